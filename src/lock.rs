//! Filesystem-advisory mutex coordinating writers across processes, one lock
//! per `scriptId`: an in-process gate for same-process contention plus an
//! atomically-created JSON record file for cross-process visibility,
//! acquired with backoff and released on drop.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::LockRecord;

const STALE_FOREIGN_HOST_SECS: u64 = 5 * 60;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_BACKOFF_MIN: Duration = Duration::from_millis(25);
const RETRY_BACKOFF_MAX: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Default)]
pub struct LockMetrics {
    pub currently_held: usize,
    pub stale_removed: u64,
    pub contentions: u64,
    pub timeouts: u64,
}

#[derive(Debug, Clone)]
pub struct LockStatus {
    pub locked: bool,
    pub holder: Option<LockRecord>,
}

/// Process-global singleton coordinating both intra-process (per `scriptId`
/// queue) and cross-process (atomic file create) exclusion.
pub struct LockManager {
    lock_dir: PathBuf,
    hostname: String,
    intra_process: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    held_by_us: Mutex<HashMap<String, ()>>,
    metrics: Mutex<LockMetrics>,
}

impl LockManager {
    pub fn new(lock_dir: PathBuf) -> std::io::Result<Self> {
        fs::create_dir_all(&lock_dir)?;
        set_dir_perms(&lock_dir)?;
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown-host".to_string());
        Ok(Self {
            lock_dir,
            hostname,
            intra_process: Mutex::new(HashMap::new()),
            held_by_us: Mutex::new(HashMap::new()),
            metrics: Mutex::new(LockMetrics::default()),
        })
    }

    fn lock_path(&self, script_id: &str) -> PathBuf {
        self.lock_dir.join(format!("{script_id}.lock"))
    }

    fn intra_process_gate(&self, script_id: &str) -> Arc<Mutex<()>> {
        let mut gates = self.intra_process.lock().expect("lock poisoned");
        gates
            .entry(script_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire the lock for `script_id`, blocking up to `timeout` (default 30s).
    pub fn acquire(
        &self,
        script_id: &str,
        operation: &str,
        timeout: Option<Duration>,
    ) -> Result<LockGuard<'_>, CoreError> {
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let deadline = Instant::now() + timeout;

        // Intra-process serialization first: a per-scriptId gate, held for
        // the lifetime of the guard via a leaked-into-guard MutexGuard would
        // fight the borrow checker across threads, so instead we track
        // cross-process ownership as the single source of truth and use the
        // gate only to avoid two local threads racing the same file create.
        let gate = self.intra_process_gate(script_id);
        let _gate_permit = gate.lock().expect("lock poisoned");

        let path = self.lock_path(script_id);
        let mut backoff = RETRY_BACKOFF_MIN;

        loop {
            match self.try_create(&path, script_id, operation) {
                Ok(()) => {
                    self.held_by_us
                        .lock()
                        .expect("lock poisoned")
                        .insert(script_id.to_string(), ());
                    let mut metrics = self.metrics.lock().expect("lock poisoned");
                    metrics.currently_held += 1;
                    debug!(script_id, operation, "lock acquired");
                    return Ok(LockGuard {
                        manager: self,
                        script_id: script_id.to_string(),
                    });
                }
                Err(CreateError::Exists) => {
                    self.metrics.lock().expect("lock poisoned").contentions += 1;
                    match self.read_record(&path) {
                        Some(record) if self.is_stale(&record) => {
                            debug!(script_id, holder = %record.pid, "removing stale lock");
                            let _ = fs::remove_file(&path);
                            self.metrics.lock().expect("lock poisoned").stale_removed += 1;
                            continue;
                        }
                        Some(record) => {
                            if Instant::now() >= deadline {
                                self.metrics.lock().expect("lock poisoned").timeouts += 1;
                                return Err(CoreError::LockTimeout {
                                    script_id: script_id.to_string(),
                                    holder: format!("{}@{}", record.pid, record.hostname),
                                });
                            }
                        }
                        None => {
                            // Record vanished or unreadable mid-race; assume live
                            // and keep waiting rather than spin.
                            if Instant::now() >= deadline {
                                self.metrics.lock().expect("lock poisoned").timeouts += 1;
                                return Err(CoreError::LockTimeout {
                                    script_id: script_id.to_string(),
                                    holder: "unknown".to_string(),
                                });
                            }
                        }
                    }
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(RETRY_BACKOFF_MAX);
                }
                Err(CreateError::Io(err)) => {
                    return Err(CoreError::io(format!("lock file create failed: {err}")));
                }
            }
        }
    }

    fn try_create(
        &self,
        path: &Path,
        script_id: &str,
        operation: &str,
    ) -> Result<(), CreateError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(f) => f,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(CreateError::Exists)
            }
            Err(err) => return Err(CreateError::Io(err)),
        };
        set_file_perms(path)?;
        let record = LockRecord {
            pid: std::process::id(),
            hostname: self.hostname.clone(),
            timestamp: now_rfc3339(),
            operation: operation.to_string(),
            script_id: script_id.to_string(),
        };
        let json = serde_json::to_vec_pretty(&record).map_err(|e| {
            CreateError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
        })?;
        file.write_all(&json).map_err(CreateError::Io)?;
        Ok(())
    }

    fn read_record(&self, path: &Path) -> Option<LockRecord> {
        let data = fs::read(path).ok()?;
        serde_json::from_slice(&data).ok()
    }

    fn is_stale(&self, record: &LockRecord) -> bool {
        if record.hostname == self.hostname {
            return !process_is_alive(record.pid);
        }
        match DateTime::parse_from_rfc3339(&record.timestamp) {
            Ok(ts) => {
                let age = Utc::now().signed_duration_since(ts.with_timezone(&Utc));
                age.num_seconds() as u64 > STALE_FOREIGN_HOST_SECS
            }
            Err(_) => false,
        }
    }

    /// Remove the lock file only if this process owns it (tracked locally).
    pub fn release(&self, script_id: &str) -> Result<(), CoreError> {
        let mut held = self.held_by_us.lock().expect("lock poisoned");
        if held.remove(script_id).is_some() {
            let path = self.lock_path(script_id);
            if path.exists() {
                fs::remove_file(&path)
                    .map_err(|e| CoreError::io(format!("failed to release lock: {e}")))?;
            }
            let mut metrics = self.metrics.lock().expect("lock poisoned");
            metrics.currently_held = metrics.currently_held.saturating_sub(1);
        }
        Ok(())
    }

    /// Report lock status without blocking.
    pub fn status(&self, script_id: &str) -> LockStatus {
        let path = self.lock_path(script_id);
        match self.read_record(&path) {
            Some(record) => LockStatus {
                locked: !self.is_stale(&record),
                holder: Some(record),
            },
            None => LockStatus {
                locked: false,
                holder: None,
            },
        }
    }

    /// Release every lock this process holds (process exit / signal).
    pub fn release_all(&self) {
        let held: Vec<String> = self
            .held_by_us
            .lock()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        for script_id in held {
            let _ = self.release(&script_id);
        }
    }

    /// Scan the lock dir; unlink records classified stale.
    pub fn cleanup_stale(&self) -> Result<usize, CoreError> {
        let mut removed = 0usize;
        let entries = fs::read_dir(&self.lock_dir)
            .map_err(|e| CoreError::io(format!("failed to scan lock dir: {e}")))?;
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("lock") {
                continue;
            }
            if let Some(record) = self.read_record(&path) {
                if self.is_stale(&record) {
                    if fs::remove_file(&path).is_ok() {
                        removed += 1;
                    }
                }
            }
        }
        self.metrics.lock().expect("lock poisoned").stale_removed += removed as u64;
        Ok(removed)
    }

    pub fn metrics(&self) -> LockMetrics {
        self.metrics.lock().expect("lock poisoned").clone()
    }
}

impl Drop for LockManager {
    fn drop(&mut self) {
        self.release_all();
    }
}

enum CreateError {
    Exists,
    Io(std::io::Error),
}

/// RAII guard releasing the lock on drop, logging instead of panicking if
/// release fails.
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    script_id: String,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.manager.release(&self.script_id) {
            warn!(script_id = %self.script_id, %err, "failed to release lock on drop");
        }
    }
}

fn process_is_alive(pid: u32) -> bool {
    #[cfg(target_os = "linux")]
    {
        Path::new(&format!("/proc/{pid}")).exists()
    }
    #[cfg(not(target_os = "linux"))]
    {
        // Conservative default off Linux: assume live so we never delete a
        // lock we can't actually verify is abandoned.
        let _ = pid;
        true
    }
}

fn now_rfc3339() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    DateTime::<Utc>::from(UNIX_EPOCH + now).to_rfc3339()
}

#[cfg(unix)]
fn set_dir_perms(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn set_dir_perms(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_file_perms(path: &Path) -> Result<(), CreateError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(CreateError::Io)
}

#[cfg(not(unix))]
fn set_file_perms(_path: &Path) -> Result<(), CreateError> {
    Ok(())
}

/// Reopen an existing lock file for reading (used by callers that want the
/// raw record without going through `LockManager::status`).
pub fn read_lock_file(path: &Path) -> std::io::Result<LockRecord> {
    let data = fs::read(path)?;
    serde_json::from_slice(&data)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
