#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command as AssertCommand;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

/// 25-60 chars of `[A-Za-z0-9_-]`, same shape the core's `ScriptId::parse`
/// requires.
pub fn script_id(seed: &str) -> String {
    let padded = format!("{seed:-<25}");
    padded.chars().take(60).collect()
}

pub struct RsmcpFixture {
    _tmp: TempDir,
    pub home: PathBuf,
}

impl RsmcpFixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let home = tmp.path().join("home");
        std::fs::create_dir_all(&home).unwrap();
        Self { _tmp: tmp, home }
    }

    pub fn cmd(&self) -> AssertCommand {
        let mut cmd = cargo_bin_cmd!("rsmcp");
        cmd.env("RSMCP_HOME", &self.home);
        cmd
    }

    pub fn process(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_rsmcp"));
        cmd.env("RSMCP_HOME", &self.home);
        cmd
    }

    pub fn project_repo(&self, id: &str) -> PathBuf {
        self.home.join("gas-repos").join(format!("project-{id}"))
    }
}
