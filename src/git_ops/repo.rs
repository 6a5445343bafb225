//! Low-level git subprocess helpers behind the write pipeline: spawn-style
//! argument lists only, never shell string concatenation, `-C <dir>` for
//! invocation, errors surfaced via captured stderr. The subcommands below
//! are the complete allow-list this core ever invokes.

use std::path::Path;
use std::process::{Command, Output};

use crate::error::CoreError;

fn run(dir: &Path, args: &[&str]) -> Result<Output, CoreError> {
    Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .map_err(|e| CoreError::io(format!("failed to spawn git {args:?}: {e}")))
}

fn ok_or_stderr(out: Output, context: &str) -> Result<Output, CoreError> {
    if out.status.success() {
        Ok(out)
    } else {
        let stderr = String::from_utf8_lossy(&out.stderr);
        Err(CoreError::io(format!("{context}: {}", stderr.trim())))
    }
}

/// `git init` if `dir/.git` is absent, then a `.gitkeep` + initial commit so
/// index operations (`add`, `diff --cached`) are valid from the start.
pub fn ensure_repo(dir: &Path) -> Result<(), CoreError> {
    std::fs::create_dir_all(dir).map_err(|e| CoreError::io(format!("mkdir {}: {e}", dir.display())))?;
    if dir.join(".git").exists() {
        return Ok(());
    }
    ok_or_stderr(run(dir, &["init"])?, "git init")?;
    let gitkeep = dir.join(".gitkeep");
    std::fs::write(&gitkeep, b"").map_err(|e| CoreError::io(format!("write .gitkeep: {e}")))?;
    ok_or_stderr(run(dir, &["add", "--", ".gitkeep"])?, "git add .gitkeep")?;
    ok_or_stderr(
        run(dir, &["commit", "-m", "initialize repository"])?,
        "git commit (init)",
    )?;
    Ok(())
}

pub fn current_branch(dir: &Path) -> Result<String, CoreError> {
    let out = ok_or_stderr(
        run(dir, &["rev-parse", "--abbrev-ref", "HEAD"])?,
        "git rev-parse HEAD",
    )?;
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

/// Create and check out `branch` if it doesn't already exist; otherwise
/// check it out. Used to set up the `session/<id>` branch and the
/// `llm-feature-<timestamp>` branch for persistent project repos.
pub fn ensure_branch(dir: &Path, branch: &str) -> Result<(), CoreError> {
    let exists = run(dir, &["rev-parse", "--verify", "--quiet", branch])?
        .status
        .success();
    if exists {
        ok_or_stderr(run(dir, &["checkout", branch])?, "git checkout")?;
    } else {
        ok_or_stderr(run(dir, &["checkout", "-b", branch])?, "git checkout -b")?;
    }
    Ok(())
}

pub fn stage(dir: &Path, files: &[String]) -> Result<(), CoreError> {
    if files.is_empty() {
        return Ok(());
    }
    let mut args = vec!["add", "--"];
    args.extend(files.iter().map(|s| s.as_str()));
    ok_or_stderr(run(dir, &args)?, "git add")?;
    Ok(())
}

/// `git diff --cached --name-only`, non-empty means something is staged.
pub fn staged_names(dir: &Path) -> Result<Vec<String>, CoreError> {
    let out = ok_or_stderr(
        run(dir, &["diff", "--cached", "--name-only"])?,
        "git diff --cached",
    )?;
    Ok(String::from_utf8_lossy(&out.stdout)
        .lines()
        .map(|l| l.to_string())
        .filter(|l| !l.is_empty())
        .collect())
}

pub fn has_any_commit(dir: &Path) -> bool {
    run(dir, &["rev-parse", "--verify", "--quiet", "HEAD"])
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Unstage files for rollback: `git reset HEAD -- <files>` if the repo has
/// commits, else `git rm --cached -- <files>`.
pub fn unstage(dir: &Path, files: &[String]) -> Result<(), CoreError> {
    if files.is_empty() {
        return Ok(());
    }
    if has_any_commit(dir) {
        let mut args = vec!["reset", "HEAD", "--"];
        args.extend(files.iter().map(|s| s.as_str()));
        ok_or_stderr(run(dir, &args)?, "git reset")?;
    } else {
        let mut args = vec!["rm", "--cached", "--"];
        args.extend(files.iter().map(|s| s.as_str()));
        ok_or_stderr(run(dir, &args)?, "git rm --cached")?;
    }
    Ok(())
}

pub fn commit(dir: &Path, message: &str) -> Result<String, CoreError> {
    ok_or_stderr(run(dir, &["commit", "-m", message])?, "git commit")?;
    rev_parse(dir, "HEAD")
}

pub fn rev_parse(dir: &Path, rev: &str) -> Result<String, CoreError> {
    let out = ok_or_stderr(
        run(dir, &["rev-parse", "--verify", rev])?,
        "git rev-parse",
    )?;
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

pub fn reset_hard(dir: &Path, rev: &str) -> Result<(), CoreError> {
    ok_or_stderr(run(dir, &["reset", "--hard", rev])?, "git reset --hard")?;
    Ok(())
}

pub fn add_all(dir: &Path) -> Result<(), CoreError> {
    ok_or_stderr(run(dir, &["add", "-A"])?, "git add -A")?;
    Ok(())
}

/// `git commit`, treating a "nothing to commit" exit as a non-error no-op.
pub fn commit_allow_empty_noop(dir: &Path, message: &str) -> Result<Option<String>, CoreError> {
    let out = run(dir, &["commit", "-m", message])?;
    if out.status.success() {
        return Ok(Some(rev_parse(dir, "HEAD")?));
    }
    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&out.stderr),
        String::from_utf8_lossy(&out.stdout)
    )
    .to_lowercase();
    let no_changes = combined.contains("nothing to commit")
        || combined.contains("no changes added to commit")
        || combined.contains("nothing added to commit");
    if no_changes {
        Ok(None)
    } else {
        Err(CoreError::io(format!("git commit failed: {combined}")))
    }
}

pub fn worktree_add(cache_dir: &Path, wt_path: &Path, branch: &str, commit_ish: &str) -> Result<(), CoreError> {
    ok_or_stderr(
        run(
            cache_dir,
            &[
                "worktree",
                "add",
                "-b",
                branch,
                &wt_path.to_string_lossy(),
                commit_ish,
            ],
        )?,
        "git worktree add",
    )?;
    Ok(())
}

pub fn worktree_remove(cache_dir: &Path, wt_path: &Path, force: bool) -> Result<(), CoreError> {
    let mut args = vec!["worktree", "remove"];
    if force {
        args.push("--force");
    }
    let path_str = wt_path.to_string_lossy();
    args.push(&path_str);
    ok_or_stderr(run(cache_dir, &args)?, "git worktree remove")?;
    Ok(())
}
