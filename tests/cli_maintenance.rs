use std::fs;

#[path = "support/mod.rs"]
mod support;

use support::RsmcpFixture;

#[test]
fn hash_matches_git_hash_object_for_known_blob() {
    let fx = RsmcpFixture::new();
    let file = fx.home.join("hello.txt");
    fs::write(&file, "hello world").unwrap();

    fx.cmd()
        .arg("hash")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicates::str::contains(
            "95d09f2b10159347eece71399a7e2e907ea3df4",
        ));
}

#[test]
fn wrap_then_unwrap_round_trips_through_the_cli() {
    let fx = RsmcpFixture::new();
    let file = fx.home.join("Utils.gs");
    fs::write(&file, "function f(){return 1}").unwrap();

    let wrapped = fx.cmd().arg("wrap").arg(&file).output().unwrap();
    assert!(wrapped.status.success());
    let wrapped_text = String::from_utf8(wrapped.stdout).unwrap();
    assert!(wrapped_text.contains("__defineModule__"));

    let wrapped_file = fx.home.join("Utils.wrapped.gs");
    fs::write(&wrapped_file, wrapped_text.trim_end()).unwrap();

    fx.cmd()
        .arg("unwrap")
        .arg(&wrapped_file)
        .assert()
        .success()
        .stdout(predicates::str::contains("function f(){return 1}"));
}

#[test]
fn lock_status_reports_unlocked_before_any_lock_is_taken() {
    let fx = RsmcpFixture::new();
    fx.cmd()
        .args(["lock", "status", "someProjectIdThatIsLongEnough123"])
        .assert()
        .success()
        .stdout(predicates::str::contains("unlocked"));
}

#[test]
fn lock_gc_on_an_empty_lock_dir_removes_nothing() {
    let fx = RsmcpFixture::new();
    fx.cmd()
        .args(["lock", "gc"])
        .assert()
        .success()
        .stdout(predicates::str::contains("removed 0 stale lock"));
}
