mod common;

use common::TestContext;
use std::fs;

const UNREACHABLE_CONFIG: &str = r#"{
    "steps": [
        { "download": { "url": "http://127.0.0.1:9/repos/acme/app/releases/latest" } }
    ]
}"#;

#[test]
#[cfg(unix)]
fn test_missing_link_is_restored_even_when_update_fails() {
    let ctx = TestContext::new();
    let app_path = ctx.write_config("app", "App", UNREACHABLE_CONFIG);
    fs::create_dir(app_path.join("App-1.0")).unwrap();
    fs::create_dir(app_path.join("App-1.2")).unwrap();
    fs::create_dir(app_path.join(".temp_abandoned")).unwrap();

    let output = ctx.run(&["-v", "update"]);
    output
        .assert_failure()
        .assert_stderr_contains("Link App is missing, pointing it at App-1.2")
        .assert_stderr_contains("app/App failed");

    assert_eq!(
        fs::read_link(app_path.join("App")).unwrap(),
        app_path.join("App-1.2")
    );
}

#[test]
#[cfg(unix)]
fn test_dangling_link_is_repointed() {
    let ctx = TestContext::new();
    let app_path = ctx.write_config("app", "App", UNREACHABLE_CONFIG);
    fs::create_dir(app_path.join("App-2.0")).unwrap();
    std::os::unix::fs::symlink(app_path.join("App-0.9"), app_path.join("App")).unwrap();

    ctx.run(&["update"]).assert_failure();

    assert_eq!(
        fs::read_link(app_path.join("App")).unwrap(),
        app_path.join("App-2.0")
    );
}

#[test]
fn test_existing_link_is_left_alone() {
    let ctx = TestContext::new();
    let app_path = ctx.write_config("app", "App", UNREACHABLE_CONFIG);
    fs::create_dir(app_path.join("App")).unwrap();
    fs::write(app_path.join("App").join("marker"), "real dir").unwrap();
    fs::create_dir(app_path.join("App-3.0")).unwrap();

    ctx.run(&["update"]).assert_failure();

    assert_eq!(
        fs::read_to_string(app_path.join("App").join("marker")).unwrap(),
        "real dir"
    );
}
