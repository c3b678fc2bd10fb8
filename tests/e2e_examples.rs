mod common;

use common::TestContext;

#[test]
#[cfg(feature = "e2e")]
fn e2e_update_notepad_plus_plus_from_github() {
    let ctx = TestContext::new();

    // Example: the portable x64 zip of the latest Notepad++ release
    let app_path = ctx.write_config(
        "notepadpp",
        "NotepadPP",
        r#"{
            "finalDirPattern": "npp-{version}",
            "steps": [
                { "download": {
                    "url": "https://api.github.com/repos/notepad-plus-plus/notepad-plus-plus/releases/latest",
                    "filter": { "mustContain": ["portable", "x64"], "allowedExt": ["zip"] }
                } },
                { "extractZip": "$downloadedFile" }
            ]
        }"#,
    );

    let output = ctx.run(&["-v", "update"]);
    output
        .assert_success()
        .assert_stdout_contains("UPDATED - notepadpp/NotepadPP - ");

    let installed: Vec<_> = std::fs::read_dir(&app_path)
        .unwrap()
        .flatten()
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("npp-"))
        .collect();
    assert_eq!(installed.len(), 1);
    assert!(installed[0].path().join("notepad++.exe").is_file());

    // Nothing new the second time round
    let output = ctx.run(&["update"]);
    output.assert_success();
    assert!(!output.stdout.contains("UPDATED"));
}

#[test]
#[cfg(feature = "e2e")]
fn e2e_validate_and_show_live_config() {
    let ctx = TestContext::new();
    ctx.write_config(
        "totalcmd",
        "TotalCommander",
        r#"{
            "finalDirPattern": "TotalCommander-{version}-x64",
            "steps": [
                { "download": {
                    "pageUrl": "https://www.ghisler.com/download.htm",
                    "findLink": { "mustContain": ["x64", ".exe"], "mustNotContain": [], "allowedExt": ["exe"] },
                    "versionFrom": "exe"
                } },
                { "extract7z": "$downloadedFile" },
                { "extract7z": "INSTALL.CAB" },
                { "move": { "from": "INSTALL/*", "to": "$finalDir/" } }
            ]
        }"#,
    );

    ctx.run(&["validate"])
        .assert_success()
        .assert_stdout_contains("totalcmd/TotalCommander (4 steps)");
    ctx.run(&["show", "totalcmd", "--format", "yaml"])
        .assert_success()
        .assert_stdout_contains("extract7z: INSTALL.CAB");
}
