use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

// Shared by several test binaries; each uses a different subset.
#[allow(dead_code)]
pub struct TestContext {
    pub _temp_dir: TempDir,
    pub settings_path: PathBuf,
    pub root: PathBuf,
    pub bin_path: PathBuf,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let settings_path = temp_dir.path().join("settings.json");
        let root = temp_dir.path().join("software");
        fs::create_dir_all(&root).expect("Failed to create software root");

        let bin_path = PathBuf::from(env!("CARGO_BIN_EXE_portup"));

        Self {
            _temp_dir: temp_dir,
            settings_path,
            root,
            bin_path,
        }
    }

    /// A command isolated from the caller's settings and environment.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(&self.bin_path);
        cmd.env("PORTUP_CONFIG", &self.settings_path);
        cmd.env("SOFTWARE_ROOT", &self.root);
        cmd.env_remove("PORTUP_ROOT");
        cmd.env_remove("PORTUP_7Z");
        cmd.env_remove("PORTUP_VERIFY_TLS");
        cmd.env_remove("PORTUP_KEEP_FAILED");
        cmd.env_remove("RUST_LOG");
        cmd.env("HOME", self._temp_dir.path());
        cmd.env("XDG_CONFIG_HOME", self._temp_dir.path().join("config"));
        cmd
    }

    pub fn run(&self, args: &[&str]) -> CommandOutput {
        self.cmd()
            .args(args)
            .output()
            .expect("Failed to run portup")
            .into()
    }

    /// Writes `<root>/<folder>/<base>.json` and returns the app directory.
    pub fn write_config(&self, folder: &str, base: &str, json: &str) -> PathBuf {
        let app_path = self.root.join(folder);
        fs::create_dir_all(&app_path).expect("Failed to create app dir");
        fs::write(app_path.join(format!("{}.json", base)), json).expect("Failed to write config");
        app_path
    }
}

#[allow(dead_code)]
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::FileOptions;

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, FileOptions::default())
            .expect("Failed to start zip entry");
        writer
            .write_all(content.as_bytes())
            .expect("Failed to write zip entry");
    }
    writer.finish().expect("Failed to finish zip").into_inner()
}

#[allow(dead_code)]
pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("Cannot read {}: {}", path.display(), e))
}

#[allow(dead_code)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status,
        }
    }
}

#[allow(dead_code)]
impl CommandOutput {
    pub fn assert_success(&self) -> &Self {
        if !self.status.success() {
            panic!(
                "Command failed with status {:?}\nstdout: {}\nstderr: {}",
                self.status.code(),
                self.stdout,
                self.stderr
            );
        }
        self
    }

    pub fn assert_failure(&self) -> &Self {
        if self.status.success() {
            panic!(
                "Command unexpectedly succeeded\nstdout: {}\nstderr: {}",
                self.stdout, self.stderr
            );
        }
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Stdout did not contain '{}'\nActual stdout: {}",
            text,
            self.stdout
        );
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Stderr did not contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}
