use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestEnv {
    _tmp: TempDir,
    pub logs: PathBuf,
    config: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let logs = tmp.path().join("logs");
        let config = tmp.path().join("config.json");
        Self {
            _tmp: tmp,
            logs,
            config,
        }
    }

    pub fn write_config(&self, json: &str) {
        fs::write(&self.config, json).expect("write config");
    }

    /// A binary with an empty environment apart from the pipe's own paths.
    pub fn cmd(&self, bin: &str) -> Command {
        let mut cmd = Command::cargo_bin(bin).expect("binary built");
        cmd.env_clear()
            .env("DETECTOR_PIPE_LOG_DIR", &self.logs)
            .env("DETECTOR_PIPE_CONFIG", &self.config);
        cmd
    }

    pub fn log_files(&self) -> Vec<(String, String)> {
        let Ok(entries) = fs::read_dir(&self.logs) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .map(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                let body = fs::read_to_string(e.path()).unwrap_or_default();
                (name, body)
            })
            .collect()
    }
}
