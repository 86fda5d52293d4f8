use anyhow::Result;
use std::path::PathBuf;
use tempfile::TempDir;

/// Scratch directory for throwaway programs handed to a PTY as its "shell"
pub struct TestFixtures {
    temp_dir: TempDir,
}

impl TestFixtures {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    /// Write an executable `/bin/sh` script with the given body
    pub fn create_test_script(&self, name: &str, body: &str) -> Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let script_path = self.temp_dir.path().join(name);
        std::fs::write(&script_path, format!("#!/bin/sh\n{body}\n"))?;

        let mut perms = std::fs::metadata(&script_path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script_path, perms)?;

        Ok(script_path)
    }
}
