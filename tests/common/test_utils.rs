use std::{fs, path::PathBuf};

/// Temporary snapshot file that is removed when dropped
pub struct TestStateFile {
    path: PathBuf,
}

impl TestStateFile {
    /// Create a state file path named after the test, inside the system temp dir
    pub fn new(test_name: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "test_bbf_{}_{}.state",
            test_name,
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        Self { path }
    }

    #[allow(dead_code)]
    pub fn path(&self) -> PathBuf {
        self.path.clone()
    }
}

impl Drop for TestStateFile {
    fn drop(&mut self) {
        if self.path.exists() {
            let _ = fs::remove_file(&self.path);
        }
    }
}
