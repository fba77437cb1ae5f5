//! The subprocess tester and the concatenating test builder.

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::trace;

use core_model::{ConfigId, Outcome, TestBuilder, Tester};

/// Builds a test case by concatenating the atoms a config selects.
pub struct ConcatTestBuilder {
    atoms: Vec<String>,
}

impl ConcatTestBuilder {
    pub fn new(atoms: Vec<String>) -> Self {
        Self { atoms }
    }
}

impl TestBuilder for ConcatTestBuilder {
    fn build(&self, config: &[usize]) -> String {
        config.iter().map(|&i| self.atoms[i].as_str()).collect()
    }
}

/// Runs a user-supplied command on the materialized test case and maps
/// its exit status to an outcome: exit code 0 means the candidate is
/// still interesting (FAIL), anything else means PASS.
///
/// Each test gets its own directory under `work_dir`, named after the
/// config id, with the test case written under the original input's
/// filename; the command runs with that directory as its working
/// directory and receives the test case path as its argument.
pub struct SubprocessTest {
    builder: Arc<dyn TestBuilder>,
    command: PathBuf,
    work_dir: PathBuf,
    filename: String,
    cleanup: bool,
}

impl SubprocessTest {
    pub fn new(
        builder: Arc<dyn TestBuilder>,
        command: PathBuf,
        work_dir: PathBuf,
        filename: String,
        cleanup: bool,
    ) -> Self {
        Self {
            builder,
            command,
            work_dir,
            filename,
            cleanup,
        }
    }
}

impl Tester for SubprocessTest {
    fn test(&self, config: &[usize], id: &ConfigId) -> Result<Outcome> {
        let test_dir = self.work_dir.join(id.dir_name());
        let test_path = test_dir.join(&self.filename);

        fs::create_dir_all(&test_dir)
            .with_context(|| format!("creating test directory {}", test_dir.display()))?;
        fs::write(&test_path, self.builder.build(config))
            .with_context(|| format!("writing test case {}", test_path.display()))?;

        let status = Command::new(&self.command)
            .arg(&test_path)
            .current_dir(&test_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("running tester {}", self.command.display()))?;

        if self.cleanup {
            let _ = fs::remove_dir_all(&test_dir);
        }

        trace!(target: "reduce.test", id = %id, code = ?status.code(), "tester exited");
        Ok(if status.success() {
            Outcome::Fail
        } else {
            Outcome::Pass
        })
    }
}
