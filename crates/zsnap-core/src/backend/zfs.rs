//! Backend that shells out to the `zfs` command line tool.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::{BackendError, StorageBackend};

/// Program name used when no explicit path is configured.
pub const DEFAULT_COMMAND: &str = "zfs";

/// [`StorageBackend`] driving a `zfs` executable.
#[derive(Debug, Clone)]
pub struct ZfsBackend {
    program: PathBuf,
}

impl ZfsBackend {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn run(&self, args: &[&str]) -> Result<String, BackendError> {
        execute(&self.program, args)
    }
}

impl Default for ZfsBackend {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND)
    }
}

impl StorageBackend for ZfsBackend {
    fn list_volumes(&self) -> Result<Vec<String>, BackendError> {
        self.run(&["list", "-Hp"]).map(|output| non_blank_lines(&output))
    }

    fn list_snapshots(&self) -> Result<Vec<String>, BackendError> {
        self.run(&["list", "-Hpt", "snapshot"])
            .map(|output| non_blank_lines(&output))
    }

    fn create_snapshot(&self, name: &str) -> Result<(), BackendError> {
        self.run(&["snapshot", name]).map(drop)
    }

    fn destroy_snapshot(&self, name: &str) -> Result<(), BackendError> {
        self.run(&["destroy", name]).map(drop)
    }
}

/// Run `program args...` and return its stdout.
///
/// # Errors
///
/// Returns [`BackendError`] carrying the command line and either the captured
/// stdout/stderr (non-zero exit) or the spawn error text.
pub fn execute<S: AsRef<OsStr>>(program: &Path, args: &[S]) -> Result<String, BackendError> {
    let command_line = render_command(program, args);
    debug!(command = %command_line, "executing backend command");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|err| BackendError::new(&command_line, err.to_string()))?;

    if !output.status.success() {
        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        captured.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(BackendError::new(command_line, captured.trim_end()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn render_command<S: AsRef<OsStr>>(program: &Path, args: &[S]) -> String {
    std::iter::once(program.as_os_str())
        .chain(args.iter().map(AsRef::as_ref))
        .map(OsStr::to_string_lossy)
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_blank_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Write an executable shell script standing in for `zfs`.
    fn fake_zfs(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("zfs");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    }

    #[test]
    fn execute_returns_stdout() {
        let output = execute(Path::new("echo"), &["Hello World!"]).expect("echo runs");
        assert_eq!(output.trim(), "Hello World!");
    }

    #[test]
    fn execute_reports_missing_program() {
        let err = execute(Path::new("iamnothere"), &["-a", "-b"]).expect_err("must fail");
        assert_eq!(err.command, "iamnothere -a -b");
        assert!(!err.output.is_empty());
    }

    #[test]
    fn execute_reports_non_zero_exit_with_output() {
        let dir = TempDir::new().expect("tempdir");
        let zfs = fake_zfs(&dir, "echo \"cannot open '$2': dataset does not exist\" >&2\nexit 1");
        let err = execute(&zfs, &["destroy", "tank@gone"]).expect_err("must fail");
        assert!(err.command.ends_with("zfs destroy tank@gone"));
        assert_eq!(err.output, "cannot open 'tank@gone': dataset does not exist");
    }

    #[test]
    fn listings_use_expected_arguments() {
        let dir = TempDir::new().expect("tempdir");
        let zfs = fake_zfs(
            &dir,
            "if [ \"$*\" = \"list -Hp\" ]; then\n  printf 'tank\\t1\\t2\\t3\\t/tank\\n\\nbackup\\t1\\t2\\t3\\t/backup\\n'\n\
             elif [ \"$*\" = \"list -Hpt snapshot\" ]; then\n  printf 'tank@zsnap_2010-06-15_12:30_0100\\t0\\t-\\t1\\t-\\n'\n\
             else\n  exit 3\nfi",
        );
        let backend = ZfsBackend::new(&zfs);
        assert_eq!(
            backend.list_volumes().expect("volumes"),
            vec!["tank\t1\t2\t3\t/tank", "backup\t1\t2\t3\t/backup"]
        );
        assert_eq!(
            backend.list_snapshots().expect("snapshots"),
            vec!["tank@zsnap_2010-06-15_12:30_0100\t0\t-\t1\t-"]
        );
    }

    #[test]
    fn create_and_destroy_pass_the_name() {
        let dir = TempDir::new().expect("tempdir");
        let log = dir.path().join("calls.log");
        let zfs = fake_zfs(&dir, &format!("echo \"$*\" >> '{}'", log.display()));
        let backend = ZfsBackend::new(&zfs);

        backend
            .create_snapshot("tank@zsnap_2010-06-15_12:30_0100")
            .expect("create");
        backend
            .destroy_snapshot("tank@zsnap_2010-06-14_12:30_0100")
            .expect("destroy");

        let calls = fs::read_to_string(&log).expect("log");
        assert_eq!(
            calls,
            "snapshot tank@zsnap_2010-06-15_12:30_0100\ndestroy tank@zsnap_2010-06-14_12:30_0100\n"
        );
    }

    #[test]
    fn default_backend_uses_zfs() {
        assert_eq!(ZfsBackend::default().program(), Path::new("zfs"));
    }
}
