//! Blocking invocation of external programs (tar, qsub)

use std::fmt;
use std::path::Path;
use std::process::Command;

use log::{debug, info};

use crate::error::{CsubError, Result};

/// A program and its arguments, run without a shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
}

/// Exit status and captured output of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `-1` when the process was killed by a signal
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

impl ProcessCommand {
    pub fn new(program: impl Into<String>) -> Self {
        ProcessCommand { program: program.into(), args: Vec::new() }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run to completion; only a failure to start the program is an error here
    pub fn output(&self) -> Result<ProcessOutput> {
        info!("Running {self}");
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|err| CsubError::io("Forking", Path::new(&self.program), err))?;

        let result = ProcessOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!("{} exited with {}", self.program, result.status);
        Ok(result)
    }

    /// Run to completion; a non-zero exit is an [`CsubError::ExternalProcess`]
    pub fn run(&self) -> Result<ProcessOutput> {
        let output = self.output()?;
        if output.success() {
            Ok(output)
        } else {
            Err(CsubError::ExternalProcess {
                command: self.to_string(),
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            })
        }
    }
}

impl fmt::Display for ProcessCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_stderr_separately() {
        let output = ProcessCommand::new("sh")
            .args(["-c", "echo out; echo err >&2"])
            .run()
            .unwrap();
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert!(output.success());
    }

    #[test]
    fn non_zero_exit_keeps_output() {
        let err = ProcessCommand::new("sh")
            .args(["-c", "echo nope; exit 3"])
            .run()
            .unwrap_err();
        match err {
            CsubError::ExternalProcess { status, stdout, command, .. } => {
                assert_eq!(status, 3);
                assert_eq!(stdout, "nope\n");
                assert!(command.starts_with("sh -c"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_program_is_an_io_error() {
        let err = ProcessCommand::new("/nonexistent/csub-test-program").output().unwrap_err();
        assert!(matches!(err, CsubError::Io { .. }));
    }
}
