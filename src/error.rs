//! Error taxonomy for submission and resume
//!
//! Nothing in the library retries or recovers: every variant ends the run with exit status 1.
//! Artifacts written before a failure are left on disk so they can be inspected.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CsubError>;

#[derive(Debug, Error)]
pub enum CsubError {
    /// A mandatory environment variable is not set
    #[error("{0} is mandatory")]
    Environment(String),

    /// The checkpoint directory for a new job already exists
    #[error("Chkpt dir {} already exists", .0.display())]
    Conflict(PathBuf),

    #[error("{action} {} failed: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    ResumeNotFound(#[from] ResumeFailure),

    /// An external program (tar, qsub) exited non-zero
    #[error("{command} failed: exitcode {status}, output {stdout}{stderr}")]
    ExternalProcess {
        command: String,
        status: i32,
        stdout: String,
        stderr: String,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Config(String),

    #[error("template {name}: {source}")]
    Template {
        name: &'static str,
        #[source]
        source: tinytemplate::error::Error,
    },
}

impl CsubError {
    pub fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        CsubError::Io { action, path: path.to_path_buf(), source }
    }
}

/// The first artifact found missing while checking a job for resume
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResumeFailure {
    #[error("Job checkpoint directory ({}) not found", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Job script ({}) not found", .0.display())]
    MissingJobScript(PathBuf),

    /// Neither a packed tarball with its completion marker nor a checkpoint file exists
    #[error("Neither job tarball ({}) nor checkpoint file ({}) found", tarball.display(), chkpt_file.display())]
    MissingPayload { tarball: PathBuf, chkpt_file: PathBuf },

    #[error("Base script for job ({}) not found", .0.display())]
    MissingBaseScript(PathBuf),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Failed to parse time '{0}', expected <hours>:<minutes>:<seconds>, e.g. '3:12:47'")]
    Duration(String),

    #[error("Job time of {job_time}s plus checkpoint time of {chkpt_time}s is too long a wall time")]
    WallTime { job_time: u64, chkpt_time: u64 },

    #[error("Unexpected format of job name '{0}'")]
    JobIdentity(String),

    #[error("Can't read back base script header: {0}")]
    BaseScript(String),
}
