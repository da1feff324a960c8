use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{CsubError, Result};

/// How a job was submitted, read back when it is resumed
///
/// Only the `shared` flag is consulted on resume: a job that ran in shared mode may have no
/// tarball and no checkpoint file yet and can still be resubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JobMeta {
    pub name: String,
    pub created: String,
    pub shared: bool,
    pub mimic_pro_epi: bool,
    pub job_time: u64,
    pub chkpt_time: u64,
    pub array_spec: Option<String>,
}

impl JobMeta {
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            CsubError::io("Serialising job metadata", path, err.into())
        })?;
        info!("Writing job metadata to {}", path.display());
        fs::write(path, json).map_err(|err| CsubError::io("Writing job metadata", path, err))
    }

    /// `None` if the file is missing or unreadable
    pub fn read(path: &Path) -> Option<JobMeta> {
        let json = fs::read_to_string(path).ok()?;
        serde_json::from_str(&json).ok()
    }
}
