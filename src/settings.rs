//! Immutable run settings shared by every component

use std::env;
use std::path::PathBuf;

use log::debug;

use crate::dialect::{Pbs, SchedulerDialect};
use crate::error::{CsubError, Result};

/// Everything a component needs to know about the site it runs on
#[derive(Debug)]
pub struct Settings {
    pub dialect: Box<dyn SchedulerDialect>,
    /// `$VSC_SCRATCH` (or the dialect's equivalent), root of the `chkpt` tree
    pub scratch_root: PathBuf,
    pub submit_program: String,
    pub tar_program: String,
}

impl Settings {
    /// Settings for the PBS dialect, scratch root taken from the environment
    pub fn from_env(submit_program: Option<String>, tar_program: Option<String>) -> Result<Self> {
        let dialect = Box::new(Pbs);
        let var = dialect.vars().scratch;
        let scratch_root = match env::var_os(var) {
            Some(value) if !value.is_empty() => PathBuf::from(value),
            _ => return Err(CsubError::Environment(var.to_string())),
        };
        debug!("{} scheduler, scratch root from ${var}: {}", dialect.name(), scratch_root.display());

        Ok(Settings::new(dialect, scratch_root, submit_program, tar_program))
    }

    pub fn new(
        dialect: Box<dyn SchedulerDialect>,
        scratch_root: PathBuf,
        submit_program: Option<String>,
        tar_program: Option<String>,
    ) -> Self {
        let submit_program = submit_program.unwrap_or_else(|| dialect.submit_program().to_string());
        Settings {
            dialect,
            scratch_root,
            submit_program,
            tar_program: tar_program.unwrap_or_else(|| "tar".to_string()),
        }
    }

    /// `<scratch>/chkpt`, parent of every job checkpoint directory
    pub fn chkpt_root(&self) -> PathBuf {
        self.scratch_root.join("chkpt")
    }

    pub fn dialect(&self) -> &dyn SchedulerDialect {
        self.dialect.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_dialect_programs() {
        let settings = Settings::new(Box::new(Pbs), PathBuf::from("/scratch"), None, None);
        assert_eq!(settings.submit_program, "qsub");
        assert_eq!(settings.tar_program, "tar");
        assert_eq!(settings.chkpt_root(), PathBuf::from("/scratch/chkpt"));
    }

    #[test]
    fn overrides_are_kept() {
        let settings = Settings::new(
            Box::new(Pbs),
            PathBuf::from("/scratch"),
            Some("/opt/fake/qsub".to_string()),
            Some("gtar".to_string()),
        );
        assert_eq!(settings.submit_program, "/opt/fake/qsub");
        assert_eq!(settings.tar_program, "gtar");
    }
}
