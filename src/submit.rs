use std::path::Path;

use log::info;

use crate::error::Result;
use crate::process::ProcessCommand;
use crate::settings::Settings;

/// A job accepted by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedJob {
    /// Whatever the submission program printed, e.g. `1234.master`
    pub scheduler_id: String,
    pub name: String,
}

pub struct Submitter<'a> {
    settings: &'a Settings,
}

impl<'a> Submitter<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Submitter { settings }
    }

    /// Hand `base_script` to the scheduler, as an array job if `array` is set
    ///
    /// A non-zero exit of the submission program is returned with its output, never retried.
    pub fn submit(&self, name: &str, base_script: &Path, array: Option<&str>) -> Result<SubmittedJob> {
        let mut cmd = ProcessCommand::new(&self.settings.submit_program);
        if let Some(spec) = array {
            cmd = cmd.args(self.settings.dialect().array_flag(spec));
        }
        let output = cmd.path_arg(base_script).run()?;

        let scheduler_id = output.stdout.trim().to_string();
        info!("Scheduler job id: {scheduler_id}");
        Ok(SubmittedJob { scheduler_id, name: name.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;
    use crate::dialect::Pbs;
    use crate::error::CsubError;

    /// A qsub that records its arguments and prints a job id
    fn fake_qsub(tmp: &TempDir, body: &str) -> Settings {
        let path = tmp.path().join("qsub");
        fs::write(&path, format!("#!/bin/sh\necho \"$@\" > {}/args\n{body}\n", tmp.path().display())).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        Settings::new(
            Box::new(Pbs),
            PathBuf::from("/scratch"),
            Some(path.display().to_string()),
            None,
        )
    }

    #[test]
    fn reports_trimmed_scheduler_id() {
        let tmp = TempDir::new().unwrap();
        let settings = fake_qsub(&tmp, "echo 1234.master");
        let job = Submitter::new(&settings)
            .submit("j.20240301_120005.a7", Path::new("/chkpt/j/checkpoint/base"), None)
            .unwrap();

        assert_eq!(job.scheduler_id, "1234.master");
        assert_eq!(job.name, "j.20240301_120005.a7");
        let args = fs::read_to_string(tmp.path().join("args")).unwrap();
        assert_eq!(args, "/chkpt/j/checkpoint/base\n");
    }

    #[test]
    fn array_spec_goes_before_the_script() {
        let tmp = TempDir::new().unwrap();
        let settings = fake_qsub(&tmp, "echo 1235[].master");
        Submitter::new(&settings)
            .submit("j", Path::new("/chkpt/j/checkpoint/base"), Some("3"))
            .unwrap();

        let args = fs::read_to_string(tmp.path().join("args")).unwrap();
        assert_eq!(args, "-t 3 /chkpt/j/checkpoint/base\n");
    }

    #[test]
    fn rejected_submission_surfaces_output() {
        let tmp = TempDir::new().unwrap();
        let settings = fake_qsub(&tmp, "echo 'qsub: Unknown queue' >&2\nexit 170");
        let err = Submitter::new(&settings)
            .submit("j", Path::new("/chkpt/j/checkpoint/base"), None)
            .unwrap_err();

        match err {
            CsubError::ExternalProcess { status, stderr, .. } => {
                assert_eq!(status, 170);
                assert_eq!(stderr, "qsub: Unknown queue\n");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
