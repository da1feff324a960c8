use std::fs::File;

use log::info;

use crate::chkpt::CheckpointDirectory;
use crate::error::{CsubError, Result};
use crate::process::ProcessCommand;

/// Pack the job directory into `checkpoint/job.localdir.tarball`, then write the `.ok` marker
///
/// Options must match the unpacking done by the prologue. The marker is written only after tar
/// exits successfully, so a tarball without it is never used to resume.
pub fn pack(tar_program: &str, dir: &CheckpointDirectory) -> Result<()> {
    let tarball = dir.tarball();
    let cmd = ProcessCommand::new(tar_program)
        .args(["-c", "-p", "-C"])
        .path_arg(dir.root())
        .arg("-f")
        .path_arg(&tarball)
        .arg(".");
    cmd.run()?;

    let marker = dir.tarball_marker();
    File::create(&marker).map_err(|err| CsubError::io("Creating tarball marker", &marker, err))?;
    info!("Packed {} into {}", dir.root().display(), tarball.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::chkpt::layout::write_executable;
    use crate::dialect::Pbs;
    use crate::name::JobIdentity;

    fn job_dir(tmp: &TempDir) -> CheckpointDirectory {
        let id = JobIdentity::parse("myjob.20240301_120005.a7", &Pbs).unwrap();
        CheckpointDirectory::create_new(tmp.path(), &id).unwrap()
    }

    #[test]
    fn marker_follows_successful_tar() {
        let tmp = TempDir::new().unwrap();
        let dir = job_dir(&tmp);
        let fake_tar = tmp.path().join("tar");
        // record the arguments, create the archive named after -f
        write_executable(&fake_tar, "#!/bin/sh\necho \"$@\" > \"$6.args\"\ntouch \"$6\"\n").unwrap();

        pack(fake_tar.to_str().unwrap(), &dir).unwrap();

        assert!(dir.has_packed_tarball());
        let args = fs::read_to_string(format!("{}.args", dir.tarball().display())).unwrap();
        assert_eq!(
            args.trim(),
            format!("-c -p -C {} -f {} .", dir.root().display(), dir.tarball().display())
        );
    }

    #[test]
    fn failed_tar_leaves_no_marker() {
        let tmp = TempDir::new().unwrap();
        let dir = job_dir(&tmp);
        let fake_tar = tmp.path().join("tar");
        write_executable(&fake_tar, "#!/bin/sh\necho 'tar: disk full' >&2\nexit 2\n").unwrap();

        let err = pack(fake_tar.to_str().unwrap(), &dir).unwrap_err();
        match err {
            CsubError::ExternalProcess { status, stderr, .. } => {
                assert_eq!(status, 2);
                assert_eq!(stderr, "tar: disk full\n");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!dir.tarball_marker().exists());
    }
}
