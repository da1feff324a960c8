use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{symlink, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::dialect::SchedulerDialect;
use crate::error::{CsubError, Result};
use crate::name::JobIdentity;
use crate::resume::{ResumeResolver, ResumeTarget};

pub const CHKPT_SUBDIR: &str = "checkpoint";
pub const TARBALL: &str = "job.localdir.tarball";
pub const CHKPT_FILE: &str = "chkpt.file";
pub const BASE: &str = "base";
pub const USER_CHKPT_SCRIPT: &str = "user_chkpt_script.sh";
pub const META: &str = "job.json";

/// Owner rwx, group/other rx
const EXECUTABLE: u32 = 0o755;

/// A job checkpoint directory: `<scratch>/chkpt/<unique name>`
///
/// Layout:
/// - `<name>.sh` user job script
/// - `epilogue`, `prologue -> epilogue` (non-shared runs only)
/// - `checkpoint/prestage`, `checkpoint/poststage` (optional)
/// - `checkpoint/base` the script handed to the scheduler
/// - `checkpoint/user_chkpt_script.sh`
/// - `checkpoint/job.json` run metadata
/// - `checkpoint/job.localdir.tarball` + `.ok` marker, or `checkpoint/chkpt.file`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointDirectory {
    root: PathBuf,
    name: String,
}

impl CheckpointDirectory {
    /// Directory `dir_name` under the checkpoint root, holding the job script of `name`
    pub fn at(chkpt_root: &Path, dir_name: &str, name: &str) -> Self {
        CheckpointDirectory { root: chkpt_root.join(dir_name), name: name.to_string() }
    }

    /// Create the directory tree for a new job
    ///
    /// Fails with [`CsubError::Conflict`] and touches nothing if the job directory exists.
    /// Creation of the job directory itself is atomic, so of two racing submissions with the
    /// same name exactly one succeeds.
    pub fn create_new(chkpt_root: &Path, identity: &JobIdentity) -> Result<Self> {
        let name = identity.unique_name();
        let dir = CheckpointDirectory::at(chkpt_root, &name, &name);

        if dir.root.exists() {
            return Err(CsubError::Conflict(dir.chkpt_dir()));
        }
        fs::create_dir_all(chkpt_root)
            .map_err(|err| CsubError::io("Creating chkpt root", chkpt_root, err))?;
        match fs::create_dir(&dir.root) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(CsubError::Conflict(dir.chkpt_dir()));
            }
            Err(err) => return Err(CsubError::io("Creating chkptdir", &dir.root, err)),
        }
        let chkpt_dir = dir.chkpt_dir();
        fs::create_dir(&chkpt_dir).map_err(|err| CsubError::io("Creating chkptdir", &chkpt_dir, err))?;

        info!("Created checkpoint directory {}", dir.root.display());
        Ok(dir)
    }

    /// Check an existing job directory for resume, see [`ResumeResolver`]
    pub fn locate_for_resume(
        chkpt_root: &Path,
        job_name: &str,
        dialect: &dyn SchedulerDialect,
    ) -> Result<ResumeTarget> {
        ResumeResolver::new(chkpt_root, dialect).resolve(job_name)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chkpt_dir(&self) -> PathBuf {
        self.root.join(CHKPT_SUBDIR)
    }

    pub fn job_script(&self) -> PathBuf {
        self.root.join(format!("{}.sh", self.name))
    }

    pub fn epilogue(&self) -> PathBuf {
        self.root.join("epilogue")
    }

    pub fn prologue(&self) -> PathBuf {
        self.root.join("prologue")
    }

    pub fn prestage(&self) -> PathBuf {
        self.chkpt_dir().join("prestage")
    }

    pub fn poststage(&self) -> PathBuf {
        self.chkpt_dir().join("poststage")
    }

    pub fn base_script(&self) -> PathBuf {
        self.chkpt_dir().join(BASE)
    }

    pub fn user_chkpt_script(&self) -> PathBuf {
        self.chkpt_dir().join(USER_CHKPT_SCRIPT)
    }

    pub fn meta_file(&self) -> PathBuf {
        self.chkpt_dir().join(META)
    }

    pub fn tarball(&self) -> PathBuf {
        self.chkpt_dir().join(TARBALL)
    }

    /// Written once the tarball is completely packed
    pub fn tarball_marker(&self) -> PathBuf {
        self.chkpt_dir().join(format!("{TARBALL}.ok"))
    }

    pub fn chkpt_file(&self) -> PathBuf {
        self.chkpt_dir().join(CHKPT_FILE)
    }

    pub fn has_packed_tarball(&self) -> bool {
        self.tarball().is_file() && self.tarball_marker().is_file()
    }

    pub fn has_chkpt_file(&self) -> bool {
        self.chkpt_file().is_file()
    }

    /// Install the epilogue, with the prologue as a symlink to it
    ///
    /// The script works out which of the two it is from the name it was called by.
    pub fn install_pro_epilogue(&self, epilogue: &str) -> Result<()> {
        let epilogue_path = self.epilogue();
        let prologue_path = self.prologue();
        write_executable(&epilogue_path, epilogue)?;
        symlink(&epilogue_path, &prologue_path)
            .map_err(|err| CsubError::io("Creating prologue link to epilogue", &prologue_path, err))?;
        Ok(())
    }
}

/// Write `contents` to a new or truncated file with mode 0755
pub fn write_executable(path: &Path, contents: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(EXECUTABLE)
        .open(path)
        .map_err(|err| CsubError::io("Creating file", path, err))?;
    file.write_all(contents.as_bytes())
        .map_err(|err| CsubError::io("Writing file", path, err))?;
    // mode() on open is filtered by the umask and ignored for existing files
    fs::set_permissions(path, fs::Permissions::from_mode(EXECUTABLE))
        .map_err(|err| CsubError::io("Changing permissions of", path, err))?;
    Ok(())
}

/// Copy `file` to `file.prev`; a file that doesn't exist is skipped
pub fn backup_prev(file: &Path) -> Result<Option<PathBuf>> {
    if !file.exists() {
        warn!("No output file {} to back up", file.display());
        return Ok(None);
    }
    let mut prev = file.as_os_str().to_owned();
    prev.push(".prev");
    let prev = PathBuf::from(prev);

    info!("Taking backup of output file {}", file.display());
    fs::copy(file, &prev).map_err(|err| CsubError::io("Backing up output file", file, err))?;
    Ok(Some(prev))
}
