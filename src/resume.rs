//! Deciding whether a checkpointed job can be resumed, and preparing it for resubmission
//!
//! The checks run in a fixed order and stop at the first missing artifact:
//!
//! ```text
//! Start -> DirFound -> ScriptFound -> PayloadFound -> BaseFound -> Resumable
//!   \________\____________\_______________\______________\-> Failed(reason)
//! ```

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::chkpt::layout::backup_prev;
use crate::chkpt::{CheckpointDirectory, JobMeta};
use crate::dialect::SchedulerDialect;
use crate::error::{ResumeFailure, Result};
use crate::name::JobIdentity;
use crate::script::{BaseHeader, BaseScript};

/// What a job will be restarted from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Packed working directory with its completion marker
    Tarball,
    /// Checkpoint file written in place
    ChkptFile,
    /// Nothing yet; only accepted for jobs submitted in shared mode
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeState {
    Start,
    DirFound,
    ScriptFound,
    PayloadFound(Payload),
    BaseFound(Payload),
    Resumable(Payload),
    Failed(ResumeFailure),
}

/// A job that passed every check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeTarget {
    pub identity: JobIdentity,
    pub dir: CheckpointDirectory,
    pub base_script: PathBuf,
    pub array_index: Option<u32>,
    pub payload: Payload,
}

pub struct ResumeResolver<'a> {
    chkpt_root: &'a Path,
    dialect: &'a dyn SchedulerDialect,
}

impl<'a> ResumeResolver<'a> {
    pub fn new(chkpt_root: &'a Path, dialect: &'a dyn SchedulerDialect) -> Self {
        ResumeResolver { chkpt_root, dialect }
    }

    /// Check the checkpoint directory of `job_name` (a unique name, optionally with array index)
    ///
    /// A malformed name is a parse error; a missing artifact is a [`ResumeFailure`].
    pub fn resolve(&self, job_name: &str) -> Result<ResumeTarget> {
        let identity = JobIdentity::parse(job_name, self.dialect)?;
        // array sub-jobs each have their own directory, named after the full job name
        let dir = CheckpointDirectory::at(
            self.chkpt_root,
            &identity.display(self.dialect),
            &identity.unique_name(),
        );

        let mut state = ResumeState::Start;
        loop {
            state = step(state, &dir);
            match state {
                ResumeState::Resumable(payload) => {
                    return Ok(ResumeTarget {
                        array_index: identity.array_index,
                        base_script: dir.base_script(),
                        identity,
                        dir,
                        payload,
                    })
                }
                ResumeState::Failed(reason) => {
                    warn!("Resuming of job {job_name} failed: {reason}");
                    return Err(reason.into());
                }
                _ => {}
            }
        }
    }
}

/// Advance one check; final states are absorbing
pub fn step(state: ResumeState, dir: &CheckpointDirectory) -> ResumeState {
    match state {
        ResumeState::Start => {
            if dir.root().is_dir() {
                info!("Job checkpoint directory found @ {}", dir.root().display());
                ResumeState::DirFound
            } else {
                ResumeState::Failed(ResumeFailure::MissingDirectory(dir.root().to_path_buf()))
            }
        }
        ResumeState::DirFound => {
            let script = dir.job_script();
            if script.is_file() {
                info!("Job script found @ {}", script.display());
                ResumeState::ScriptFound
            } else {
                ResumeState::Failed(ResumeFailure::MissingJobScript(script))
            }
        }
        ResumeState::ScriptFound => find_payload(dir),
        ResumeState::PayloadFound(payload) => {
            let base = dir.base_script();
            if base.is_file() {
                info!("Base script for job found @ {}", base.display());
                ResumeState::BaseFound(payload)
            } else {
                ResumeState::Failed(ResumeFailure::MissingBaseScript(base))
            }
        }
        ResumeState::BaseFound(payload) => ResumeState::Resumable(payload),
        state @ (ResumeState::Resumable(_) | ResumeState::Failed(_)) => state,
    }
}

fn find_payload(dir: &CheckpointDirectory) -> ResumeState {
    if dir.has_packed_tarball() {
        info!("Job tarball found @ {}", dir.tarball().display());
        return ResumeState::PayloadFound(Payload::Tarball);
    }
    if dir.has_chkpt_file() {
        info!("Checkpoint file for job found @ {}", dir.chkpt_file().display());
        return ResumeState::PayloadFound(Payload::ChkptFile);
    }
    match JobMeta::read(&dir.meta_file()) {
        Some(meta) if meta.shared => {
            warn!("No checkpoint payload for shared job {}, it restarts from scratch", dir.name());
            ResumeState::PayloadFound(Payload::None)
        }
        _ => ResumeState::Failed(ResumeFailure::MissingPayload {
            tarball: dir.tarball(),
            chkpt_file: dir.chkpt_file(),
        }),
    }
}

/// Changes to a persisted base script requested on resume
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeOverrides {
    pub job_time: Option<u64>,
    pub chkpt_time: Option<u64>,
    pub vmem: Option<String>,
}

impl ResumeOverrides {
    pub fn is_empty(&self) -> bool {
        self.job_time.is_none() && self.chkpt_time.is_none() && self.vmem.is_none()
    }

    /// Apply to a parsed base script; sides of the time budget not overridden keep their values
    pub fn apply(&self, script: &mut BaseScript) -> Result<()> {
        let header = &mut script.header;
        header.budget = header.budget.with_overrides(self.job_time, self.chkpt_time)?;
        if let Some(vmem) = &self.vmem {
            header.vmem = Some(vmem.clone());
        }
        info!("Base script of {} now requests {}", header.name, header.budget);
        Ok(())
    }
}

/// Output files of the previous run of a job
///
/// `<dir>/<name>.{out,err}`, or `<dir>-<idx>/<name>-<idx>.{out,err}` for an array sub-job.
pub fn previous_logs(header: &BaseHeader, array_index: Option<u32>, dialect: &dyn SchedulerDialect) -> Vec<PathBuf> {
    let (dir, name) = match array_index {
        Some(index) => {
            let sep = dialect.array_sep();
            let mut dir = header.chkpt_dir.as_os_str().to_owned();
            dir.push(format!("{sep}{index}"));
            (PathBuf::from(dir), format!("{}{sep}{index}", header.name))
        }
        None => (header.chkpt_dir.clone(), header.name.clone()),
    };
    ["out", "err"]
        .iter()
        .map(|ext| dir.join(format!("{name}.{ext}")))
        .collect()
}

/// Copy each previous output file to a `.prev` sibling
pub fn backup_logs(logs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut backups = Vec::new();
    for log in logs {
        if let Some(prev) = backup_prev(log)? {
            backups.push(prev);
        }
    }
    Ok(backups)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::dialect::Pbs;
    use crate::error::{CsubError, ParseError};
    use crate::walltime::TimeBudget;

    const NAME: &str = "myjob.20240301_120005.a7";

    struct Fixture {
        tmp: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture { tmp: TempDir::new().unwrap() }
        }

        fn root(&self) -> &Path {
            self.tmp.path()
        }

        fn dir(&self, dir_name: &str) -> CheckpointDirectory {
            CheckpointDirectory::at(self.root(), dir_name, NAME)
        }

        fn with_dir(self, dir_name: &str) -> Self {
            fs::create_dir_all(self.dir(dir_name).chkpt_dir()).unwrap();
            self
        }

        fn with_script(self, dir_name: &str) -> Self {
            fs::write(self.dir(dir_name).job_script(), "#!/bin/bash\n").unwrap();
            self
        }

        fn with_tarball(self, dir_name: &str) -> Self {
            let dir = self.dir(dir_name);
            fs::write(dir.tarball(), "").unwrap();
            fs::write(dir.tarball_marker(), "").unwrap();
            self
        }

        fn with_base(self, dir_name: &str) -> Self {
            fs::write(self.dir(dir_name).base_script(), "#!/bin/bash\n").unwrap();
            self
        }

        fn with_meta(self, dir_name: &str, shared: bool) -> Self {
            let meta = JobMeta {
                name: NAME.to_string(),
                created: String::new(),
                shared,
                mimic_pro_epi: true,
                job_time: 3600,
                chkpt_time: 900,
                array_spec: None,
            };
            meta.write(&self.dir(dir_name).meta_file()).unwrap();
            self
        }

        fn resolve(&self, job_name: &str) -> Result<ResumeTarget> {
            ResumeResolver::new(self.root(), &Pbs).resolve(job_name)
        }
    }

    fn failure(result: Result<ResumeTarget>) -> ResumeFailure {
        match result {
            Err(CsubError::ResumeNotFound(reason)) => reason,
            other => panic!("expected a resume failure, got {other:?}"),
        }
    }

    #[test]
    fn complete_directory_is_resumable() {
        let fx = Fixture::new().with_dir(NAME).with_script(NAME).with_tarball(NAME).with_base(NAME);
        let target = fx.resolve(NAME).unwrap();
        assert_eq!(target.base_script, fx.dir(NAME).base_script());
        assert_eq!(target.array_index, None);
        assert_eq!(target.payload, Payload::Tarball);
    }

    #[test]
    fn malformed_name_is_a_parse_error() {
        let fx = Fixture::new();
        assert!(matches!(fx.resolve("not-a-job"), Err(CsubError::Parse(_))));
    }

    #[test]
    fn missing_directory_is_reported_first() {
        let fx = Fixture::new();
        assert_eq!(failure(fx.resolve(NAME)), ResumeFailure::MissingDirectory(fx.root().join(NAME)));
    }

    #[test]
    fn missing_script_is_reported_before_later_artifacts() {
        // payload and base present, script missing
        let fx = Fixture::new().with_dir(NAME).with_tarball(NAME).with_base(NAME);
        assert_eq!(failure(fx.resolve(NAME)), ResumeFailure::MissingJobScript(fx.dir(NAME).job_script()));
    }

    #[test]
    fn missing_payload_is_reported_before_missing_base() {
        let fx = Fixture::new().with_dir(NAME).with_script(NAME);
        assert!(matches!(failure(fx.resolve(NAME)), ResumeFailure::MissingPayload { .. }));
    }

    #[test]
    fn missing_base_is_reported_even_with_packed_tarball() {
        let fx = Fixture::new().with_dir(NAME).with_script(NAME).with_tarball(NAME);
        assert_eq!(failure(fx.resolve(NAME)), ResumeFailure::MissingBaseScript(fx.dir(NAME).base_script()));
    }

    #[test]
    fn tarball_without_marker_is_no_payload() {
        let fx = Fixture::new().with_dir(NAME).with_script(NAME).with_base(NAME);
        fs::write(fx.dir(NAME).tarball(), "").unwrap();
        assert!(matches!(failure(fx.resolve(NAME)), ResumeFailure::MissingPayload { .. }));
    }

    #[test]
    fn checkpoint_file_is_a_payload() {
        let fx = Fixture::new().with_dir(NAME).with_script(NAME).with_base(NAME);
        fs::write(fx.dir(NAME).chkpt_file(), "").unwrap();
        assert_eq!(fx.resolve(NAME).unwrap().payload, Payload::ChkptFile);
    }

    #[test]
    fn shared_job_may_resume_without_payload() {
        let fx = Fixture::new().with_dir(NAME).with_script(NAME).with_base(NAME).with_meta(NAME, true);
        assert_eq!(fx.resolve(NAME).unwrap().payload, Payload::None);

        let fx = Fixture::new().with_dir(NAME).with_script(NAME).with_base(NAME).with_meta(NAME, false);
        assert!(matches!(failure(fx.resolve(NAME)), ResumeFailure::MissingPayload { .. }));
    }

    #[test]
    fn array_job_resolves_its_own_directory() {
        let sub = format!("{NAME}-3");
        let fx = Fixture::new().with_dir(&sub).with_script(&sub).with_tarball(&sub).with_base(&sub);
        let target = fx.resolve(&sub).unwrap();
        assert_eq!(target.array_index, Some(3));
        assert_eq!(target.dir.root(), fx.root().join(&sub));
        assert_eq!(target.dir.job_script(), fx.root().join(&sub).join(format!("{NAME}.sh")));
    }

    #[test]
    fn final_states_are_absorbing() {
        let fx = Fixture::new();
        let dir = fx.dir(NAME);
        let failed = ResumeState::Failed(ResumeFailure::MissingDirectory(dir.root().to_path_buf()));
        assert_eq!(step(failed.clone(), &dir), failed);
        assert_eq!(step(ResumeState::Resumable(Payload::Tarball), &dir), ResumeState::Resumable(Payload::Tarball));
    }

    fn header() -> BaseHeader {
        BaseHeader {
            budget: TimeBudget::new(3 * 3600, 15 * 60).unwrap(),
            queue: None,
            name: NAME.to_string(),
            chkpt_dir: PathBuf::from(format!("/scratch/chkpt/{NAME}")),
            epilogue: None,
            prologue: None,
            resources: Vec::new(),
            vmem: Some("4gb".to_string()),
        }
    }

    #[test]
    fn vmem_override_keeps_time_budget() {
        let mut script = BaseScript { header: header(), body: String::new() };
        let overrides = ResumeOverrides { vmem: Some("8gb".to_string()), ..Default::default() };
        overrides.apply(&mut script).unwrap();
        assert_eq!(script.header.vmem.as_deref(), Some("8gb"));
        assert_eq!(script.header.budget, TimeBudget::new(3 * 3600, 15 * 60).unwrap());
    }

    #[test]
    fn job_time_override_keeps_chkpt_time() {
        let mut script = BaseScript { header: header(), body: String::new() };
        let overrides = ResumeOverrides { job_time: Some(5 * 3600), ..Default::default() };
        overrides.apply(&mut script).unwrap();
        assert_eq!(script.header.budget.wall_time(), 5 * 3600 + 15 * 60);
        assert_eq!(script.header.vmem.as_deref(), Some("4gb"));
    }

    #[test]
    fn override_overflowing_wall_time_leaves_header_alone() {
        let mut script = BaseScript { header: header(), body: String::new() };
        let overrides = ResumeOverrides { job_time: Some(u64::MAX - 60), ..Default::default() };
        assert!(matches!(
            overrides.apply(&mut script),
            Err(CsubError::Parse(ParseError::WallTime { .. }))
        ));
        assert_eq!(script.header.budget, TimeBudget::new(3 * 3600, 15 * 60).unwrap());
    }

    #[test]
    fn previous_logs_of_plain_and_array_jobs() {
        assert_eq!(
            previous_logs(&header(), None, &Pbs),
            vec![
                PathBuf::from(format!("/scratch/chkpt/{NAME}/{NAME}.out")),
                PathBuf::from(format!("/scratch/chkpt/{NAME}/{NAME}.err")),
            ]
        );
        assert_eq!(
            previous_logs(&header(), Some(3), &Pbs),
            vec![
                PathBuf::from(format!("/scratch/chkpt/{NAME}-3/{NAME}-3.out")),
                PathBuf::from(format!("/scratch/chkpt/{NAME}-3/{NAME}-3.err")),
            ]
        );
    }
}
