//! Submitting a new checkpointed job and resuming one from its checkpoint directory

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::info;

use crate::chkpt::{archive, CheckpointDirectory, JobMeta};
use crate::error::{CsubError, Result};
use crate::name::JobIdentity;
use crate::resume::{backup_logs, previous_logs, ResumeOverrides};
use crate::script::{BaseScript, ChkptSaveOpt, ComposeOptions, KillMode, ProEpiMode, ScriptBundle, StageMode};
use crate::settings::Settings;
use crate::submit::{SubmittedJob, Submitter};
use crate::walltime::TimeBudget;

/// A job script to run under checkpoint control
#[derive(Debug, Clone)]
pub struct NewJob {
    pub script: PathBuf,
    pub queue: Option<String>,
    pub array: Option<String>,
    pub budget: TimeBudget,
    pub vmem: Option<String>,
    pub prestage: Option<StageMode>,
    pub poststage: Option<StageMode>,
    pub shared: bool,
    pub pro_epi: ProEpiMode,
    pub chkpt_save_opt: ChkptSaveOpt,
    pub kill_mode: KillMode,
    pub cleanup_after_restart: bool,
    pub cleanup_chkpt: bool,
}

/// A previously submitted job to start again from its latest checkpoint
#[derive(Debug, Clone)]
pub struct ResumeJob {
    /// Unique job name, with array index for an array sub-job
    pub name: String,
    pub overrides: ResumeOverrides,
}

impl NewJob {
    /// Create the checkpoint directory, write every script, pack and submit
    ///
    /// Artifacts already written are left in place when a later phase fails.
    pub fn submit(&self, settings: &Settings) -> Result<SubmittedJob> {
        let dialect = settings.dialect();
        let script = fs::read_to_string(&self.script)
            .map_err(|err| CsubError::io("Reading job script", &self.script, err))?;
        let submit_dir = parent_dir(&self.script)?;

        let identity = JobIdentity::generate(&self.script, &script, dialect);
        let dir = CheckpointDirectory::create_new(&settings.chkpt_root(), &identity)?;
        info!("Submitting job {} from {}", dir.name(), submit_dir.display());

        self.meta(dir.name()).write(&dir.meta_file())?;
        let bundle = ScriptBundle::compose(&dir, &self.compose_options(submit_dir, settings), &script, dialect)?;
        bundle.write(&dir, dialect)?;

        if !self.shared {
            archive::pack(&settings.tar_program, &dir)?;
        }

        Submitter::new(settings).submit(dir.name(), &dir.base_script(), self.array.as_deref())
    }

    fn compose_options(&self, submit_dir: PathBuf, settings: &Settings) -> ComposeOptions {
        ComposeOptions {
            budget: self.budget,
            queue: self.queue.clone(),
            vmem: self.vmem.clone(),
            prestage: self.prestage,
            poststage: self.poststage,
            submit_dir,
            shared: self.shared,
            pro_epi: self.pro_epi,
            chkpt_save_opt: self.chkpt_save_opt,
            kill_mode: self.kill_mode,
            cleanup_after_restart: self.cleanup_after_restart,
            cleanup_chkpt: self.cleanup_chkpt,
            submit_program: settings.submit_program.clone(),
        }
    }

    fn meta(&self, name: &str) -> JobMeta {
        JobMeta {
            name: name.to_string(),
            created: Local::now().to_rfc3339(),
            shared: self.shared,
            mimic_pro_epi: self.pro_epi == ProEpiMode::Mimic,
            job_time: self.budget.job_time(),
            chkpt_time: self.budget.chkpt_time(),
            array_spec: self.array.clone(),
        }
    }
}

impl ResumeJob {
    /// Check the checkpoint directory, apply overrides, back up old logs, resubmit
    ///
    /// Nothing is modified unless every artifact needed to resume is present.
    pub fn submit(&self, settings: &Settings) -> Result<SubmittedJob> {
        let dialect = settings.dialect();
        let target = CheckpointDirectory::locate_for_resume(&settings.chkpt_root(), &self.name, dialect)?;

        let mut base = BaseScript::read(&target.base_script, dialect)?;
        if !self.overrides.is_empty() {
            self.overrides.apply(&mut base)?;
            base.write(&target.base_script, dialect)?;
        }

        let logs = previous_logs(&base.header, target.array_index, dialect);
        backup_logs(&logs)?;

        let array = target.array_index.map(|index| index.to_string());
        Submitter::new(settings).submit(&self.name, &target.base_script, array.as_deref())
    }
}

/// Absolute directory holding the job script
fn parent_dir(script: &Path) -> Result<PathBuf> {
    let script = fs::canonicalize(script).map_err(|err| CsubError::io("Resolving job script", script, err))?;
    Ok(script.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("/")))
}
