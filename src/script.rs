//! Render the scripts of a checkpointed job
//!
//! Every script is a fixed template with explicit parameters. The scheduler's own
//! prologue/epilogue support is unreliable, so by default the base script calls the
//! pro/epilogue itself ("mimic" mode) instead of declaring them in the header.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use log::info;

use crate::chkpt::layout::write_executable;
use crate::chkpt::CheckpointDirectory;
use crate::dialect::SchedulerDialect;
use crate::error::{CsubError, Result};
use crate::walltime::TimeBudget;

/// Shared templating helper
pub mod template;
/// Pre- and poststage scripts
pub mod stage;
/// Scheduler header of the base script
pub mod header;
/// The base script: header plus body
pub mod base;
/// Pro/epilogue script
pub mod epilogue;
/// Script a user runs to checkpoint a job on request
pub mod trigger;

pub use base::{BaseScript, BodyParams, NO_OP_CALL};
pub use header::BaseHeader;
pub use stage::StageMode;

/// What `cr_checkpoint` saves along with the process image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChkptSaveOpt {
    All,
    #[default]
    Exe,
    None,
}

impl fmt::Display for ChkptSaveOpt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChkptSaveOpt::All => write!(f, "all"),
            ChkptSaveOpt::Exe => write!(f, "exe"),
            ChkptSaveOpt::None => write!(f, "none"),
        }
    }
}

impl FromStr for ChkptSaveOpt {
    type Err = CsubError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(ChkptSaveOpt::All),
            "exe" => Ok(ChkptSaveOpt::Exe),
            "none" => Ok(ChkptSaveOpt::None),
            _ => Err(CsubError::Config(format!(
                "Invalid value for chkpt_save_opt specified: {s}. Please use one of the following: all,exe,none"
            ))),
        }
    }
}

/// Signal sent to the checkpointed process once the checkpoint is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KillMode {
    Term,
    #[default]
    Kill,
}

impl fmt::Display for KillMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KillMode::Term => write!(f, "term"),
            KillMode::Kill => write!(f, "kill"),
        }
    }
}

/// How the pro/epilogue of a non-shared job get run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProEpiMode {
    /// Called from the base script
    #[default]
    Mimic,
    /// Declared in the header for the scheduler to run
    Native,
}

/// Everything about a new job that ends up in its scripts
#[derive(Debug, Clone)]
pub struct ComposeOptions {
    pub budget: TimeBudget,
    pub queue: Option<String>,
    pub vmem: Option<String>,
    pub prestage: Option<StageMode>,
    pub poststage: Option<StageMode>,
    /// Directory the job script was submitted from
    pub submit_dir: PathBuf,
    pub shared: bool,
    pub pro_epi: ProEpiMode,
    pub chkpt_save_opt: ChkptSaveOpt,
    pub kill_mode: KillMode,
    pub cleanup_after_restart: bool,
    pub cleanup_chkpt: bool,
    pub submit_program: String,
}

/// All rendered scripts of a new job, written to its checkpoint directory in one go
#[derive(Debug, Clone)]
pub struct ScriptBundle {
    pub prestage: Option<String>,
    pub poststage: Option<String>,
    pub job_script: String,
    /// `None` in shared mode
    pub epilogue: Option<String>,
    pub user_chkpt: String,
    pub base: BaseScript,
}

impl ScriptBundle {
    /// Render every script for the job in `dir` from the user's job script
    pub fn compose(
        dir: &CheckpointDirectory,
        opts: &ComposeOptions,
        job_script: &str,
        dialect: &dyn SchedulerDialect,
    ) -> Result<Self> {
        let prestage = opts
            .prestage
            .map(|mode| stage::render_prestage(mode, &opts.submit_dir))
            .transpose()?;
        let poststage = opts
            .poststage
            .map(|mode| stage::render_poststage(mode, &opts.submit_dir, dialect))
            .transpose()?;
        let epilogue = match opts.shared {
            true => None,
            false => Some(epilogue::render_epilogue(dialect)?),
        };

        let (pro_epi_call, pro_epi_directive) = match (opts.shared, opts.pro_epi) {
            (true, _) => (None, None),
            (false, ProEpiMode::Mimic) => (Some((dir.prologue(), dir.epilogue())), None),
            (false, ProEpiMode::Native) => (None, Some((dir.prologue(), dir.epilogue()))),
        };
        let call = |path: Option<PathBuf>| match path {
            Some(path) => path.display().to_string(),
            None => NO_OP_CALL.to_string(),
        };
        let params = BodyParams {
            prologue_call: call(pro_epi_call.as_ref().map(|(pro, _)| pro.clone())),
            epilogue_call: call(pro_epi_call.as_ref().map(|(_, epi)| epi.clone())),
            chkpt_save_opt: opts.chkpt_save_opt,
            kill_mode: opts.kill_mode,
            cleanup_after_restart: opts.cleanup_after_restart,
            cleanup_chkpt: opts.cleanup_chkpt,
            shared: opts.shared,
            submit_program: opts.submit_program.clone(),
        };

        let header = BaseHeader {
            budget: opts.budget,
            queue: opts.queue.clone(),
            name: dir.name().to_string(),
            chkpt_dir: dir.root().to_path_buf(),
            prologue: pro_epi_directive.as_ref().map(|(pro, _)| pro.clone()),
            epilogue: pro_epi_directive.map(|(_, epi)| epi),
            resources: dialect.resource_specs(job_script),
            // an explicit request wins over the one in the job script
            vmem: opts.vmem.clone().or_else(|| dialect.vmem_spec(job_script)),
        };
        let base = BaseScript { header, body: base::render_body(&params, dialect)? };

        Ok(ScriptBundle {
            prestage,
            poststage,
            job_script: job_script.to_string(),
            epilogue,
            user_chkpt: trigger::render_user_chkpt_trigger()?,
            base,
        })
    }

    /// Write all scripts into `dir`, base script last
    pub fn write(&self, dir: &CheckpointDirectory, dialect: &dyn SchedulerDialect) -> Result<()> {
        if let Some(prestage) = &self.prestage {
            write_executable(&dir.prestage(), prestage)?;
        }
        if let Some(poststage) = &self.poststage {
            write_executable(&dir.poststage(), poststage)?;
        }
        info!("Writing job script to {}", dir.job_script().display());
        write_executable(&dir.job_script(), &self.job_script)?;
        if let Some(epilogue) = &self.epilogue {
            dir.install_pro_epilogue(epilogue)?;
        }
        write_executable(&dir.user_chkpt_script(), &self.user_chkpt)?;
        self.base.write(&dir.base_script(), dialect)
    }
}
