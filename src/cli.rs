use std::path::PathBuf;

use clap::Parser;

use crate::error::{CsubError, Result};
use crate::job::{NewJob, ResumeJob};
use crate::resume::ResumeOverrides;
use crate::script::{ChkptSaveOpt, KillMode, ProEpiMode, StageMode};
use crate::walltime::{parse_wall_time_string, TimeBudget, DEFAULT_CHKPT_TIME, DEFAULT_JOB_TIME};

/// Submit a job script under checkpoint/restart control, or resume one from its checkpoint
#[derive(Parser, Debug)]
#[command(name = "csub", version)]
pub struct Cli {
    /// Job script to submit
    #[arg(short = 's', value_name = "SCRIPT")]
    pub script: Option<PathBuf>,

    /// Queue to submit to
    #[arg(short = 'q')]
    pub queue: Option<String>,

    /// Array job specification, e.g. 1-10
    #[arg(short = 't', value_name = "SPEC")]
    pub array: Option<String>,

    /// Copy the submission directory into the local working directory before the job starts
    #[arg(long)]
    pub pre: bool,

    /// Copy the local working directory into <submitdir>/result.<jobname> afterwards
    #[arg(long)]
    pub post: bool,

    /// Keep checkpoints on the shared file system instead of a node-local tarball
    #[arg(long)]
    pub shared: bool,

    /// Time the job runs before it is checkpointed, <hours>:<minutes>:<seconds> [default: 10:00:00]
    #[arg(long = "job_time", value_name = "TIME")]
    pub job_time: Option<String>,

    /// Time reserved for checkpointing, <hours>:<minutes>:<seconds> [default: 0:15:00]
    #[arg(long = "chkpt_time", value_name = "TIME")]
    pub chkpt_time: Option<String>,

    /// Declare prologue and epilogue to the scheduler instead of calling them from the job
    #[arg(long = "no_mimic_pro_epi")]
    pub no_mimic_pro_epi: bool,

    /// Clean up the checkpoint file and tarball after a successful restart
    #[arg(long = "cleanup_after_restart")]
    pub cleanup_after_restart: bool,

    /// Keep checkpoint data once the job has finished
    #[arg(long = "no_cleanup_chkpt")]
    pub no_cleanup_chkpt: bool,

    /// Resume the job with this name from its latest checkpoint
    #[arg(long, value_name = "JOB_NAME")]
    pub resume: Option<String>,

    /// What to save in a checkpoint: all, exe or none
    #[arg(long = "chkpt_save_opt", value_name = "OPT", default_value = "exe")]
    pub chkpt_save_opt: String,

    /// Stop the job with SIGTERM instead of SIGKILL when checkpointing
    #[arg(long = "term_kill_mode")]
    pub term_kill_mode: bool,

    /// Virtual memory to request, e.g. 4gb
    #[arg(long)]
    pub vmem: Option<String>,

    #[arg(long, env = "CSUB_QSUB", hide = true)]
    pub qsub: Option<String>,

    #[arg(long, env = "CSUB_TAR", hide = true)]
    pub tar: Option<String>,
}

/// A validated command line
#[derive(Debug)]
pub enum Request {
    Submit(NewJob),
    Resume(ResumeJob),
}

impl Cli {
    /// Check combinations of options and parse their values
    ///
    /// Touches neither the environment nor the file system.
    pub fn validate(&self) -> Result<Request> {
        let job_time = self.job_time.as_deref().map(parse_wall_time_string).transpose()?;
        let chkpt_time = self.chkpt_time.as_deref().map(parse_wall_time_string).transpose()?;
        let chkpt_save_opt: ChkptSaveOpt = self.chkpt_save_opt.parse()?;

        match (&self.script, &self.resume) {
            (_, Some(name)) => {
                if self.script.is_some() || self.queue.is_some() || self.array.is_some() || self.pre || self.post {
                    return Err(CsubError::Config(
                        "Found extra options when resuming from checkpoint, the original job script is \
                         part of the checkpoint. Use --vmem, --job_time and/or --chkpt_time to vary job parameters"
                            .to_string(),
                    ));
                }
                Ok(Request::Resume(ResumeJob {
                    name: name.clone(),
                    overrides: ResumeOverrides { job_time, chkpt_time, vmem: self.vmem.clone() },
                }))
            }
            (Some(script), None) => Ok(Request::Submit(NewJob {
                script: script.clone(),
                queue: self.queue.clone(),
                array: self.array.clone(),
                budget: TimeBudget::new(
                    job_time.unwrap_or(DEFAULT_JOB_TIME),
                    chkpt_time.unwrap_or(DEFAULT_CHKPT_TIME),
                )?,
                vmem: self.vmem.clone(),
                prestage: self.pre.then_some(StageMode::Local),
                poststage: self.post.then_some(StageMode::Local),
                shared: self.shared,
                pro_epi: match self.no_mimic_pro_epi {
                    true => ProEpiMode::Native,
                    false => ProEpiMode::Mimic,
                },
                chkpt_save_opt,
                kill_mode: match self.term_kill_mode {
                    true => KillMode::Term,
                    false => KillMode::Kill,
                },
                cleanup_after_restart: self.cleanup_after_restart,
                cleanup_chkpt: !self.no_cleanup_chkpt,
            })),
            (None, None) => Err(CsubError::Config(
                "No job script read or job to resume specified. Use -s to specify the job script, \
                 or --resume=<job_name> to resume a job from the latest checkpoint"
                    .to_string(),
            )),
        }
    }
}
