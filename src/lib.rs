//! Checkpointed submission of batch jobs
//!
//! A job script is wrapped in a base script that runs it under checkpoint/restart control for a
//! fixed time budget, checkpoints it and resubmits itself. Everything needed to restart the job
//! lives in a checkpoint directory under `$VSC_SCRATCH/chkpt`, from which the job can also be
//! resumed by hand.

pub mod chkpt;
pub mod cli;
pub mod dialect;
pub mod error;
pub mod job;
pub mod name;
pub mod process;
pub mod resume;
pub mod script;
pub mod settings;
pub mod submit;
pub mod walltime;
