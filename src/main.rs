use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::error;

use csub::cli::{Cli, Request};
use csub::settings::Settings;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    // option errors are reported before anything is looked up or created
    let request = cli.validate()?;
    let settings = Settings::from_env(cli.qsub, cli.tar)?;

    match request {
        Request::Submit(job) => {
            let script = job.script.display().to_string();
            let submitted = job.submit(&settings).with_context(|| format!("Submitting {script}"))?;
            println!("{}", submitted.scheduler_id);
            println!("Job with name {} succesfully submitted", submitted.name);
        }
        Request::Resume(job) => {
            let resumed = job
                .submit(&settings)
                .with_context(|| format!("Resuming of job {} failed", job.name))?;
            println!("{}", resumed.scheduler_id);
            println!("Job {} succesfully resumed.", resumed.name);
        }
    }
    Ok(())
}
