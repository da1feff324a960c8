//! Wall time arithmetic
//!
//! A submitted job asks the scheduler for `job_time + chkpt_time`: the first window runs the job,
//! the second leaves room to checkpoint it before the scheduler kills it.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ParseError;

static DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<hours>\d+):(?P<mins>\d+):(?P<secs>\d+)$").expect("valid regex"));

/// Default execution window (10 hours)
pub const DEFAULT_JOB_TIME: u64 = 10 * 60 * 60;
/// Default checkpoint window (15 minutes)
pub const DEFAULT_CHKPT_TIME: u64 = 15 * 60;

/// Render seconds as `H:MM:SS`, hours unbounded
pub fn to_wall_time_string(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let mins = total_seconds % 3600 / 60;
    let secs = total_seconds % 60;
    format!("{hours}:{mins:02}:{secs:02}")
}

/// Parse `<hours>:<minutes>:<seconds>` into seconds
///
/// Minutes and seconds are not range checked, so `0:90:00` is 5400 seconds.
pub fn parse_wall_time_string(time_str: &str) -> Result<u64, ParseError> {
    let err = || ParseError::Duration(time_str.to_string());
    let caps = DURATION.captures(time_str.trim()).ok_or_else(err)?;
    let field = |name: &str| caps[name].parse::<u64>().map_err(|_| err());

    let (hours, mins, secs) = (field("hours")?, field("mins")?, field("secs")?);

    hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(mins.checked_mul(60)?))
        .and_then(|hm| hm.checked_add(secs))
        .ok_or_else(err)
}

/// `job_time + chkpt_time`, `None` if the sum doesn't fit
pub fn combined_budget(job_time: u64, chkpt_time: u64) -> Option<u64> {
    job_time.checked_add(chkpt_time)
}

/// Execution and checkpoint windows of one submission
///
/// Their sum always fits in a `u64`, so the wall time can be recovered from a rendered header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBudget {
    job_time: u64,
    chkpt_time: u64,
}

impl TimeBudget {
    pub fn new(job_time: u64, chkpt_time: u64) -> Result<Self, ParseError> {
        match combined_budget(job_time, chkpt_time) {
            Some(_) => Ok(TimeBudget { job_time, chkpt_time }),
            None => Err(ParseError::WallTime { job_time, chkpt_time }),
        }
    }

    pub fn job_time(&self) -> u64 {
        self.job_time
    }

    pub fn chkpt_time(&self) -> u64 {
        self.chkpt_time
    }

    pub fn wall_time(&self) -> u64 {
        // checked on construction
        self.job_time + self.chkpt_time
    }

    /// Recover the budget a header was rendered with from its declared job and wall time
    pub fn from_declared(job_time: u64, wall_time: u64) -> Result<Self, ParseError> {
        let chkpt_time = wall_time.checked_sub(job_time).ok_or_else(|| {
            ParseError::BaseScript(format!(
                "declared job time {job_time}s exceeds wall time {wall_time}s"
            ))
        })?;
        Ok(TimeBudget { job_time, chkpt_time })
    }

    /// Replace either side, keeping the other as it was
    pub fn with_overrides(self, job_time: Option<u64>, chkpt_time: Option<u64>) -> Result<Self, ParseError> {
        TimeBudget::new(job_time.unwrap_or(self.job_time), chkpt_time.unwrap_or(self.chkpt_time))
    }
}

impl Default for TimeBudget {
    fn default() -> Self {
        TimeBudget { job_time: DEFAULT_JOB_TIME, chkpt_time: DEFAULT_CHKPT_TIME }
    }
}

impl fmt::Display for TimeBudget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} (job {} + checkpoint {})",
            to_wall_time_string(self.wall_time()),
            to_wall_time_string(self.job_time),
            to_wall_time_string(self.chkpt_time)
        )
    }
}
