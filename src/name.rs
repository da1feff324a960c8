//! Unique job names
//!
//! A job is known as `<name>.<YYYYMMDD_HHMMSS>.<2 random alphanumerics>`, where `<name>` is the
//! name declared in the job script or the script's file name. Array sub-jobs append the
//! scheduler's array separator and their index, e.g. `myjob.20240301_101500.a7-3`.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Local, TimeZone};
use log::info;
use rand::seq::IndexedRandom;
use rand::Rng;
use regex::Regex;

use crate::dialect::SchedulerDialect;
use crate::error::ParseError;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Alphabet of the random disambiguator, never contains an array separator
const ALPHANUM: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobIdentity {
    pub clean_name: String,
    pub timestamp: String,
    pub disambiguator: String,
    pub array_index: Option<u32>,
}

impl JobIdentity {
    /// New identity for `script_path` created now
    pub fn generate(script_path: &Path, script: &str, dialect: &dyn SchedulerDialect) -> Self {
        JobIdentity::generate_at(script_path, script, dialect, &Local::now(), &mut rand::rng())
    }

    pub fn generate_at<Tz: TimeZone, R: Rng + ?Sized>(
        script_path: &Path,
        script: &str,
        dialect: &dyn SchedulerDialect,
        now: &DateTime<Tz>,
        rng: &mut R,
    ) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        let declared = dialect.job_name_spec(script);
        let name = match &declared {
            Some(name) => name.clone(),
            None => script_path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| "job".to_string()),
        };

        let disambiguator = ALPHANUM
            .choose_multiple(rng, 2)
            .map(|&c| c as char)
            .collect();

        let identity = JobIdentity {
            clean_name: sanitise(&name),
            timestamp: now.format(TIMESTAMP_FORMAT).to_string(),
            disambiguator,
            array_index: None,
        };
        info!("Generated unique job name {} (declared name: {:?})", identity.unique_name(), declared);
        identity
    }

    /// Split a unique name, possibly carrying an array index, back into its parts
    pub fn parse(name: &str, dialect: &dyn SchedulerDialect) -> Result<Self, ParseError> {
        let sep = regex::escape(&dialect.array_sep().to_string());
        let pattern = format!(
            r"^(?P<name>\S+)\.(?P<ts>\d{{8}}_\d{{6}})\.(?P<rand>[0-9A-Za-z]{{2}})(?:{sep}(?P<array>\d+))?$"
        );
        let re = Regex::new(&pattern).map_err(|_| ParseError::JobIdentity(name.to_string()))?;
        let caps = re
            .captures(name)
            .ok_or_else(|| ParseError::JobIdentity(name.to_string()))?;

        let array_index = caps
            .name("array")
            .map(|m| m.as_str().parse::<u32>())
            .transpose()
            .map_err(|_| ParseError::JobIdentity(name.to_string()))?;

        Ok(JobIdentity {
            clean_name: caps["name"].to_string(),
            timestamp: caps["ts"].to_string(),
            disambiguator: caps["rand"].to_string(),
            array_index,
        })
    }

    /// `<name>.<timestamp>.<disambiguator>`, shared by all sub-jobs of an array
    pub fn unique_name(&self) -> String {
        format!("{}.{}.{}", self.clean_name, self.timestamp, self.disambiguator)
    }

    /// Name of one array sub-job of this identity
    pub fn with_array_index(&self, index: u32) -> Self {
        JobIdentity { array_index: Some(index), ..self.clone() }
    }

    pub fn display(&self, dialect: &dyn SchedulerDialect) -> String {
        match self.array_index {
            Some(index) => format!("{}{}{}", self.unique_name(), dialect.array_sep(), index),
            None => self.unique_name(),
        }
    }
}

/// Keep a name usable as a path component and as a shell word
fn sanitise(name: &str) -> String {
    let clean: String = name
        .chars()
        .map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect();
    match clean.trim_start_matches('.') {
        "" => "job".to_string(),
        _ => clean,
    }
}
