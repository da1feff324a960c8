//! The scheduler header of a base script
//!
//! A header is rendered from a [`BaseHeader`] in a fixed order and read back into one on resume,
//! so fields can be changed and the script re-rendered without editing text in place:
//!
//! ```text
//! #!/bin/bash
//! #PBS -l walltime=<job time + checkpoint time>
//! #PBS -q <queue>                     (optional)
//! #PBS -N <name>
//! #PBS -o <chkptdir>/<name>.base.out
//! #PBS -e <chkptdir>/<name>.base.err
//! #PBS -l epilogue=<path>             (optional, no-mimic mode)
//! #PBS -l prologue=<path>             (optional, no-mimic mode)
//! <resource lines from the job script>
//! #PBS -l vmem=<vmem>                 (optional)
//!
//! chksltot=<job time in seconds>
//! <array id handling>
//! ### end of csub header ###
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::dialect::{Directive, SchedulerDialect};
use crate::error::{ParseError, Result};
use crate::script::template;
use crate::walltime::{parse_wall_time_string, to_wall_time_string, TimeBudget};

/// Last line of every rendered header
pub const HEADER_END: &str = "### end of csub header ###";

const JOB_TIME_FIELD: &str = "chksltot=";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseHeader {
    pub budget: TimeBudget,
    pub queue: Option<String>,
    pub name: String,
    /// Job checkpoint directory, the scheduler's own stdout/stderr go here
    pub chkpt_dir: PathBuf,
    pub epilogue: Option<PathBuf>,
    pub prologue: Option<PathBuf>,
    pub resources: Vec<String>,
    pub vmem: Option<String>,
}

/// Rendering context for the shell part of the header
#[derive(Serialize)]
struct HeaderContext {
    job_time: u64,
    name: String,
    chkptdirbase: String,
    job_name_var: &'static str,
    array_sep: &'static str,
}

impl BaseHeader {
    pub fn stdout(&self) -> PathBuf {
        self.chkpt_dir.join(format!("{}.base.out", self.name))
    }

    pub fn stderr(&self) -> PathBuf {
        self.chkpt_dir.join(format!("{}.base.err", self.name))
    }

    fn directives(&self) -> Vec<Directive> {
        let mut directives = vec![Directive::WallTime(to_wall_time_string(self.budget.wall_time()))];
        if let Some(queue) = &self.queue {
            directives.push(Directive::Queue(queue.clone()));
        }
        directives.push(Directive::Name(self.name.clone()));
        directives.push(Directive::Stdout(self.stdout().display().to_string()));
        directives.push(Directive::Stderr(self.stderr().display().to_string()));
        if let Some(epilogue) = &self.epilogue {
            directives.push(Directive::Epilogue(epilogue.display().to_string()));
        }
        if let Some(prologue) = &self.prologue {
            directives.push(Directive::Prologue(prologue.display().to_string()));
        }
        directives.extend(self.resources.iter().cloned().map(Directive::Resource));
        if let Some(vmem) = &self.vmem {
            directives.push(Directive::Vmem(vmem.clone()));
        }
        directives
    }

    pub fn render(&self, dialect: &dyn SchedulerDialect) -> Result<String> {
        /// included header template, shell logic following the directives
        static HEADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/header.txt"));

        let mut text = String::from("#!/bin/bash\n");
        for directive in self.directives() {
            text.push_str(&dialect.render_directive(&directive));
            text.push('\n');
        }
        text.push('\n');

        let vars = dialect.vars();
        let context = HeaderContext {
            job_time: self.budget.job_time(),
            name: self.name.clone(),
            chkptdirbase: self.chkpt_dir.display().to_string(),
            job_name_var: vars.job_name,
            array_sep: vars.array_sep,
        };
        text.push_str(&template::render("header", HEADER, &context)?);
        text.push_str(HEADER_END);
        text.push('\n');
        Ok(text)
    }

    /// Read a header back from the lines before [`HEADER_END`]
    pub fn parse(header: &str, dialect: &dyn SchedulerDialect) -> std::result::Result<Self, ParseError> {
        let mut wall_time = None;
        let mut job_time = None;
        let mut queue = None;
        let mut name = None;
        let mut stdout = None;
        let mut epilogue = None;
        let mut prologue = None;
        let mut resources = Vec::new();
        let mut vmem = None;

        for line in header.lines() {
            if let Some(value) = line.trim().strip_prefix(JOB_TIME_FIELD) {
                let seconds = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ParseError::BaseScript(format!("bad job time '{value}'")))?;
                job_time = Some(seconds);
                continue;
            }
            match dialect.parse_directive(line) {
                Some(Directive::WallTime(time)) => wall_time = Some(parse_wall_time_string(&time)?),
                Some(Directive::Queue(q)) => queue = Some(q),
                Some(Directive::Name(n)) => name = Some(n),
                Some(Directive::Stdout(path)) => stdout = Some(path),
                Some(Directive::Stderr(_)) => {}
                Some(Directive::Epilogue(path)) => epilogue = Some(PathBuf::from(path)),
                Some(Directive::Prologue(path)) => prologue = Some(PathBuf::from(path)),
                Some(Directive::Resource(line)) => resources.push(line),
                Some(Directive::Vmem(v)) => vmem = Some(v),
                None => {}
            }
        }

        let missing = |what: &str| ParseError::BaseScript(format!("no {what} found"));
        let wall_time = wall_time.ok_or_else(|| missing("wall time"))?;
        let job_time = job_time.ok_or_else(|| missing("job time"))?;
        let name = name.ok_or_else(|| missing("job name"))?;
        let stdout = stdout.ok_or_else(|| missing("stdout path"))?;
        let chkpt_dir = chkpt_dir_from_stdout(&stdout, &name)?;

        Ok(BaseHeader {
            budget: TimeBudget::from_declared(job_time, wall_time)?,
            queue,
            name,
            chkpt_dir,
            epilogue,
            prologue,
            resources,
            vmem,
        })
    }
}

/// `<chkptdir>/<name>.base.out` -> `<chkptdir>`
fn chkpt_dir_from_stdout(stdout: &str, name: &str) -> std::result::Result<PathBuf, ParseError> {
    let path = Path::new(stdout);
    let expected = format!("{name}.base.out");
    match (path.file_name(), path.parent()) {
        (Some(file), Some(parent)) if file.to_string_lossy() == expected => Ok(parent.to_path_buf()),
        _ => Err(ParseError::BaseScript(format!("unexpected stdout path '{stdout}'"))),
    }
}
