use std::path::Path;

use serde::Serialize;

use crate::dialect::SchedulerDialect;
use crate::error::Result;
use crate::script::template;

/// Where staged files come from and go to
///
/// Only copying from/to the directory the job was submitted from is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageMode {
    Local,
}

/// Rendering context for the local prestage script
#[derive(Serialize)]
struct PrestageContext {
    srcdir: String,
}

/// Rendering context for the local poststage script
#[derive(Serialize)]
struct PoststageContext {
    destdir: String,
    job_name_var: &'static str,
}

/// Copy the submission directory into the job's working directory before the first start
pub fn render_prestage(mode: StageMode, submit_dir: &Path) -> Result<String> {
    static PRESTAGE_LOCAL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/prestage_local.txt"));
    match mode {
        StageMode::Local => {
            let context = PrestageContext { srcdir: submit_dir.display().to_string() };
            template::render("prestage", PRESTAGE_LOCAL, &context)
        }
    }
}

/// Copy results back to `<submit dir>/result.<job name>` once the job has finished
pub fn render_poststage(mode: StageMode, submit_dir: &Path, dialect: &dyn SchedulerDialect) -> Result<String> {
    static POSTSTAGE_LOCAL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/poststage_local.txt"));
    match mode {
        StageMode::Local => {
            let context = PoststageContext {
                destdir: submit_dir.display().to_string(),
                job_name_var: dialect.vars().job_name,
            };
            template::render("poststage", POSTSTAGE_LOCAL, &context)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Pbs;

    #[test]
    fn prestage_copies_from_submit_dir() {
        let text = render_prestage(StageMode::Local, Path::new("/home/u/project")).unwrap();
        assert!(text.starts_with("#!/bin/bash\n"));
        assert!(text.contains("srcdir=/home/u/project\n"));
        assert!(text.contains("cp -r $srcdir/* ."));
    }

    #[test]
    fn poststage_copies_into_result_dir() {
        let text = render_poststage(StageMode::Local, Path::new("/home/u/project"), &Pbs).unwrap();
        assert!(text.contains("destdir=/home/u/project/result.$PBS_JOBNAME\n"));
        assert!(text.contains("rm -f $destdir/prologue $destdir/epilogue"));
    }
}
