use serde::Serialize;

use crate::chkpt::layout::{BASE, CHKPT_SUBDIR, META, TARBALL};
use crate::dialect::{SchedulerDialect, SchedulerVars};
use crate::error::Result;
use crate::script::template;

/// Rendering context for the pro/epilogue script
#[derive(Serialize)]
struct EpilogueContext<'a> {
    chkptsubdir: &'static str,
    tarball: &'static str,
    base: &'static str,
    meta: &'static str,
    vars: &'a SchedulerVars,
}

/// Render the script installed as `epilogue` (and linked as `prologue`)
///
/// As prologue it unpacks the checkpoint tarball into the node-local working directory; as
/// epilogue it packs the working directory back and marks the tarball complete.
pub fn render_epilogue(dialect: &dyn SchedulerDialect) -> Result<String> {
    static EPILOGUE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/epilogue.txt"));
    let context = EpilogueContext {
        chkptsubdir: CHKPT_SUBDIR,
        tarball: TARBALL,
        base: BASE,
        meta: META,
        vars: dialect.vars(),
    };
    template::render("epilogue", EPILOGUE, &context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Pbs;

    #[test]
    fn dispatches_on_invocation_name() {
        let text = render_epilogue(&Pbs).unwrap();
        assert!(text.starts_with("#!/bin/bash\n"));
        assert!(text.contains("mode=`basename $0`\n"));
        assert!(text.contains("\nprologue)\n"));
        assert!(text.contains("\nepilogue)\n"));
    }

    #[test]
    fn substitutes_layout_and_scheduler_names() {
        let text = render_epilogue(&Pbs).unwrap();
        assert!(text.contains("tarball=$chkptdir/job.localdir.tarball\n"));
        assert!(text.contains("workdir=${VSC_SCRATCH_NODE:-/tmp}/$jobname\n"));
        assert!(text.contains("jobchkptdir=$chkptdirbase-${jobname##*-}\n"));
        assert!(text.contains("$chkptdirbase/checkpoint/base $chkptdirbase/checkpoint/job.json"));
    }
}
