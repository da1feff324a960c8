//! Scheduler specific syntax
//!
//! Everything that differs between batch schedulers sits behind [`SchedulerDialect`]: how a job
//! script declares its name, how header directives are written and read back, the array job
//! naming convention, the environment variables a running job sees and the submission command.
//! Torque/PBS is the only dialect implemented.

use once_cell::sync::Lazy;
use regex::Regex;

/// One scheduler directive of a generated base script header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    WallTime(String),
    Queue(String),
    Name(String),
    Stdout(String),
    Stderr(String),
    Epilogue(String),
    Prologue(String),
    /// Any other resource request, kept verbatim
    Resource(String),
    Vmem(String),
}

/// Names of the scheduler environment variables substituted into generated scripts
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchedulerVars {
    pub array_sep: &'static str,
    pub job_id: &'static str,
    pub job_name: &'static str,
    pub o_host: &'static str,
    pub queue: &'static str,
    pub server: &'static str,
    pub scratch: &'static str,
    pub scratch_node: &'static str,
    pub profile_script: &'static str,
    pub org: &'static str,
}

pub trait SchedulerDialect: std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn vars(&self) -> &SchedulerVars;

    /// Separator between a job name and its array index, e.g. the `-` in `job-1`
    fn array_sep(&self) -> char;

    /// Name declared inside a user job script, if any
    fn job_name_spec(&self, script: &str) -> Option<String>;

    /// Resource request lines of a user job script
    ///
    /// Wall time and virtual memory are left out since they are controlled separately.
    fn resource_specs(&self, script: &str) -> Vec<String>;

    /// Virtual memory requested by a user job script
    fn vmem_spec(&self, script: &str) -> Option<String>;

    fn render_directive(&self, directive: &Directive) -> String;

    /// Inverse of [`SchedulerDialect::render_directive`]; `None` for non-directive lines
    fn parse_directive(&self, line: &str) -> Option<Directive>;

    /// Default submission program
    fn submit_program(&self) -> &'static str;

    fn array_flag(&self, spec: &str) -> Vec<String>;
}

static PBS_VARS: SchedulerVars = SchedulerVars {
    array_sep: "-",
    job_id: "PBS_JOBID",
    job_name: "PBS_JOBNAME",
    o_host: "PBS_O_HOST",
    queue: "PBS_QUEUE",
    server: "PBS_SERVER",
    scratch: "VSC_SCRATCH",
    scratch_node: "VSC_SCRATCH_NODE",
    profile_script: "/etc/profile.d/vsc.sh",
    org: "VSC",
};

static PBS_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*#PBS\s+-N\s+(?P<job_name>\S+)\s*$").expect("valid regex"));
static PBS_L_SPEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*#PBS\s+-l\s+[^\n]*$").expect("valid regex"));
static PBS_WALLTIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*#PBS\s+-l\s+walltime").expect("valid regex"));
static PBS_VMEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*#PBS\s+-l\s+vmem").expect("valid regex"));
static PBS_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#PBS\s+-(?P<flag>[lqNoe])\s+(?P<value>.*?)\s*$").expect("valid regex")
});

/// Torque/PBS
#[derive(Debug, Clone, Copy, Default)]
pub struct Pbs;

impl SchedulerDialect for Pbs {
    fn name(&self) -> &'static str {
        "PBS"
    }

    fn vars(&self) -> &SchedulerVars {
        &PBS_VARS
    }

    fn array_sep(&self) -> char {
        '-'
    }

    fn job_name_spec(&self, script: &str) -> Option<String> {
        PBS_NAME
            .captures(script)
            .map(|caps| caps["job_name"].to_string())
    }

    fn resource_specs(&self, script: &str) -> Vec<String> {
        PBS_L_SPEC
            .find_iter(script)
            .map(|m| m.as_str().trim().to_string())
            .filter(|line| !PBS_WALLTIME.is_match(line) && !PBS_VMEM.is_match(line))
            .collect()
    }

    fn vmem_spec(&self, script: &str) -> Option<String> {
        PBS_L_SPEC
            .find_iter(script)
            .filter(|m| PBS_VMEM.is_match(m.as_str()))
            .find_map(|m| match self.parse_directive(m.as_str()) {
                Some(Directive::Vmem(vmem)) => Some(vmem),
                _ => None,
            })
    }

    fn render_directive(&self, directive: &Directive) -> String {
        match directive {
            Directive::WallTime(time) => format!("#PBS -l walltime={time}"),
            Directive::Queue(queue) => format!("#PBS -q {queue}"),
            Directive::Name(name) => format!("#PBS -N {name}"),
            Directive::Stdout(path) => format!("#PBS -o {path}"),
            Directive::Stderr(path) => format!("#PBS -e {path}"),
            Directive::Epilogue(path) => format!("#PBS -l epilogue={path}"),
            Directive::Prologue(path) => format!("#PBS -l prologue={path}"),
            Directive::Resource(line) => line.clone(),
            Directive::Vmem(vmem) => format!("#PBS -l vmem={vmem}"),
        }
    }

    fn parse_directive(&self, line: &str) -> Option<Directive> {
        let caps = PBS_DIRECTIVE.captures(line.trim_start())?;
        let value = caps["value"].to_string();
        let directive = match &caps["flag"] {
            "q" => Directive::Queue(value),
            "N" => Directive::Name(value),
            "o" => Directive::Stdout(value),
            "e" => Directive::Stderr(value),
            _ => match value.split_once('=') {
                Some(("walltime", time)) => Directive::WallTime(time.to_string()),
                Some(("vmem", vmem)) => Directive::Vmem(vmem.to_string()),
                Some(("epilogue", path)) => Directive::Epilogue(path.to_string()),
                Some(("prologue", path)) => Directive::Prologue(path.to_string()),
                _ => Directive::Resource(line.trim().to_string()),
            },
        };
        Some(directive)
    }

    fn submit_program(&self) -> &'static str {
        "qsub"
    }

    fn array_flag(&self, spec: &str) -> Vec<String> {
        vec!["-t".to_string(), spec.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "#!/bin/bash
#PBS -N myjob
#PBS -l nodes=1:ppn=4
#PBS -l walltime=72:00:00
#PBS -q long
  #PBS -l vmem=4gb
#PBS -m abe
echo hello
";

    #[test]
    fn finds_declared_job_name() {
        assert_eq!(Pbs.job_name_spec(SCRIPT).as_deref(), Some("myjob"));
        assert_eq!(Pbs.job_name_spec("#!/bin/bash\necho #PBS -N nope\n"), None);
    }

    #[test]
    fn keeps_resources_except_walltime_and_vmem() {
        assert_eq!(Pbs.resource_specs(SCRIPT), vec!["#PBS -l nodes=1:ppn=4".to_string()]);
    }

    #[test]
    fn picks_up_vmem_from_script() {
        assert_eq!(Pbs.vmem_spec(SCRIPT).as_deref(), Some("4gb"));
        assert_eq!(Pbs.vmem_spec("#!/bin/bash\n"), None);
    }

    #[test]
    fn directives_read_back_as_rendered() {
        let directives = [
            Directive::WallTime("3:15:00".into()),
            Directive::Queue("long".into()),
            Directive::Name("job.20240101_120000.ab".into()),
            Directive::Stdout("/scratch/chkpt/x/x.base.out".into()),
            Directive::Stderr("/scratch/chkpt/x/x.base.err".into()),
            Directive::Epilogue("/scratch/chkpt/x/epilogue".into()),
            Directive::Prologue("/scratch/chkpt/x/prologue".into()),
            Directive::Resource("#PBS -l nodes=1:ppn=4".into()),
            Directive::Vmem("8gb".into()),
        ];
        for directive in directives {
            let line = Pbs.render_directive(&directive);
            assert_eq!(Pbs.parse_directive(&line), Some(directive), "{line}");
        }
    }

    #[test]
    fn plain_lines_are_not_directives() {
        assert_eq!(Pbs.parse_directive("echo hello"), None);
        assert_eq!(Pbs.parse_directive("# a comment"), None);
        assert_eq!(Pbs.parse_directive("#PBS -m abe"), None);
    }

    #[test]
    fn array_flag_uses_dash_t() {
        assert_eq!(Pbs.array_flag("1-10"), vec!["-t", "1-10"]);
    }
}
