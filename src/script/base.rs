use std::fs;
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::chkpt::layout::{write_executable, BASE, CHKPT_FILE, CHKPT_SUBDIR, META, TARBALL, USER_CHKPT_SCRIPT};
use crate::dialect::{SchedulerDialect, SchedulerVars};
use crate::error::{CsubError, ParseError, Result};
use crate::script::header::{BaseHeader, HEADER_END};
use crate::script::template;
use crate::script::{ChkptSaveOpt, KillMode};

/// Stand-in for a pro/epilogue call when there is nothing to run
///
/// Comments out the arguments that follow and exits 0, so the exit code checks in the base
/// script pass.
pub const NO_OP_CALL: &str = "echo #";

/// The script handed to the scheduler: a header the scheduler reads and a fixed body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseScript {
    pub header: BaseHeader,
    pub body: String,
}

/// Parameters of the base script body
#[derive(Debug, Clone)]
pub struct BodyParams {
    /// Command line that runs the prologue, [`NO_OP_CALL`] if the base script shouldn't
    pub prologue_call: String,
    pub epilogue_call: String,
    pub chkpt_save_opt: ChkptSaveOpt,
    pub kill_mode: KillMode,
    pub cleanup_after_restart: bool,
    pub cleanup_chkpt: bool,
    pub shared: bool,
    pub submit_program: String,
}

/// Rendering context for the base script body
#[derive(Serialize)]
struct BodyContext<'a> {
    prologue: &'a str,
    epilogue: &'a str,
    chkpt_save_opt: String,
    kill_mode: String,
    cleanup_after_restart: bool,
    cleanup_chkpt: bool,
    shared: bool,
    chkptsubdir: &'static str,
    chkpt_file: &'static str,
    tarball: &'static str,
    base: &'static str,
    meta: &'static str,
    user_chkpt_script_file: &'static str,
    submit_program: &'a str,
    vars: &'a SchedulerVars,
}

/// Render the base script body using TinyTemplate
pub fn render_body(params: &BodyParams, dialect: &dyn SchedulerDialect) -> Result<String> {
    /// included base body template
    static BODY: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/base.txt"));
    let context = BodyContext {
        prologue: &params.prologue_call,
        epilogue: &params.epilogue_call,
        chkpt_save_opt: params.chkpt_save_opt.to_string(),
        kill_mode: params.kill_mode.to_string(),
        cleanup_after_restart: params.cleanup_after_restart,
        cleanup_chkpt: params.cleanup_chkpt,
        shared: params.shared,
        chkptsubdir: CHKPT_SUBDIR,
        chkpt_file: CHKPT_FILE,
        tarball: TARBALL,
        base: BASE,
        meta: META,
        user_chkpt_script_file: USER_CHKPT_SCRIPT,
        submit_program: &params.submit_program,
        vars: dialect.vars(),
    };
    template::render("base", BODY, &context)
}

impl BaseScript {
    pub fn render(&self, dialect: &dyn SchedulerDialect) -> Result<String> {
        let mut text = self.header.render(dialect)?;
        text.push_str(&self.body);
        Ok(text)
    }

    /// Split a rendered base script at the end of its header and read the header back
    pub fn parse(text: &str, dialect: &dyn SchedulerDialect) -> std::result::Result<Self, ParseError> {
        let marker = format!("{HEADER_END}\n");
        let (header, body) = match text.find(&marker) {
            Some(pos) => (&text[..pos], &text[pos + marker.len()..]),
            None => match text.strip_suffix(HEADER_END) {
                Some(header) => (header, ""),
                None => return Err(ParseError::BaseScript("no end of header marker".to_string())),
            },
        };
        Ok(BaseScript {
            header: BaseHeader::parse(header, dialect)?,
            body: body.to_string(),
        })
    }

    pub fn read(path: &Path, dialect: &dyn SchedulerDialect) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| CsubError::io("Reading base script", path, err))?;
        Ok(BaseScript::parse(&text, dialect)?)
    }

    pub fn write(&self, path: &Path, dialect: &dyn SchedulerDialect) -> Result<()> {
        let text = self.render(dialect)?;
        info!("Writing base script to {}", path.display());
        write_executable(path, &text)
    }
}
