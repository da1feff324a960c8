use serde::Serialize;

use crate::error::Result;
use crate::script::template;

/// Exit code of the user checkpoint script on any failure
///
/// Out of the range a shell uses for its own statuses; the checkpoint trigger looks for it.
pub const USER_CHKPT_FAILURE_CODE: u32 = 12345;

/// Program creating the checkpoint of a running process
pub const CHKPT_COMMAND: &str = "cr_checkpoint";

/// Rendering context for the user checkpoint script
#[derive(Serialize)]
struct TriggerContext {
    failure_code: u32,
    chkpt_command: &'static str,
}

/// Render `user_chkpt_script.sh`
///
/// Contract with the running job: the master pid is read from `$CSUB_MASTER_PID_FILE`, the
/// request is acknowledged by creating `$CSUB_KILL_ACK_FILE`, the checkpoint is written to
/// `$CSUB_CHECKPOINT_FILE`.
pub fn render_user_chkpt_trigger() -> Result<String> {
    static USER_CHKPT: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/user_chkpt.txt"));
    let context = TriggerContext {
        failure_code: USER_CHKPT_FAILURE_CODE,
        chkpt_command: CHKPT_COMMAND,
    };
    template::render("user_chkpt", USER_CHKPT, &context)
}
