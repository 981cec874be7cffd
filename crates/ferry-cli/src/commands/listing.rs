//! `outputs` and `resume-ls` handlers.

use ferry_fsops::list_outputs;

use crate::cli::OutputsArgs;
use crate::context::{CliContext, CliError, CliResult};
use crate::output::{render_checkpoints, render_outputs};

pub(crate) fn handle_outputs(ctx: &CliContext, args: &OutputsArgs) -> CliResult<()> {
    let root = args
        .root
        .clone()
        .unwrap_or_else(|| ctx.app.config().storage.download_root.clone());
    let entries = list_outputs(&root).map_err(CliError::failure)?;
    render_outputs(&root, &entries, ctx.output)
}

pub(crate) async fn handle_resume_list(ctx: &CliContext) -> CliResult<()> {
    let infos = ctx
        .app
        .resume_store()
        .list()
        .await
        .map_err(CliError::failure)?;
    render_checkpoints(&infos, ctx.output)
}
