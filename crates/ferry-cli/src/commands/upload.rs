//! `send` handler.

use ferry_drive::TokenSource;

use crate::cli::SendArgs;
use crate::context::{CliContext, CliError, CliResult};
use crate::output::render_receipt;

/// Token sources in lookup order: explicit file, environment, then the
/// terminal when requested. The configured token file slots in before the
/// prompt.
fn token_sources(args: &SendArgs) -> Vec<TokenSource> {
    let mut sources = Vec::with_capacity(3);
    if let Some(path) = &args.token_file {
        sources.push(TokenSource::File(path.clone()));
    }
    sources.push(TokenSource::Env(args.token_env.clone()));
    if args.prompt {
        sources.push(TokenSource::Prompt);
    }
    sources
}

pub(crate) async fn handle_send(ctx: &CliContext, args: SendArgs) -> CliResult<()> {
    if !args.path.is_file() {
        return Err(CliError::validation(format!(
            "{} is not a file",
            args.path.display()
        )));
    }
    let folder = args
        .folder
        .clone()
        .unwrap_or_else(|| ctx.app.config().upload.folder.clone());

    let (console, observer) = ctx.observer("send");
    let controller = ctx.app.upload_controller(observer, token_sources(&args))?;
    let path = args.path;
    let job = ctx
        .app
        .pool()
        .submit("send", async move { controller.send(&path, &folder).await });
    let result = job.wait().await;
    console.finish();

    render_receipt(&result??, ctx.output)
}
