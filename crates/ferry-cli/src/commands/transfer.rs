//! `analyze` and `fetch` handlers.

use ferry_app::{FetchOutcome, FetchRequest, StopHandle};
use tokio::task::JoinHandle;
use tracing::info;

use crate::cli::{AnalyzeArgs, FetchArgs};
use crate::context::{CliContext, CliError, CliResult, require_non_empty};
use crate::output::{render_fetch_report, render_manifest};

/// Stop the controller on Ctrl-C. Abort the returned task once the
/// controller is done.
fn stop_on_interrupt(stop: StopHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping transfer");
            stop.stop();
        }
    })
}

pub(crate) async fn handle_analyze(ctx: &CliContext, args: AnalyzeArgs) -> CliResult<()> {
    require_non_empty("magnet", &args.magnet)?;
    let mut policy = ctx.app.policy().clone();
    policy.add_trackers &= !args.no_trackers;

    let (console, observer) = ctx.observer("analyze");
    let controller = ctx.app.transfer_controller_with_policy(observer, policy);
    let watcher = stop_on_interrupt(controller.stop_handle());
    let magnet = args.magnet;
    let job = ctx
        .app
        .pool()
        .submit("analyze", async move { controller.analyze(&magnet).await });
    let result = job.wait().await;
    watcher.abort();
    console.finish();

    match result?? {
        Some(metadata) => render_manifest(&metadata, ctx.output),
        None => Err(CliError::Interrupted),
    }
}

pub(crate) async fn handle_fetch(ctx: &CliContext, args: FetchArgs) -> CliResult<()> {
    require_non_empty("magnet", &args.magnet)?;
    ctx.app.prepare_storage().await?;

    let destination = args
        .dest
        .clone()
        .unwrap_or_else(|| ctx.app.config().storage.download_root.clone());
    let mut request = FetchRequest::new(args.magnet, destination)
        .with_trackers(!args.no_trackers && ctx.app.policy().add_trackers);
    if !args.select.is_empty() {
        request = request.with_selection(args.select);
    }
    if args.zip || args.zip_name.is_some() {
        request = request.with_archive(args.zip_name);
    }

    let (console, observer) = ctx.observer("fetch");
    let controller = ctx.app.transfer_controller(observer);
    let watcher = stop_on_interrupt(controller.stop_handle());
    let job = ctx.app.pool().submit("fetch", controller.fetch(request));
    let result = job.wait().await;
    watcher.abort();
    console.finish();

    match result?? {
        FetchOutcome::Completed(report) => render_fetch_report(&report, ctx.output),
        FetchOutcome::Stopped => Err(CliError::Interrupted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use std::fs;
    use std::path::Path;

    fn context(root: &Path) -> anyhow::Result<CliContext> {
        let config = root.join("ferry.yaml");
        fs::write(
            &config,
            format!(
                "storage:\n  download_root: {}\ntransfer:\n  metadata_poll_secs: 1\n  download_poll_secs: 1\n  add_trackers: false\n  space_margin: 1.0\nlogging:\n  level: warn\n",
                root.join("downloads").display()
            ),
        )?;
        CliContext::bootstrap(Some(&config), OutputFormat::Json, true)
            .map_err(|err| anyhow::anyhow!("bootstrap failed: {err:?}"))
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_honours_destination_override() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let ctx = context(temp.path())?;
        let dest = temp.path().join("elsewhere");
        let args = FetchArgs {
            magnet: "magnet:?xt=urn:btih:feed01&dn=Clip".to_string(),
            dest: Some(dest.clone()),
            select: Vec::new(),
            zip: false,
            zip_name: None,
            no_trackers: true,
        };
        let result = handle_fetch(&ctx, args).await;
        assert!(result.is_ok(), "{result:?}");
        assert!(dest.join("Clip").is_file());
        assert!(!temp.path().join("downloads").join("Clip").exists());
        assert!(temp.path().join("downloads").is_dir());
        ctx.app.shutdown().await;
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn analyze_reports_without_downloading() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let ctx = context(temp.path())?;
        let args = AnalyzeArgs {
            magnet: "magnet:?xt=urn:btih:feed02&dn=Preview".to_string(),
            no_trackers: false,
        };
        let result = handle_analyze(&ctx, args).await;
        assert!(result.is_ok(), "{result:?}");
        assert!(!temp.path().join("downloads").join("Preview").exists());
        Ok(())
    }

    #[tokio::test]
    async fn blank_magnet_is_a_validation_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let ctx = context(temp.path())?;
        let args = AnalyzeArgs {
            magnet: "   ".to_string(),
            no_trackers: true,
        };
        let result = handle_analyze(&ctx, args).await;
        assert!(matches!(result, Err(CliError::Validation(_))), "{result:?}");
        Ok(())
    }
}
