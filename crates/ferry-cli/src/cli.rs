//! Argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use ferry_telemetry::GlobalContextGuard;

use crate::commands::listing::{handle_outputs, handle_resume_list};
use crate::commands::transfer::{handle_analyze, handle_fetch};
use crate::commands::upload::handle_send;
use crate::context::{CliContext, CliResult};

/// Environment variable consulted for a Drive token when `--token-env` is not given.
pub(crate) const DEFAULT_TOKEN_ENV: &str = "FERRY_DRIVE_TOKEN";

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    execute(Cli::parse()).await
}

pub(crate) async fn execute(cli: Cli) -> i32 {
    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            if let Some(message) = err.display_message() {
                eprintln!("error: {message}");
            }
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let ctx = CliContext::bootstrap(cli.config.as_deref(), cli.output, cli.quiet)?;
    let _context = GlobalContextGuard::new(command_label(&cli.command));

    let result = match cli.command {
        Command::Analyze(args) => handle_analyze(&ctx, args).await,
        Command::Fetch(args) => handle_fetch(&ctx, args).await,
        Command::Send(args) => handle_send(&ctx, args).await,
        Command::Outputs(args) => handle_outputs(&ctx, &args),
        Command::ResumeLs => handle_resume_list(&ctx).await,
    };
    ctx.app.shutdown().await;
    result
}

pub(crate) const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Analyze(_) => "analyze",
        Command::Fetch(_) => "fetch",
        Command::Send(_) => "send",
        Command::Outputs(_) => "outputs",
        Command::ResumeLs => "resume-ls",
    }
}

#[derive(Parser)]
#[command(
    name = "ferry",
    version,
    about = "Fetch magnet content and send it to remote storage"
)]
pub(crate) struct Cli {
    #[arg(long, global = true, env = "FERRY_CONFIG", help = "YAML configuration file")]
    pub(crate) config: Option<PathBuf>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[arg(long, short, global = true, help = "Hide progress bars")]
    pub(crate) quiet: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Show a magnet link's manifest without downloading payload.
    Analyze(AnalyzeArgs),
    /// Download a magnet link, optionally a subset, optionally zipped.
    Fetch(FetchArgs),
    /// Upload a local file into a remote folder.
    Send(SendArgs),
    /// List files under the download root.
    Outputs(OutputsArgs),
    /// List stored resume checkpoints.
    ResumeLs,
}

#[derive(Args)]
pub(crate) struct AnalyzeArgs {
    /// Magnet URI.
    pub(crate) magnet: String,
    #[arg(long, help = "Do not add the default tracker list")]
    pub(crate) no_trackers: bool,
}

#[derive(Args)]
pub(crate) struct FetchArgs {
    /// Magnet URI.
    pub(crate) magnet: String,
    #[arg(long, help = "Destination directory (defaults to the download root)")]
    pub(crate) dest: Option<PathBuf>,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Comma-separated file indices to fetch (see `analyze`)"
    )]
    pub(crate) select: Vec<u32>,
    #[arg(long, help = "Zip the fetched content once complete")]
    pub(crate) zip: bool,
    #[arg(long = "zip-name", help = "Archive name (implies --zip)")]
    pub(crate) zip_name: Option<String>,
    #[arg(long, help = "Do not add the default tracker list")]
    pub(crate) no_trackers: bool,
}

#[derive(Args)]
pub(crate) struct SendArgs {
    /// File to upload.
    pub(crate) path: PathBuf,
    #[arg(long, help = "Remote folder name (defaults to the configured folder)")]
    pub(crate) folder: Option<String>,
    #[arg(long, help = "File holding an access token")]
    pub(crate) token_file: Option<PathBuf>,
    #[arg(
        long,
        default_value = DEFAULT_TOKEN_ENV,
        help = "Environment variable holding an access token"
    )]
    pub(crate) token_env: String,
    #[arg(long, help = "Prompt for a token when no other source has one")]
    pub(crate) prompt: bool,
}

#[derive(Args)]
pub(crate) struct OutputsArgs {
    #[arg(long, help = "Directory to list (defaults to the download root)")]
    pub(crate) root: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EXIT_INTERRUPTED;
    use std::fs;

    fn parse(args: &[&str]) -> anyhow::Result<Cli> {
        Ok(Cli::try_parse_from(
            std::iter::once("ferry").chain(args.iter().copied()),
        )?)
    }

    fn write_config(root: &std::path::Path) -> anyhow::Result<PathBuf> {
        let path = root.join("ferry.yaml");
        fs::write(
            &path,
            format!(
                "storage:\n  download_root: {}\ntransfer:\n  metadata_poll_secs: 1\n  download_poll_secs: 1\n  add_trackers: false\n  space_margin: 1.0\nlogging:\n  level: warn\n",
                root.join("downloads").display()
            ),
        )?;
        Ok(path)
    }

    #[test]
    fn fetch_flags_parse() -> anyhow::Result<()> {
        let cli = parse(&[
            "fetch",
            "magnet:?xt=urn:btih:abc123",
            "--select",
            "0,2",
            "--zip-name",
            "bundle",
            "--no-trackers",
            "--output",
            "json",
        ])?;
        assert_eq!(cli.output, OutputFormat::Json);
        let Command::Fetch(args) = cli.command else {
            anyhow::bail!("expected fetch");
        };
        assert_eq!(args.select, vec![0, 2]);
        assert_eq!(args.zip_name.as_deref(), Some("bundle"));
        assert!(args.no_trackers);
        assert!(!args.zip);
        Ok(())
    }

    #[test]
    fn send_defaults_to_environment_token() -> anyhow::Result<()> {
        let cli = parse(&["send", "movie.zip", "--folder", "Backups"])?;
        assert_eq!(command_label(&cli.command), "send");
        let Command::Send(args) = cli.command else {
            anyhow::bail!("expected send");
        };
        assert_eq!(args.token_env, DEFAULT_TOKEN_ENV);
        assert_eq!(args.folder.as_deref(), Some("Backups"));
        assert!(!args.prompt);
        Ok(())
    }

    #[test]
    fn resume_listing_uses_kebab_case() -> anyhow::Result<()> {
        let cli = parse(&["resume-ls"])?;
        assert!(matches!(cli.command, Command::ResumeLs));
        assert!(parse(&["resume_ls"]).is_err());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_then_list_outputs() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let config = write_config(temp.path())?;
        let config = config.to_string_lossy().into_owned();

        let code = execute(parse(&[
            "--config",
            &config,
            "--quiet",
            "fetch",
            "magnet:?xt=urn:btih:abc123&dn=Sample",
            "--zip",
        ])?)
        .await;
        assert_eq!(code, 0);
        let downloads = temp.path().join("downloads");
        assert!(downloads.join("Sample").is_file());
        assert!(downloads.join("Sample.zip").is_file());

        let code = execute(parse(&["--config", &config, "--output", "json", "outputs"])?).await;
        assert_eq!(code, 0);
        let code = execute(parse(&["--config", &config, "resume-ls"])?).await;
        assert_eq!(code, 0);
        Ok(())
    }

    #[tokio::test]
    async fn invalid_magnet_exits_with_validation_code() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let config = write_config(temp.path())?;
        let config = config.to_string_lossy().into_owned();
        let code = execute(parse(&[
            "--config",
            &config,
            "--quiet",
            "analyze",
            "https://example.com/not-a-magnet",
        ])?)
        .await;
        assert_eq!(code, 2);
        assert_ne!(code, EXIT_INTERRUPTED);
        Ok(())
    }

    #[tokio::test]
    async fn missing_config_file_is_a_failure() -> anyhow::Result<()> {
        let code = execute(parse(&["--config", "/no/such/ferry.yaml", "resume-ls"])?).await;
        assert_eq!(code, 3);
        Ok(())
    }
}
