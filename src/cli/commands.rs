//! CLI command definitions.

use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::config::{AppConfig, ToolKind, TOOLS};
use crate::metrics::init_metrics;
use crate::server::{build_dispatcher, build_standalone, serve_all, AppState};

/// Office tools server: PDF editing, shift tables, name tags, file transfer
/// and proofreading behind one dispatcher.
#[derive(Parser)]
#[command(name = "efficepart")]
#[command(about = "Office productivity tools served over HTTP")]
#[command(version)]
#[command(
    long_about = "efficepart serves a set of office tools over HTTP.\n\nEach tool is nested under its path prefix in the dispatcher and can also run on its own port.\n\nExample usage:\n  efficepart serve --port 8000\n  efficepart tool pdf\n  efficepart tools --json"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the dispatcher with every tool mounted under its path.
    Serve(ServeArgs),

    /// Run one tool on its own port.
    Tool(ToolArgs),

    /// Run the dispatcher and every tool on its own port.
    All,

    /// Delete expired uploads and name-tag workbooks once, then exit.
    Purge,

    /// List the tool registry.
    Tools(ToolsArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port for the dispatcher.
    #[arg(short, long, default_value_t = 8000, env = "EFFICEPART_PORT")]
    pub port: u16,
}

#[derive(Args, Debug)]
pub struct ToolArgs {
    /// Tool name, e.g. `pdf` or `gigafile`.
    pub name: ToolKind,

    /// Override the tool's registry port.
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Args, Debug)]
pub struct ToolsArgs {
    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

/// Parse CLI arguments without running any command.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with already parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve(args) => run_serve_command(args).await,
        Commands::Tool(args) => run_tool_command(args).await,
        Commands::All => run_all_command().await,
        Commands::Purge => run_purge_command().await,
        Commands::Tools(args) => run_tools_command(args),
    }
}

async fn connect() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env()?;
    init_metrics()?;
    info!(
        data_dir = %config.data_dir.display(),
        retention_days = config.retention.as_secs() / 86_400,
        "Loading state"
    );
    Ok(AppState::connect(config).await?)
}

fn address(state: &AppState, port: u16) -> String {
    format!("{}:{}", state.config.host, port)
}

async fn run_serve_command(args: ServeArgs) -> anyhow::Result<()> {
    let state = connect().await?;
    let app = build_dispatcher(state.clone());
    serve_all(&state, vec![(address(&state, args.port), app)]).await
}

async fn run_tool_command(args: ToolArgs) -> anyhow::Result<()> {
    let state = connect().await?;
    let port = args.port.unwrap_or(args.name.info().port);
    info!(tool = %args.name, port, "Starting standalone tool");
    let app = build_standalone(args.name, state.clone());
    serve_all(&state, vec![(address(&state, port), app)]).await
}

async fn run_all_command() -> anyhow::Result<()> {
    let state = connect().await?;

    let mut apps = Vec::with_capacity(TOOLS.len());
    for info in TOOLS {
        let app = match info.kind {
            ToolKind::Main => build_dispatcher(state.clone()),
            kind => build_standalone(kind, state.clone()),
        };
        apps.push((address(&state, info.port), app));
    }

    serve_all(&state, apps).await
}

async fn run_purge_command() -> anyhow::Result<()> {
    let state = connect().await?;
    let report = state.sweeper().sweep_once().await?;

    for (bucket, purged) in &report.buckets {
        println!(
            "{:<10} {:>6} files  {:>12} bytes",
            bucket.as_str(),
            purged.files,
            purged.bytes
        );
    }
    let total = report.total();
    println!(
        "total      {:>6} files  {:>12} bytes  ({} orphans, {} name-tag workbooks)",
        total.files, total.bytes, report.orphans, report.nametag_batches
    );
    Ok(())
}

/// Registry as printed by `efficepart tools`.
pub fn format_tools_table() -> String {
    let mut out = format!("{:<14} {:<6} {:<15} {}\n", "NAME", "PORT", "PATH", "DISPLAY NAME");
    for info in TOOLS {
        out.push_str(&format!(
            "{:<14} {:<6} {:<15} {}\n",
            info.name, info.port, info.path, info.display_name
        ));
    }
    out
}

fn run_tools_command(args: ToolsArgs) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(TOOLS)?);
    } else {
        print!("{}", format_tools_table());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["efficepart", "serve"]).expect("should parse");
        match cli.command {
            Commands::Serve(args) => assert_eq!(args.port, 8000),
            _ => panic!("Expected Serve command"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_tool_command_parses_name() {
        let cli = Cli::try_parse_from(["efficepart", "tool", "gigafile", "-p", "9006"])
            .expect("should parse");
        match cli.command {
            Commands::Tool(args) => {
                assert_eq!(args.name, ToolKind::Gigafile);
                assert_eq!(args.port, Some(9006));
            }
            _ => panic!("Expected Tool command"),
        }
    }

    #[test]
    fn test_unknown_tool_is_rejected() {
        assert!(Cli::try_parse_from(["efficepart", "tool", "spreadsheet"]).is_err());
    }

    #[test]
    fn test_global_log_level() {
        let cli = Cli::try_parse_from(["efficepart", "tools", "--json", "--log-level", "debug"])
            .expect("should parse");
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Commands::Tools(ToolsArgs { json: true })));
    }

    #[test]
    fn test_tools_table_lists_registry() {
        let table = format_tools_table();
        assert_eq!(table.lines().count(), TOOLS.len() + 1);
        assert!(table.contains("proofreading"));
        assert!(table.contains("/gigafile"));
    }
}
