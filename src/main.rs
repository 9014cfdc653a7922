//! Thin CLI entry point over the symbolic code-intelligence core.
//!
//! This binary is deliberately minimal: the MCP transport that would
//! normally front this core for an LLM client is an external collaborator
//! (see the crate-level docs), so this just wires a project's
//! `.codecore/project.toml` to a [`universal_lsp::Host`], runs one
//! operation through the [`universal_lsp::AgentExecutor`] so it observes
//! the same serialization and restart-on-termination policy a real tool
//! invocation would, and prints the result.

use std::sync::Arc;

use clap::Parser;
use universal_lsp::config::{CliArgs, Commands};
use universal_lsp::executor::with_lsp_restart_on_failure;
use universal_lsp::host::project_config::ProjectConfig;
use universal_lsp::retriever::{LanguageServerRetriever, SymbolRetriever};
use universal_lsp::{AgentExecutor, CoreError, Host};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(&args.log_level);

    if let Err(e) = run(args).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(log_level: &str) {
    let level = match log_level {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

async fn run(args: CliArgs) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let project_root = match args.project {
        Some(p) => p,
        None => ProjectConfig::discover_root(&cwd)
            .ok_or_else(|| CoreError::ConfigError(format!("no .codecore/project.toml found above {}", cwd.display())))?,
    };

    let config = ProjectConfig::load(&project_root)?;
    universal_lsp::host::project_config::validate_timeouts(config.read_timeout(), config.tool_timeout())?;

    tracing::info!(
        project = %project_root.display(),
        language = %config.language,
        "starting language server"
    );

    let config = Arc::new(config);
    let host = Arc::new(Host::new(project_root.clone(), &config));
    host.start(&config).await?;
    let executor = AgentExecutor::new();

    let result = execute_command(host.clone(), config, &executor, args.command).await;

    host.shutdown().await;
    result
}

async fn execute_command(
    host: Arc<Host>,
    config: Arc<ProjectConfig>,
    executor: &AgentExecutor,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Symbols { path, include_body } => {
            let (flat, _roots) = run_tool(host, config, executor, "symbols", move |host| {
                let path = path.clone();
                async move { host.request_document_symbols(&path, include_body).await }
            })
            .await?;
            for symbol in &flat {
                println!(
                    "{} ({:?}) @ {}:{}",
                    symbol.name, symbol.kind, symbol.selection_range.start.line, symbol.selection_range.start.character
                );
                if let Some(body) = &symbol.body {
                    println!("{body}");
                }
            }
        }
        Commands::Find { name_path, within } => {
            let matches = run_tool(host, config, executor, "find", move |host| {
                let name_path = name_path.clone();
                let within = within.clone();
                async move {
                    let retriever = LanguageServerRetriever::new(&host);
                    retriever.find_by_name(&name_path, within.as_deref()).await
                }
            })
            .await?;
            match matches.len() {
                0 => println!("No symbol found"),
                1 => println!("{}", describe_symbol(&matches[0])),
                _ => {
                    println!("Multiple symbols found:");
                    for symbol in &matches {
                        println!("  {}", describe_symbol(symbol));
                    }
                }
            }
        }
        Commands::References { path, line, character } => {
            let locations = run_tool(host, config, executor, "references", move |host| {
                let path = path.clone();
                async move { host.request_references(&path, line, character).await }
            })
            .await?;
            for location in &locations {
                println!("{}:{}:{}", location.relative_path, location.range.start.line, location.range.start.character);
            }
        }
    }
    Ok(())
}

fn describe_symbol(symbol: &universal_lsp::UnifiedSymbol) -> String {
    format!(
        "{} ({:?}) @ {}:{}:{}",
        symbol.name,
        symbol.kind,
        symbol.location.relative_path,
        symbol.selection_range.start.line,
        symbol.selection_range.start.character
    )
}

/// Runs one core call on the agent executor with the restart-on-termination
/// policy (§4.G/§5): if the language server died mid-call, it is restarted
/// exactly once and the call retried before the failure surfaces to the
/// caller. Submitting through the executor, rather than calling `host`
/// directly, means this CLI observes the same strict submission-order
/// scheduling a real tool invocation would.
async fn run_tool<T, F, Fut>(
    host: Arc<Host>,
    config: Arc<ProjectConfig>,
    executor: &AgentExecutor,
    label: &'static str,
    call: F,
) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: Fn(Arc<Host>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<T, CoreError>> + Send,
{
    executor
        .execute_task(label, async move {
            with_lsp_restart_on_failure(
                || call(host.clone()),
                || {
                    let host = host.clone();
                    let config = config.clone();
                    async move {
                        tracing::warn!("restarting language server after termination");
                        host.start(&config).await
                    }
                },
            )
            .await
        })
        .await
        .map_err(anyhow::Error::from)?
        .map_err(anyhow::Error::from)
}
