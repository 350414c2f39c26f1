//! Trip Planner CLI
//!
//! A command-line interface for the travel planner with REPL support.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use trip_planner::tools::create_registry;
use trip_planner::{
    CapabilityRegistry, Config, RunEvent, Services, SubmitResponse, Telemetry, TravelPlanner,
    TravelPlannerBuilder, Turn,
};

/// Uses XDG_DATA_HOME if set, otherwise ~/.trip_planner
fn default_data_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data).join("trip_planner")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".trip_planner")
    } else {
        PathBuf::from(".trip_planner")
    }
}

/// Priority: CLI flags > auth.json > environment variables
fn build_config(cli: &Cli, working_dir: PathBuf) -> Config {
    let mut config = Config::from_env()
        .with_working_dir(working_dir)
        .with_verbose(cli.verbose)
        .with_offline(cli.offline)
        .with_otel_endpoint(cli.otel_endpoint.clone());

    if let Some(model) = &cli.model {
        config = config.with_model(model.clone());
    }
    if let Some(base_url) = &cli.base_url {
        let model = config.llm.model.clone();
        config = config.lm_studio(base_url, &model);
    }
    if let Some(api_key) = &cli.api_key {
        config = config.with_api_key(api_key.clone());
    }
    if let Some(max_iterations) = cli.max_iterations {
        config = config.with_max_iterations(max_iterations);
    }
    if let Some(secs) = cli.tool_timeout {
        config = config.with_tool_timeout(Duration::from_secs(secs));
    }
    if let Some(url) = &cli.searxng_url {
        config = config.with_searxng_url(url.clone());
    }
    config
}

#[derive(Parser)]
#[command(name = "trip-planner")]
#[command(about = "Trip Planner - multi-agent travel planning", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory searched for .trip/workers/*.yaml overrides
    #[arg(short = 'd', long, default_value = ".")]
    working_dir: PathBuf,

    /// LLM model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Base URL for custom LLM endpoint (e.g., LM Studio) - overrides auth.json
    #[arg(long)]
    base_url: Option<String>,

    /// API key - overrides auth.json and env vars
    #[arg(long)]
    api_key: Option<String>,

    /// Worker dispatches allowed per request
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Per tool call timeout in seconds
    #[arg(long)]
    tool_timeout: Option<u64>,

    /// Route with rules only, no LLM calls
    #[arg(long)]
    offline: bool,

    /// SearXNG instance for web search (default: $SEARXNG_URL)
    #[arg(long)]
    searxng_url: Option<String>,

    /// Log directory (default: ~/.trip_planner or $XDG_DATA_HOME/trip_planner)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// OpenTelemetry collector endpoint (e.g., http://localhost:4318)
    #[arg(long)]
    otel_endpoint: Option<String>,

    /// Verbose logging, and print run events
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive REPL session
    Repl,

    /// Run a single request
    Prompt {
        /// The request to plan
        message: String,
    },

    /// List workers and their tools (-v adds argument schemas)
    Workers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let working_dir = if cli.working_dir.is_absolute() {
        cli.working_dir.clone()
    } else {
        std::env::current_dir()?.join(&cli.working_dir)
    }
    .canonicalize()?;

    let data_dir = cli.log_dir.clone().unwrap_or_else(default_data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let config = build_config(&cli, working_dir.clone()).with_log_dir(data_dir.clone());

    if let Some(Commands::Workers) = cli.command {
        show_workers(&working_dir, cli.verbose)?;
        return Ok(());
    }

    let telemetry = Arc::new(Telemetry::init(
        &config.telemetry.log_dir,
        config.telemetry.verbose,
        config.telemetry.otel_endpoint.as_deref(),
    )?);

    let (tx, rx) = mpsc::unbounded_channel();
    let events = tokio::spawn(forward_events(rx, telemetry.clone(), cli.verbose));

    let planner = TravelPlannerBuilder::from_config(&config)?.events(tx).build()?;

    match cli.command {
        Some(Commands::Prompt { message }) => {
            let response = planner.submit(&message, Vec::new()).await;
            print_response(&response);
        }
        Some(Commands::Repl) | None => {
            run_repl(&planner, &telemetry, &data_dir).await?;
        }
        Some(Commands::Workers) => {}
    }

    drop(planner);
    let _ = events.await;
    println!("---");
    println!("{}", telemetry.stats());

    Ok(())
}

/// Feed run events to telemetry, echoing them in verbose mode
async fn forward_events(
    mut rx: mpsc::UnboundedReceiver<RunEvent>,
    telemetry: Arc<Telemetry>,
    verbose: bool,
) {
    while let Some(event) = rx.recv().await {
        telemetry.record(&event);
        if !verbose {
            continue;
        }
        match &event {
            RunEvent::RoutingDecided {
                iteration, next, fault, ..
            } => match fault {
                Some(fault) => eprintln!("[route #{}] {} (fault: {})", iteration, next, fault),
                None => eprintln!("[route #{}] {}", iteration, next),
            },
            RunEvent::Redirected {
                requested, next, reason,
            } => eprintln!("[redirect] {} -> {}: {}", requested, next, reason),
            RunEvent::WorkerEnd {
                worker,
                success,
                duration_ms,
                ..
            } => eprintln!(
                "[{}] {} in {}ms",
                worker,
                if *success { "ok" } else { "failed" },
                duration_ms
            ),
            RunEvent::ToolCallStart { tool, arguments, .. } => {
                eprintln!("  -> {} {}", tool, arguments)
            }
            _ => {}
        }
    }
}

fn show_workers(working_dir: &Path, verbose: bool) -> Result<()> {
    let registry = CapabilityRegistry::with_config(working_dir);
    let tools = create_registry(&Services::unconfigured());
    for (worker, capability) in registry.workers() {
        println!("{:16} {}", worker.as_str(), capability.description);
        for tool in tools.definitions(capability.tools.as_slice()) {
            println!("  {:24} {}", tool.name, tool.description);
            if verbose {
                let schema = serde_json::to_string_pretty(&tool.parameters)?;
                for line in schema.lines() {
                    println!("    {}", line);
                }
            }
        }
    }
    Ok(())
}

fn print_response(response: &SubmitResponse) {
    println!("{}", response.final_response_text);
    if !response.success {
        eprintln!("(run {}: {})", response.run.id, response.run.status);
    }
}

fn print_help() {
    println!("Commands:");
    println!("  /quit, /exit  - Exit the REPL");
    println!("  /clear        - Start a new conversation");
    println!("  /stats        - Show session statistics");
    println!("  /history      - Show the conversation log");
    println!("  /help         - Show this help");
}

async fn run_repl(
    planner: &TravelPlanner,
    telemetry: &Telemetry,
    data_dir: &Path,
) -> Result<()> {
    println!("Trip Planner REPL");
    println!("Session: {}", telemetry.session_id());
    println!();
    print_help();
    println!();

    let mut rl = DefaultEditor::new()?;
    let history_path = data_dir.join("history.txt");
    let _ = rl.load_history(&history_path);

    let mut history: Vec<Turn> = Vec::new();

    loop {
        let prompt = if history.is_empty() { "trip> " } else { "trip>> " };

        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(line)?;

                if line.starts_with('/') {
                    match line {
                        "/quit" | "/exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        "/clear" => {
                            history.clear();
                            println!("Conversation cleared.");
                        }
                        "/stats" => println!("{}", telemetry.stats()),
                        "/history" => {
                            for turn in &history {
                                let text = turn.payload().text().unwrap_or("");
                                println!("{:4} {:16} {}", turn.seq(), turn.origin(), text);
                            }
                        }
                        "/help" => print_help(),
                        _ => println!("Unknown command: {}", line),
                    }
                    continue;
                }

                // Ctrl-C during a run cancels the run, not the REPL
                let token = CancellationToken::new();
                let canceller = token.clone();
                let watcher = tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        canceller.cancel();
                    }
                });

                println!();
                let response = planner
                    .submit_with(line, std::mem::take(&mut history), token, None)
                    .await;
                watcher.abort();

                print_response(&response);
                println!();
                history = response.updated_history;
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    Ok(())
}
