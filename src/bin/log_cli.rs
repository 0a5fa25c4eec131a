//! Log Dashboard CLI - query, control, and watch a log server
//!
//! A terminal front end for a running `log-server`.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Args, Parser, Subcommand};
use console::{style, Emoji, Key, Term};
use std::path::PathBuf;
use tokio::sync::mpsc;

use log_dashboard::config::{default_config_path, DashboardConfig};
use log_dashboard::sync::{DashboardState, SyncClient};
use log_dashboard::{
    FilterSpec, LogBackend, LogLevel, LogRecord, LogType, NewLogEntry, RpcClient, StreamAction,
    StreamStatus,
};

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "+ ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");
static INFO: Emoji<'_, '_> = Emoji("ℹ ", "i ");
static PAUSED: Emoji<'_, '_> = Emoji("⏸ ", "|| ");
static LIVE: Emoji<'_, '_> = Emoji("▶ ", "> ");

#[derive(Parser)]
#[command(name = "log-cli")]
#[command(author = "e421")]
#[command(version)]
#[command(about = "Log Dashboard CLI - query and control a log server from the terminal")]
#[command(long_about = r#"
Log Dashboard CLI talks to a running log-server over its RPC API.

Examples:
  log-cli logs --level error            # Errors only
  log-cli logs --source nginx -n 20     # Last 20 nginx entries
  log-cli search timeout                # Keyword search
  log-cli pause                         # Pause the stream
  log-cli clear --all                   # Delete every stored log
  log-cli watch                         # Live view, refreshes every 2s
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Server URL (overrides config)
    #[arg(long, global = true, env = "LOG_DASHBOARD_URL")]
    server: Option<String>,

    /// Config file (default: ~/.config/log-dashboard/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the server is reachable
    Health,

    /// List logs matching a filter
    Logs(FilterArgs),

    /// Most recently inserted logs
    Recent {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: i64,
    },

    /// Case-insensitive keyword search over message and raw content
    Search {
        keyword: String,

        #[arg(short = 'n', long, default_value_t = 100)]
        limit: i64,
    },

    /// List distinct sources
    Sources,

    /// Show stream status
    Status,

    /// Pause the stream
    Pause,

    /// Resume the stream
    Resume,

    /// Delete every log and zero the counter (--all goes through clearLogs)
    Clear {
        /// Delete all logs through clearLogs
        #[arg(long)]
        all: bool,
    },

    /// Create a log entry
    Push {
        message: String,

        #[arg(short, long, default_value = "info")]
        level: LogLevel,

        #[arg(short = 't', long = "type", default_value = "application")]
        log_type: LogType,

        #[arg(short, long, default_value = "log-cli")]
        source: String,

        /// Raw line (default: same as message)
        #[arg(long)]
        raw: Option<String>,

        /// Event time, RFC 3339 (default: now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Live view that polls the server (r refresh, p pause/resume, q quit)
    Watch {
        #[command(flatten)]
        filter: FilterArgs,

        /// Start in search mode
        #[arg(long)]
        search: Option<String>,

        /// Load once without polling
        #[arg(long)]
        no_auto_refresh: bool,
    },
}

#[derive(Args, Clone)]
struct FilterArgs {
    #[arg(short, long)]
    level: Option<LogLevel>,

    #[arg(short = 't', long = "type")]
    log_type: Option<LogType>,

    #[arg(short, long)]
    source: Option<String>,

    #[arg(short, long)]
    keyword: Option<String>,

    /// Inclusive lower bound, RFC 3339
    #[arg(long)]
    since: Option<DateTime<Utc>>,

    /// Inclusive upper bound, RFC 3339
    #[arg(long)]
    until: Option<DateTime<Utc>>,

    #[arg(short = 'n', long, default_value_t = 100)]
    limit: i64,

    #[arg(long, default_value_t = 0)]
    offset: i64,
}

impl From<FilterArgs> for FilterSpec {
    fn from(args: FilterArgs) -> Self {
        FilterSpec {
            level: args.level,
            log_type: args.log_type,
            source: args.source,
            keyword: args.keyword,
            start_time: args.since,
            end_time: args.until,
            limit: args.limit,
            offset: args.offset,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(default_config_path);
    let mut config = DashboardConfig::load_from(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?
        .with_env()
        .client;
    if let Some(server) = cli.server {
        config.server_url = server;
    }

    let client = RpcClient::new(config.rpc_config())?;

    match cli.command {
        Commands::Health => cmd_health(&client).await,
        Commands::Logs(filter) => cmd_logs(&client, filter.into()).await,
        Commands::Recent { limit } => {
            let logs = client.get_recent_logs(limit).await?;
            print_logs("Recent Logs", &logs);
            Ok(())
        }
        Commands::Search { keyword, limit } => {
            let logs = client.search_logs(&keyword, limit).await?;
            print_logs(&format!("Search: \"{}\"", keyword), &logs);
            Ok(())
        }
        Commands::Sources => cmd_sources(&client).await,
        Commands::Status => {
            let status = client.get_stream_status().await?;
            print_status(&status);
            Ok(())
        }
        Commands::Pause => cmd_control(&client, StreamAction::Pause).await,
        Commands::Resume => cmd_control(&client, StreamAction::Resume).await,
        Commands::Clear { all: false } => cmd_control(&client, StreamAction::Clear).await,
        Commands::Clear { all: true } => {
            let outcome = client.clear_logs().await?;
            println!("{}{}", CHECK, style(outcome.message).green());
            Ok(())
        }
        Commands::Push {
            message,
            level,
            log_type,
            source,
            raw,
            at,
        } => {
            let mut entry = NewLogEntry::new(level, log_type, source, message);
            if let Some(raw) = raw {
                entry = entry.with_raw_content(raw);
            }
            if let Some(at) = at {
                entry = entry.with_timestamp(at);
            }
            let record = client.create_log_entry(&entry).await?;
            println!("{}Created log #{}", CHECK, style(record.id).bold());
            Ok(())
        }
        Commands::Watch {
            filter,
            search,
            no_auto_refresh,
        } => {
            let auto_refresh = config.auto_refresh && !no_auto_refresh;
            cmd_watch(client, filter.into(), search, auto_refresh).await
        }
    }
}

async fn cmd_health(client: &RpcClient) -> Result<()> {
    match client.healthcheck().await {
        Ok(health) => {
            println!(
                "{}{} is {} ({})",
                CHECK,
                style(client.base_url()).cyan(),
                style(&health.status).green().bold(),
                health.timestamp.with_timezone(&Local).format("%H:%M:%S")
            );
            Ok(())
        }
        Err(e) => {
            println!("{}{} is unreachable", CROSS, style(client.base_url()).cyan());
            Err(e.into())
        }
    }
}

async fn cmd_logs(client: &RpcClient, filter: FilterSpec) -> Result<()> {
    let logs = client.get_logs(&filter).await?;
    print_logs("Logs", &logs);
    Ok(())
}

async fn cmd_sources(client: &RpcClient) -> Result<()> {
    let sources = client.get_log_sources().await?;

    println!("\n{}", style("Sources").bold().underlined());
    println!();
    if sources.is_empty() {
        println!("  {} No sources yet", INFO);
    }
    for source in &sources {
        println!("  {} {}", style("●").cyan(), source);
    }
    println!();
    Ok(())
}

async fn cmd_control(client: &RpcClient, action: StreamAction) -> Result<()> {
    let status = client.control_stream(action).await?;
    println!("{}Stream {}", CHECK, style(action).bold());
    print_status(&status);
    Ok(())
}

async fn cmd_watch(
    client: RpcClient,
    filter: FilterSpec,
    search: Option<String>,
    auto_refresh: bool,
) -> Result<()> {
    let sync = SyncClient::new(client);
    sync.set_auto_refresh(auto_refresh);
    if filter != FilterSpec::default() {
        sync.set_filter(filter).await;
    } else {
        sync.start().await;
    }
    if let Some(keyword) = search {
        // Connection failures already show in the banner
        let _ = sync.search(&keyword).await;
    }

    let term = Term::stdout();
    let mut updates = sync.subscribe();
    let mut keys = spawn_key_reader();
    let mut rendered: Option<DashboardState> = None;

    loop {
        // Loading flips alone don't warrant a redraw
        let mut state = updates.borrow_and_update().clone();
        state.loading = false;
        if rendered.as_ref() != Some(&state) {
            render(&term, &state)?;
            rendered = Some(state);
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            Some(key) = keys.recv() => match key {
                Key::Char('r') => sync.refresh().await,
                Key::Char('p') => {
                    // Failures show in the error banner
                    let _ = sync.toggle_pause().await;
                }
                Key::Char('q') | Key::Escape | Key::CtrlC => break,
                _ => {}
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    sync.set_auto_refresh(false);
    Ok(())
}

/// Forward key presses from a dedicated thread. The channel closes at once
/// when no terminal is attached.
fn spawn_key_reader() -> mpsc::UnboundedReceiver<Key> {
    let (tx, rx) = mpsc::unbounded_channel();
    let term = Term::stdout();
    if !term.is_term() {
        return rx;
    }
    std::thread::spawn(move || {
        while let Ok(key) = term.read_key() {
            if tx.send(key).is_err() {
                break;
            }
        }
    });
    rx
}

fn render(term: &Term, state: &DashboardState) -> Result<()> {
    term.clear_screen()?;

    println!("{}", style("Log Dashboard").bold().underlined());
    if let Some(status) = &state.status {
        print_status(status);
    }
    if let Some(banner) = state.disconnected_banner() {
        println!("{}{}", CROSS, style(banner).red().bold());
    }
    if let Some(error) = &state.error {
        println!("{}{}", CROSS, style(error).red());
    }

    let mode = match &state.search {
        Some(keyword) => format!("search \"{}\"", keyword),
        None => "filter".to_string(),
    };
    println!(
        "  {} {} | {} | {}",
        style("mode:").dim(),
        mode,
        if state.auto_refresh {
            style("auto-refresh on").green()
        } else {
            style("auto-refresh off").yellow()
        },
        style(format!("{} sources", state.sources.len())).dim()
    );

    print_logs("Logs", &state.logs);
    println!("{}", style("r refresh | p pause/resume | q or Ctrl+C to exit").dim());
    Ok(())
}

fn print_status(status: &StreamStatus) {
    let state = if status.is_paused {
        format!("{}{}", PAUSED, style("paused").yellow().bold())
    } else {
        format!("{}{}", LIVE, style("live").green().bold())
    };
    println!(
        "  {} {} updated {}",
        state,
        style(format!("total {}", status.total_logs)).dim(),
        status.last_update.with_timezone(&Local).format("%H:%M:%S")
    );
}

fn print_logs(title: &str, logs: &[LogRecord]) {
    println!("\n{} {}", style(title).bold(), style(format!("({})", logs.len())).dim());
    println!();

    if logs.is_empty() {
        println!("  {} No logs found", INFO);
    }
    for record in logs {
        println!(
            "  {} {:<5} {:<11} {} {}",
            style(record.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")).dim(),
            level_style(record.level),
            style(record.log_type).cyan(),
            style(format!("[{}]", record.source)).magenta(),
            record.message
        );
    }
    println!();
}

fn level_style(level: LogLevel) -> console::StyledObject<&'static str> {
    let label = level.as_str();
    match level {
        LogLevel::Fatal => style(label).red().bold().reverse(),
        LogLevel::Error => style(label).red().bold(),
        LogLevel::Warn => style(label).yellow(),
        LogLevel::Info => style(label).green(),
        LogLevel::Debug => style(label).dim(),
    }
}
