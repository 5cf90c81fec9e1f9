use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::sync::Arc;
use tmx_randomizer::autosave::AutosaveReconciler;
use tmx_randomizer::config::{default_config_path, RandomizerConfig};
use tmx_randomizer::fetch::HttpMapFetcher;
use tmx_randomizer::presets::{write_preset, PresetStore};
use tmx_randomizer::request::{build_request, compatible_sites};
use tmx_randomizer::rules::{validate_rules, RandomizerRules};
use tmx_randomizer::session::{
    format_clock, SessionEvent, SessionManager, SessionServices, StartOutcome,
};
use tmx_randomizer::storage::{rank_best_sessions, FileSessionStore, SessionStore, SessionSummary};
use tmx_randomizer::validate::HeaderMapValidator;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, trace};
use tracing_subscriber::EnvFilter;

/// Timed random-map challenge sessions
#[derive(Parser)]
#[command(name = "tmx-randomizer")]
#[command(about = "Play random exchange maps against the clock", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the configuration file
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print random map request URLs for the current rules
    Url {
        /// Use a saved preset instead of the configured rules
        #[arg(short, long)]
        preset: Option<String>,

        /// Seed the random choices
        #[arg(long)]
        seed: Option<u64>,

        /// Number of URLs to print
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
    },
    /// Validate the configuration and rules
    Check,
    /// Run a session; type `skip` or `end` on stdin, Ctrl-C ends it
    Run {
        /// Use a saved preset instead of the configured rules
        #[arg(short, long)]
        preset: Option<String>,
    },
    /// List recorded sessions
    Sessions {
        /// Rank by minutes per author medal
        #[arg(long)]
        best: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Manage rule presets
    Preset {
        #[command(subcommand)]
        command: PresetCommands,
    },
}

#[derive(Subcommand)]
enum PresetCommands {
    /// Save the configured rules under a name
    Save { name: String },
    /// List saved presets
    List,
    /// Print a preset's contents
    Show { name: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).await;

    let log_level = match cli.verbose {
        0 => config
            .as_ref()
            .ok()
            .and_then(|c| c.log_level.clone())
            .unwrap_or_else(|| "info".to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .with_target(cli.verbose >= 2)
        .with_line_number(cli.verbose >= 2)
        .with_writer(std::io::stderr)
        .init();

    debug!("tmx-randomizer started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let result = match config {
        Ok(config) => run_command(cli.command, config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!("Fatal error: {e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<RandomizerConfig> {
    let mut config = match path {
        Some(path) => RandomizerConfig::load_from(path).await?,
        None => RandomizerConfig::load_from(&default_config_path()?).await?,
    };
    config.merge_env_vars(|key| std::env::var(key).ok());
    Ok(config)
}

async fn run_command(command: Commands, config: RandomizerConfig) -> anyhow::Result<()> {
    match command {
        Commands::Url {
            preset,
            seed,
            count,
        } => run_url(&config, preset, seed, count).await,
        Commands::Check => run_check(&config),
        Commands::Run { preset } => run_session(&config, preset).await,
        Commands::Sessions { best, json } => run_sessions(&config, best, json).await,
        Commands::Preset { command } => run_preset_command(&config, command).await,
    }
}

async fn resolve_rules(
    config: &RandomizerConfig,
    preset: Option<String>,
) -> anyhow::Result<RandomizerRules> {
    match preset {
        Some(name) => {
            let store = PresetStore::new(config.presets_dir()?);
            Ok(store.load(&name).await?)
        }
        None => Ok(config.rules.clone()),
    }
}

async fn run_url(
    config: &RandomizerConfig,
    preset: Option<String>,
    seed: Option<u64>,
    count: usize,
) -> anyhow::Result<()> {
    let rules = resolve_rules(config, preset).await?;
    validate_rules(&rules)?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    for _ in 0..count {
        let request = build_request(&rules.request_rules, &mut rng)?;
        println!("{}", request.url);
    }
    Ok(())
}

fn run_check(config: &RandomizerConfig) -> anyhow::Result<()> {
    let show = |dir: Option<PathBuf>| {
        dir.map(|d| d.display().to_string())
            .unwrap_or_else(|| "not configured".to_string())
    };

    println!("Game directory:       {}", show(config.game_directory.clone()));
    println!("Autosaves directory:  {}", show(config.autosaves_dir()));
    println!("Downloaded maps:      {}", show(config.downloaded_dir()));
    println!("Sessions directory:   {}", config.sessions_dir()?.display());
    println!("Time limit:           {}", format_clock(config.rules.time_limit));

    validate_rules(&config.rules).context("The configured rules cannot be used")?;
    let sites: Vec<_> = compatible_sites(&config.rules.request_rules)
        .into_iter()
        .map(|s| s.name())
        .collect();
    println!("Compatible sites:     {}", sites.join(", "));
    Ok(())
}

async fn run_session(config: &RandomizerConfig, preset: Option<String>) -> anyhow::Result<()> {
    if config.game_directory.is_none() && config.autosaves_directory.is_none() {
        bail!("The game directory is not configured; set game_directory or RANDOMIZER_GAME_DIRECTORY");
    }
    let rules = resolve_rules(config, preset).await?;

    let fetcher = HttpMapFetcher::new(&config.fetch.user_agent, config.fetch.request_timeout)?;
    let services = SessionServices {
        fetcher: Arc::new(fetcher),
        validator: Arc::new(HeaderMapValidator),
        store: Arc::new(FileSessionStore::new(config.sessions_dir()?)),
        reconciler: AutosaveReconciler::new(config.replay_file_format.clone()),
        retry: config.fetch.retry.clone(),
        settings: config.session.clone(),
        downloaded_dir: config.downloaded_dir(),
        autosaves_dir: config.autosaves_dir(),
    };

    let manager = SessionManager::new(services);
    let mut events = manager.subscribe();
    match manager.start_session(rules).await? {
        StartOutcome::Started { directory } => {
            println!("Session started, data in {}", directory.display())
        }
        StartOutcome::AlreadyRunning => bail!("A session is already running"),
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = input.next_line(), if input_open => match line?.as_deref().map(str::trim) {
                Some("skip") => {
                    if let Err(e) = manager.skip().await {
                        eprintln!("{}", e.user_message());
                    }
                }
                Some("end") => break,
                Some("") => {}
                Some(other) => eprintln!("Unknown input '{other}', expected 'skip' or 'end'"),
                None => input_open = false,
            },
            event = events.recv() => match event {
                Ok(event) => {
                    println!("{}", event.description());
                    if let SessionEvent::MapAccepted { path: Some(path), .. } = &event {
                        println!("  saved to {}", path.display());
                    }
                    if event.is_terminal() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    debug!("Missed {n} session events");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    if let Some(outcome) = manager.end_session().await {
        let summary = SessionSummary::from(&outcome.data);
        println!(
            "Session over ({:?}): {} author, {} gold, {} skipped",
            outcome.reason, summary.author_count, summary.gold_count, summary.skipped_count
        );
    }
    Ok(())
}

async fn run_sessions(config: &RandomizerConfig, best: bool, json: bool) -> anyhow::Result<()> {
    let store = FileSessionStore::new(config.sessions_dir()?);
    let sessions = store.list_sessions().await?;

    let summaries: Vec<SessionSummary> = if best {
        rank_best_sessions(&sessions)
    } else {
        sessions.iter().map(SessionSummary::from).collect()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }
    if summaries.is_empty() {
        println!("No sessions recorded.");
        return Ok(());
    }
    for summary in summaries {
        let rate = summary
            .minutes_per_author
            .map(|m| format!("{m:.1} min/AT"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {}  AT {}  gold {}  skipped {}  {}",
            summary.directory,
            format_clock(summary.original_time_limit),
            summary.author_count,
            summary.gold_count,
            summary.skipped_count,
            rate
        );
    }
    Ok(())
}

async fn run_preset_command(
    config: &RandomizerConfig,
    command: PresetCommands,
) -> anyhow::Result<()> {
    let store = PresetStore::new(config.presets_dir()?);
    match command {
        PresetCommands::Save { name } => {
            let path = store.save(&name, &config.rules).await?;
            println!("Saved preset '{name}' to {}", path.display());
        }
        PresetCommands::List => {
            let names = store.list().await?;
            if names.is_empty() {
                println!("No presets saved.");
            }
            for name in names {
                println!("{name}");
            }
        }
        PresetCommands::Show { name } => {
            let rules = store.load(&name).await?;
            print!("{}", write_preset(&rules));
        }
    }
    Ok(())
}
