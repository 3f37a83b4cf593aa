use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use waav_voice_control::{
    Cart, ClientConfig, DomainKind, DomainModule, Negotiator, Playlist, TransportSession,
    VoiceApp,
    app::{console, replay},
    core::realtime::default_transport,
    domain::default_track_player,
};

/// WaaV Voice Control - speak to a playlist or a shopping cart
#[derive(Parser, Debug)]
#[command(name = "waav-voice-control")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run (defaults to `run`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the interactive console
    Run {
        /// Domain to control, overriding the configuration
        #[arg(short = 'd', long = "domain")]
        domain: Option<DomainKind>,
    },

    /// Print the session.update event announcing the domain's tools
    Tools {
        #[arg(short = 'd', long = "domain")]
        domain: Option<DomainKind>,
    },

    /// Replay recorded server events (one JSON object per line) offline
    Replay {
        /// Transcript file
        file: PathBuf,

        #[arg(short = 'd', long = "domain")]
        domain: Option<DomainKind>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Load configuration from file or environment
    let mut config = if let Some(config_path) = &cli.config {
        ClientConfig::from_file(config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ClientConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    // Logs go to stderr; stdout belongs to the console view
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    for note in config.advisories() {
        warn!("{}", note);
    }

    // Initialize crypto provider for TLS connections
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let command = cli.command.unwrap_or(Commands::Run { domain: None });
    match command {
        Commands::Run { domain } => {
            if let Some(kind) = domain {
                config.domain.kind = kind;
            }
            match config.domain.kind {
                DomainKind::Playlist => run_console::<Playlist>(&config).await,
                DomainKind::Cart => run_console::<Cart>(&config).await,
            }
        }
        Commands::Tools { domain } => {
            let kind = domain.unwrap_or(config.domain.kind);
            let json = match kind {
                DomainKind::Playlist => tools_json::<Playlist>(&config)?,
                DomainKind::Cart => tools_json::<Cart>(&config)?,
            };
            println!("{json}");
            Ok(())
        }
        Commands::Replay { file, domain } => {
            if let Some(kind) = domain {
                config.domain.kind = kind;
            }
            match config.domain.kind {
                DomainKind::Playlist => replay_file::<Playlist>(&config, &file),
                DomainKind::Cart => replay_file::<Cart>(&config, &file),
            }
        }
    }
}

fn tools_json<D: DomainModule>(config: &ClientConfig) -> anyhow::Result<String> {
    let event = D::registry().session_update(&config.session_options());
    Ok(serde_json::to_string_pretty(&event)?)
}

async fn run_console<D: DomainModule>(config: &ClientConfig) -> anyhow::Result<()> {
    let (media, connector) = default_transport(&config.audio);
    let session = TransportSession::new(
        Negotiator::new(config.negotiation_endpoints()),
        media,
        connector,
        config.realtime.channel_label.clone(),
    );

    let mut domain = D::from_config(&config.domain);
    if D::PLAYS_TRACKS
        && let Some(player) = default_track_player(&config.audio).await
    {
        domain.attach_player(player);
    }

    let app = VoiceApp::new(session, domain, config.session_options());
    let (handle, task) = app.spawn();
    info!(domain = %D::KIND, model = %config.realtime.model, "Voice control ready");

    console::run(handle, tools_json::<D>(config)?).await?;
    task.await
        .map_err(|e| anyhow!("Voice app task failed: {}", e))?;
    Ok(())
}

fn replay_file<D: DomainModule>(config: &ClientConfig, path: &PathBuf) -> anyhow::Result<()> {
    let file = File::open(path)
        .map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;
    let outcome = replay::replay(
        D::from_config(&config.domain),
        config.session_options(),
        BufReader::new(file),
    )?;

    for step in &outcome.steps {
        for event in &step.outbound {
            println!("{:>4}  {}", step.line, serde_json::to_string(event)?);
        }
    }
    if outcome.skipped > 0 {
        println!("Skipped {} unparseable line(s)", outcome.skipped);
    }
    println!("{}", D::render(&outcome.snapshot));
    Ok(())
}
