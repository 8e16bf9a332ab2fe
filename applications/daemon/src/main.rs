//! gramophoned - playback daemon
use anyhow::Context;
use clap::{Parser, Subcommand};
use gramophone_core::storage::keys;
use gramophone_core::PreferenceStore;
use gramophone_daemon::commands::{self, DaemonCommand};
use gramophone_audio::AudioBackendFactory;
use gramophone_daemon::config::{DaemonConfig, EngineKind, Overrides, OutputKind};
use gramophone_playback::engine::{
    self, BackendFactory, EngineNotifier, HttpResolver, MediaBackend,
};
use gramophone_playback::{
    HeadlessBackend, LocalPlayer, Playback, SessionBuilder, SessionCommand, SessionEvent,
    SessionHandle, ShuffleMode, StreamingPlayer,
};
use gramophone_server_client::MediaServerClient;
use gramophone_storage::{PreferenceChange, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gramophoned")]
#[command(about = "Gramophone playback daemon", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "GRAMOPHONE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the session and read commands from stdin
    Run {
        /// Database URL
        #[arg(long)]
        database: Option<String>,

        /// Playback engine
        #[arg(long, value_enum)]
        engine: Option<EngineKind>,

        /// Audio output
        #[arg(long, value_enum)]
        output: Option<OutputKind>,
    },
    /// Print the effective configuration as JSON
    ShowConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let overrides = match &cli.command {
        Commands::Run {
            database,
            engine,
            output,
        } => Overrides {
            database_url: database.clone(),
            engine: *engine,
            output: *output,
        },
        Commands::ShowConfig => Overrides::default(),
    };

    let config = DaemonConfig::load(cli.config.as_deref(), &overrides)
        .context("Failed to load configuration")?;
    config.validate()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Run { .. } => run(config).await,
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    tracing::info!("Starting gramophoned");
    tracing::info!("Engine: {}", config.engine.as_str());
    tracing::info!("Output: {}", config.output.as_str());

    let store = Arc::new(
        gramophone_storage::open(&config.database.url)
            .await
            .with_context(|| format!("Failed to open database {}", config.database.url))?,
    );
    tracing::info!("Database connected");

    let (notifier, engine_events) = engine::channel();
    let factory: Arc<dyn BackendFactory> = match config.output {
        OutputKind::Audio => {
            Arc::new(AudioBackendFactory::new().context("Failed to open audio output")?)
        }
        OutputKind::Headless => Arc::new(|notifier: EngineNotifier| -> Box<dyn MediaBackend> {
            Box::new(HeadlessBackend::new(notifier))
        }),
    };
    let engine: Box<dyn Playback> = match config.engine {
        EngineKind::Local => Box::new(LocalPlayer::local(factory, notifier)),
        EngineKind::Streaming => Box::new(StreamingPlayer::streaming(
            HttpResolver::new().context("Failed to build HTTP client")?,
            factory,
            notifier,
        )),
    };

    let mut builder = SessionBuilder::new(engine, engine_events, store.clone(), store.clone())
        .config(config.playback.clone());

    if let Some(remote) = &config.server {
        let client = MediaServerClient::new(remote.client_config())
            .context("Invalid media server configuration")?;
        tracing::info!("Reporting playback to {}", client.url());
        builder = builder.reporter(Arc::new(client));
    }

    let session = builder.spawn().await;
    let handle = session.handle();
    tracing::info!("Session started");

    let event_task = tokio::spawn(log_events(handle.subscribe()));
    let preference_task = tokio::spawn(forward_preferences(
        store.subscribe_changes(),
        handle.clone(),
    ));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Err(e) = execute(&line, &handle, &store).await {
                        tracing::warn!(error = %e, "Command failed");
                    }
                }
                Ok(None) => {
                    tracing::info!("Input closed, quitting");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read input, quitting");
                    break;
                }
            },
            () = handle.closed() => break,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, quitting");
                break;
            }
        }
    }

    // Already closed after an explicit quit
    let _ = handle.quit();
    session.join().await;

    preference_task.abort();
    event_task.abort();
    tracing::info!("Session stopped");
    Ok(())
}

async fn execute(line: &str, handle: &SessionHandle, store: &SqliteStore) -> anyhow::Result<()> {
    let Some(command) = commands::parse(line)? else {
        return Ok(());
    };
    tracing::debug!(?command, "Executing");

    match command {
        DaemonCommand::Session(command) => handle.send(command)?,
        DaemonCommand::PlayPlaylist { path, shuffle } => {
            let json = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let tracks = commands::parse_playlist(&json)?;
            tracing::info!(tracks = tracks.len(), "Playing {}", path.display());
            handle.send(SessionCommand::PlayPlaylist {
                tracks,
                shuffle: shuffle.then_some(ShuffleMode::On),
            })?;
        }
        DaemonCommand::SetDucking(enabled) => {
            store.set_int(keys::AUDIO_DUCKING, i64::from(enabled)).await?;
        }
        DaemonCommand::Status => {
            let snapshot = handle.snapshot().await?;
            println!("{}", serde_json::to_string(&snapshot)?);
        }
    }
    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Advisory { advisory }) => tracing::warn!("{advisory}"),
            Ok(SessionEvent::MetaChanged(now)) => tracing::info!(
                position = now.position,
                queue_length = now.queue_length,
                "Now playing: {}",
                now.track.title
            ),
            Ok(event) => tracing::info!(?event, "Session event"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn forward_preferences(
    mut changes: broadcast::Receiver<PreferenceChange>,
    handle: SessionHandle,
) {
    loop {
        match changes.recv().await {
            Ok(change) if change.key == keys::AUDIO_DUCKING => {
                if handle
                    .send(SessionCommand::SetAudioDucking(change.value != 0))
                    .is_err()
                {
                    break;
                }
            }
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
