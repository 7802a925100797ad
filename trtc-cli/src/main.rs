//! TRTC command-line tool

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::EnvFilter;
use trtc_core::prelude::*;
use trtc_core::{init_shared, LIBRARY_ENV};

/// How long to wait for the exit-room event after leaving
const EXIT_GRACE: Duration = Duration::from_secs(3);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// SDK shared library to load
    #[arg(long, global = true, env = LIBRARY_ENV)]
    library: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true, env = "TRTC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the SDK version
    Version,

    /// Join a room and print events until interrupted
    Join {
        /// Application id from the service console
        #[arg(long, env = "TRTC_APP_ID")]
        app_id: u32,

        /// Local user id
        #[arg(long, env = "TRTC_USER_ID")]
        user_id: String,

        /// Signature authorising the user id
        #[arg(long, env = "TRTC_USER_SIG", hide_env_values = true)]
        user_sig: String,

        /// Numeric room id
        #[arg(long, conflicts_with = "str_room_id")]
        room_id: Option<u32>,

        /// String room id
        #[arg(long)]
        str_room_id: Option<String>,

        /// Role to enter as
        #[arg(long, value_enum, default_value = "anchor")]
        role: CliRole,

        /// Application scene
        #[arg(long, value_enum, default_value = "video-call")]
        scene: CliScene,

        /// Room permission ticket
        #[arg(long, hide_env_values = true, env = "TRTC_PRIVATE_MAP_KEY")]
        private_map_key: Option<String>,

        /// Leave after this many seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,

        /// Print SDK logs to the console (overrides the config file)
        #[arg(long)]
        sdk_console: bool,
    },

    /// Run the local capture self-test
    LocalTest {
        /// Seconds to run for
        #[arg(long, default_value = "10")]
        duration: u64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CliRole {
    Anchor,
    Audience,
}

impl From<CliRole> for RoleType {
    fn from(role: CliRole) -> Self {
        match role {
            CliRole::Anchor => RoleType::Anchor,
            CliRole::Audience => RoleType::Audience,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CliScene {
    VideoCall,
    Live,
    AudioCall,
    VoiceChatRoom,
}

impl From<CliScene> for AppScene {
    fn from(scene: CliScene) -> Self {
        match scene {
            CliScene::VideoCall => AppScene::VideoCall,
            CliScene::Live => AppScene::Live,
            CliScene::AudioCall => AppScene::AudioCall,
            CliScene::VoiceChatRoom => AppScene::VoiceChatRoom,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trtc=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    let library = cli.library.clone().or_else(|| config.library.clone());

    let shared = init_shared(library.as_deref()).context("Failed to load the SDK")?;

    let result = match cli.command {
        Commands::Version => handle_version(shared),
        Commands::Join {
            app_id,
            user_id,
            user_sig,
            room_id,
            str_room_id,
            role,
            scene,
            private_map_key,
            duration,
            json,
            sdk_console,
        } => {
            if sdk_console {
                config.log.console_enabled = true;
            }
            let mut params = RoomParams::new(app_id, user_id, user_sig)
                .with_role(role.into())
                .with_scene(scene.into());
            if let Some(id) = room_id {
                params = params.with_room_id(id);
            }
            if let Some(id) = str_room_id {
                params = params.with_str_room_id(id);
            }
            if let Some(key) = private_map_key {
                params = params.with_private_map_key(key);
            }
            handle_join(
                shared,
                &config,
                &params,
                duration.map(Duration::from_secs),
                json,
            )
            .await
        }
        Commands::LocalTest { duration } => {
            handle_local_test(shared, &config, Duration::from_secs(duration)).await
        }
    };

    shared.destroy();
    result
}

fn load_config(path: Option<&Path>) -> Result<CloudConfig> {
    match path {
        Some(path) => CloudConfig::load(path)
            .with_context(|| format!("Failed to read config {}", path.display())),
        None => Ok(CloudConfig::default()),
    }
}

fn handle_version(shared: &SharedCloud) -> Result<()> {
    let cloud = shared.instance()?;
    println!("TRTC SDK {}", cloud.sdk_version()?);
    Ok(())
}

async fn handle_join(
    shared: &SharedCloud,
    config: &CloudConfig,
    params: &RoomParams,
    duration: Option<Duration>,
    json: bool,
) -> Result<()> {
    let cloud = shared.instance()?;
    cloud.apply_config(config)?;

    let events = Arc::new(EventChannel::default());
    let mut rx = events.subscribe();
    let token = cloud.add_callback(events)?;

    cloud.enter_room(params)?;
    tracing::info!("Join requested, waiting for the SDK");

    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, leaving room");
                break Ok(());
            }
            _ = &mut deadline => {
                tracing::info!("Duration elapsed, leaving room");
                break Ok(());
            }
            event = rx.recv() => match event {
                Ok(event) => {
                    print_event(&event, json)?;
                    if let Some(outcome) = session_outcome(&event) {
                        break outcome;
                    }
                }
                Err(RecvError::Lagged(n)) => tracing::warn!("Dropped {} events", n),
                Err(RecvError::Closed) => break Ok(()),
            }
        }
    };

    if cloud.state() == SessionState::RoomJoined || cloud.state() == SessionState::RoomJoining {
        cloud.exit_room()?;
        wait_for_exit(&mut rx, json).await?;
    }
    cloud.remove_callback(token);
    outcome
}

/// How a terminal event ends the join session
fn session_outcome(event: &TrtcEvent) -> Option<Result<()>> {
    if !event.is_terminal() {
        return None;
    }
    Some(match event {
        TrtcEvent::ExitRoom { reason } => {
            tracing::warn!("Removed from room (reason {})", reason);
            Ok(())
        }
        other => Err(anyhow::anyhow!("{}", other)),
    })
}

async fn wait_for_exit(rx: &mut broadcast::Receiver<TrtcEvent>, json: bool) -> Result<()> {
    let wait = async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    print_event(&event, json)?;
                    if matches!(event, TrtcEvent::ExitRoom { .. }) {
                        return Ok(());
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return Ok(()),
            }
        }
    };
    match tokio::time::timeout(EXIT_GRACE, wait).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("No exit-room event within {:?}", EXIT_GRACE);
            Ok(())
        }
    }
}

async fn handle_local_test(
    shared: &SharedCloud,
    config: &CloudConfig,
    duration: Duration,
) -> Result<()> {
    if duration.is_zero() {
        bail!("Duration must be at least one second");
    }
    let cloud = shared.instance()?;
    cloud.apply_log_config(&config.log)?;
    cloud.start_local_test()?;
    println!("Local test running for {:?}", duration);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
        _ = tokio::time::sleep(duration) => {}
    }
    Ok(())
}

fn print_event(event: &TrtcEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else {
        println!("{}", event);
    }
    Ok(())
}
