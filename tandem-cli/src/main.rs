use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Input;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tandem::RoomId;
use tandem::client::{Client, ClientConfig, RtcAdapterFactory, SessionEvent};
use tandem::model::IceServerConfig;
use tandem::server::{DEFAULT_STUN_ADDR, RoomConfig, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tandem", version, about = "Room-scoped WebRTC signaling")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling server.
    Serve {
        #[arg(long, env = "TANDEM_BIND", default_value = "0.0.0.0:8080")]
        bind: SocketAddr,

        /// STUN/TURN URLs pushed to clients. `turn:`/`turns:` URLs use the
        /// credentials below.
        #[arg(long = "ice-url", env = "TANDEM_ICE_URLS", value_delimiter = ',', default_value = DEFAULT_STUN_ADDR)]
        ice_urls: Vec<String>,

        #[arg(long, env = "TANDEM_ICE_USERNAME")]
        ice_username: Option<String>,

        #[arg(long, env = "TANDEM_ICE_CREDENTIAL", hide_env_values = true)]
        ice_credential: Option<String>,

        #[arg(long, env = "TANDEM_MAX_MEMBERS", default_value_t = 8)]
        max_members: usize,
    },

    /// Join a room and connect to everyone in it.
    Join {
        #[arg(long, env = "TANDEM_SERVER", default_value = "ws://127.0.0.1:8080")]
        server: String,

        /// Prompted for when omitted.
        #[arg(long, env = "TANDEM_ROOM")]
        room: Option<String>,

        /// Seconds an offer or answer may stay unanswered.
        #[arg(long, env = "TANDEM_NEGOTIATION_TIMEOUT", default_value_t = 30)]
        negotiation_timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Commands::Serve {
            bind,
            ice_urls,
            ice_username,
            ice_credential,
            max_members,
        } => {
            let ice_servers = ice_servers(ice_urls, ice_username, ice_credential);
            serve(bind, ice_servers, max_members).await
        }

        Commands::Join {
            server,
            room,
            negotiation_timeout,
        } => join(server, room, Duration::from_secs(negotiation_timeout)).await,
    }
}

fn ice_servers(
    urls: Vec<String>,
    username: Option<String>,
    credential: Option<String>,
) -> Vec<IceServerConfig> {
    urls.into_iter()
        .map(|url| {
            let server = IceServerConfig::stun(url);
            if !server.is_turn() {
                return server;
            }
            match (&username, &credential) {
                (Some(user), Some(pass)) => IceServerConfig::turn(server.urls[0].clone(), user, pass),
                _ => {
                    warn!("{} has no --ice-username/--ice-credential", server.urls[0]);
                    server
                }
            }
        })
        .collect()
}

async fn serve(bind: SocketAddr, ice_servers: Vec<IceServerConfig>, max_members: usize) -> Result<()> {
    let config = ServerConfig {
        bind,
        ice_servers,
        room: RoomConfig {
            max_members,
            ..RoomConfig::default()
        },
    };

    println!("{}", format!("Signaling on ws://{}/ws/{{peer_id}}", bind).green().bold());

    tandem::server::run(config, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Ctrl-C received, shutting down");
    })
    .await
}

async fn join(server: String, room: Option<String>, negotiation_timeout: Duration) -> Result<()> {
    let room = match room {
        Some(room) => room,
        None => Input::<String>::new()
            .with_prompt("Room")
            .interact_text()
            .context("Failed to read room name")?,
    };
    let room_id = RoomId::new(room).context("Invalid room name")?;

    let mut config = ClientConfig::new(server, room_id);
    config.negotiation_timeout = negotiation_timeout;

    println!(
        "{} {} {} {}",
        "Joining".cyan(),
        config.identity.room_id.to_string().bold(),
        "as".cyan(),
        config.identity.peer_id
    );

    let (handle, mut events) = Client::start(config, Arc::new(RtcAdapterFactory));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, leaving room");
                handle.stop().await;
                break;
            }

            event = events.recv() => match event {
                Some(event) => print_event(&event),
                None => break,
            },
        }
    }

    Ok(())
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::SignalingConnected => println!("{}", "signaling connected".green()),
        SessionEvent::SignalingDisconnected {
            reason,
            will_reconnect,
        } => {
            let tail = if *will_reconnect { "reconnecting" } else { "giving up" };
            println!("{} ({}, {})", "signaling lost".red(), reason, tail);
        }
        SessionEvent::Joined(room) => println!("{} {}", "joined".green().bold(), room),
        SessionEvent::Left(room) => println!("{} {}", "left".yellow(), room),
        SessionEvent::PeerJoined(peer) => println!("{} {}", "+".green(), peer),
        SessionEvent::PeerLeft(peer) => println!("{} {}", "-".red(), peer),
        SessionEvent::StateChanged { peer_id, state } => {
            println!("  {} {}", peer_id.to_string().dimmed(), state)
        }
        SessionEvent::PeerConnected(peer) => {
            println!("{} {}", "connected to".green().bold(), peer)
        }
        SessionEvent::PeerDisconnected(peer) => println!("{} {}", "media interrupted:".yellow(), peer),
        SessionEvent::NegotiationFailed { peer_id, reason } => {
            println!("{} {}: {}", "negotiation failed with".red().bold(), peer_id, reason)
        }
        SessionEvent::ServerError { code, message } => {
            println!("{} {}: {}", "server error".red(), code, message)
        }
        SessionEvent::Stopped => println!("{}", "stopped".yellow()),
    }
}
