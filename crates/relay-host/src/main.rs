// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Relays chat between a 7 Days to Die server and a Discord channel.
//!
//! ```bash
//! horde-relay --config-file ./config.json
//! ```

mod demo;
mod discord;
mod shell_codec;
mod store;
mod telnet;

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use clap_derive::{Args, Parser};
use eyre::eyre;
use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};
use horde_relay::{
    ChatPlatform, EventSender, Relay, RelayConfig, RelayEvent, RemoteShell, Supervisor,
    event_channel,
};
use serde_derive::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::select;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};

use crate::demo::DemoShell;
use crate::discord::DiscordPlatform;
use crate::store::JsonConfigStore;
use crate::telnet::TelnetShell;

/// Held open for the life of the process so a second copy can't start alongside it.
const INSTANCE_PORT: u16 = 7383;

const CONSOLE_HELP: &str = "This is the console for the relay. Type \"exit\" or \"stop\" to shut it down, or \"leaveguilds\" to remove the bot from every Discord server.";

fn is_false(value: &bool) -> bool {
    !*value
}

/// Command line overrides, applied on top of the config file.
#[derive(Args, Debug, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
struct Overrides {
    /// Address of the game server's telnet console
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    ip: Option<String>,

    /// Port of the game server's telnet console
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,

    /// Id of the Discord channel to relay to
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,

    /// Command prefix, e.g. "7d!"
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    prefix: Option<String>,

    /// Answer console commands with canned data instead of connecting to a server
    #[arg(long)]
    #[serde(skip_serializing_if = "is_false")]
    demo_mode: bool,

    /// Don't log in to Discord
    #[arg(long)]
    #[serde(skip_serializing_if = "is_false")]
    skip_discord_auth: bool,

    #[arg(long)]
    #[serde(skip_serializing_if = "is_false")]
    allow_multiple_instances: bool,
}

#[derive(Parser, Debug)]
#[command(name = "horde-relay")]
#[command(about = "Relays chat between a 7 Days to Die server and a Discord channel")]
#[command(version)]
struct Arguments {
    /// JSON config file; also where the channel is saved by setchannel
    #[arg(long, default_value = "config.json")]
    config_file: PathBuf,

    #[arg(long, help = "Enable debug logging", default_value = "false")]
    debug: bool,

    #[command(flatten)]
    overrides: Overrides,
}

fn load_config(args: &Arguments) -> Result<RelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RelayConfig::default()))
        .merge(Json::file(&args.config_file))
        .merge(Serialized::defaults(&args.overrides))
        .extract()
}

async fn single_instance_guard(config: &RelayConfig) -> Result<Option<TcpListener>, eyre::Error> {
    if config.allow_multiple_instances {
        return Ok(None);
    }
    match TcpListener::bind(("0.0.0.0", INSTANCE_PORT)).await {
        Ok(listener) => Ok(Some(listener)),
        Err(e) if e.kind() == ErrorKind::AddrInUse => Err(eyre!(
            "It appears that there is another instance of this application already running. Please make sure only one instance of this application is running at a time. To bypass this, enable \"allow-multiple-instances\" in the config."
        )),
        Err(e) => {
            warn!("An unknown error has occurred. ({e})");
            Ok(None)
        }
    }
}

fn request_shutdown(supervisor: &Supervisor, events: &EventSender) {
    supervisor.stop();
    let _ = events.send(RelayEvent::Shutdown);
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), eyre::Error> {
    color_eyre::install()?;
    let args = Arguments::parse();
    let config = load_config(&args)?;

    let main_subscriber = tracing_subscriber::fmt()
        .compact()
        .with_ansi(true)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true)
        .with_max_level(if args.debug || config.debug_mode {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(main_subscriber)?;

    if let Err(e) = config.validate() {
        error!("{e}");
        return Err(e.into());
    }
    for warning in config.warnings() {
        warn!("{warning}");
    }
    if config.demo_mode {
        info!("Demo mode enabled; no game server will be contacted.");
    }

    let _instance = single_instance_guard(&config).await?;

    let (events, rx) = event_channel();
    let shell: Arc<dyn RemoteShell> = if config.demo_mode {
        Arc::new(DemoShell::new(events.clone()))
    } else {
        Arc::new(TelnetShell::new(
            &config.ip,
            config.port,
            config.password.clone().unwrap_or_default(),
            events.clone(),
        ))
    };
    let chat: Arc<dyn ChatPlatform> = Arc::new(DiscordPlatform::new(
        config.token.clone().unwrap_or_default(),
        events.clone(),
    ));
    let store = Arc::new(JsonConfigStore::new(&args.config_file));
    let supervisor = Supervisor::new();
    let relay = Relay::new(
        config,
        shell,
        chat,
        store,
        supervisor.clone(),
        events.clone(),
    );

    let mut hup_signal = signal(SignalKind::hangup())?;
    let mut stop_signal = signal(SignalKind::interrupt())?;
    let mut console = BufReader::new(tokio::io::stdin()).lines();
    let mut console_open = true;

    let mut relay_task = tokio::spawn(relay.run(rx));
    info!("Relay started. Type \"help\" for console commands.");
    let result = loop {
        select! {
            result = &mut relay_task => break result,
            _ = hup_signal.recv() => {
                info!("HUP received, stopping...");
                request_shutdown(&supervisor, &events);
            }
            _ = stop_signal.recv() => {
                info!("STOP received, stopping...");
                request_shutdown(&supervisor, &events);
            }
            line = console.next_line(), if console_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "stop" | "exit" => request_shutdown(&supervisor, &events),
                    "help" => info!("{CONSOLE_HELP}"),
                    "leaveguilds" => {
                        let _ = events.send(RelayEvent::LeaveGuilds);
                    }
                    "" => {}
                    other => warn!("Unknown console command '{other}'. {CONSOLE_HELP}"),
                },
                Ok(None) => console_open = false,
                Err(e) => {
                    warn!("Console input unavailable: {e}");
                    console_open = false;
                }
            },
        }
    };

    result??;
    info!("Done.");
    Ok(())
}
