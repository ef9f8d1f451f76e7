// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use lightdesk::config::{self, Console};
use lightdesk::controller::{keyboard, Controller};
use lightdesk::dmx::{Engine, NullTransport, OlaTransport};
use lightdesk::show::ShowSettings;
use lightdesk::LightShow;
use parking_lot::Mutex;
use tracing::{info, warn};

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=lighting console
After=olad.service

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/lightdesk
ExecStart=/usr/local/bin/lightdesk start "$LIGHTDESK_CONFIG"
ExecReload=/bin/kill -HUP $MAINPID

[Install]
WantedBy=multi-user.target
Alias=lightdesk.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A lighting console."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start will start the console and take commands from the keyboard.
    Start {
        /// The path to the console config.
        config_path: String,
    },
    /// Loads and verifies a show file, then prints a summary of it.
    Verify {
        /// The path to the show file.
        show_path: String,
        /// The console config providing the universes the show is patched into.
        #[arg[short, long]]
        config_path: Option<String>,
    },
    /// Prints the patch of a show file.
    Patch {
        /// The path to the show file.
        show_path: String,
        /// The console config providing the universes the show is patched into.
        #[arg[short, long]]
        config_path: Option<String>,
    },
    /// Writes a default console config.
    Init {
        /// Where to write the config.
        config_path: String,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

fn settings(config_path: Option<&String>) -> Result<ShowSettings, Box<dyn Error>> {
    match config_path {
        Some(path) => Ok(Console::deserialize(Path::new(path))?.to_settings()?),
        None => Ok(ShowSettings::default()),
    }
}

fn offline_show(
    show_path: &str,
    config_path: Option<&String>,
) -> Result<LightShow, Box<dyn Error>> {
    let mut show = LightShow::new(settings(config_path)?, Arc::new(NullTransport));
    config::load_show(&mut show, Path::new(show_path))?;
    Ok(show)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config_path } => {
            let config_path = PathBuf::from(config_path);
            let console = Console::deserialize(&config_path)?;
            let settings = console.to_settings()?;
            let tick = settings.tick;

            let port = console.ola_port();
            let transport = tokio::task::spawn_blocking(move || {
                OlaTransport::connect(port).map_err(|e| e.to_string())
            })
            .await??;

            let mut show = LightShow::new(settings, Arc::new(transport));
            match console.show_path(&config_path) {
                Some(show_path) if show_path.exists() => config::load_show(&mut show, &show_path)?,
                Some(show_path) => {
                    warn!(path = %show_path.display(), "Show file not found, starting empty");
                    show.patch_1on1();
                }
                None => show.patch_1on1(),
            }
            let show = Arc::new(Mutex::new(show));

            let _engine = Engine::start(show.clone(), tick);
            info!("Console started.");
            Controller::new(show, Arc::new(keyboard::Driver::new()))
                .join()
                .await?;
        }
        Commands::Verify {
            show_path,
            config_path,
        } => {
            let show = offline_show(&show_path, config_path.as_ref())?;
            println!("{}", show);
        }
        Commands::Patch {
            show_path,
            config_path,
        } => {
            let show = offline_show(&show_path, config_path.as_ref())?;
            let patch = show.patch();

            if patch.iter().next().is_none() {
                println!("Nothing patched.");
                return Ok(());
            }

            println!("Patch (count: {}):", patch.iter().count());
            for (address, binding) in patch.iter() {
                let curve = show
                    .curves()
                    .get(binding.curve)
                    .map_or("unknown", |curve| curve.name());
                println!(
                    "- {}/{} <- channel {} ({})",
                    address.universe, address.output, binding.channel, curve
                );
            }
        }
        Commands::Init { config_path } => {
            let config_path = PathBuf::from(config_path);
            if config_path.exists() {
                return Err(format!("{} already exists", config_path.display()).into());
            }
            Console::default().save(&config_path)?;
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}
