// FairPlay Core - FairPlay Streaming license client
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use fairplay_core::crypto::{ContentIdentifier, RecordedChallengeProvider};
use fairplay_core::license::{KeyRequestRouter, SessionDeps};
use fairplay_core::storage::{Database, PersistedKeyStore};
use fairplay_core::FairPlayConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter (e.g. `fairplay_core=debug`)
const LOG_ENV: &str = "FAIRPLAY_LOG";

#[derive(Parser)]
#[command(name = "fairplay-cli")]
#[command(about = "FairPlay CLI - license server testing tool", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// License server URL (overrides configuration)
    #[arg(long, global = true)]
    license_server_url: Option<String>,

    /// Certificate URL (overrides configuration)
    #[arg(long, global = true)]
    certificate_url: Option<String>,

    /// Persisted key database (overrides configuration)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Log filter when FAIRPLAY_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the content identifier of a key locator
    ContentId {
        /// Key locator, e.g. skd://asset-42
        locator: String,
    },
    /// Fetch the application certificate
    Certificate {
        /// Write the certificate bytes here
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Run one key exchange using a recorded SPC
    Exchange {
        /// Key locator, e.g. skd://asset-42
        locator: String,
        /// SPC captured on a device for this locator
        #[arg(long)]
        spc: PathBuf,
        /// Write the returned key bytes here
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Manage persisted keys
    Keys {
        #[command(subcommand)]
        command: KeyCommands,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// List persisted keys
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Remove the key for one content identifier
    Forget { identifier: String },
    /// Remove every persisted key
    Clear,
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .init();
        }
        LogFormat::Text => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .init();
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<FairPlayConfig> {
    let mut config = match cli.config {
        Some(ref path) => FairPlayConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config at {}", path.display()))?,
        None => FairPlayConfig::default(),
    };
    config.apply_env_overrides();

    if let Some(ref url) = cli.license_server_url {
        config.license_server.url = url.clone();
    }
    if let Some(ref url) = cli.certificate_url {
        config.license_server.certificate_url = Some(url.clone());
    }
    if let Some(ref path) = cli.database {
        config.storage.database_path = Some(path.clone());
    }

    Ok(config)
}

async fn open_store(config: &FairPlayConfig) -> anyhow::Result<PersistedKeyStore> {
    let path = config
        .storage
        .database_path
        .clone()
        .unwrap_or_else(Database::get_default_path);
    let db = Database::new(&path)
        .await
        .with_context(|| format!("Failed to open key database {}", path.display()))?;
    Ok(PersistedKeyStore::new(db))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::ContentId { ref locator } => {
            let id = ContentIdentifier::from_locator(locator)
                .with_context(|| format!("No content identifier in {:?}", locator))?;
            println!("{}", id);
        }

        Commands::Certificate { ref out } => {
            let config = load_config(&cli)?;
            let (client, _) = config.build_transport().context("Invalid configuration")?;
            let certificate = config
                .certificate_source(client)
                .fetch()
                .await
                .context("Failed to fetch application certificate")?;

            println!("Certificate: {} bytes", certificate.len());
            println!("Fingerprint: {}", certificate.fingerprint());
            if let Some(path) = out {
                tokio::fs::write(path, certificate.as_bytes())
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Written to {}", path.display());
            }
        }

        Commands::Exchange {
            ref locator,
            ref spc,
            ref out,
        } => {
            let config = load_config(&cli)?;
            let (client, transport) = config.build_transport().context("Invalid configuration")?;
            let certificates = config.certificate_source(client);

            let identifier = ContentIdentifier::from_locator(locator)
                .with_context(|| format!("No content identifier in {:?}", locator))?;
            let provider = RecordedChallengeProvider::from_file(spc)
                .await?
                .captured_for(identifier);

            let router = KeyRequestRouter::new(
                SessionDeps::new(certificates, Arc::new(provider), transport),
                config.router_config(),
            );

            let ticket = router.handle_key_request(locator, false);
            if !ticket.accepted {
                bail!("Key request for {:?} was not accepted", locator);
            }
            let response = ticket.wait().await.context("Key exchange failed")?;

            println!("Key: {} bytes", response.data.len());
            println!("Content type: {}", response.content_type);
            println!("Fingerprint: {}", fairplay_core::crypto::fingerprint(&response.data));
            if let Some(path) = out {
                tokio::fs::write(path, &response.data)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Written to {}", path.display());
            }
        }

        Commands::Keys { ref command } => {
            let config = load_config(&cli)?;
            let store = open_store(&config).await?;

            match command {
                KeyCommands::List { json } => {
                    let keys = store.list().await?;
                    if *json {
                        println!("{}", serde_json::to_string_pretty(&keys)?);
                    } else if keys.is_empty() {
                        println!("No persisted keys");
                    } else {
                        println!("{:<40} {:<18} {:>6} {:>8}  {}", "IDENTIFIER", "FINGERPRINT", "BYTES", "RENEWED", "STORED");
                        for key in keys {
                            println!(
                                "{:<40} {:<18} {:>6} {:>8}  {}",
                                key.identifier,
                                key.fingerprint,
                                key.len,
                                key.renewed_count,
                                key.stored_at.to_rfc3339()
                            );
                        }
                    }
                }
                KeyCommands::Forget { identifier } => {
                    let id = ContentIdentifier::new(identifier.as_bytes().to_vec())?;
                    if store.forget(&id).await? {
                        println!("Forgot key for {}", id);
                    } else {
                        println!("No key stored for {}", id);
                    }
                }
                KeyCommands::Clear => {
                    let removed = store.clear().await?;
                    println!("Removed {} persisted key(s)", removed);
                }
            }
        }
    }

    Ok(())
}
