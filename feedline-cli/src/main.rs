use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use feedline::crypto::keys;
use feedline::{App, ClientConfig, TimelineItem, TimelineMode};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "feedline")]
#[command(author, version, about = "Signed social timeline client", long_about = None)]
struct Args {
    /// Directory holding the settings database
    #[arg(long, env = "FEEDLINE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Feed server to use instead of the stored one
    #[arg(long, env = "FEEDLINE_SERVER_URL")]
    server: Option<String>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new identity key pair, replacing the current one
    Keygen,
    /// Import a key pair from PEM or raw base64 files
    ImportKeys {
        public: PathBuf,
        private: PathBuf,
    },
    /// Show the current identity
    Whoami {
        /// Print the public key armored
        #[arg(long)]
        pem: bool,
    },
    /// Store the feed server address
    Server { url: String },
    /// Sign and post a message
    Post { text: String },
    /// Publish profile fields
    Profile {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        avatar: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Follow an identity by public key
    Follow { pubkey: String },
    /// Stop following an identity
    Unfollow { pubkey: String },
    /// List followed identities
    Following,
    /// Fetch and print a timeline
    Timeline {
        /// home (followed identities) or local (everyone)
        #[arg(long, default_value = "home")]
        mode: String,
    },
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feedline=info"));

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let name = path
                .file_name()
                .context("log file path has no file name")?;

            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

fn print_item(item: &TimelineItem) {
    let name = item
        .author
        .as_ref()
        .map(|p| p.username.clone())
        .unwrap_or_else(|| keys::fingerprint(&item.entry.author));
    let when = item
        .entry
        .created_at()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    let mark = if item.verified { " " } else { "!" };
    let body = item
        .entry
        .body()
        .unwrap_or_else(|| "<unreadable payload>".to_string());

    println!("{}{:<16} {:>16}  {}", mark, name, when, body);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_logging(args.log_file.as_ref())?;

    let mut config = ClientConfig::from_env()?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(server) = args.server {
        config.server_url = Some(server);
    }

    let app = App::open(config).context("failed to open client state")?;

    match args.command {
        Command::Keygen => {
            let raw = app.generate_keys().await?;
            println!("{}", keys::armor(keys::PUBLIC_KEY_LABEL, &raw.public));
        }
        Command::ImportKeys { public, private } => {
            let public = std::fs::read_to_string(&public)
                .with_context(|| format!("reading {}", public.display()))?;
            let private = std::fs::read_to_string(&private)
                .with_context(|| format!("reading {}", private.display()))?;
            let raw = app.import_keys(&public, &private).await?;
            println!("Imported {}", keys::fingerprint(&raw.public));
        }
        Command::Whoami { pem } => {
            let settings = app.settings().await;
            println!("username:  {}", settings.username);
            println!("avatar:    {}", settings.avatar);
            println!("server:    {}", settings.server);
            match settings.keypair {
                Some(raw) if pem => println!("{}", keys::armor(keys::PUBLIC_KEY_LABEL, &raw.public)),
                Some(raw) => {
                    println!("pubkey:    {}", raw.public);
                    println!("fingerprint: {}", keys::fingerprint(&raw.public));
                }
                None => println!("pubkey:    (none, run `feedline keygen`)"),
            }
        }
        Command::Server { url } => {
            app.set_server(&url).await?;
            println!("Server set to {}", app.settings().await.server);
        }
        Command::Post { text } => {
            app.ensure_keypair().await?;
            let envelope = app.post(&text).await?;
            info!(bytes = envelope.payload.len(), "Message sent");
            println!("Posted.");
        }
        Command::Profile {
            username,
            avatar,
            description,
        } => {
            app.ensure_keypair().await?;
            app.update_profile(&username, &avatar, &description).await?;
            println!("Profile published as {}", username);
        }
        Command::Follow { pubkey } => {
            if app.follow(&pubkey).await? {
                println!("Following {}", keys::fingerprint(pubkey.trim()));
            } else {
                println!("Already following {}", keys::fingerprint(pubkey.trim()));
            }
        }
        Command::Unfollow { pubkey } => {
            if app.unfollow(&pubkey).await? {
                println!("Unfollowed {}", keys::fingerprint(pubkey.trim()));
            } else {
                println!("Not following {}", keys::fingerprint(pubkey.trim()));
            }
        }
        Command::Following => {
            for followee in app.followees().await {
                println!(
                    "{:<16} {}",
                    followee.username,
                    keys::fingerprint(&followee.pubkey)
                );
            }
        }
        Command::Timeline { mode } => {
            let mode: TimelineMode = mode.parse()?;
            app.reload(mode).await?;
            for item in app.timeline().await? {
                print_item(&item);
            }
        }
    }

    Ok(())
}
