use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;

use switchyard::config::load_config;
use switchyard::security::csrf;
use switchyard::session::{self, Session};
use switchyard::storage::PersistentConnection;

#[derive(Parser)]
#[command(name = "switchyard-cli")]
#[command(about = "Offline tools for switchyard sessions and transaction logs", long_about = None)]
struct Cli {
    /// Read the session secret from this config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Session secret (overrides --config).
    #[arg(short, long)]
    secret: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify and print a session cookie value
    Decode { cookie: String },
    /// Sign `key=value` pairs into a session cookie value
    Encode { pairs: Vec<String> },
    /// Print the CSRF token for a session cookie value
    Csrf { cookie: String },
    /// Replay a transaction log and print its facts
    Log { path: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let secret = match (cli.secret, &cli.config) {
        (Some(secret), _) => secret,
        (None, Some(path)) => load_config(path)?.session.secret,
        (None, None) => switchyard::config::AppConfig::default().session.secret,
    };

    match cli.command {
        Commands::Decode { cookie } => {
            let session = session::decode(&cookie, &secret);
            if session.is_empty() {
                eprintln!("Warning: cookie did not verify or holds no entries");
            }
            let entries: Vec<_> = session.iter().map(|(k, v)| json!({ "key": k, "value": v })).collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Commands::Encode { pairs } => {
            let mut entries = Vec::with_capacity(pairs.len());
            for pair in &pairs {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("expected key=value, got '{pair}'"))?;
                entries.push((key, value));
            }
            println!("{}", session::encode(&Session::from_entries(entries), &secret));
        }
        Commands::Csrf { cookie } => {
            let mut session = session::decode(&cookie, &secret);
            session::Flash::extract(&mut session);
            println!("{}", csrf::generate_token(&secret, &session));
        }
        Commands::Log { path } => {
            let conn = PersistentConnection::open(&path)?;
            let snapshot = conn.snapshot();
            let facts: Vec<_> = snapshot.facts().collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "basis": snapshot.basis(), "facts": facts }))?
            );
        }
    }

    Ok(())
}
