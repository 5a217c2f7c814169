mod config;
mod draft_cmd;
mod serve_cmd;
#[cfg(test)]
mod test_util;
mod token_cmd;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use taskdraft_core::session::HmacSessionVerifier;

use config::ModelSettings;

#[derive(Parser)]
#[command(
    name = "taskdraft",
    about = "Turn free-text todo requests into validated task drafts"
)]
struct Cli {
    /// Model identifier (overrides TASKDRAFT_MODEL env var)
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a taskdraft config file with a fresh session secret
    Init {
        /// Model API key to store in the config file
        #[arg(long)]
        api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Serve /ai-create-todo and /ai-todo-breakdown over HTTP
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8787)]
        port: u16,
    },
    /// Mint a session token for a user
    Token {
        /// User ID (UUID) the token identifies
        user_id: String,
        /// Token lifetime in seconds
        #[arg(long, default_value_t = 86_400)]
        ttl_secs: u64,
    },
    /// Turn one request into one task and print it as JSON
    Draft {
        /// Free-text request
        prompt: String,
    },
    /// Split a goal into up to five tasks and print them as JSON
    Breakdown {
        /// Free-text goal (at most 800 characters)
        prompt: String,
    },
}

/// Execute the `taskdraft init` command: write config file.
fn cmd_init(api_key: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let session_secret = config::generate_session_secret();
    let has_api_key = api_key.is_some();

    let cfg = config::ConfigFile {
        model: config::ModelSection {
            api_key,
            ..Default::default()
        },
        auth: config::AuthSection {
            session_secret: session_secret.clone(),
        },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!(
        "  auth.session_secret = {}...{}",
        &session_secret[..8],
        &session_secret[56..]
    );
    if has_api_key {
        println!("  model.api_key = <set>");
    } else {
        println!();
        println!("No API key stored; set TASKDRAFT_API_KEY or GEMINI_API_KEY before drafting.");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { api_key, force } => {
            cmd_init(api_key, force)?;
        }
        Commands::Serve { bind, port } => {
            let settings = ModelSettings::resolve(cli.model.as_deref())?;
            let sessions = config::resolve_session_config()?;
            let state = serve_cmd::AppState {
                drafter: settings.drafter()?,
                sessions: Arc::new(HmacSessionVerifier::new(sessions)),
            };
            tracing::info!(
                model = %settings.gemini.model,
                timeout_secs = settings.timeout.as_secs(),
                "model backend configured"
            );
            serve_cmd::run_serve(state, &bind, port).await?;
        }
        Commands::Token { user_id, ttl_secs } => {
            let sessions = config::resolve_session_config()?;
            token_cmd::run_token(&sessions, &user_id, ttl_secs)?;
        }
        Commands::Draft { prompt } => {
            let drafter = ModelSettings::resolve(cli.model.as_deref())?.drafter()?;
            draft_cmd::run_draft(&drafter, &prompt).await?;
        }
        Commands::Breakdown { prompt } => {
            let drafter = ModelSettings::resolve(cli.model.as_deref())?.drafter()?;
            draft_cmd::run_breakdown(&drafter, &prompt).await?;
        }
    }

    Ok(())
}
