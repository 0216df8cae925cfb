//! Butchery CLI - operator tasks for the auth service
//!
//! Usage:
//!   butchery hash-password <password>
//!   butchery seed-admin --email <email> --name <name> --password <password>
//!   butchery purge-tokens
//!   butchery migrate
//!   butchery verify-token <token>

use anyhow::Context;
use butchery_api::auth::{
    password::hash_password_with_config, JwtConfig, PasswordConfig, TokenService,
};
use butchery_core::{
    validate_password, Admin, AdminStore, AppConfig, Clock, PgStore, RefreshTokenStore,
    SystemClock,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "butchery")]
#[command(about = "Butchery auth service operator CLI")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables override its values
    #[arg(short, long, global = true, env = "BUTCHERY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an Argon2id hash for a password
    HashPassword { password: String },
    /// Create an administrator account
    SeedAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, env = "BUTCHERY_ADMIN_PASSWORD")]
        password: String,
    },
    /// Delete expired refresh tokens
    PurgeTokens,
    /// Apply database migrations
    Migrate,
    /// Validate an access token and print its subject
    VerifyToken { token: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "butchery_cli=info,butchery_core=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::HashPassword { password } => {
            let hash = hash_password_with_config(&password, &PasswordConfig::default())?;
            println!("{hash}");
        }
        Commands::SeedAdmin {
            email,
            name,
            password,
        } => {
            validate_password(&password)?;
            let hash = hash_password_with_config(&password, &PasswordConfig::default())?;
            let admin = Admin::new(Uuid::new_v4(), &email, hash, &name)?;

            let store = connect(&config).await?;
            AdminStore::save(&store, &admin)
                .await
                .with_context(|| format!("failed to create administrator {}", admin.email))?;

            tracing::info!(admin_id = %admin.id, email = %admin.email, "Administrator created");
            println!("{}", admin.id);
        }
        Commands::PurgeTokens => {
            let store = connect(&config).await?;
            let now = SystemClock.now();
            let removed = store.delete_expired(now).await?;

            tracing::info!(removed, cutoff = %now, "Expired refresh tokens purged");
            println!("{removed}");
        }
        Commands::Migrate => {
            let store = connect(&config).await?;
            store.migrate().await?;
            println!("Migrations applied");
        }
        Commands::VerifyToken { token } => {
            config.validate()?;
            let tokens = TokenService::new(JwtConfig::from(&config.auth), Arc::new(SystemClock));

            let subject = tokens
                .validate_access_token(&token)
                .context("token rejected")?;
            println!(
                "{}",
                serde_json::json!({
                    "subject_id": subject.id,
                    "subject_type": subject.kind,
                })
            );
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path.clone())?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgStore> {
    PgStore::connect(
        &config.database.postgres_url,
        config.database.postgres_pool_size,
    )
    .await
    .context("failed to connect to PostgreSQL")
}
