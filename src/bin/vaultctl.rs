//! Vault administration tool
//!
//! Creates the schema on every configured shard, bootstraps the system
//! administrator and decodes identifiers.

use anyhow::Context;
use clap::{Parser, Subcommand};
use object_vault::core::id;
use object_vault::{format_id, parse_id, MemoryPublisher, Vault, VaultConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "vaultctl")]
#[command(about = "Administration tool for a sharded object vault")]
struct Args {
    /// Deployment configuration (.toml or .json)
    #[arg(short = 'c', long, default_value = "vault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the schema on every shard
    Init,

    /// Create the system administrator and the system organization
    Bootstrap {
        #[arg(long)]
        email: String,

        #[arg(long)]
        username: String,

        /// Read from VAULT_ADMIN_PASSWORD when omitted
        #[arg(long, env = "VAULT_ADMIN_PASSWORD")]
        password: String,
    },

    /// Print the fields of a `:hex` identifier
    DecodeId { id: String },

    /// Validate the configuration and print the shard layout
    CheckConfig,
}

fn open(config: &PathBuf) -> anyhow::Result<Vault> {
    let config = VaultConfig::load(config).with_context(|| format!("loading {}", config.display()))?;
    // no broker is attached; bootstrap emits no actions
    let vault = Vault::new(config, Arc::new(MemoryPublisher::new()))?;
    Ok(vault)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Init => {
            let vault = open(&args.config)?;
            vault.migrate().context("creating schema")?;
            info!(groups = vault.router().group_count(), "schema ready");
        }
        Command::Bootstrap {
            email,
            username,
            password,
        } => {
            let vault = open(&args.config)?;
            vault.migrate().context("creating schema")?;
            let admin = vault.bootstrap(&email, &username, &password)?;
            println!("system administrator {} ({})", admin.username(), format_id(admin.id()));
        }
        Command::DecodeId { id: text } => {
            let value = parse_id(&text)?;
            let (group, object_type, shard, local) = id::decode(value);
            println!("id      {}", format_id(value));
            println!("group   {}", group);
            println!("type    {:#04x}", object_type);
            println!("shard   {}", shard);
            println!("local   {}", local);
        }
        Command::CheckConfig => {
            let config = VaultConfig::load(&args.config)
                .with_context(|| format!("loading {}", args.config.display()))?;
            println!("data group {}", config.data_group);
            for (group, shards) in config.shard_groups.iter().enumerate() {
                for shard in &shards.shards {
                    println!(
                        "group {:2}  shards {:4}..={:4}  {}",
                        group, shard.range.start, shard.range.end, shard.connection.database
                    );
                }
            }
        }
    }

    Ok(())
}
