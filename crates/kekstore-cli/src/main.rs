mod cli;
mod commands;
mod config;
mod storage;

use std::{
    io::{self, Read, Write},
    time::Duration,
};

use crate::cli::{Command, ConfigCommand};
use clap::Parser;
use color_eyre::{eyre::bail, Result};
use kekstore_core::{Context, Cursor, Keystore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Entry point wiring the CLI to the encrypted keystore.
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    let ctx = match cli.timeout {
        Some(secs) => Context::background().with_timeout(Duration::from_secs(secs)),
        None => Context::background(),
    };

    match cli.command {
        Command::Version => print_version(),
        Command::Config(ConfigCommand::Init) => init_config(cli.config.as_deref())?,
        Command::Keygen { cipher } => {
            let settings = config.keystore()?;
            storage::init_keystore(&settings, cipher.as_deref())?;
            println!("Master key written to {}", settings.master_key_path.display());
        }
        command @ (Command::Status
        | Command::Create { .. }
        | Command::Get { .. }
        | Command::Delete { .. }
        | Command::List { .. }) => {
            let store = storage::open_keystore(&config, &ctx).await?;
            let outcome = run_store_command(&store, &ctx, command).await;
            store.close().await?;
            outcome?;
        }
    }

    Ok(())
}

fn init_tracing() {
    // Logs go to stderr so `get` output on stdout stays clean.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("kekstore {}", env!("CARGO_PKG_VERSION"));
}

fn init_config(path: Option<&std::path::Path>) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config::default_path()?,
    };
    let defaults = config::Config {
        keystore: Some(config::default_keystore()?),
    };
    let path = config::write_if_missing(&defaults, &path)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

async fn run_store_command<K: Keystore + ?Sized>(
    store: &K,
    ctx: &Context,
    command: Command,
) -> Result<()> {
    let mut stdout = io::stdout().lock();
    match command {
        Command::Status => commands::status(store, ctx, &mut stdout).await?,
        Command::Create { name, value } => {
            let value = match value {
                Some(value) => value.into_bytes(),
                None => {
                    let mut buf = Vec::new();
                    io::stdin().read_to_end(&mut buf)?;
                    buf
                }
            };
            commands::create(store, ctx, &name, &value).await?;
            eprintln!("Created {name}");
        }
        Command::Get { name } => commands::get(store, ctx, &name, &mut stdout).await?,
        Command::Delete { name } => {
            commands::delete(store, ctx, &name).await?;
            eprintln!("Deleted {name}");
        }
        Command::List {
            prefix,
            limit,
            cursor,
            json,
        } => {
            let cursor = cursor.map(|c| c.parse::<Cursor>()).transpose()?;
            let format = if json {
                commands::ListFormat::Json
            } else {
                commands::ListFormat::Lines
            };
            commands::list(store, ctx, &prefix, cursor.as_ref(), limit, format, &mut stdout)
                .await?;
        }
        other => bail!("{other:?} does not operate on an open keystore"),
    }
    stdout.flush()?;
    Ok(())
}
