mod cli;
mod ops;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = ops::load_settings(&cli)?;

    match cli.command {
        Commands::List { json } => {
            ops::do_list(&settings, json)?;
        }
        Commands::Create { name, ignore_tables, no_compress, migration } => {
            let options = ops::CreateOptions { name, ignore_tables, no_compress, migration };
            ops::do_create(cli.database.as_deref(), settings, options)?;
        }
        Commands::Restore { file, force, ignore_origin_check, ignore_tables } => {
            let options = ops::RestoreOptions { file, force, ignore_origin_check, ignore_tables };
            ops::do_restore(cli.database.as_deref(), settings, options)?;
        }
        Commands::Prune => {
            ops::do_prune(&settings)?;
        }
        Commands::Version => {
            ops::do_version();
        }
    }

    Ok(())
}
