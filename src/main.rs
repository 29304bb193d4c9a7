//! pl CLI - Entry point
//!
//! Usage: pl <command> [options]

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pearls::cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for --json and context output
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match cli.command {
        Commands::Init(args) => pearls::cli::init::run(args),
        Commands::Create(args) => pearls::cli::create::run(args),
        Commands::Show(args) => pearls::cli::show::run(args),
        Commands::Cat(args) => pearls::cli::show::run_cat(args),
        Commands::List(args) => pearls::cli::list::run(args),
        Commands::Update(args) => pearls::cli::update::run(args),
        Commands::Delete(args) => pearls::cli::delete::run(args),
        Commands::Archive(args) => pearls::cli::delete::run_archive(args),
        Commands::Refs(args) => pearls::cli::refs::run(args),
        Commands::Context(args) => pearls::cli::context::run(args),
        Commands::Clutch(args) => pearls::cli::context::run_clutch(args),
        Commands::Search(args) => pearls::cli::search::run(args),
        Commands::Sync(args) => pearls::cli::sync::run(args),
        Commands::Index(args) => pearls::cli::index::run(args),
        Commands::Doctor(args) => pearls::cli::doctor::run(args),
        Commands::Introspect(args) => pearls::cli::introspect::run(args),
        Commands::Onboard(args) => pearls::cli::onboard::run(args),
        Commands::Prime(args) => pearls::cli::prime::run(args),
    }
}
