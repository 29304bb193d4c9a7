//! CLI module - Command definitions and handlers
//!
//! Every command is a thin adapter: parse flags, open the catalog, call the
//! store, print. Flags live in per-command `Args` structs and are passed by
//! parameter.

use clap::{Parser, Subcommand};

pub mod context;
pub mod create;
pub mod delete;
pub mod doctor;
pub mod index;
pub mod init;
pub mod introspect;
pub mod list;
pub mod onboard;
pub mod prime;
pub mod refs;
pub mod search;
pub mod show;
pub mod sync;
pub mod update;
pub mod utils;

/// pl - Data catalog and context store for AI agents
///
/// Pearls keep metadata and markdown docs for data assets and project
/// knowledge, and hand the relevant ones to agents by path or topic.
#[derive(Parser, Debug)]
#[command(name = "pl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a pearls catalog in the current directory
    Init(init::InitArgs),

    /// Create a new pearl
    Create(create::CreateArgs),

    /// Show pearl metadata
    Show(show::ShowArgs),

    /// Print a pearl's markdown content
    Cat(show::CatArgs),

    /// List pearls
    List(list::ListArgs),

    /// Update pearl metadata or content
    Update(update::UpdateArgs),

    /// Archive a pearl, or delete it permanently with --force
    Delete(delete::DeleteArgs),

    /// Archive a pearl (soft delete)
    Archive(delete::ArchiveArgs),

    /// Show outgoing and incoming references
    Refs(refs::RefsArgs),

    /// Output pearl content for agent context
    Context(context::ContextArgs),

    /// Output all required pearls, highest priority first
    Clutch(context::ClutchArgs),

    /// Search pearls by keyword or meaning
    Search(search::SearchArgs),

    /// Reconcile the database with the JSONL log
    Sync(sync::SyncArgs),

    /// Show or rebuild the vector index
    Index(index::IndexArgs),

    /// Check catalog health
    Doctor(doctor::DoctorArgs),

    /// Generate pearls from a database schema
    Introspect(introspect::IntrospectArgs),

    /// Add pearls usage instructions to agent instruction files
    Onboard(onboard::OnboardArgs),

    /// Output a catalog summary for agent session priming
    Prime(prime::PrimeArgs),
}
