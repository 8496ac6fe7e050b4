use std::path::PathBuf;

use call_agent::Result;
use call_agent::commands::{
    AskArgs, IngestArgs, ask, ingest, list_profiles, set_profile, show_profile, show_status,
};
use call_agent::config::{run_interactive_config, show_config};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "call-agent")]
#[command(about = "Answer questions from a local documentation corpus with Ollama")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Load a corpus directory into a vector collection
    Ingest {
        /// Corpus root laid out as <framework>/<version>/<lang>/...
        #[arg(long, default_value = "corpus")]
        corpus: PathBuf,
        /// Target collection name
        #[arg(long)]
        collection: String,
        /// Drop the collection before writing
        #[arg(long)]
        recreate: bool,
        /// Maximum chunk length in characters (default from config, 900)
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Overlap between consecutive chunks (default from config, 150)
        #[arg(long)]
        chunk_overlap: Option<usize>,
    },
    /// Ask a question; starts the REPL when no question is given
    Ask {
        /// Profile to search under, overriding the saved default. Use 'all' for no filter.
        #[arg(short, long)]
        profile: Option<String>,
        /// Number of chunks to retrieve (default from config, 8)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Collection to query instead of the configured default
        #[arg(long)]
        collection: Option<String>,
        /// The question
        question: Vec<String>,
    },
    /// Manage the saved default profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Show health of Ollama, the vector store and profiles
    Status,
}

#[derive(Subcommand)]
enum ProfileAction {
    /// List registered profiles
    List,
    /// Show the saved default profile
    Show,
    /// Save a default profile; 'all' clears it
    Set {
        /// Profile name or 'all'
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Ingest {
            corpus,
            collection,
            recreate,
            chunk_size,
            chunk_overlap,
        } => {
            ingest(IngestArgs {
                corpus,
                collection,
                recreate,
                chunk_size,
                chunk_overlap,
            })
            .await?;
        }
        Commands::Ask {
            profile,
            top_k,
            collection,
            question,
        } => {
            let question = (!question.is_empty()).then(|| question.join(" "));
            ask(AskArgs {
                question,
                profile,
                top_k,
                collection,
            })
            .await?;
        }
        Commands::Profile { action } => match action {
            ProfileAction::List => list_profiles()?,
            ProfileAction::Show => show_profile()?,
            ProfileAction::Set { name } => set_profile(&name)?,
        },
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}
