use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use console::style;
use tokio::io::BufReader;
use tracing::{debug, info};

use crate::RagError;
use crate::answer::{Answer, AnswerComposer};
use crate::config::Config;
use crate::database::{VectorIndex, VectorStore};
use crate::embeddings::OllamaClient;
use crate::indexer::{IngestOptions, Indexer};
use crate::profiles::{ALL_PROFILE, ProfileStore, Profiles, parse_selection};
use crate::repl::{self, ProfileCommand, ReplHandler, Session, USAGE};
use crate::retrieval::{Retrieval, RetrievalPolicy};

/// Arguments of the `ingest` subcommand
#[derive(Debug, Clone)]
pub struct IngestArgs {
    pub corpus: PathBuf,
    pub collection: String,
    pub recreate: bool,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
}

/// Arguments of the `ask` subcommand; no question starts the REPL
#[derive(Debug, Clone, Default)]
pub struct AskArgs {
    pub question: Option<String>,
    pub profile: Option<String>,
    pub top_k: Option<usize>,
    pub collection: Option<String>,
}

/// Load, chunk, embed and store a corpus
#[inline]
pub async fn ingest(args: IngestArgs) -> Result<()> {
    let config = Config::load_default()?;

    let mut chunking = config.chunking.clone();
    if let Some(size) = args.chunk_size {
        chunking.chunk_size = size;
    }
    if let Some(overlap) = args.chunk_overlap {
        chunking.chunk_overlap = overlap;
    }

    let client =
        OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?;
    let store = VectorStore::open(&config, &args.collection)
        .await
        .context("Failed to open vector store")?;

    let options = IngestOptions {
        corpus_root: args.corpus,
        chunking,
        recreate: args.recreate,
    };

    if options.recreate {
        println!(
            "{} collection '{}' will be dropped and rebuilt",
            style("⚠️").yellow(),
            args.collection
        );
    }

    let started = Instant::now();
    let report = Indexer::new(&client, &store)
        .with_batch_size(config.ollama.batch_size as usize)
        .ingest(&options)
        .await?;

    println!(
        "✅ Ingested {} chunks from {} documents into '{}' in {:.1}s",
        report.chunks,
        report.documents,
        args.collection,
        started.elapsed().as_secs_f64()
    );
    if !report.failed_files.is_empty() {
        println!("⚠️  {} files could not be loaded:", report.failed_files.len());
        for failure in &report.failed_files {
            println!("   {} - {}", failure.path.display(), failure.error);
        }
    }

    Ok(())
}

/// Everything one question needs, opened once per invocation
struct AskContext {
    config: Config,
    client: OllamaClient,
    store: VectorStore,
    profile_store: ProfileStore,
    top_k: usize,
}

impl AskContext {
    async fn open(collection: Option<String>, top_k: Option<usize>) -> Result<Self> {
        let config = Config::load_default()?;
        let collection = collection.unwrap_or_else(|| config.store.collection.clone());

        let client =
            OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?;
        let store = VectorStore::open(&config, &collection)
            .await
            .context("Failed to open vector store")?;
        let profile_store = ProfileStore::from_config(&config);
        let top_k = top_k.unwrap_or(config.retrieval.top_k);

        Ok(Self {
            config,
            client,
            store,
            profile_store,
            top_k,
        })
    }
}

/// Answer a question, or run the REPL when none is given
#[inline]
pub async fn ask(args: AskArgs) -> Result<()> {
    let context = AskContext::open(args.collection, args.top_k).await?;

    let active_profile = match args.profile.as_deref().map(parse_selection) {
        Some(Some(name)) => {
            if !context.profile_store.load()?.contains(name) {
                return Err(RagError::UnknownProfile(name.to_string()).into());
            }
            Some(name.to_string())
        }
        Some(None) => None,
        None => context.profile_store.current()?,
    };
    debug!("Active profile: {:?}", active_profile);

    match args.question {
        Some(question) => context.answer(&question, active_profile.as_deref()).await,
        None => run_repl(&context, Session::new(active_profile)).await,
    }
}

async fn run_repl(context: &AskContext, session: Session) -> Result<()> {
    println!(
        "{} REPL mode. Current profile: {}",
        style("call-agent").bold(),
        style(session.label()).green()
    );
    println!("{}", style(format!("Commands: {}", USAGE)).dim());

    repl::run(BufReader::new(tokio::io::stdin()), context, session).await
}

#[async_trait]
impl ReplHandler for AskContext {
    /// Retrieve, compose and print one answer
    async fn answer(&self, question: &str, profile: Option<&str>) -> Result<()> {
        let profiles = self.profile_store.load()?;
        let policy =
            RetrievalPolicy::new(&self.store, &self.client, &profiles, &self.config.retrieval);

        let started = Instant::now();
        let retrieval = policy.retrieve(question, profile, self.top_k).await?;
        let retrieval_time = started.elapsed();

        let started = Instant::now();
        let answer = AnswerComposer::new(&self.client).compose(question, &retrieval.hits, None)?;
        let generation_time = started.elapsed();

        print_answer(
            &answer,
            &retrieval,
            &profiles,
            (retrieval_time, generation_time),
        );
        Ok(())
    }

    fn profile_command(&self, session: &mut Session, command: ProfileCommand) -> Result<()> {
        let store = &self.profile_store;
        match command {
            ProfileCommand::List => print_profiles(&store.load()?),
            ProfileCommand::Show => {
                println!("{} {}", style("Current (session):").bold(), session.label());
                let persisted = store.current()?;
                let persisted = persisted.as_deref().unwrap_or(ALL_PROFILE);
                if persisted != session.label() {
                    println!("{}", style(format!("Default (saved): {}", persisted)).dim());
                }
            }
            ProfileCommand::Set(name) => {
                let selected = store.select(name.as_deref().unwrap_or(ALL_PROFILE))?;
                println!(
                    "{} {}",
                    style("Profile set to:").green(),
                    selected.as_deref().unwrap_or(ALL_PROFILE)
                );
                session.set_active_profile(selected);
            }
            ProfileCommand::Usage => {
                println!("{} {}", style("Usage:").red(), USAGE);
            }
        }
        Ok(())
    }
}

fn print_profiles(profiles: &Profiles) {
    println!("{}", style("Profiles available:").bold());
    for name in profiles.names() {
        println!(
            "- {}  {}",
            name,
            style(format!("({})", profiles.describe(Some(name)))).dim()
        );
    }
}

fn print_answer(
    answer: &Answer,
    retrieval: &Retrieval,
    profiles: &Profiles,
    (retrieval_time, generation_time): (Duration, Duration),
) {
    let profile = retrieval.profile_used.as_deref();
    let marker = if retrieval.fallback_used {
        format!(" {}", style("[auto-selected]").yellow())
    } else {
        String::new()
    };
    println!(
        "{} {}  {}{}",
        style("profile:").bold(),
        profile.unwrap_or(ALL_PROFILE),
        style(format!("({})", profiles.describe(profile))).dim(),
        marker
    );
    println!();

    println!("{}", style("result:").bold().cyan());
    println!("{}", answer.text.trim());
    println!();

    println!("{}", style("sources").bold().magenta());
    if answer.sources.is_empty() {
        println!("   (none)");
    }
    for (i, source) in answer.sources.iter().enumerate() {
        let meta = &source.metadata;
        println!(
            "{:>3}. {}  {}",
            i + 1,
            meta.source_path,
            style(format!("{}/{}/{}", meta.framework, meta.version, meta.lang)).dim()
        );
    }

    println!(
        "{}",
        style(format!(
            "retrieval {:.3}s | generation {:.3}s",
            retrieval_time.as_secs_f64(),
            generation_time.as_secs_f64()
        ))
        .dim()
    );
}

/// `profile list`
#[inline]
pub fn list_profiles() -> Result<()> {
    let config = Config::load_default()?;
    let profiles = ProfileStore::from_config(&config).load()?;
    if profiles.is_empty() {
        println!(
            "No profiles registered. Add them to {}",
            config.profiles_path().display()
        );
    }
    print_profiles(&profiles);
    Ok(())
}

/// `profile show`
#[inline]
pub fn show_profile() -> Result<()> {
    let config = Config::load_default()?;
    let store = ProfileStore::from_config(&config);
    let profiles = store.load()?;
    let current = store.current()?;

    println!(
        "{} {}  {}",
        style("Default profile:").bold(),
        current.as_deref().unwrap_or(ALL_PROFILE),
        style(format!("({})", profiles.describe(current.as_deref()))).dim()
    );
    Ok(())
}

/// `profile set <name|all>`
#[inline]
pub fn set_profile(name: &str) -> Result<()> {
    let config = Config::load_default()?;
    let selected = ProfileStore::from_config(&config).select(name)?;

    match selected {
        Some(name) => println!("{} {}", style("Default profile set to:").green(), name),
        None => println!("{}", style("Default profile cleared (all).").green()),
    }
    Ok(())
}

/// Report on Ollama, the vector store and profiles
#[inline]
pub async fn show_status() -> Result<()> {
    let config = Config::load_default()?;

    println!("📊 call-agent Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Ollama Status:");
    match OllamaClient::new(&config.ollama) {
        Ok(client) => match client.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Embedding model: {}", client.embedding_model());
                println!("   📋 Generation model: {}", client.generation_model());
            }
            Err(e) => {
                println!("   ⚠️  Ollama: Unhealthy - {:#}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Ollama: Failed to connect - {:#}", e);
        }
    }

    println!();
    println!("🔍 Vector Database Status:");
    println!("   📁 Path: {}", config.vector_database_path().display());
    match VectorStore::open(&config, &config.store.collection).await {
        Ok(store) => {
            match store.list_collections().await {
                Ok(collections) if collections.is_empty() => {
                    println!("   📭 No collections yet");
                }
                Ok(collections) => println!("   📚 Collections: {}", collections.join(", ")),
                Err(e) => println!("   ❌ Failed to list collections - {}", e),
            }
            match store.count().await {
                Ok(count) => println!(
                    "   📄 Default collection '{}': {} chunks",
                    store.collection(),
                    count
                ),
                Err(e) => println!("   ❌ Failed to count chunks - {}", e),
            }
        }
        Err(e) => {
            println!("   ❌ LanceDB: Failed to open - {}", e);
        }
    }

    println!();
    println!("🏷️  Profiles:");
    let store = ProfileStore::from_config(&config);
    match store.load() {
        Ok(profiles) => {
            for (name, filter) in profiles.iter() {
                println!("   • {} ({})", name, filter.describe());
            }
            if profiles.is_empty() {
                println!("   📭 No profiles registered");
            }
        }
        Err(e) => println!("   ❌ Failed to load profiles - {}", e),
    }
    match store.current() {
        Ok(current) => println!(
            "   📌 Default: {}",
            current.as_deref().unwrap_or(ALL_PROFILE)
        ),
        Err(e) => println!("   ❌ Failed to read default profile - {}", e),
    }

    info!("Status report complete");
    Ok(())
}
