use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use genevidence::chunk::chunk_articles;
use genevidence::config::{self, CacheBackendKind, EmbeddingBackendKind, Settings};
use genevidence::interpret::{ChatInterpreter, Interpreter};
use genevidence::ranks::{parse_ranks, RankStats};
use genevidence::sources::eutils::EutilsClient;
use genevidence::sources::ontology::OntologyClient;
use genevidence::{
    ApiEmbedder, ArticleRecord, ContextFormatter, Embedder, EntityKind, EvidenceCache,
    HashEmbedder, LiteratureSource, LiveRetriever, Pacer, RateLimitedFetcher, Retriever,
    SemanticRetriever, VectorStore,
};

#[derive(Parser)]
#[command(name = "genevidence")]
#[command(version = "0.1")]
#[command(about = "Literature evidence retrieval for candidate genes and phenotypes", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and cache literature for genes or phenotypes
    Fetch {
        /// Comma-separated entities
        entities: String,
        #[arg(long)]
        phenotype: bool,
        /// Use the expanded gene/variant/disease query
        #[arg(long)]
        expand: bool,
        #[arg(short)]
        k: Option<usize>,
    },
    /// Chunk, embed and index a JSON array of articles
    Ingest {
        articles: PathBuf,
    },
    /// Nearest chunks to a free-text query
    Search {
        query: String,
        #[arg(short)]
        k: Option<usize>,
    },
    /// Print the formatted context for a set of genes
    Context {
        genes: String,
        /// Search the local index instead of the live API
        #[arg(long)]
        semantic: bool,
        #[arg(short)]
        k: Option<usize>,
    },
    /// Ontology background for a phenotype term
    Phenotype {
        term: String,
    },
    /// Rank genes against phenotypes with the language model
    Interpret {
        #[arg(long)]
        genes: String,
        #[arg(long)]
        phenotypes: String,
        #[arg(long)]
        semantic: bool,
        #[arg(short)]
        k: Option<usize>,
    },
    /// Causative-gene ranks and summary statistics from a report
    Ranks {
        report: PathBuf,
    },
    Config,
}

type DynRetriever = Retriever<Box<dyn LiteratureSource>, Box<dyn Embedder>>;

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn build_embedder(state: &Settings) -> Result<Box<dyn Embedder>> {
    let embedder: Box<dyn Embedder> = match state.embedding_backend {
        EmbeddingBackendKind::Hash => Box::new(HashEmbedder::new(state.dimensions)),
        EmbeddingBackendKind::Api => Box::new(ApiEmbedder::new(
            &state.embedding_url,
            &state.embedding_model,
            state.embedding_api_key.clone(),
            state.dimensions,
        )?),
    };
    Ok(embedder)
}

fn build_cache(state: &Settings) -> Result<EvidenceCache> {
    let cache = match state.cache_backend {
        CacheBackendKind::Json => EvidenceCache::json_dir(&state.cache_dir),
        CacheBackendKind::Lmdb => EvidenceCache::lmdb(&state.cache_dir),
    };
    cache.with_context(|| format!("Failed to open cache at '{}'", state.cache_dir.display()))
}

fn live_retriever(state: &Settings, kind: EntityKind, expand: bool) -> Result<DynRetriever> {
    let source: Box<dyn LiteratureSource> =
        Box::new(EutilsClient::new(state.literature_db, state.ncbi_api_key.clone())?);
    let fetcher = RateLimitedFetcher::new(source, Pacer::from_millis(state.request_delay_ms));
    let live = LiveRetriever::new(build_cache(state)?, fetcher)
        .with_kind(kind)
        .with_expansion(expand);
    Ok(Retriever::Live(live))
}

fn semantic_retriever(state: &Settings) -> Result<DynRetriever> {
    let store = VectorStore::load(build_embedder(state)?, &state.index_path, &state.metadata_path)
        .with_context(|| {
            format!(
                "Failed to load vector store '{}' / '{}'",
                state.index_path.display(),
                state.metadata_path.display()
            )
        })?;
    Ok(Retriever::Semantic(SemanticRetriever::new(store)))
}

fn retriever(state: &Settings, semantic: bool) -> Result<DynRetriever> {
    if semantic {
        semantic_retriever(state)
    } else {
        live_retriever(state, EntityKind::Gene, false)
    }
}

fn fetch_command(state: &Settings, entities: &str, phenotype: bool, expand: bool, k: usize) -> Result<()> {
    let kind = if phenotype { EntityKind::Phenotype } else { EntityKind::Gene };
    let retriever = live_retriever(state, kind, expand)?;
    for entity in split_list(entities) {
        let found = retriever.retrieve(&entity, k)?;
        println!("{}\t{}", entity, found.len());
    }
    Ok(())
}

fn ingest_command(state: &Settings, articles_path: &Path) -> Result<()> {
    let raw = fs::read(articles_path)
        .with_context(|| format!("Failed to read '{}'", articles_path.display()))?;
    let articles: Vec<ArticleRecord> =
        serde_json::from_slice(&raw).context("Failed to parse articles JSON")?;

    let chunks = chunk_articles(&articles, state.max_chunk_length);
    info!(articles = articles.len(), chunks = chunks.len(), "chunked articles");

    let mut store = VectorStore::new(build_embedder(state)?, state.dimensions)?;
    store.add_in_batches(&chunks, state.batch_size)?;
    store.save(&state.index_path, &state.metadata_path)?;
    println!("Saved vector store with {} embeddings", store.len());
    Ok(())
}

fn search_command(state: &Settings, query: &str, k: usize) -> Result<()> {
    let retriever = semantic_retriever(state)?;
    let results = retriever.retrieve(query, k)?;

    let output = serde_json::json!({
        "query": query,
        "results": results,
        "actual_results_count": results.len(),
        "requested_results_count": k,
    });
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn context_command(state: &Settings, genes: &str, semantic: bool, k: usize) -> Result<()> {
    let evidence = retriever(state, semantic)?.retrieve_many(&split_list(genes), k)?;
    println!("{}", ContextFormatter::new(state.abstract_limit).format(&evidence));
    Ok(())
}

fn phenotype_command(state: &Settings, term: &str) -> Result<()> {
    let client = OntologyClient::new(&state.ontology_url, &state.ontology)?;
    println!("{}", client.lookup(term)?);
    Ok(())
}

fn interpret_command(state: &Settings, genes: &str, phenotypes: &str, semantic: bool, k: usize) -> Result<()> {
    let gene_list = split_list(genes);
    let evidence = retriever(state, semantic)?.retrieve_many(&gene_list, k)?;
    let context = ContextFormatter::new(state.abstract_limit).format(&evidence);

    let interpreter = ChatInterpreter::new(
        &state.interpreter_url,
        &state.interpreter_model,
        state.interpreter_api_key.clone(),
        state.temperature,
    )?;
    let phenotype_list = split_list(phenotypes).join(", ");
    info!(genes = gene_list.len(), articles = evidence.len(), "generating interpretation");
    println!("{}", interpreter.interpret(&gene_list.join(", "), &phenotype_list, &context)?);
    Ok(())
}

fn ranks_command(report: &Path) -> Result<()> {
    let text = fs::read_to_string(report)
        .with_context(|| format!("Failed to read report '{}'", report.display()))?;
    let ranks = parse_ranks(&text);
    let stats = RankStats::from_ranks(&ranks);
    let output = serde_json::json!({ "ranks": ranks, "stats": stats });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    config::init_tracing(args.verbose);
    let state = Settings::load()?;

    match args.command {
        Commands::Fetch { entities, phenotype, expand, k } => {
            fetch_command(&state, &entities, phenotype, expand, k.unwrap_or(state.top_k))?
        }
        Commands::Ingest { articles } => ingest_command(&state, &articles)?,
        Commands::Search { query, k } => search_command(&state, &query, k.unwrap_or(state.top_k))?,
        Commands::Context { genes, semantic, k } => {
            context_command(&state, &genes, semantic, k.unwrap_or(state.top_k))?
        }
        Commands::Phenotype { term } => phenotype_command(&state, &term)?,
        Commands::Interpret { genes, phenotypes, semantic, k } => {
            interpret_command(&state, &genes, &phenotypes, semantic, k.unwrap_or(state.top_k))?
        }
        Commands::Ranks { report } => ranks_command(&report)?,
        Commands::Config => state.print_config(),
    }
    Ok(())
}
