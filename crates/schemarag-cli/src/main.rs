use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use schemarag_core::{Config, DialectConfig, RetrievalResult, TableDescriptor};
use schemarag_index::{EmbeddingProvider, HashEmbedder, HttpEmbedder};
use schemarag_retrieval::{extract_and_store, DocumentSource, Reranker, Retriever};
use schemarag_sql::SqlParser;
use schemarag_store::InMemoryRelationStore;

/// SchemaRAG - join-relationship mining and hybrid schema retrieval
#[derive(Parser)]
#[command(name = "schemarag")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: schemarag.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract join edges from mapper documents
    Extract {
        /// Path to mapper documents JSON (array of documents)
        mappers: PathBuf,

        /// Output file for the extraction report and edges
        #[arg(short, long, default_value = "edges.json")]
        output: PathBuf,

        /// SQL dialect override: mysql, postgres, or ansi
        #[arg(short, long)]
        dialect: Option<String>,
    },

    /// Retrieve relevant tables and join edges for a query
    Retrieve {
        /// Natural-language query
        query: String,

        /// Path to table catalog JSON (array of table descriptors)
        #[arg(long, default_value = "catalog.json")]
        catalog: PathBuf,

        /// Path to mapper documents JSON
        #[arg(long, default_value = "mappers.json")]
        mappers: PathBuf,

        /// Number of tables to return (overrides config)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else if Path::new("schemarag.toml").exists() {
        Config::from_file(Path::new("schemarag.toml"))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    if cli.verbose {
        eprintln!("{} dialect: {:?}", "Using".cyan(), config.dialect);
    }

    match cli.command {
        Commands::Extract {
            mappers,
            output,
            dialect,
        } => {
            let dialect = match dialect.as_deref() {
                Some(name) => parse_dialect(name)?,
                None => config.dialect,
            };
            extract_command(dialect, &mappers, &output, cli.verbose).await
        }
        Commands::Retrieve {
            query,
            catalog,
            mappers,
            top_k,
        } => retrieve_command(&config, &query, &catalog, &mappers, top_k, cli.verbose).await,
    }
}

fn load_documents(path: &Path) -> Result<Vec<DocumentSource>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read mapper documents from {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("invalid mapper documents in {}", path.display()))
}

fn load_catalog(path: &Path) -> Result<Vec<TableDescriptor>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog from {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("invalid catalog in {}", path.display()))
}

fn parse_dialect(name: &str) -> Result<DialectConfig> {
    match name {
        "mysql" => Ok(DialectConfig::MySql),
        "postgres" => Ok(DialectConfig::Postgres),
        "ansi" => Ok(DialectConfig::Ansi),
        other => Err(anyhow::anyhow!(
            "unknown dialect '{other}' (expected mysql, postgres, or ansi)"
        )),
    }
}

async fn extract_command(
    dialect: DialectConfig,
    mappers: &Path,
    output: &Path,
    verbose: bool,
) -> Result<()> {
    let documents = load_documents(mappers)?;
    let store = InMemoryRelationStore::new();
    let parser = SqlParser::from_dialect(dialect);

    if verbose {
        eprintln!(
            "{} {} documents...",
            "Extracting from".cyan(),
            documents.len()
        );
    }

    let report = extract_and_store(&documents, &parser, &store).await;
    let edges = store.snapshot().await;

    let payload = serde_json::json!({
        "report": report,
        "edges": edges,
    });
    std::fs::write(output, serde_json::to_string_pretty(&payload)?)
        .with_context(|| format!("failed to write {}", output.display()))?;

    eprintln!(
        "{} {} statements, {} edges ({} inserted, {} merged)",
        "Processed".green(),
        report.statements,
        report.edges_extracted,
        report.upsert.inserted,
        report.upsert.merged
    );
    if report.malformed > 0 || report.parse_skipped > 0 {
        eprintln!(
            "{} {} malformed, {} unparseable",
            "Skipped".yellow(),
            report.malformed,
            report.parse_skipped
        );
        if verbose {
            for issue in &report.issues {
                eprintln!(
                    "  [{}] {}/{}: {}",
                    issue.code.as_str().yellow(),
                    issue.document_id.as_deref().unwrap_or("-"),
                    issue.statement_id.as_deref().unwrap_or("-"),
                    issue.message
                );
            }
        }
    }
    if verbose {
        eprintln!("{} {}", "Edges saved to:".green(), output.display());
    }
    Ok(())
}

async fn retrieve_command(
    config: &Config,
    query: &str,
    catalog: &Path,
    mappers: &Path,
    top_k: Option<usize>,
    verbose: bool,
) -> Result<()> {
    let tables = load_catalog(catalog)?;
    let documents = load_documents(mappers)?;

    let store = Arc::new(InMemoryRelationStore::new());
    let parser = SqlParser::from_dialect(config.dialect);
    let report = extract_and_store(&documents, &parser, store.as_ref()).await;
    if verbose {
        eprintln!(
            "{} {} edges from {} statements",
            "Ingested".cyan(),
            report.upsert.total(),
            report.statements
        );
    }

    let embedder: Arc<dyn EmbeddingProvider> = match &config.embedding {
        Some(endpoint) => Arc::new(HttpEmbedder::new(endpoint)),
        None => Arc::new(HashEmbedder::default()),
    };
    let reranker = config
        .rerank
        .as_ref()
        .map(|endpoint| Reranker::from_config(endpoint, config.tuning.rerank_timeout_ms));

    let retriever = Retriever::build(
        tables,
        embedder,
        store,
        reranker,
        config.tuning,
    )
    .await?;

    let top_k = top_k.unwrap_or(config.tuning.top_k);
    let result = retriever.retrieve(query, top_k).await?;

    if verbose {
        print_summary(&result);
    }
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn print_summary(result: &RetrievalResult) {
    if result.tables.is_empty() {
        eprintln!("{}", "No matching tables".yellow());
        return;
    }
    eprintln!("{}", "Tables:".cyan());
    for table in &result.tables {
        eprintln!("  {}", table.name);
    }
    if !result.edges.is_empty() {
        eprintln!("{}", "Joins:".cyan());
        for group in &result.edges {
            for edge in &group.edges {
                eprintln!("  {} [{}]", edge.predicate, edge.kind);
            }
        }
    }
    if !result.reranked {
        eprintln!("{}", "(rerank skipped or degraded, fused order)".yellow());
    }
    if !result.edges_resolved {
        eprintln!("{}", "(store unavailable, edges omitted)".yellow());
    }
}
