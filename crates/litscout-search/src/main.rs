//! litscout CLI - Article search and related-article retrieval
//!
//! # Usage
//!
//! ```bash
//! # Write ~/.litscout/config.toml with defaults
//! litscout init-config
//!
//! # Create the article schema
//! litscout init-db
//!
//! # Hybrid search for tenant 1
//! litscout search "sparse attention" --tenant 1
//!
//! # Related articles, recomputing the cached list
//! litscout related 42 --tenant 1 --refresh
//!
//! # Check the embedding endpoint and vector store
//! litscout status --tenant 1
//! ```

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use litscout_config::{ConfigLoader, ConfigOverrides, LitscoutConfig, LogFormat};
use litscout_search::{
    ArticleStore, SearchEngine, SearchMode, SearchRequest, SearchResponse, TenantId,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// litscout - Search and related-article retrieval over collected articles
#[derive(Parser, Debug)]
#[command(name = "litscout")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Path to configuration file
    #[arg(long, short = 'c', global = true, env = "LITSCOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the article database
    #[arg(long, global = true, env = "LITSCOUT_DATABASE")]
    database: Option<PathBuf>,

    /// Qdrant server URL (e.g. http://localhost:6334)
    #[arg(long, global = true, env = "LITSCOUT_QDRANT_URL")]
    qdrant_url: Option<String>,

    /// Rerank semantic results (overrides `rerank.enabled`)
    #[arg(long, global = true, overrides_with = "no_rerank")]
    rerank: bool,

    /// Do not rerank semantic results
    #[arg(long, global = true, overrides_with = "rerank")]
    no_rerank: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

impl GlobalOptions {
    /// Convert global options to config overrides
    fn to_config_overrides(&self) -> Result<ConfigOverrides> {
        let (qdrant_host, qdrant_port) = match self.qdrant_url {
            Some(ref url) => {
                let (host, port) = parse_qdrant_url(url)?;
                (Some(host), port)
            }
            None => (None, None),
        };

        Ok(ConfigOverrides {
            database_path: self.database.clone(),
            qdrant_host,
            qdrant_port,
            rerank_enabled: self.rerank_override(),
            log_level: self.verbose.then(|| "debug".to_string()),
            ..Default::default()
        })
    }

    fn rerank_override(&self) -> Option<bool> {
        match (self.rerank, self.no_rerank) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

/// Split a Qdrant URL into host and optional port.
fn parse_qdrant_url(url: &str) -> Result<(String, Option<u16>)> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .unwrap_or(url)
        .trim_end_matches('/');

    match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .with_context(|| format!("Invalid port in Qdrant URL: {}", url))?;
            Ok((host.to_string(), Some(port)))
        }
        None if rest.is_empty() => anyhow::bail!("Invalid Qdrant URL: {}", url),
        None => Ok((rest.to_string(), None)),
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search a tenant's articles
    Search(SearchArgs),

    /// Find articles related to a source article
    Related(RelatedArgs),

    /// Write the global configuration file with defaults
    InitConfig,

    /// Create the article database schema
    InitDb,

    /// Check the embedding endpoint and vector store
    Status(StatusArgs),
}

/// Text search mode
#[derive(Debug, Clone, Copy, ValueEnum)]
enum TextMode {
    /// Title matching over the article database
    Keyword,
    /// Vector similarity, optionally reranked
    Semantic,
    /// Weighted fusion of semantic and keyword results (default)
    Hybrid,
}

impl From<TextMode> for SearchMode {
    fn from(mode: TextMode) -> Self {
        match mode {
            TextMode::Keyword => SearchMode::Keyword,
            TextMode::Semantic => SearchMode::Semantic,
            TextMode::Hybrid => SearchMode::Hybrid,
        }
    }
}

/// Arguments for the search command
#[derive(Args, Debug)]
struct SearchArgs {
    /// Search query
    query: String,

    /// Tenant (user id) to search within
    #[arg(long, short = 't')]
    tenant: i64,

    /// Search mode
    #[arg(long, short = 'm', value_enum, default_value = "hybrid")]
    mode: TextMode,

    /// Maximum number of results to return
    #[arg(long, short = 'n')]
    limit: Option<usize>,

    /// Number of results to skip
    #[arg(long, default_value = "0")]
    offset: usize,

    /// Weight of the semantic score in hybrid fusion
    #[arg(long)]
    semantic_weight: Option<f32>,

    /// Weight of the keyword score in hybrid fusion
    #[arg(long)]
    keyword_weight: Option<f32>,

    /// Fail instead of falling back to keyword results
    #[arg(long)]
    no_fallback: bool,

    /// Fuse raw semantic scores without normalizing
    #[arg(long)]
    raw_scores: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the related command
#[derive(Args, Debug)]
struct RelatedArgs {
    /// Source article id
    article_id: i64,

    /// Tenant (user id) owning the article
    #[arg(long, short = 't')]
    tenant: i64,

    /// Maximum number of related articles
    #[arg(long, short = 'n')]
    limit: Option<usize>,

    /// Recompute and replace the cached list
    #[arg(long)]
    refresh: bool,

    /// Ignore the cached list when reading
    #[arg(long)]
    no_cache: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the status command
#[derive(Args, Debug)]
struct StatusArgs {
    /// Tenant whose vector store should be checked
    #[arg(long, short = 't', default_value = "0")]
    tenant: i64,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig = cli.command {
        return init_config();
    }

    let config = load_config(&cli.global)?;
    init_tracing(&config)?;

    match cli.command {
        Commands::Search(args) => search(args, &config).await,
        Commands::Related(args) => related(args, &config).await,
        Commands::InitConfig => init_config(),
        Commands::InitDb => init_db(&config).await,
        Commands::Status(args) => status(args, &config).await,
    }
}

/// Load configuration: global → local → explicit file → CLI overrides.
fn load_config(global: &GlobalOptions) -> Result<LitscoutConfig> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let overrides = global.to_config_overrides()?;

    ConfigLoader::new()
        .load(&cwd, global.config.as_deref(), Some(&overrides))
        .context("Failed to load configuration")
}

fn init_tracing(config: &LitscoutConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("Invalid log level")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.with_ansi(true).try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}

async fn open_engine(config: &LitscoutConfig) -> Result<SearchEngine> {
    let store = ArticleStore::open(&config.database.path).with_context(|| {
        format!(
            "Failed to open article database {}",
            config.database.path.display()
        )
    })?;
    SearchEngine::from_config(config, store).context("Failed to create search engine")
}

async fn search(args: SearchArgs, config: &LitscoutConfig) -> Result<()> {
    let engine = open_engine(config).await?;

    let request = SearchRequest {
        limit: args.limit.unwrap_or(config.search.default_limit),
        offset: args.offset,
        semantic_weight: args
            .semantic_weight
            .unwrap_or(config.search.semantic_weight),
        keyword_weight: args.keyword_weight.unwrap_or(config.search.keyword_weight),
        normalize_scores: !args.raw_scores,
        fallback_enabled: !args.no_fallback,
        ..SearchRequest::text(args.mode.into(), TenantId(args.tenant), args.query)
    };

    let response = engine.search(&request).await.context("Search failed")?;
    engine.shutdown().await;

    print_response(&response, args.json)
}

async fn related(args: RelatedArgs, config: &LitscoutConfig) -> Result<()> {
    let engine = open_engine(config).await?;

    let request = SearchRequest {
        limit: args.limit.unwrap_or(config.search.default_limit),
        use_cache: !args.no_cache,
        refresh_cache: args.refresh,
        ..SearchRequest::related(TenantId(args.tenant), args.article_id)
    };

    let response = engine
        .search(&request)
        .await
        .context("Related-article lookup failed")?;
    engine.shutdown().await;

    print_response(&response, args.json)
}

fn init_config() -> Result<()> {
    let path = ConfigLoader::new()
        .init_global()
        .context("Failed to write global configuration")?;
    println!("Configuration at {}", path.display());
    Ok(())
}

async fn init_db(config: &LitscoutConfig) -> Result<()> {
    let path = &config.database.path;
    let store = ArticleStore::open(path)
        .with_context(|| format!("Failed to open article database {}", path.display()))?;
    store
        .initialize()
        .await
        .context("Failed to create schema")?;

    info!("Initialized article database at {}", path.display());
    println!("Initialized {}", path.display());
    Ok(())
}

async fn status(args: StatusArgs, config: &LitscoutConfig) -> Result<()> {
    let engine = open_engine(config).await?;
    let tenant = TenantId(args.tenant);

    let embedding = engine.semantic().embedder().check_status().await;

    let settings = engine.semantic().registry().settings_for(tenant).await;
    let started = Instant::now();
    let vector_store = match engine.semantic().registry().store_for(tenant).await {
        Ok(store) => store.health_check().await,
        Err(e) => Err(e),
    };
    let vector_latency = started.elapsed().as_millis() as u64;

    let schema_version = engine.store().schema_version().await.ok().flatten();
    engine.shutdown().await;

    if args.json {
        let mut status = serde_json::json!({
            "tenant": tenant,
            "database": {
                "path": config.database.path,
                "schema_version": schema_version,
            },
            "vector_store": {
                "url": settings.url(),
                "collection": settings.collection,
                "available": vector_store.is_ok(),
                "latency_ms": vector_latency,
            },
        });
        if let Err(ref e) = vector_store {
            status["vector_store"]["error"] = serde_json::json!(e.to_string());
        }
        status["embedding"] = match embedding {
            Ok(ref s) => serde_json::json!({
                "endpoint": s.endpoint,
                "available": s.available,
                "latency_ms": s.latency_ms,
                "error": s.error,
            }),
            Err(ref e) => serde_json::json!({ "available": false, "error": e.to_string() }),
        };
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Database:     {}", config.database.path.display());
    match schema_version {
        Some(v) => println!("  schema version {}", v),
        None => println!("  not initialized (run `litscout init-db`)"),
    }

    println!("Vector store: {} ({})", settings.url(), settings.collection);
    match vector_store {
        Ok(()) => println!("  ok ({} ms)", vector_latency),
        Err(e) => println!("  unavailable: {}", e),
    }

    match embedding {
        Ok(s) if s.available => {
            print!("Embedding:    {}\n  ok", s.endpoint);
            if let Some(ms) = s.latency_ms {
                print!(" ({} ms)", ms);
            }
            println!();
        }
        Ok(s) => println!(
            "Embedding:    {}\n  unavailable: {}",
            s.endpoint,
            s.error.unwrap_or_default()
        ),
        Err(e) => println!("Embedding:    unavailable: {}", e),
    }

    Ok(())
}

fn print_response(response: &SearchResponse, json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(response).context("Failed to serialize response")?;
        println!("{}", out);
        return Ok(());
    }

    if response.results.is_empty() {
        eprintln!("No results");
        return Ok(());
    }

    let mut flags = Vec::new();
    if response.cached {
        flags.push("cached");
    }
    if response.fallback {
        flags.push("keyword fallback");
    }
    let suffix = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };
    println!(
        "{} of {} {} results{}:\n",
        response.results.len(),
        response.total,
        response.mode,
        suffix
    );

    for (i, result) in response.results.iter().enumerate() {
        match result.metadata {
            Some(ref meta) => {
                println!("{}. {} (#{})", i + 1, meta.title, result.article_id);
                println!("   {} - {}", meta.source_name, meta.url);
            }
            None => println!("{}. #{}", i + 1, result.article_id),
        }
        print!("   Score: {:.3}", result.score);
        if let Some(s) = result.semantic_score {
            print!("  semantic {:.3}", s);
        }
        if let Some(k) = result.keyword_score {
            print!("  keyword {:.3}", k);
        }
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_qdrant_url() {
        assert_eq!(
            parse_qdrant_url("http://qdrant.internal:6334").unwrap(),
            ("qdrant.internal".to_string(), Some(6334))
        );
        assert_eq!(
            parse_qdrant_url("localhost").unwrap(),
            ("localhost".to_string(), None)
        );
        assert!(parse_qdrant_url("http://host:notaport").is_err());
        assert!(parse_qdrant_url("http://").is_err());
    }

    #[test]
    fn test_cli_parses_search() {
        let cli = Cli::try_parse_from([
            "litscout", "search", "gpt", "--tenant", "3", "--mode", "keyword", "--limit", "5",
            "--no-fallback",
        ])
        .unwrap();

        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.query, "gpt");
                assert_eq!(args.tenant, 3);
                assert!(matches!(args.mode, TextMode::Keyword));
                assert_eq!(args.limit, Some(5));
                assert!(args.no_fallback);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_verbose_sets_debug_override() {
        let cli = Cli::try_parse_from(["litscout", "-v", "init-db", "--database", "x.db"]).unwrap();
        let overrides = cli.global.to_config_overrides().unwrap();
        assert_eq!(overrides.log_level.as_deref(), Some("debug"));
        assert_eq!(overrides.database_path, Some(PathBuf::from("x.db")));
        assert_eq!(overrides.rerank_enabled, None);
    }

    #[test]
    fn test_rerank_flags_set_override() {
        let cli = Cli::try_parse_from(["litscout", "status", "--no-rerank"]).unwrap();
        assert_eq!(cli.global.to_config_overrides().unwrap().rerank_enabled, Some(false));

        let cli = Cli::try_parse_from(["litscout", "--rerank", "status"]).unwrap();
        assert_eq!(cli.global.to_config_overrides().unwrap().rerank_enabled, Some(true));

        // Last flag wins
        let cli =
            Cli::try_parse_from(["litscout", "--rerank", "status", "--no-rerank"]).unwrap();
        assert_eq!(cli.global.to_config_overrides().unwrap().rerank_enabled, Some(false));
    }

    #[test]
    fn test_cli_parses_init_config() {
        let cli = Cli::try_parse_from(["litscout", "init-config"]).unwrap();
        assert!(matches!(cli.command, Commands::InitConfig));
    }
}
