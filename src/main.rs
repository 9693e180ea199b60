//! Themis - retrieval-augmented legal assistant backend
//!
//! Serves two paths from one process:
//! - POST /api/search ranks the precomputed case corpus against a query
//! - the /api/chat/* routes run the retrieval + streaming generation pipeline

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use themis::config::Config;
use themis::corpus::CaseCorpus;
use themis::encoder::HttpQueryEncoder;
use themis::engine::ConversationEngine;
use themis::generation::AgentClient;
use themis::llm::ChatCompletionClient;
use themis::recommend::Recommender;
use themis::retrieval::{DisabledRag, LlmKeywordExtractor, RetrievalOrchestrator, WebSearchClient};
use themis::search::CaseSearchService;
use themis::server::{AppState, router};
use themis::store::Store;
use themis::stream::StreamController;
use themis::summary::Summarizer;

#[derive(Parser)]
#[command(name = "themis")]
#[command(about = "Retrieval-augmented legal assistant backend")]
struct Args {
    /// Bind host
    #[arg(long)]
    host: Option<String>,

    /// HTTP server port
    #[arg(long)]
    port: Option<u16>,

    /// Database path (sqlite URL)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Embeddings API base URL
    #[arg(long, env = "EMBEDDING_BASE_URL")]
    embedding_base_url: Option<String>,

    /// Embeddings API key
    #[arg(long, env = "EMBEDDING_API_KEY")]
    embedding_api_key: Option<String>,

    /// Chat completions base URL (keyword extraction + summarization)
    #[arg(long, env = "LLM_BASE_URL")]
    llm_base_url: Option<String>,

    /// Chat completions API key
    #[arg(long, env = "LLM_API_KEY")]
    llm_api_key: Option<String>,

    /// Web search tool endpoint
    #[arg(long, env = "WEB_SEARCH_URL")]
    web_search_url: Option<String>,

    /// Web search API key
    #[arg(long, env = "WEB_SEARCH_API_KEY")]
    web_search_api_key: Option<String>,

    /// Generation (agent app) base URL
    #[arg(long, env = "GENERATION_BASE_URL")]
    generation_base_url: Option<String>,

    /// Generation API key
    #[arg(long, env = "GENERATION_API_KEY")]
    generation_api_key: Option<String>,

    /// Generation agent app id
    #[arg(long, env = "GENERATION_APP_ID")]
    generation_app_id: Option<String>,

    /// Case metadata JSON file
    #[arg(long, env = "CORPUS_METADATA")]
    corpus_metadata: Option<String>,

    /// Case vectors file (raw little-endian f32)
    #[arg(long, env = "CORPUS_VECTORS")]
    corpus_vectors: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let config = Config::load();

    // Resolve values: CLI args > env vars (handled by clap) > config file > defaults
    let database_url = args
        .database_url
        .or(config.database_url)
        .unwrap_or_else(|| "sqlite://data/themis.db?mode=rwc".to_string());

    let embedding_base_url = args
        .embedding_base_url
        .or(config.embedding_base_url)
        .unwrap_or_else(|| "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string());
    let embedding_api_key = args
        .embedding_api_key
        .or(config.embedding_api_key)
        .context("EMBEDDING_API_KEY required")?;
    let embedding_model = config
        .embedding_model
        .unwrap_or_else(|| "text-embedding-v3".to_string());
    let embedding_dimensions = config.embedding_dimensions.unwrap_or(1024);

    let llm_base_url = args
        .llm_base_url
        .or(config.llm_base_url)
        .unwrap_or_else(|| "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string());
    let llm_api_key = args
        .llm_api_key
        .or(config.llm_api_key)
        .context("LLM_API_KEY required")?;
    let llm_model = config.llm_model.unwrap_or_else(|| "qwen-plus".to_string());

    let web_search_url = args
        .web_search_url
        .or(config.web_search_url)
        .unwrap_or_else(|| "https://open.bigmodel.cn/api/paas/v4/tools".to_string());
    let web_search_api_key = args
        .web_search_api_key
        .or(config.web_search_api_key)
        .context("WEB_SEARCH_API_KEY required")?;

    let generation_base_url = args
        .generation_base_url
        .or(config.generation_base_url)
        .unwrap_or_else(|| "https://dashscope.aliyuncs.com/api/v1".to_string());
    let generation_api_key = args
        .generation_api_key
        .or(config.generation_api_key)
        .context("GENERATION_API_KEY required")?;
    let generation_app_id = args
        .generation_app_id
        .or(config.generation_app_id)
        .context("GENERATION_APP_ID required")?;

    let corpus_metadata = args
        .corpus_metadata
        .or(config.corpus_metadata)
        .unwrap_or_else(|| "data/cases.json".to_string());
    let corpus_vectors = args
        .corpus_vectors
        .or(config.corpus_vectors)
        .unwrap_or_else(|| "data/case_vectors.f32".to_string());

    let host = args.host.or(config.host).unwrap_or_else(|| "0.0.0.0".to_string());
    let port = args.port.or(config.port).unwrap_or(8900);

    // Load the case corpus once; it is immutable for the process lifetime
    let corpus = Arc::new(
        CaseCorpus::load(
            Path::new(&corpus_metadata),
            Path::new(&corpus_vectors),
            embedding_dimensions,
        )
        .context("failed to load case corpus")?,
    );
    info!("case corpus loaded: {} cases, {} dims", corpus.len(), corpus.dim());

    // Database
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")?;
    let store = Store::new(pool);
    store.migrate().await?;
    info!("database ready at {}", database_url);

    // Long-lived external clients, constructed once and shared
    let encoder = Arc::new(HttpQueryEncoder::new(
        embedding_base_url,
        embedding_api_key,
        embedding_model,
        embedding_dimensions,
    ));
    let llm = Arc::new(ChatCompletionClient::new(llm_base_url, llm_api_key, llm_model));
    let web = Arc::new(WebSearchClient::new(web_search_url, web_search_api_key));
    let backend = Arc::new(AgentClient::new(
        generation_base_url,
        generation_api_key,
        generation_app_id,
    ));

    let search = Arc::new(CaseSearchService::new(corpus, encoder));
    let retrieval = Arc::new(RetrievalOrchestrator::new(
        store.clone(),
        Arc::new(LlmKeywordExtractor::new(llm.clone())),
        web,
        Arc::new(DisabledRag),
    ));
    let engine = Arc::new(ConversationEngine::new(backend, store.clone()));
    let summarizer = Arc::new(Summarizer::new(store.clone(), llm.clone()));
    let controller = Arc::new(StreamController::new(store.clone(), engine, summarizer));
    let recommender = Arc::new(Recommender::new(llm));

    let state = AppState {
        store,
        search,
        retrieval,
        controller,
        recommender,
    };

    let bind_address = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {}", bind_address))?;
    info!("listening on http://{}", bind_address);

    axum::serve(listener, router(state)).await?;

    Ok(())
}
