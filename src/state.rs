use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::config::Config;
use crate::extract::PlainTextExtractor;
use crate::generate::{GenerationOrchestrator, GenerationSession};
use crate::ingest::DocumentIndexer;
use crate::llm::embeddings::HttpEmbedder;
use crate::retrieve::HybridRetriever;
use crate::store::IndexStore;
use crate::vectorize::ContextVectorizer;

/// Shared application state, cheap to clone into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<IndexStore>,
    pub indexer: Arc<DocumentIndexer>,
    pub retriever: Arc<HybridRetriever>,
    pub orchestrator: Arc<GenerationOrchestrator>,
    pub session: Arc<GenerationSession>,
    pub rag_enabled: Arc<RwLock<bool>>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;

        let store = Arc::new(IndexStore::open(&config.data_dir)?);
        let vectorizer =
            ContextVectorizer::new(Arc::new(HttpEmbedder::new(client.clone(), config.llm.clone())));

        let indexer = Arc::new(DocumentIndexer::new(
            store.clone(),
            Arc::new(PlainTextExtractor),
            vectorizer.clone(),
            config.chunk_size,
            config.chunk_overlap,
        ));

        let retriever = Arc::new(HybridRetriever::new(
            store.clone(),
            vectorizer,
            config.retrieval.use_hybrid_search,
            config.retrieval.max_keywords,
        ));

        let session = Arc::new(GenerationSession::new());
        let orchestrator = Arc::new(GenerationOrchestrator::new(
            client,
            config.llm.clone(),
            retriever.clone(),
            session.clone(),
            config.master_prompt.clone(),
        ));

        Ok(Self {
            config,
            store,
            indexer,
            retriever,
            orchestrator,
            session,
            rag_enabled: Arc::new(RwLock::new(false)),
        })
    }
}
