//! Answer generation: single-session orchestration over the streaming
//! backend, with cooperative cancellation.
//!
//! One generation runs at a time. [`GenerationSession::begin`] hands out a
//! cancel token plus a guard; the guard clears the active flag on drop, so
//! the session can never stay stuck active after a stream is abandoned,
//! completes, or fails.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{Stream, StreamExt};
use parking_lot::{Mutex, RwLock};

use crate::config::LlmConfig;
use crate::error::RagError;
use crate::llm::generate::{stream_generate, Fragment, FragmentStream};
use crate::models::GenerationOptions;
use crate::retrieve::HybridRetriever;

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Placeholder context when retrieval is enabled but finds nothing.
const NO_DOCUMENTS_FOUND: &str = "No relevant documents found.";

pub type AnswerStream = Pin<Box<dyn Stream<Item = String> + Send>>;

// ─── Session state ───────────────────────────────────────

#[derive(Default)]
struct Flags {
    active: bool,
    cancel: Option<Arc<AtomicBool>>,
}

/// Tracks whether a generation is in flight and routes cancel requests to
/// it. Both flags live under one lock so begin/cancel/finish transitions
/// are atomic.
#[derive(Default)]
pub struct GenerationSession {
    flags: Mutex<Flags>,
}

impl GenerationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the session. Returns `None` if a generation is already active.
    pub fn begin(self: &Arc<Self>) -> Option<(CancelToken, SessionGuard)> {
        let mut flags = self.flags.lock();
        if flags.active {
            return None;
        }

        let flag = Arc::new(AtomicBool::new(false));
        flags.active = true;
        flags.cancel = Some(flag.clone());

        Some((
            CancelToken { flag },
            SessionGuard {
                session: self.clone(),
            },
        ))
    }

    /// Request cancellation of the active generation. Returns whether a
    /// generation was active to receive the request.
    pub fn request_cancel(&self) -> bool {
        let flags = self.flags.lock();
        match (&flags.cancel, flags.active) {
            (Some(flag), true) => {
                flag.store(true, Ordering::SeqCst);
                tracing::info!("Cancellation requested for active generation");
                true
            }
            _ => {
                tracing::info!("Cancellation requested but no generation is active");
                false
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.flags.lock().active
    }

    fn finish(&self) {
        let mut flags = self.flags.lock();
        flags.active = false;
        flags.cancel = None;
    }
}

pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Observe and consume a pending cancel request.
    pub fn is_cancelled(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

/// Clears the session on drop, whatever path the stream took to its end.
pub struct SessionGuard {
    session: Arc<GenerationSession>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.finish();
    }
}

// ─── Orchestrator ────────────────────────────────────────

pub struct GenerationOrchestrator {
    client: reqwest::Client,
    llm: LlmConfig,
    retriever: Arc<HybridRetriever>,
    session: Arc<GenerationSession>,
    master_prompt: String,
    system_prompt: RwLock<Option<String>>,
    idle_timeout: Duration,
}

impl GenerationOrchestrator {
    pub fn new(
        client: reqwest::Client,
        llm: LlmConfig,
        retriever: Arc<HybridRetriever>,
        session: Arc<GenerationSession>,
        master_prompt: String,
    ) -> Self {
        Self {
            client,
            llm,
            retriever,
            session,
            master_prompt,
            system_prompt: RwLock::new(None),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Replace the runtime system prompt. `None` removes it.
    pub fn set_system_prompt(&self, prompt: Option<String>) {
        match &prompt {
            Some(_) => tracing::info!("System prompt updated"),
            None => tracing::info!("System prompt cleared"),
        }
        *self.system_prompt.write() = prompt;
    }

    pub fn system_prompt(&self) -> Option<String> {
        self.system_prompt.read().clone()
    }

    /// Stream an answer for `prompt`. Fails fast with [`RagError::Busy`]
    /// when a generation is already running; every later failure is
    /// reported inside the stream so the client sees it as text.
    pub async fn stream_answer(
        &self,
        prompt: &str,
        top_n: usize,
        options: GenerationOptions,
        use_rag: bool,
    ) -> Result<AnswerStream, RagError> {
        let (token, guard) = self.session.begin().ok_or(RagError::Busy)?;

        let options = options.clamped();
        let top_n = top_n.clamp(1, 10);

        let documents = if use_rag {
            let docs = self.retriever.retrieve(prompt, top_n).await;
            if docs.is_empty() {
                tracing::warn!("Retrieval produced no documents, answering with placeholder");
                Some(vec![NO_DOCUMENTS_FOUND.to_string()])
            } else {
                Some(docs)
            }
        } else {
            None
        };

        let full_prompt = self.build_prompt(prompt, documents.as_deref());

        let fragments = match stream_generate(&self.client, &self.llm, &full_prompt, options).await
        {
            Ok(fragments) => fragments,
            Err(e) => {
                tracing::error!("Failed to start generation: {e}");
                let only: FragmentStream = Box::pin(futures_util::stream::iter(vec![
                    Fragment::Transport(e.to_string()),
                ]));
                only
            }
        };

        Ok(answer_stream(fragments, token, guard, self.idle_timeout))
    }

    /// Assemble the final prompt. With retrieval the context documents come
    /// before the question; without retrieval the question comes first and
    /// an explicit no-context marker closes the prompt. The system section
    /// is always present, with a placeholder when no prompt is set.
    fn build_prompt(&self, prompt: &str, documents: Option<&[String]>) -> String {
        let system = self
            .system_prompt
            .read()
            .clone()
            .unwrap_or_else(|| "No specific system instructions provided.".to_string());
        let master = &self.master_prompt;

        match documents {
            Some(docs) => format!(
                "{master}\n\nSystem Instructions:\n{system}\n\n\
                 Context Documents:\n{}\n\nUser Question:\n{prompt}",
                docs.join("\n\n")
            ),
            None => format!(
                "{master}\n\nSystem Instructions:\n{system}\n\n\
                 User Question:\n{prompt}\n\n\
                 Context Documents:\nNo relevant documents provided."
            ),
        }
    }
}

/// Drive the fragment stream to completion, applying the cancellation and
/// error policy:
/// - a pending cancel request ends the stream before the next delta
/// - malformed fragments are reported inline and the stream continues
/// - transport failures are reported once and the stream ends
/// - silence beyond the idle timeout ends the stream with an error
fn answer_stream(
    fragments: FragmentStream,
    token: CancelToken,
    guard: SessionGuard,
    idle_timeout: Duration,
) -> AnswerStream {
    struct State {
        fragments: FragmentStream,
        token: CancelToken,
        done: bool,
        // Held for its Drop impl
        _guard: SessionGuard,
    }

    let state = State {
        fragments,
        token,
        done: false,
        _guard: guard,
    };

    Box::pin(futures_util::stream::unfold(state, move |mut state| async move {
        loop {
            if state.done {
                return None;
            }

            let next = tokio::time::timeout(idle_timeout, state.fragments.next()).await;
            match next {
                Err(_) => {
                    tracing::error!("Generation backend idle timeout reached");
                    state.done = true;
                    return Some(("Error: generation timed out".to_string(), state));
                }
                Ok(None) => {
                    tracing::info!("Generation completed");
                    return None;
                }
                Ok(Some(fragment)) => {
                    // Checked on every fragment received, whatever its kind
                    if state.token.is_cancelled() {
                        tracing::info!("Generation cancelled by request");
                        return None;
                    }
                    match fragment {
                        Fragment::Delta(text) => return Some((text, state)),
                        Fragment::Malformed(msg) => {
                            tracing::warn!("Malformed generation fragment: {msg}");
                            return Some((format!("[error: {msg}]"), state));
                        }
                        Fragment::Transport(msg) => {
                            tracing::error!("Generation stream failed: {msg}");
                            state.done = true;
                            return Some((format!("Error: {msg}"), state));
                        }
                    }
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment_stream(fragments: Vec<Fragment>) -> FragmentStream {
        Box::pin(futures_util::stream::iter(fragments))
    }

    async fn collect(stream: AnswerStream) -> Vec<String> {
        stream.collect().await
    }

    // ─── Session ─────────────────────────────────────────

    #[test]
    fn test_begin_claims_session_exclusively() {
        let session = Arc::new(GenerationSession::new());
        let claim = session.begin();
        assert!(claim.is_some());
        assert!(session.is_active());
        assert!(session.begin().is_none());
    }

    #[test]
    fn test_guard_drop_releases_session() {
        let session = Arc::new(GenerationSession::new());
        {
            let _claim = session.begin().unwrap();
            assert!(session.is_active());
        }
        assert!(!session.is_active());
        assert!(session.begin().is_some());
    }

    #[test]
    fn test_cancel_without_active_session_is_noop() {
        let session = Arc::new(GenerationSession::new());
        assert!(!session.request_cancel());
    }

    #[test]
    fn test_cancel_reaches_token_and_is_consumed() {
        let session = Arc::new(GenerationSession::new());
        let (token, _guard) = session.begin().unwrap();

        assert!(!token.is_cancelled());
        assert!(session.request_cancel());
        assert!(token.is_cancelled());
        // Consumed on observation
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_does_not_leak_into_next_session() {
        let session = Arc::new(GenerationSession::new());
        {
            let (_token, _guard) = session.begin().unwrap();
            session.request_cancel();
        }
        let (token, _guard) = session.begin().unwrap();
        assert!(!token.is_cancelled());
    }

    // ─── Answer stream policy ────────────────────────────

    #[tokio::test]
    async fn test_deltas_flow_through_and_release_session() {
        let session = Arc::new(GenerationSession::new());
        let (token, guard) = session.begin().unwrap();

        let fragments = fragment_stream(vec![
            Fragment::Delta("Hello".to_string()),
            Fragment::Delta(" world".to_string()),
        ]);
        let out = collect(answer_stream(fragments, token, guard, DEFAULT_IDLE_TIMEOUT)).await;

        assert_eq!(out, vec!["Hello", " world"]);
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_delta() {
        let session = Arc::new(GenerationSession::new());
        let (token, guard) = session.begin().unwrap();
        session.request_cancel();

        let fragments = fragment_stream(vec![
            Fragment::Delta("never".to_string()),
            Fragment::Delta("emitted".to_string()),
        ]);
        let out = collect(answer_stream(fragments, token, guard, DEFAULT_IDLE_TIMEOUT)).await;

        assert!(out.is_empty());
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_cancel_observed_on_malformed_fragments_too() {
        let session = Arc::new(GenerationSession::new());
        let (token, guard) = session.begin().unwrap();
        session.request_cancel();

        let fragments = fragment_stream(vec![
            Fragment::Malformed("garbled".to_string()),
            Fragment::Malformed("still garbled".to_string()),
            Fragment::Delta("never".to_string()),
        ]);
        let out = collect(answer_stream(fragments, token, guard, DEFAULT_IDLE_TIMEOUT)).await;

        assert!(out.is_empty());
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_malformed_fragment_reported_inline_and_stream_continues() {
        let session = Arc::new(GenerationSession::new());
        let (token, guard) = session.begin().unwrap();

        let fragments = fragment_stream(vec![
            Fragment::Delta("a".to_string()),
            Fragment::Malformed("bad json".to_string()),
            Fragment::Delta("b".to_string()),
        ]);
        let out = collect(answer_stream(fragments, token, guard, DEFAULT_IDLE_TIMEOUT)).await;

        assert_eq!(out.len(), 3);
        assert_eq!(out[0], "a");
        assert!(out[1].contains("bad json"));
        assert_eq!(out[2], "b");
    }

    #[tokio::test]
    async fn test_transport_failure_reported_once_and_stream_ends() {
        let session = Arc::new(GenerationSession::new());
        let (token, guard) = session.begin().unwrap();

        let fragments = fragment_stream(vec![
            Fragment::Delta("a".to_string()),
            Fragment::Transport("connection reset".to_string()),
            Fragment::Delta("never".to_string()),
        ]);
        let out = collect(answer_stream(fragments, token, guard, DEFAULT_IDLE_TIMEOUT)).await;

        assert_eq!(out.len(), 2);
        assert_eq!(out[0], "a");
        assert!(out[1].starts_with("Error:"));
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_idle_timeout_ends_stream_with_error() {
        let session = Arc::new(GenerationSession::new());
        let (token, guard) = session.begin().unwrap();

        let fragments: FragmentStream = Box::pin(futures_util::stream::pending());
        let out = collect(answer_stream(
            fragments,
            token,
            guard,
            Duration::from_millis(20),
        ))
        .await;

        assert_eq!(out.len(), 1);
        assert!(out[0].contains("timed out"));
        assert!(!session.is_active());
    }

    // ─── Prompt assembly ─────────────────────────────────

    fn orchestrator() -> GenerationOrchestrator {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(crate::store::IndexStore::open(dir.path()).unwrap());
        std::mem::forget(dir);

        struct NoEmbedder;

        #[async_trait::async_trait]
        impl crate::llm::embeddings::Embedder for NoEmbedder {
            async fn embed_batch(
                &self,
                texts: &[String],
            ) -> Result<Vec<Vec<f32>>, RagError> {
                Ok(texts.iter().map(|_| vec![0.0]).collect())
            }
        }

        let retriever = Arc::new(HybridRetriever::new(
            store,
            crate::vectorize::ContextVectorizer::new(Arc::new(NoEmbedder)),
            false,
            10,
        ));
        GenerationOrchestrator::new(
            reqwest::Client::new(),
            LlmConfig::default(),
            retriever,
            Arc::new(GenerationSession::new()),
            "Master instructions.".to_string(),
        )
    }

    #[test]
    fn test_prompt_with_documents_and_system_prompt() {
        let orch = orchestrator();
        orch.set_system_prompt(Some("Answer in French.".to_string()));

        let docs = vec!["doc one".to_string(), "doc two".to_string()];
        let prompt = orch.build_prompt("What is this?", Some(&docs));

        assert!(prompt.starts_with("Master instructions."));
        assert!(prompt.contains("System Instructions:\nAnswer in French."));
        assert!(prompt.contains("Context Documents:\ndoc one\n\ndoc two"));
        assert!(prompt.ends_with("User Question:\nWhat is this?"));
    }

    #[test]
    fn test_prompt_without_rag_puts_question_before_context_marker() {
        let orch = orchestrator();
        let prompt = orch.build_prompt("Hello?", None);

        let question = prompt.find("User Question:").unwrap();
        let context = prompt.find("Context Documents:").unwrap();
        assert!(question < context);
        assert!(prompt.ends_with("No relevant documents provided."));
        assert!(prompt.contains("System Instructions:\nNo specific system instructions provided."));
    }

    #[test]
    fn test_prompt_with_rag_puts_context_before_question() {
        let orch = orchestrator();
        let docs = vec!["doc".to_string()];
        let prompt = orch.build_prompt("Hello?", Some(&docs));

        let context = prompt.find("Context Documents:").unwrap();
        let question = prompt.find("User Question:").unwrap();
        assert!(context < question);
    }

    #[test]
    fn test_system_prompt_can_be_cleared() {
        let orch = orchestrator();
        orch.set_system_prompt(Some("temp".to_string()));
        assert_eq!(orch.system_prompt().as_deref(), Some("temp"));
        orch.set_system_prompt(None);
        assert!(orch.system_prompt().is_none());
    }
}
