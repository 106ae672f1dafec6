use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::RagError;
use crate::models::GenerationOptions;

/// One unit received from the generation backend.
///
/// `Malformed` is non-fatal: the orchestrator reports it inline and keeps
/// consuming. `Transport` is fatal for the stream: the orchestrator reports
/// a single error fragment and stops.
#[derive(Debug)]
pub enum Fragment {
    Delta(String),
    Malformed(String),
    Transport(String),
}

pub type FragmentStream = Pin<Box<dyn Stream<Item = Fragment> + Send>>;

/// Start a streamed generation request and return the fragment stream.
/// The backend terminates the stream with an explicit `done` marker.
pub async fn stream_generate(
    client: &reqwest::Client,
    config: &LlmConfig,
    prompt: &str,
    options: GenerationOptions,
) -> Result<FragmentStream, RagError> {
    let url = format!("{}/api/generate", config.base_url);

    let req = GenerateRequest {
        model: config.generation_model.clone(),
        prompt: prompt.to_string(),
        stream: true,
        options: GenerateRequestOptions {
            num_ctx: options.num_ctx,
            temperature: options.temperature,
            repeat_last_n: options.repeat_last_n,
            repeat_penalty: options.repeat_penalty,
        },
    };

    let resp = client
        .post(&url)
        .timeout(Duration::from_secs(300))
        .json(&req)
        .send()
        .await
        .map_err(|e| RagError::BackendUnavailable(format!("generation backend: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(RagError::BackendUnavailable(format!(
            "generation API returned {status}: {body}"
        )));
    }

    let stream = stream_lines(resp.bytes_stream()).filter_map(|line_result| async move {
        match line_result {
            Ok(line) => parse_generate_line(&line),
            Err(e) => Some(Fragment::Transport(e)),
        }
    });

    Ok(Box::pin(stream))
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateRequestOptions,
}

#[derive(Serialize)]
struct GenerateRequestOptions {
    num_ctx: u32,
    temperature: f32,
    repeat_last_n: u32,
    repeat_penalty: f32,
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

/// Parse one newline-delimited JSON line from the generation stream.
/// Returns:
/// - `Some(Fragment::Delta)` for content
/// - `Some(Fragment::Malformed)` for lines that fail to parse
/// - `None` to skip (blank lines, empty deltas, the done marker)
fn parse_generate_line(line: &str) -> Option<Fragment> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<GenerateChunk>(line) {
        Ok(chunk) => {
            if chunk.done || chunk.response.is_empty() {
                return None;
            }
            Some(Fragment::Delta(chunk.response))
        }
        Err(e) => Some(Fragment::Malformed(format!(
            "failed to parse generation fragment: {e}"
        ))),
    }
}

// ─── Line buffering ──────────────────────────────────────

/// Convert a byte stream into a stream of complete lines.
fn stream_lines(
    byte_stream: impl Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
) -> impl Stream<Item = Result<String, String>> + Send {
    futures_util::stream::unfold(
        (Box::pin(byte_stream), String::new()),
        |(mut stream, mut buffer)| async move {
            loop {
                // First, try to extract a complete line from the buffer
                if let Some(newline_pos) = buffer.find('\n') {
                    let line = buffer[..newline_pos].to_string();
                    buffer = buffer[newline_pos + 1..].to_string();
                    if !line.trim().is_empty() {
                        return Some((Ok(line), (stream, buffer)));
                    }
                    continue;
                }

                // Buffer has no complete line, read more bytes
                match stream.next().await {
                    Some(Ok(bytes)) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                    }
                    Some(Err(e)) => {
                        return Some((Err(format!("stream read error: {e}")), (stream, buffer)));
                    }
                    None => {
                        // Stream ended, emit remaining buffer if non-empty
                        if !buffer.trim().is_empty() {
                            let remaining = std::mem::take(&mut buffer);
                            return Some((Ok(remaining), (stream, buffer)));
                        }
                        return None;
                    }
                }
            }
        },
    )
}
