//! HTTP client for the generation backend.
//!
//! Structured endpoints answer JSON and may declare failure in-band with
//! `{"status": "error", "message": ...}`. The binary endpoints (visual,
//! audio) have no structured error channel; success is decided by the
//! transport status alone.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::{Architecture, CodeSample, Difficulty, QuizQuestion, TextLesson, Voice};

/// The backend truncates narration input to this many characters; clip
/// client-side so the request body stays small.
const SPEECH_TEXT_LIMIT: usize = 2000;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Failure declared by the backend in the response body.
    #[error("{0}")]
    Api(String),
    /// Network or transport failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Response body did not match the expected shape.
    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
    /// Non-success HTTP status from a binary endpoint.
    #[error("server returned {0}")]
    Status(StatusCode),
}

pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
    ) -> Result<T, ClientError> {
        debug!(path, "sending generation request");
        let response = self.http.post(self.url(path)).json(&body).send().await?;
        let value: Value = response.json().await?;
        declared_error(&value)?;
        Ok(serde_json::from_value(value)?)
    }

    async fn post_bytes(&self, path: &str, body: Value) -> Result<Vec<u8>, ClientError> {
        debug!(path, "sending binary generation request");
        let response = self.http.post(self.url(path)).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Lesson text for a topic.
    pub async fn generate_text(
        &self,
        topic: &str,
        difficulty: Difficulty,
    ) -> Result<TextLesson, ClientError> {
        self.post_json(
            "/generate/text",
            json!({ "topic": topic, "difficulty": difficulty.as_str() }),
        )
        .await
    }

    /// Code sample for a topic.
    pub async fn generate_code(
        &self,
        topic: &str,
        difficulty: Difficulty,
    ) -> Result<CodeSample, ClientError> {
        self.post_json(
            "/generate/code",
            json!({ "topic": topic, "difficulty": difficulty.as_str() }),
        )
        .await
    }

    /// Full learning architecture: analytics, graph, roadmap, seed quiz.
    pub async fn generate_architecture(
        &self,
        topic: &str,
        difficulty: Difficulty,
    ) -> Result<Architecture, ClientError> {
        self.post_json(
            "/generate/architecture",
            json!({ "topic": topic, "difficulty": difficulty.as_str() }),
        )
        .await
    }

    /// A fresh batch of quiz questions, appended to the queue by the caller.
    pub async fn generate_quiz(
        &self,
        topic: &str,
        difficulty: Difficulty,
    ) -> Result<Vec<QuizQuestion>, ClientError> {
        #[derive(Deserialize)]
        struct QuizBatch {
            #[serde(default)]
            questions: Vec<QuizQuestion>,
        }
        let batch: QuizBatch = self
            .post_json(
                "/generate/quiz",
                json!({ "topic": topic, "difficulty": difficulty.as_str() }),
            )
            .await?;
        Ok(batch.questions)
    }

    /// Diagram image bytes (PNG or JPEG).
    pub async fn generate_visual(&self, topic: &str) -> Result<Vec<u8>, ClientError> {
        self.post_bytes("/generate/visual", json!({ "topic": topic }))
            .await
    }

    /// Narrated audio bytes (MP3) for the given lesson text.
    pub async fn generate_audio(&self, text: &str, voice: Voice) -> Result<Vec<u8>, ClientError> {
        let clipped = clip_for_speech(text);
        self.post_bytes(
            "/generate/audio",
            json!({ "text": clipped, "voice": voice.as_str() }),
        )
        .await
    }

    /// Resolve a video search query to an embeddable video id.
    pub async fn resolve_video(&self, query: &str) -> Result<String, ClientError> {
        #[derive(Deserialize)]
        struct VideoLookup {
            #[serde(default)]
            video_id: Option<String>,
        }
        let lookup: VideoLookup = self
            .post_json("/get_video", json!({ "query": query }))
            .await?;
        lookup
            .video_id
            .ok_or_else(|| ClientError::Api("no video id in response".to_string()))
    }

    /// One stateless tutor chat exchange.
    pub async fn chat(&self, message: &str, topic: &str) -> Result<String, ClientError> {
        #[derive(Deserialize)]
        struct ChatReply {
            response: String,
        }
        let reply: ChatReply = self
            .post_json("/chat", json!({ "message": message, "topic": topic }))
            .await?;
        Ok(reply.response)
    }
}

fn declared_error(value: &Value) -> Result<(), ClientError> {
    if value.get("status").and_then(Value::as_str) == Some("error") {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown backend error");
        return Err(ClientError::Api(message.to_string()));
    }
    Ok(())
}

fn clip_for_speech(text: &str) -> String {
    text.chars().take(SPEECH_TEXT_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_error_is_detected() {
        let body = json!({ "status": "error", "message": "rate limited" });
        match declared_error(&body) {
            Err(ClientError::Api(msg)) => assert_eq!(msg, "rate limited"),
            other => panic!("expected Api error, got {:?}", other.err()),
        }
    }

    #[test]
    fn declared_error_without_message_uses_fallback() {
        let body = json!({ "status": "error" });
        match declared_error(&body) {
            Err(ClientError::Api(msg)) => assert_eq!(msg, "unknown backend error"),
            other => panic!("expected Api error, got {:?}", other.err()),
        }
    }

    #[test]
    fn success_and_absent_status_pass_through() {
        assert!(declared_error(&json!({ "status": "success", "content": "x" })).is_ok());
        assert!(declared_error(&json!({ "content": "x" })).is_ok());
    }

    #[test]
    fn speech_text_is_clipped_on_char_boundary() {
        let long: String = "é".repeat(SPEECH_TEXT_LIMIT + 50);
        let clipped = clip_for_speech(&long);
        assert_eq!(clipped.chars().count(), SPEECH_TEXT_LIMIT);

        let short = "hello";
        assert_eq!(clip_for_speech(short), "hello");
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = ApiClient::new("http://localhost:5001/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.url("/chat"), "http://localhost:5001/chat");
    }
}
