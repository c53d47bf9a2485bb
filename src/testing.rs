//! Fakes shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::acquire::Strategy;
use crate::gemini::TextModel;
use crate::http::{HttpClient, HttpResponse};
use crate::{Error, Result, Transcript, VideoId};

/// HTTP client that replays canned responses in order and records every call.
#[derive(Default)]
pub struct ScriptedHttp {
    responses: Mutex<VecDeque<Result<HttpResponse>>>,
    pub calls: Mutex<Vec<(String, tokio::time::Instant)>>,
}

impl ScriptedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.responses.lock().unwrap().push_back(Ok(HttpResponse {
            status,
            body: body.to_string(),
        }));
        self
    }

    pub fn fail(self, error: Error) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }

    fn next(&self, url: &str) -> Result<HttpResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), tokio::time::Instant::now()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Network(format!("no scripted response for {url}"))))
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn get(&self, url: &str, _headers: &[(&'static str, String)]) -> Result<HttpResponse> {
        self.next(url)
    }

    async fn post_json(
        &self,
        url: &str,
        _headers: &[(&'static str, String)],
        _body: &serde_json::Value,
    ) -> Result<HttpResponse> {
        self.next(url)
    }
}

/// Strategy with a fixed outcome that counts how often it ran.
pub struct FakeStrategy {
    name: &'static str,
    outcome: std::result::Result<String, fn() -> Error>,
    pub calls: AtomicUsize,
}

impl FakeStrategy {
    pub fn succeeding(name: &'static str, text: &str) -> Self {
        FakeStrategy {
            name,
            outcome: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &'static str, error: fn() -> Error) -> Self {
        FakeStrategy {
            name,
            outcome: Err(error),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Strategy for FakeStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn attempt(&self, _video_id: &VideoId) -> Result<Transcript> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Ok(text) => Transcript::accept(text),
            Err(make) => Err(make()),
        }
    }
}

#[async_trait]
impl<S: Strategy + ?Sized> Strategy for std::sync::Arc<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn attempt(&self, video_id: &VideoId) -> Result<Transcript> {
        (**self).attempt(video_id).await
    }
}

/// Model that records prompts and replies from a queue (or echoes a default).
#[derive(Default)]
pub struct RecordingModel {
    replies: Mutex<VecDeque<Result<String>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, error: Error) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextModel for RecordingModel {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("ok".to_string()))
    }
}

#[async_trait]
impl<M: TextModel + ?Sized> TextModel for std::sync::Arc<M> {
    async fn generate(&self, prompt: &str) -> Result<String> {
        (**self).generate(prompt).await
    }
}
