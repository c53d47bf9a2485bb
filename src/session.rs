use std::collections::HashMap;

use log::{info, warn};
use serde::Serialize;

use crate::acquire::Acquirer;
use crate::gemini::TextModel;
use crate::summarize::{self, PromptLimits};
use crate::{Error, Result, Transcript, VideoId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// State of one interactive user: current video, its summary, the
/// conversation, and every transcript fetched so far.
#[derive(Debug, Default)]
pub struct Session {
    video_id: Option<VideoId>,
    transcript: Option<Transcript>,
    summary: Option<String>,
    history: Vec<ChatMessage>,
    cache: HashMap<VideoId, Transcript>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn video_id(&self) -> Option<&VideoId> {
        self.video_id.as_ref()
    }

    pub fn transcript(&self) -> Option<&Transcript> {
        self.transcript.as_ref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn cached(&self, video_id: &VideoId) -> Option<&Transcript> {
        self.cache.get(video_id)
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Start the conversation over, keeping the current video.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Drop everything, cache included.
    pub fn reset(&mut self) {
        *self = Session::default();
    }

    /// Make `video_id` current; a different video starts a fresh conversation.
    fn load(&mut self, video_id: VideoId, transcript: Transcript) {
        if self.video_id.as_ref() != Some(&video_id) {
            self.summary = None;
        }
        self.video_id = Some(video_id);
        self.transcript = Some(transcript);
        self.history.clear();
    }

    fn push(&mut self, role: Role, content: String) {
        self.history.push(ChatMessage { role, content });
    }
}

/// Result of loading a video into a session.
#[derive(Debug)]
pub struct Processed {
    pub video_id: VideoId,
    pub from_cache: bool,
    /// Set when the transcript loaded but summarizing it failed.
    pub summary_error: Option<Error>,
}

/// Binds acquisition and the model together and drives a [`Session`].
pub struct Assistant {
    acquirer: Acquirer,
    model: Box<dyn TextModel>,
    limits: PromptLimits,
}

impl Assistant {
    pub fn new(acquirer: Acquirer, model: Box<dyn TextModel>, limits: PromptLimits) -> Self {
        Assistant {
            acquirer,
            model,
            limits,
        }
    }

    /// Load the video behind `url` into the session and summarize it.
    ///
    /// Acquisition failures leave the session untouched.
    pub async fn process(&self, session: &mut Session, url: &str) -> Result<Processed> {
        let video_id = VideoId::parse(url)?;

        let (transcript, from_cache) = match session.cached(&video_id) {
            Some(t) => {
                info!("Loading transcript for {video_id} from session cache");
                (t.clone(), true)
            }
            None => {
                let t = self.acquirer.acquire(&video_id).await?;
                session.cache.insert(video_id.clone(), t.clone());
                (t, false)
            }
        };

        session.load(video_id.clone(), transcript);

        let mut summary_error = None;
        if session.summary.is_none() {
            let transcript = session.transcript.as_ref().ok_or(Error::NoTranscript)?;
            match summarize::summarize(self.model.as_ref(), transcript, &self.limits).await {
                Ok(summary) => session.summary = Some(summary),
                Err(e) => {
                    warn!("Summary failed for {video_id}: {e}");
                    summary_error = Some(e);
                }
            }
        }

        Ok(Processed {
            video_id,
            from_cache,
            summary_error,
        })
    }

    /// Answer a question about the current video and record the exchange.
    pub async fn ask(&self, session: &mut Session, question: &str) -> Result<String> {
        let transcript = session.transcript.as_ref().ok_or(Error::NoTranscript)?;
        let answer = summarize::answer(self.model.as_ref(), transcript, question, &session.history, &self.limits).await?;

        session.push(Role::User, question.to_string());
        session.push(Role::Assistant, answer.clone());
        Ok(answer)
    }
}
