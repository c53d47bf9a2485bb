use log::debug;

use crate::gemini::TextModel;
use crate::normalize::truncate_chars;
use crate::session::ChatMessage;
use crate::{Result, Transcript};

/// Character budgets for transcript text embedded in prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptLimits {
    pub summary_chars: usize,
    pub answer_chars: usize,
    pub history_turns: usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        PromptLimits {
            summary_chars: 15_000,
            answer_chars: 20_000,
            history_turns: 5,
        }
    }
}

pub fn summary_prompt(transcript: &Transcript, limits: &PromptLimits) -> String {
    let text = truncate_chars(transcript.as_str(), limits.summary_chars);
    format!(
        "You are a professional content analyst. Please provide a concise executive summary \
of the following video transcript.

Focus on:
- Main topic and key points
- Important insights or arguments
- Any actionable takeaways

Transcript:
{text}

Please provide a summary in 3-5 paragraphs."
    )
}

pub fn answer_prompt(transcript: &Transcript, question: &str, history: &[ChatMessage], limits: &PromptLimits) -> String {
    let text = truncate_chars(transcript.as_str(), limits.answer_chars);

    let recent = &history[history.len().saturating_sub(limits.history_turns)..];
    let mut context = String::from("Previous conversation:\n");
    for msg in recent {
        context.push_str(&format!("{}: {}\n", msg.role, msg.content));
    }

    format!(
        "You are TubeMind, an AI assistant that helps users understand YouTube video content.

Video Transcript:
{text}

{context}
User Question: {question}

Instructions:
- Answer based ONLY on the information present in the transcript
- Be concise and specific
- If the information is not in the transcript, say so
- Use bullet points for lists when appropriate

Answer:"
    )
}

/// Produce an executive summary of a transcript
pub async fn summarize(model: &dyn TextModel, transcript: &Transcript, limits: &PromptLimits) -> Result<String> {
    debug!("Summarizing transcript ({} chars)", transcript.char_count());
    model.generate(&summary_prompt(transcript, limits)).await
}

/// Answer a question about a transcript given the conversation so far
pub async fn answer(
    model: &dyn TextModel,
    transcript: &Transcript,
    question: &str,
    history: &[ChatMessage],
    limits: &PromptLimits,
) -> Result<String> {
    debug!("Answering question with {} prior messages", history.len());
    model.generate(&answer_prompt(transcript, question, history, limits)).await
}
