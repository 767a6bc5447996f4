use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::api::RelevantChunk;
use crate::state::{lock, AppState};

/// Substituted when the backend returns an empty answer string.
pub const NO_ANSWER: &str = "No answer available";
/// Marker line of the excerpts entry that follows an answer with sources.
pub const EXCERPTS_MARKER: &str = "📄 Relevant sections found:";

pub const ASK_FAILED: &str = "Sorry, something went wrong while processing your question.";
pub const SUMMARIZE_FAILED: &str = "Failed to summarize.";
pub const GEMINI_FAILED: &str = "Error in chat process.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Supporting passage attached to an excerpts entry, reduced to what the
/// conversation pane shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Excerpt {
    pub page: u32,
    pub text: String,
}

impl From<RelevantChunk> for Excerpt {
    fn from(chunk: RelevantChunk) -> Self {
        Excerpt {
            page: chunk.page,
            text: chunk.text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    /// Non-empty only on excerpts entries.
    pub excerpts: Vec<Excerpt>,
}

impl ChatTurn {
    fn user(content: impl Into<String>) -> Self {
        ChatTurn {
            id: Uuid::new_v4().to_string(),
            role: ChatRole::User,
            content: content.into(),
            excerpts: Vec::new(),
        }
    }

    fn assistant(content: impl Into<String>) -> Self {
        ChatTurn {
            id: Uuid::new_v4().to_string(),
            role: ChatRole::Assistant,
            content: content.into(),
            excerpts: Vec::new(),
        }
    }

    fn sources(excerpts: Vec<Excerpt>) -> Self {
        ChatTurn {
            id: Uuid::new_v4().to_string(),
            role: ChatRole::Assistant,
            content: EXCERPTS_MARKER.to_string(),
            excerpts,
        }
    }
}

/// Append-only conversation log for the current process.
///
/// Entries are never mutated or reordered once pushed. `excerpts` holds the
/// most recent answer's supporting passages, the source the viewer highlights
/// are derived from.
#[derive(Debug, Default)]
pub struct Session {
    turns: Vec<ChatTurn>,
    excerpts: Vec<Excerpt>,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Supporting passages of the most recent sourced answer.
    pub fn excerpts(&self) -> &[Excerpt] {
        &self.excerpts
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(ChatTurn::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(ChatTurn::assistant(content));
    }

    fn push_excerpts(&mut self, excerpts: Vec<Excerpt>) {
        self.excerpts = excerpts.clone();
        self.turns.push(ChatTurn::sources(excerpts));
    }
}

/// Why a chat action did not run. None of these change any state.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("no PDF has been uploaded yet")]
    NoDocument,
    #[error("question is empty")]
    EmptyQuestion,
    #[error("another request is still in flight")]
    Busy,
}

// Clears the in-flight flag when the request settles, also on panic.
#[derive(Debug)]
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn acquire(busy: &AtomicBool) -> Result<BusyGuard<'_>, ActionError> {
    busy.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .map_err(|_| ActionError::Busy)?;
    Ok(BusyGuard(busy))
}

/// Sends `text` to `/ask_question/` and appends the exchange to the log.
///
/// The user turn goes in before the call; the answer turn (and an excerpts
/// turn when the backend returned sources) after it settles. A failed call
/// appends the fixed fallback line instead, so the outcome is always visible
/// in the conversation.
pub async fn ask_question(state: &AppState, text: &str) -> Result<(), ActionError> {
    let question = text.trim();
    if question.is_empty() {
        return Err(ActionError::EmptyQuestion);
    }
    let pdf_name = state.pdf_name().ok_or(ActionError::NoDocument)?;
    let _busy = acquire(&state.busy)?;

    lock(&state.session).push_user(question);
    let client = state.client();
    let outcome = client.ask_question(&pdf_name, question).await;

    let mut session = lock(&state.session);
    match outcome {
        Ok(answer) => {
            if answer.answer.is_empty() {
                session.push_assistant(NO_ANSWER);
            } else {
                session.push_assistant(answer.answer);
            }
            if !answer.relevant_chunks.is_empty() {
                let excerpts = answer
                    .relevant_chunks
                    .into_iter()
                    .map(Excerpt::from)
                    .collect();
                session.push_excerpts(excerpts);
            }
        }
        Err(err) => {
            warn!(error = %err, "ask_question failed");
            session.push_assistant(ASK_FAILED);
        }
    }
    Ok(())
}

/// Requests a whole-document summary. No user turn is appended; the summary
/// (or the fallback line) is the only new entry.
pub async fn summarize(state: &AppState) -> Result<(), ActionError> {
    let pdf_name = state.pdf_name().ok_or(ActionError::NoDocument)?;
    let _busy = acquire(&state.busy)?;

    let client = state.client();
    let outcome = client.summarize(&pdf_name).await;

    let mut session = lock(&state.session);
    match outcome {
        Ok(summary) => session.push_assistant(summary),
        Err(err) => {
            warn!(error = %err, "summarize failed");
            session.push_assistant(SUMMARIZE_FAILED);
        }
    }
    Ok(())
}

/// Same shape as [`ask_question`] but through `/chat_gemini/`: the answer is
/// a plain string and never carries excerpts.
pub async fn chat_gemini(state: &AppState, text: &str) -> Result<(), ActionError> {
    let question = text.trim();
    if question.is_empty() {
        return Err(ActionError::EmptyQuestion);
    }
    let pdf_name = state.pdf_name().ok_or(ActionError::NoDocument)?;
    let _busy = acquire(&state.busy)?;

    lock(&state.session).push_user(question);
    let client = state.client();
    let outcome = client.chat_gemini(&pdf_name, question).await;

    let mut session = lock(&state.session);
    match outcome {
        Ok(answer) => session.push_assistant(answer),
        Err(err) => {
            warn!(error = %err, "chat_gemini failed");
            session.push_assistant(GEMINI_FAILED);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_appends_in_order_with_unique_ids() {
        let mut session = Session::new();
        session.push_user("hello");
        session.push_assistant("hi");
        session.push_excerpts(vec![Excerpt {
            page: 2,
            text: "source".into(),
        }]);

        let turns = session.turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].role, ChatRole::User);
        assert_eq!(turns[1].role, ChatRole::Assistant);
        assert_eq!(turns[2].content, EXCERPTS_MARKER);
        assert_eq!(turns[2].excerpts.len(), 1);
        assert_ne!(turns[0].id, turns[1].id);
        assert_eq!(session.excerpts(), turns[2].excerpts.as_slice());
    }

    #[test]
    fn excerpt_keeps_page_and_text_from_chunk() {
        let chunk = RelevantChunk {
            text: "passage".into(),
            page: 7,
            start_offset: Some(0),
            end_offset: Some(7),
        };
        let excerpt = Excerpt::from(chunk);
        assert_eq!(excerpt.page, 7);
        assert_eq!(excerpt.text, "passage");
    }

    #[tokio::test]
    async fn blank_question_is_rejected_before_anything_happens() {
        let state = AppState::new();
        let err = ask_question(&state, "   ").await.unwrap_err();
        assert_eq!(err, ActionError::EmptyQuestion);
        assert!(lock(&state.session).is_empty());
    }

    #[tokio::test]
    async fn question_without_document_is_rejected() {
        let state = AppState::new();
        let err = ask_question(&state, "what is this?").await.unwrap_err();
        assert_eq!(err, ActionError::NoDocument);
        let err = summarize(&state).await.unwrap_err();
        assert_eq!(err, ActionError::NoDocument);
        let err = chat_gemini(&state, "hi").await.unwrap_err();
        assert_eq!(err, ActionError::NoDocument);
        assert!(lock(&state.session).is_empty());
    }

    #[test]
    fn busy_flag_blocks_second_acquire_until_released() {
        let busy = AtomicBool::new(false);
        let guard = acquire(&busy).unwrap();
        assert_eq!(acquire(&busy).unwrap_err(), ActionError::Busy);
        drop(guard);
        assert!(acquire(&busy).is_ok());
    }
}
