pub mod client;

pub use client::{AnswerPayload, BackendClient, RelevantChunk, UploadResponse};

use serde::{Deserialize, Serialize};

/// The two fixed AskPDF deployments the client can target.
///
/// The local backend is the default; the hosted one is offered as a fallback
/// when the startup probe finds the local one unreachable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ServerChoice {
    #[default]
    Local,
    Hosted,
}

impl ServerChoice {
    pub fn base_url(self) -> &'static str {
        match self {
            ServerChoice::Local => "http://127.0.0.1:8000",
            ServerChoice::Hosted => "https://askpdf-aj8j.onrender.com",
        }
    }

    /// The other of the two options.
    pub fn other(self) -> Self {
        match self {
            ServerChoice::Local => ServerChoice::Hosted,
            ServerChoice::Hosted => ServerChoice::Local,
        }
    }
}

impl std::fmt::Display for ServerChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerChoice::Local => write!(f, "local"),
            ServerChoice::Hosted => write!(f, "hosted"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

impl Serialize for ApiError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_choice_pairs_up() {
        assert_eq!(ServerChoice::Local.other(), ServerChoice::Hosted);
        assert_eq!(ServerChoice::Hosted.other(), ServerChoice::Local);
        assert_eq!(ServerChoice::default(), ServerChoice::Local);
    }

    #[test]
    fn base_urls_are_the_two_fixed_deployments() {
        assert_eq!(ServerChoice::Local.base_url(), "http://127.0.0.1:8000");
        assert!(ServerChoice::Hosted.base_url().starts_with("https://"));
    }

    #[test]
    fn api_error_display_carries_status_and_body() {
        let err = ApiError::Api {
            status: 404,
            message: r#"{"message": "PDF file not found"}"#.into(),
        };
        let text = err.to_string();
        assert!(text.contains("404"), "got: {text}");
        assert!(text.contains("PDF file not found"));
    }
}
