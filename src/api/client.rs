use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ApiError, ServerChoice};

/// Response to `POST /upload_pdf/`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    /// Name the backend stored the file under; later calls reference it.
    pub filename: String,
    /// Short preview of the extracted text, for display only.
    #[serde(default)]
    pub pdf_text: String,
}

#[derive(Debug, Deserialize)]
struct AskResponse {
    answer: AnswerPayload,
}

/// The nested answer object returned by `POST /ask_question/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnswerPayload {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub relevant_chunks: Vec<RelevantChunk>,
}

/// A supporting passage, tagged with the 1-based page it came from.
///
/// Offsets index into the page's extracted text and are absent when the
/// backend could not locate the passage precisely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevantChunk {
    pub text: String,
    pub page: u32,
    #[serde(default)]
    pub start_offset: Option<i64>,
    #[serde(default)]
    pub end_offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SummarizeResponse {
    summary: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    answer: String,
}

#[derive(Debug, Deserialize)]
struct ProbeResponse {
    message: String,
}

/// HTTP client bound to one AskPDF deployment.
///
/// All question-answering happens on the backend; this client only moves
/// bytes and JSON. Endpoints take their parameters as query strings, matching
/// the server's route signatures.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(choice: ServerChoice) -> Self {
        Self::with_base_url(choice.base_url())
    }

    /// Used by tests to point the client at an ephemeral local server.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /test/` liveness probe, run once at startup. Returns the
    /// greeting string the backend answers with.
    pub async fn probe(&self) -> Result<String, ApiError> {
        let url = format!("{}/test/", self.base_url);
        debug!(%url, "probing backend");
        let response = self.http.get(&url).send().await?;
        let response = check_status(response).await?;
        let data: ProbeResponse = response.json().await?;
        Ok(data.message)
    }

    /// `POST /upload_pdf/` with the file as a multipart part named `file`.
    pub async fn upload_pdf(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, ApiError> {
        let url = format!("{}/upload_pdf/", self.base_url);
        debug!(%url, filename, size = bytes.len(), "uploading pdf");
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/pdf")?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self.http.post(&url).multipart(form).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// `POST /ask_question/` against a previously uploaded file.
    pub async fn ask_question(
        &self,
        pdf_filename: &str,
        question: &str,
    ) -> Result<AnswerPayload, ApiError> {
        let url = format!("{}/ask_question/", self.base_url);
        debug!(%url, pdf_filename, "asking question");
        let response = self
            .http
            .post(&url)
            .query(&[("pdf_filename", pdf_filename), ("question", question)])
            .send()
            .await?;
        let response = check_status(response).await?;
        let data: AskResponse = response.json().await?;
        Ok(data.answer)
    }

    /// `POST /summarize/` against a previously uploaded file.
    pub async fn summarize(&self, pdf_filename: &str) -> Result<String, ApiError> {
        let url = format!("{}/summarize/", self.base_url);
        debug!(%url, pdf_filename, "requesting summary");
        let response = self
            .http
            .post(&url)
            .query(&[("pdf_filename", pdf_filename)])
            .send()
            .await?;
        let response = check_status(response).await?;
        let data: SummarizeResponse = response.json().await?;
        Ok(data.summary)
    }

    /// `POST /chat_gemini/`, the alternate-model path. The answer comes back
    /// as a plain string with no supporting chunks.
    pub async fn chat_gemini(
        &self,
        pdf_filename: &str,
        question: &str,
    ) -> Result<String, ApiError> {
        let url = format!("{}/chat_gemini/", self.base_url);
        debug!(%url, pdf_filename, "asking question (gemini)");
        let response = self
            .http
            .post(&url)
            .query(&[("pdf_filename", pdf_filename), ("question", question)])
            .send()
            .await?;
        let response = check_status(response).await?;
        let data: GeminiResponse = response.json().await?;
        Ok(data.answer)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        return Err(ApiError::Api { status, message });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    struct Recorded {
        method: String,
        url: String,
        content_type: Option<String>,
        body: Vec<u8>,
    }

    /// Serves exactly one canned response on an ephemeral port and records
    /// the request it answered.
    fn serve_one(status: u16, body: &'static str) -> (String, mpsc::Receiver<Recorded>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let base_url = format!("http://{addr}");
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            if let Ok(mut request) = server.recv() {
                let mut buf = Vec::new();
                let _ = request.as_reader().read_to_end(&mut buf);
                let content_type = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Content-Type"))
                    .map(|h| h.value.to_string());
                let _ = tx.send(Recorded {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    content_type,
                    body: buf,
                });
                let response = tiny_http::Response::from_string(body)
                    .with_status_code(status)
                    .with_header(
                        "Content-Type: application/json"
                            .parse::<tiny_http::Header>()
                            .unwrap(),
                    );
                let _ = request.respond(response);
            }
        });
        (base_url, rx)
    }

    #[tokio::test]
    async fn probe_returns_greeting() {
        let (base_url, rx) = serve_one(200, r#"{"message": "API is working"}"#);
        let client = BackendClient::with_base_url(base_url);
        let message = client.probe().await.unwrap();
        assert_eq!(message, "API is working");
        let recorded = rx.recv().unwrap();
        assert_eq!(recorded.method, "GET");
        assert_eq!(recorded.url, "/test/");
    }

    #[tokio::test]
    async fn probe_reports_connection_errors() {
        // Nothing listens here; the port comes from a socket we already closed.
        let client = BackendClient::with_base_url("http://127.0.0.1:9");
        let err = client.probe().await.unwrap_err();
        assert!(matches!(err, ApiError::Http(_)));
    }

    #[tokio::test]
    async fn upload_sends_multipart_file_field() {
        let (base_url, rx) = serve_one(
            200,
            r#"{"filename": "paper.pdf", "pdf_text": "Abstract. We study..."}"#,
        );
        let client = BackendClient::with_base_url(base_url);
        let uploaded = client
            .upload_pdf("paper.pdf", b"%PDF-1.4 fake".to_vec())
            .await
            .unwrap();
        assert_eq!(uploaded.filename, "paper.pdf");
        assert_eq!(uploaded.pdf_text, "Abstract. We study...");

        let recorded = rx.recv().unwrap();
        assert_eq!(recorded.method, "POST");
        assert_eq!(recorded.url, "/upload_pdf/");
        let content_type = recorded.content_type.unwrap();
        assert!(
            content_type.starts_with("multipart/form-data; boundary="),
            "got: {content_type}"
        );
        let body = String::from_utf8_lossy(&recorded.body);
        assert!(body.contains(r#"name="file""#));
        assert!(body.contains(r#"filename="paper.pdf""#));
        assert!(body.contains("application/pdf"));
        assert!(body.contains("%PDF-1.4 fake"));
    }

    #[tokio::test]
    async fn ask_question_encodes_query_and_unwraps_nested_answer() {
        let (base_url, rx) = serve_one(
            200,
            r#"{
                "question": "what is this?",
                "answer": {
                    "answer": "A test fixture.",
                    "relevant_chunks": [
                        {"text": "fixture text", "page": 3, "start_offset": 10, "end_offset": 22}
                    ]
                }
            }"#,
        );
        let client = BackendClient::with_base_url(base_url);
        let answer = client
            .ask_question("paper.pdf", "what is this?")
            .await
            .unwrap();
        assert_eq!(answer.answer, "A test fixture.");
        assert_eq!(answer.relevant_chunks.len(), 1);
        assert_eq!(answer.relevant_chunks[0].page, 3);
        assert_eq!(answer.relevant_chunks[0].start_offset, Some(10));

        let recorded = rx.recv().unwrap();
        assert_eq!(recorded.method, "POST");
        assert!(recorded.url.starts_with("/ask_question/?"));
        assert!(recorded.url.contains("pdf_filename=paper.pdf"));
        // Form-urlencoded query: spaces become '+', '?' is percent-escaped.
        assert!(
            recorded.url.contains("question=what+is+this%3F"),
            "got: {}",
            recorded.url
        );
    }

    #[tokio::test]
    async fn ask_question_tolerates_missing_chunks() {
        let (base_url, _rx) = serve_one(200, r#"{"answer": {"answer": "Short."}}"#);
        let client = BackendClient::with_base_url(base_url);
        let answer = client.ask_question("paper.pdf", "hm?").await.unwrap();
        assert_eq!(answer.answer, "Short.");
        assert!(answer.relevant_chunks.is_empty());
    }

    #[tokio::test]
    async fn summarize_returns_summary_only() {
        let (base_url, rx) = serve_one(
            200,
            r#"{"filename": "paper.pdf", "summary": "It is about tests."}"#,
        );
        let client = BackendClient::with_base_url(base_url);
        let summary = client.summarize("paper.pdf").await.unwrap();
        assert_eq!(summary, "It is about tests.");
        let recorded = rx.recv().unwrap();
        assert!(recorded.url.starts_with("/summarize/?"));
        assert!(recorded.url.contains("pdf_filename=paper.pdf"));
    }

    #[tokio::test]
    async fn chat_gemini_answer_is_plain_string() {
        let (base_url, rx) = serve_one(
            200,
            r#"{"question": "hi", "answer": "Gemini says hello."}"#,
        );
        let client = BackendClient::with_base_url(base_url);
        let answer = client.chat_gemini("paper.pdf", "hi").await.unwrap();
        assert_eq!(answer, "Gemini says hello.");
        let recorded = rx.recv().unwrap();
        assert!(recorded.url.starts_with("/chat_gemini/?"));
    }

    #[tokio::test]
    async fn non_success_status_becomes_api_error_with_body() {
        let (base_url, _rx) = serve_one(404, r#"{"message": "PDF file not found"}"#);
        let client = BackendClient::with_base_url(base_url);
        let err = client.ask_question("gone.pdf", "hi").await.unwrap_err();
        match err {
            ApiError::Api { status, message } => {
                assert_eq!(status, 404);
                assert!(message.contains("PDF file not found"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
