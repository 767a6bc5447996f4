use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use crate::api::{ApiError, BackendClient, ServerChoice};
use crate::chat::Session;
use crate::document::DocumentRef;
use crate::viewer::ViewerState;

/// Locks without propagating poisoning, so state stays usable after a
/// panicked handler.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The selected deployment and the client bound to it. Swapped as a unit so
/// the choice and the client base URL can never disagree.
#[derive(Debug, Clone)]
struct Backend {
    choice: ServerChoice,
    client: BackendClient,
}

impl Backend {
    fn new(choice: ServerChoice) -> Self {
        Backend {
            choice,
            client: BackendClient::new(choice),
        }
    }
}

/// Everything the client keeps between user actions. All of it is ephemeral;
/// the only disk artifact is the current document's temp copy, and that goes
/// with its `DocumentRef`.
pub struct AppState {
    pub session: Mutex<Session>,
    pub document: Mutex<Option<DocumentRef>>,
    pub viewer: Mutex<ViewerState>,
    backend: Mutex<Backend>,
    /// Whether the document panel is shown next to the conversation.
    pub panel_open: AtomicBool,
    /// Single in-flight flag shared by ask, summarize and the gemini path.
    pub busy: AtomicBool,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_server(ServerChoice::default())
    }

    pub fn with_server(choice: ServerChoice) -> Self {
        AppState {
            session: Mutex::new(Session::new()),
            document: Mutex::new(None),
            viewer: Mutex::new(ViewerState::new()),
            backend: Mutex::new(Backend::new(choice)),
            panel_open: AtomicBool::new(true),
            busy: AtomicBool::new(false),
        }
    }

    /// Points the client at an arbitrary base URL; used by tests.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let state = Self::new();
        lock(&state.backend).client = BackendClient::with_base_url(base_url);
        state
    }

    /// Snapshot of the current client. Cheap; the underlying HTTP pool is
    /// shared.
    pub fn client(&self) -> BackendClient {
        lock(&self.backend).client.clone()
    }

    pub fn server(&self) -> ServerChoice {
        lock(&self.backend).choice
    }

    /// Re-targets every subsequent call at the given deployment.
    pub fn switch_backend(&self, choice: ServerChoice) {
        *lock(&self.backend) = Backend::new(choice);
        info!(%choice, "switched backend");
    }

    /// Backend-assigned name of the current document, if one is loaded.
    pub fn pdf_name(&self) -> Option<String> {
        lock(&self.document).as_ref().map(|d| d.remote_name.clone())
    }

    pub fn panel_open(&self) -> bool {
        self.panel_open.load(Ordering::SeqCst)
    }

    /// Flips panel visibility and returns the new value.
    pub fn toggle_panel(&self) -> bool {
        !self.panel_open.fetch_xor(true, Ordering::SeqCst)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Startup liveness probe. `Ok` carries the backend's greeting; an error is
/// the cue to offer the user the other deployment.
pub async fn probe_backend(state: &AppState) -> Result<String, ApiError> {
    let client = state.client();
    match client.probe().await {
        Ok(greeting) => {
            info!(url = client.base_url(), "backend reachable");
            Ok(greeting)
        }
        Err(err) => {
            warn!(url = client.base_url(), error = %err, "backend unreachable");
            Err(err)
        }
    }
}
