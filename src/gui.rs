use std::path::Path;

use serde::Serialize;
use tauri::{Emitter, Manager, State};

use crate::api::ServerChoice;
use crate::chat::{ChatTurn, Excerpt};
use crate::state::{lock, probe_backend, AppState};
use crate::viewer::{Highlight, Rect, ViewerSnapshot};
use crate::{chat, document};

/// What the frontend needs to render the current document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub remote_name: String,
    pub preview_text: String,
    /// Local copy backing the webview's own renderer.
    pub blob_path: String,
}

/// Payload of the `backend-unreachable` startup event.
#[derive(Debug, Clone, Serialize)]
struct BackendUnreachable {
    url: String,
    fallback: String,
}

fn document_info(state: &AppState) -> Option<DocumentInfo> {
    lock(&state.document).as_ref().map(|doc| DocumentInfo {
        remote_name: doc.remote_name.clone(),
        preview_text: doc.preview_text.clone(),
        blob_path: doc.blob_path().display().to_string(),
    })
}

#[tauri::command]
async fn upload_pdf(
    state: State<'_, AppState>,
    path: String,
) -> Result<Option<DocumentInfo>, String> {
    document::upload_pdf(state.inner(), Path::new(&path))
        .await
        .map_err(|e| e.to_string())?;
    Ok(document_info(state.inner()))
}

#[tauri::command]
async fn ask_question(state: State<'_, AppState>, text: String) -> Result<(), String> {
    chat::ask_question(state.inner(), &text)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
async fn summarize(state: State<'_, AppState>) -> Result<(), String> {
    chat::summarize(state.inner())
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
async fn chat_gemini(state: State<'_, AppState>, text: String) -> Result<(), String> {
    chat::chat_gemini(state.inner(), &text)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
fn get_conversation(state: State<'_, AppState>) -> Vec<ChatTurn> {
    lock(&state.session).turns().to_vec()
}

#[tauri::command]
fn get_excerpts(state: State<'_, AppState>) -> Vec<Excerpt> {
    lock(&state.session).excerpts().to_vec()
}

#[tauri::command]
fn get_document(state: State<'_, AppState>) -> Option<DocumentInfo> {
    document_info(state.inner())
}

#[tauri::command]
fn get_viewer(state: State<'_, AppState>) -> ViewerSnapshot {
    lock(&state.viewer).snapshot()
}

#[tauri::command]
fn next_page(state: State<'_, AppState>) -> ViewerSnapshot {
    let mut viewer = lock(&state.viewer);
    viewer.next_page();
    viewer.snapshot()
}

#[tauri::command]
fn prev_page(state: State<'_, AppState>) -> ViewerSnapshot {
    let mut viewer = lock(&state.viewer);
    viewer.prev_page();
    viewer.snapshot()
}

#[tauri::command]
fn go_to_page(state: State<'_, AppState>, page: u32) -> ViewerSnapshot {
    let mut viewer = lock(&state.viewer);
    viewer.go_to_page(page);
    viewer.snapshot()
}

#[tauri::command]
fn zoom_in(state: State<'_, AppState>) -> ViewerSnapshot {
    let mut viewer = lock(&state.viewer);
    viewer.zoom_in();
    viewer.snapshot()
}

#[tauri::command]
fn zoom_out(state: State<'_, AppState>) -> ViewerSnapshot {
    let mut viewer = lock(&state.viewer);
    viewer.zoom_out();
    viewer.snapshot()
}

#[tauri::command]
fn rotate(state: State<'_, AppState>) -> ViewerSnapshot {
    let mut viewer = lock(&state.viewer);
    viewer.rotate();
    viewer.snapshot()
}

#[tauri::command]
fn set_highlights(state: State<'_, AppState>, highlights: Vec<Highlight>) {
    lock(&state.viewer).set_highlights(highlights);
}

#[tauri::command]
fn highlights_for_page(state: State<'_, AppState>, page: u32) -> Vec<Rect> {
    lock(&state.viewer).highlights_for_page(page)
}

#[tauri::command]
fn toggle_panel(state: State<'_, AppState>) -> bool {
    state.toggle_panel()
}

#[tauri::command]
fn switch_server(state: State<'_, AppState>, choice: ServerChoice) -> String {
    state.switch_backend(choice);
    choice.base_url().to_string()
}

#[tauri::command]
fn server_url(state: State<'_, AppState>) -> String {
    state.client().base_url().to_string()
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            app.manage(AppState::new());
            let handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                let state = handle.state::<AppState>();
                if probe_backend(&state).await.is_err() {
                    let _ = handle.emit(
                        "backend-unreachable",
                        BackendUnreachable {
                            url: state.client().base_url().to_string(),
                            fallback: state.server().other().base_url().to_string(),
                        },
                    );
                }
            });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            upload_pdf,
            ask_question,
            summarize,
            chat_gemini,
            get_conversation,
            get_excerpts,
            get_document,
            get_viewer,
            next_page,
            prev_page,
            go_to_page,
            zoom_in,
            zoom_out,
            rotate,
            set_highlights,
            highlights_for_page,
            toggle_panel,
            switch_server,
            server_url,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
