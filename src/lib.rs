//! Client-side core of AskPDF: conversation log, document handling, view
//! state and the HTTP client for the question-answering backend. The
//! terminal UI and the Tauri shell are both thin layers over this crate.

pub mod api;
pub mod chat;
pub mod document;
pub mod state;
pub mod viewer;

#[cfg(feature = "gui")]
mod gui;

#[cfg(feature = "gui")]
pub use gui::run;
