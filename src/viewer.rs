use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 2.0;
pub const ZOOM_STEP: f32 = 0.1;

/// Message recorded when the local preview parse fails.
pub const LOAD_ERROR: &str = "Failed to load PDF. Please check the file and try again.";

/// An unscaled highlight region on a page, in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    fn scaled(self, factor: f32) -> Rect {
        Rect {
            top: self.top * factor,
            left: self.left * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Highlight {
    /// 1-based page the region belongs to.
    pub page: u32,
    pub rect: Rect,
}

#[derive(Debug, Clone)]
enum PaneContent {
    Empty,
    Loaded { pages: Vec<String> },
    Failed { message: String },
}

/// View state for the document pane: current page, zoom, rotation and
/// highlight overlays. Holds no network handles; every operation is a pure
/// state transition, and page and zoom stay clamped to their ranges no
/// matter the call sequence.
#[derive(Debug, Clone)]
pub struct ViewerState {
    content: PaneContent,
    page: u32,
    zoom: f32,
    rotation: u16,
    highlights: Vec<Highlight>,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable snapshot of the pane, shaped for display.
#[derive(Debug, Clone, Serialize)]
pub struct ViewerSnapshot {
    pub page: u32,
    pub page_count: u32,
    pub zoom: f32,
    pub rotation: u16,
    pub error: Option<String>,
    pub page_text: Option<String>,
    pub highlights: Vec<Highlight>,
}

impl ViewerState {
    pub fn new() -> Self {
        ViewerState {
            content: PaneContent::Empty,
            page: 1,
            zoom: 1.0,
            rotation: 0,
            highlights: Vec::new(),
        }
    }

    /// Installs the per-page preview text and jumps back to page 1. Zoom and
    /// rotation are view preferences and survive a reload.
    pub fn load(&mut self, pages: Vec<String>) {
        self.content = PaneContent::Loaded { pages };
        self.page = 1;
        self.highlights.clear();
    }

    /// Records a preview load error; the pane shows the message instead of a
    /// page.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.content = PaneContent::Failed {
            message: message.into(),
        };
        self.page = 1;
        self.highlights.clear();
    }

    /// Empties the pane, as when an upload is rolled back.
    pub fn clear(&mut self) {
        self.content = PaneContent::Empty;
        self.page = 1;
        self.highlights.clear();
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.content, PaneContent::Loaded { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match &self.content {
            PaneContent::Failed { message } => Some(message),
            _ => None,
        }
    }

    pub fn page_count(&self) -> u32 {
        match &self.content {
            PaneContent::Loaded { pages } => pages.len() as u32,
            _ => 0,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// Preview text of the current page, when a document is loaded.
    pub fn page_text(&self) -> Option<&str> {
        match &self.content {
            PaneContent::Loaded { pages } => {
                pages.get(self.page as usize - 1).map(String::as_str)
            }
            _ => None,
        }
    }

    pub fn next_page(&mut self) {
        self.go_to_page(self.page + 1);
    }

    pub fn prev_page(&mut self) {
        self.go_to_page(self.page.saturating_sub(1));
    }

    pub fn go_to_page(&mut self, target: u32) {
        let count = self.page_count();
        if count == 0 {
            return;
        }
        self.page = target.clamp(1, count);
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn zoom_in(&mut self) {
        self.step_zoom(1);
    }

    pub fn zoom_out(&mut self) {
        self.step_zoom(-1);
    }

    // Work in tenths so repeated steps land on exact boundaries instead of
    // accumulating float drift.
    fn step_zoom(&mut self, direction: i32) {
        let tenths = (self.zoom * 10.0).round() as i32 + direction;
        let clamped = tenths.clamp((MIN_ZOOM * 10.0) as i32, (MAX_ZOOM * 10.0) as i32);
        self.zoom = clamped as f32 / 10.0;
    }

    pub fn rotation(&self) -> u16 {
        self.rotation
    }

    pub fn rotate(&mut self) {
        self.rotation = (self.rotation + 90) % 360;
    }

    /// Replaces the highlight overlays, usually from the latest answer's
    /// excerpt regions.
    pub fn set_highlights(&mut self, highlights: Vec<Highlight>) {
        self.highlights = highlights;
    }

    /// Regions on `page`, scaled by the current zoom so they overlay the
    /// rendered page directly.
    pub fn highlights_for_page(&self, page: u32) -> Vec<Rect> {
        self.highlights
            .iter()
            .filter(|h| h.page == page)
            .map(|h| h.rect.scaled(self.zoom))
            .collect()
    }

    pub fn snapshot(&self) -> ViewerSnapshot {
        ViewerSnapshot {
            page: self.page,
            page_count: self.page_count(),
            zoom: self.zoom,
            rotation: self.rotation,
            error: self.error().map(str::to_string),
            page_text: self.page_text().map(str::to_string),
            highlights: self.highlights.clone(),
        }
    }
}
