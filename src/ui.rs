use crate::annotation::Point;
use egui::Color32;
use std::time::{Duration, Instant};

pub const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Transient view state that never leaves the window.
pub struct UiState {
    // Appearance
    pub dark_mode: bool,
    pub marker_color: Color32,
    pub show_point_numbers: bool,

    // Pixel under the cursor, for the status bar
    pub cursor_pixel: Option<Point>,

    status: Option<(String, Instant)>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            dark_mode: true,
            marker_color: Color32::from_rgb(0, 255, 0),
            show_point_numbers: true,
            cursor_pixel: None,
            status: None,
        }
    }
}

impl UiState {
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some((message.into(), Instant::now()));
    }

    /// The current status message, if it has not expired yet.
    pub fn status(&self) -> Option<&str> {
        self.status
            .as_ref()
            .filter(|(_, at)| at.elapsed() < STATUS_TIMEOUT)
            .map(|(message, _)| message.as_str())
    }
}
