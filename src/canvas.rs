use crate::annotation::Point;
use egui::{Pos2, Rect, Vec2};

const MIN_ZOOM: f32 = 0.05;
const MAX_ZOOM: f32 = 20.0;

/// Pan/zoom view of the open image inside the central panel.
pub struct Canvas {
    width: f32,
    height: f32,
    offset: Vec2,
    zoom: f32,
    /// Set when the image changes; the next frame fits it to the view.
    needs_fit: bool,
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            offset: Vec2::ZERO,
            zoom: 1.0,
            needs_fit: true,
        }
    }

    /// Called whenever a new image is shown.
    pub fn set_image_size(&mut self, width: u32, height: u32) {
        self.width = width as f32;
        self.height = height as f32;
        self.needs_fit = true;
    }

    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    pub fn zoom_at(&mut self, factor: f32, pos: Pos2, view_rect: Rect) {
        let old_zoom = self.zoom;
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);

        let view_center = view_rect.center() + self.offset;
        let mouse_offset = pos - view_center;
        self.offset -= mouse_offset * (self.zoom / old_zoom - 1.0);
    }

    pub fn reset_view(&mut self) {
        self.needs_fit = true;
    }

    /// Centers the image and scales it to fit `view_rect`, if requested.
    pub fn fit_if_needed(&mut self, view_rect: Rect) {
        if !self.needs_fit || self.width <= 0.0 || self.height <= 0.0 {
            return;
        }
        let scale_x = view_rect.width() / self.width;
        let scale_y = view_rect.height() / self.height;
        self.zoom = scale_x.min(scale_y).clamp(MIN_ZOOM, MAX_ZOOM);
        self.offset = Vec2::ZERO;
        self.needs_fit = false;
    }

    pub fn get_zoom(&self) -> f32 {
        self.zoom
    }

    pub fn get_screen_rect(&self, view_rect: Rect) -> Rect {
        let center = view_rect.center() + self.offset;
        let size = Vec2::new(self.width, self.height) * self.zoom;
        Rect::from_center_size(center, size)
    }

    pub fn screen_to_canvas_pos(&self, screen_pos: Pos2, view_rect: Rect) -> Pos2 {
        let screen_rect = self.get_screen_rect(view_rect);
        let normalized_pos = (screen_pos - screen_rect.min) / self.zoom;
        Pos2::new(normalized_pos.x, normalized_pos.y)
    }

    pub fn canvas_to_screen_pos(&self, canvas_pos: Pos2, view_rect: Rect) -> Pos2 {
        let screen_rect = self.get_screen_rect(view_rect);
        screen_rect.min + canvas_pos.to_vec2() * self.zoom
    }

    /// The image pixel under `screen_pos`, or `None` outside the image.
    pub fn screen_to_pixel(&self, screen_pos: Pos2, view_rect: Rect) -> Option<Point> {
        let pos = self.screen_to_canvas_pos(screen_pos, view_rect);
        if pos.x < 0.0 || pos.y < 0.0 || pos.x >= self.width || pos.y >= self.height {
            return None;
        }
        Some(Point::new(pos.x.floor() as i32, pos.y.floor() as i32))
    }

    /// Screen position of the center of pixel `point`.
    pub fn pixel_to_screen(&self, point: Point, view_rect: Rect) -> Pos2 {
        let center = egui::pos2(point.x as f32 + 0.5, point.y as f32 + 0.5);
        self.canvas_to_screen_pos(center, view_rect)
    }
}
