use crate::annotation::{Point, LABEL_EXTENSION};
use crate::canvas::Canvas;
use crate::config::{CliArgs, Settings};
use crate::controller::{Command, Controller, ControllerState, Outcome};
use crate::error::LabelError;
use crate::scanner;
use crate::session::Session;
use crate::ui::{UiState, STATUS_TIMEOUT};
use clipboard::ClipboardContext;
use clipboard::ClipboardProvider;
use egui::{Color32, Context, Stroke, TextureHandle, Ui};
use egui_extras::{Column, TableBuilder};
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "Point Labeler";

/// Screen-space distance within which a right click deletes a point.
const REMOVE_RADIUS: f32 = 10.0;

pub struct LabelApp {
    controller: Controller,
    canvas: Canvas,
    ui_state: UiState,
    texture: Option<TextureHandle>,
    texture_generation: u64,
    clipboard: Option<ClipboardContext>,
    settings: Settings,
    window_title: String,
    scroll_to_current: bool,
}

impl LabelApp {
    pub fn new(cc: &eframe::CreationContext<'_>, args: CliArgs, settings: Settings) -> Self {
        let mut style = (*cc.egui_ctx.style()).clone();
        style.spacing.item_spacing = egui::vec2(10.0, 8.0);
        cc.egui_ctx.set_style(style);

        let mut session = Session::new(scanner::supported_extensions());
        session.set_last_open_dir(settings.last_open_dir.clone());
        session.set_recent_files(settings.recent_files.clone());

        let mut app = Self {
            controller: Controller::new(session),
            canvas: Canvas::new(),
            ui_state: UiState::default(),
            texture: None,
            texture_generation: 0,
            clipboard: ClipboardProvider::new().ok(),
            settings,
            window_title: String::new(),
            scroll_to_current: false,
        };

        // A save directory on the command line wins over the remembered one.
        let save_dir = args.save_dir.or_else(|| app.settings.save_dir.clone());
        if let Some(dir) = save_dir {
            app.run(Command::ChangeSaveDir(dir));
        }
        if let Some(initial) = args.initial {
            if initial.is_dir() {
                app.run(Command::OpenDir(initial));
            } else {
                app.run(Command::Open(initial));
            }
        }

        app
    }

    /// Dispatches a command and reports the result to the user.
    fn run(&mut self, command: Command) {
        match self.controller.dispatch(command) {
            Ok(outcome) => self.handle_outcome(outcome),
            Err(e) => self.show_error(&e),
        }
        self.persist_settings();
    }

    fn handle_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Opened(path) => {
                self.ui_state.set_status(format!("Loaded {}", file_name(&path)));
                self.scroll_to_current = true;
            }
            Outcome::DirectoryLoaded { dir, count } => {
                self.ui_state
                    .set_status(format!("Found {} images in {}", count, dir.display()));
                self.scroll_to_current = true;
            }
            Outcome::SaveDirChanged(dir) => {
                self.ui_state.set_status(format!(
                    "Change saved folder. Annotation will be saved to {}",
                    dir.display()
                ));
            }
            Outcome::Saved {
                file,
                advance_error,
            } => {
                self.ui_state.set_status(format!("Saved {}", file.display()));
                self.scroll_to_current = true;
                if let Some(e) = advance_error {
                    self.show_error(&e);
                }
            }
            Outcome::SaveDirRequired => {
                // Cancelling the prompt cancels the save.
                match self.pick_save_dir() {
                    Some(dir) => {
                        self.run(Command::ChangeSaveDir(dir));
                        if self.controller.session().save_dir().is_some() {
                            self.run(Command::Verify);
                        }
                    }
                    None => self.ui_state.set_status("Save cancelled: no save directory"),
                }
            }
            Outcome::Unchanged => {}
        }
    }

    fn show_error(&mut self, error: &LabelError) {
        log::error!("{}", error);
        self.ui_state.set_status(format!("Error: {}", error));
        rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Error)
            .set_title(error.title())
            .set_description(&error.to_string())
            .set_buttons(rfd::MessageButtons::Ok)
            .show();
    }

    fn persist_settings(&mut self) {
        let session = self.controller.session();
        let settings = Settings {
            save_dir: session.save_dir().map(Path::to_path_buf),
            last_open_dir: session.last_open_dir().map(Path::to_path_buf),
            recent_files: session.recent_files().to_vec(),
        };
        if settings != self.settings {
            settings.save();
            self.settings = settings;
        }
    }

    fn current_dir(&self) -> PathBuf {
        self.controller
            .session()
            .current_path()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn pick_file(&self) -> Option<PathBuf> {
        let mut extensions = self.controller.session().extensions().to_vec();
        extensions.push(LABEL_EXTENSION);
        rfd::FileDialog::new()
            .set_title(&format!("{} - Choose Image or Label file", APP_NAME))
            .set_directory(self.current_dir())
            .add_filter("Image & Label files", &extensions)
            .pick_file()
    }

    fn pick_dir(&self) -> Option<PathBuf> {
        let start = self
            .controller
            .session()
            .last_open_dir()
            .filter(|dir| dir.exists())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.current_dir());
        rfd::FileDialog::new()
            .set_title(&format!("{} - Open Directory", APP_NAME))
            .set_directory(start)
            .pick_folder()
    }

    fn pick_save_dir(&self) -> Option<PathBuf> {
        let start = self
            .controller
            .session()
            .save_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        rfd::FileDialog::new()
            .set_title(&format!("{} - Save text to the directory", APP_NAME))
            .set_directory(start)
            .pick_folder()
    }

    pub fn copy_to_clipboard(&mut self, text: String) -> bool {
        if let Some(clipboard) = &mut self.clipboard {
            clipboard.set_contents(text).is_ok()
        } else {
            false
        }
    }

    /// Uploads the open image as a texture when it changed since the last frame.
    fn sync_texture(&mut self, ctx: &Context) {
        let session = self.controller.session();
        if session.generation() == self.texture_generation {
            return;
        }
        self.texture_generation = session.generation();
        self.texture = session.current_image().map(|pixels| {
            self.canvas.set_image_size(pixels.width(), pixels.height());
            let size = [pixels.width() as usize, pixels.height() as usize];
            let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_raw());
            ctx.load_texture("current_image", color_image, egui::TextureOptions::LINEAR)
        });
    }

    fn sync_window_title(&mut self, frame: &mut eframe::Frame) {
        let title = match self.controller.session().current_path() {
            Some(path) => format!("{} {}", APP_NAME, path.display()),
            None => APP_NAME.to_string(),
        };
        if title != self.window_title {
            frame.set_window_title(&title);
            self.window_title = title;
        }
    }

    // Mouse interaction with the image
    fn handle_canvas_interactions(&mut self, ui: &mut Ui, response: egui::Response) {
        let view_rect = response.rect;

        if response.dragged_by(egui::PointerButton::Middle)
            || (response.dragged_by(egui::PointerButton::Primary) && ui.input(|i| i.modifiers.alt))
        {
            self.canvas.pan(response.drag_delta());
        }

        if response.hovered() {
            let scroll_delta = ui.input(|i| i.scroll_delta.y);
            if scroll_delta != 0.0 {
                let zoom_factor = if scroll_delta > 0.0 { 1.1 } else { 1.0 / 1.1 };
                if let Some(pos) = ui.input(|i| i.pointer.hover_pos()) {
                    self.canvas.zoom_at(zoom_factor, pos, view_rect);
                }
            }
        }

        if self.texture.is_none() {
            self.ui_state.cursor_pixel = None;
            return;
        }

        self.ui_state.cursor_pixel = response
            .hover_pos()
            .and_then(|pos| self.canvas.screen_to_pixel(pos, view_rect));

        let alt_held = ui.input(|i| i.modifiers.alt);
        if response.clicked() && !alt_held {
            if let Some(point) = self.ui_state.cursor_pixel {
                self.controller.add_point(point);
            }
        }

        if response.secondary_clicked() {
            if let Some(point) = self.ui_state.cursor_pixel {
                let radius = REMOVE_RADIUS / self.canvas.get_zoom();
                self.controller.remove_point_near(point, radius);
            }
        }
    }

    fn draw_canvas(&mut self, ui: &mut Ui) -> egui::Response {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());
        let view_rect = response.rect;
        let bg_color = if self.ui_state.dark_mode {
            Color32::from_rgb(20, 20, 20)
        } else {
            Color32::from_rgb(240, 240, 240)
        };
        painter.rect_filled(view_rect, 0.0, bg_color);

        let Some(texture) = &self.texture else {
            painter.text(
                view_rect.center(),
                egui::Align2::CENTER_CENTER,
                "Open an image or a directory to start labelling",
                egui::FontId::proportional(18.0),
                Color32::GRAY,
            );
            return response;
        };

        self.canvas.fit_if_needed(view_rect);
        let image_rect = self.canvas.get_screen_rect(view_rect);
        let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
        painter.image(texture.id(), image_rect, uv, Color32::WHITE);

        let text_color = if self.ui_state.dark_mode {
            Color32::WHITE
        } else {
            Color32::BLACK
        };
        for (i, point) in self.controller.session().points().iter().enumerate() {
            let screen_pos = self.canvas.pixel_to_screen(*point, view_rect);
            painter.circle_filled(screen_pos, 4.0, self.ui_state.marker_color);
            painter.circle_stroke(screen_pos, 4.0, Stroke::new(1.0, Color32::BLACK));
            if self.ui_state.show_point_numbers {
                painter.text(
                    screen_pos + egui::vec2(8.0, 0.0),
                    egui::Align2::LEFT_CENTER,
                    format!("{}", i + 1),
                    egui::FontId::default(),
                    text_color,
                );
            }
        }

        if let Some(mouse_pos) = response.hover_pos() {
            if image_rect.contains(mouse_pos) {
                let crosshair_color = Color32::from_rgb(255, 0, 0);
                let crosshair_size = 10.0;
                painter.line_segment(
                    [
                        egui::pos2(mouse_pos.x - crosshair_size, mouse_pos.y),
                        egui::pos2(mouse_pos.x + crosshair_size, mouse_pos.y),
                    ],
                    Stroke::new(1.0, crosshair_color),
                );
                painter.line_segment(
                    [
                        egui::pos2(mouse_pos.x, mouse_pos.y - crosshair_size),
                        egui::pos2(mouse_pos.x, mouse_pos.y + crosshair_size),
                    ],
                    Stroke::new(1.0, crosshair_color),
                );
            }
        }

        response
    }

    fn points_table(&self, ui: &mut Ui) {
        let points: Vec<Point> = self.controller.session().points().to_vec();
        TableBuilder::new(ui)
            .striped(true)
            .vscroll(false)
            .column(Column::exact(30.0))
            .column(Column::remainder())
            .column(Column::remainder())
            .header(20.0, |mut header| {
                header.col(|ui| {
                    ui.strong("#");
                });
                header.col(|ui| {
                    ui.strong("x");
                });
                header.col(|ui| {
                    ui.strong("y");
                });
            })
            .body(|mut body| {
                for (i, point) in points.iter().enumerate() {
                    body.row(18.0, |mut row| {
                        row.col(|ui| {
                            ui.label(format!("{}", i + 1));
                        });
                        row.col(|ui| {
                            ui.label(point.x.to_string());
                        });
                        row.col(|ui| {
                            ui.label(point.y.to_string());
                        });
                    });
                }
            });
    }
}

impl eframe::App for LabelApp {
    fn update(&mut self, ctx: &Context, frame: &mut eframe::Frame) {
        let mut style = (*ctx.style()).clone();
        if self.ui_state.dark_mode {
            style.visuals = egui::Visuals::dark();
        } else {
            style.visuals = egui::Visuals::light();
        }
        ctx.set_style(style);

        self.sync_texture(ctx);
        self.sync_window_title(frame);

        let mut pending: Option<Command> = None;

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(APP_NAME);
                ui.separator();
                if ui.button("Open").on_hover_text("Open image or label file").clicked() {
                    pending = self.pick_file().map(Command::Open);
                }
                if ui.button("Open Dir").clicked() {
                    pending = self.pick_dir().map(Command::OpenDir);
                }
                if ui
                    .button("Change Save Dir")
                    .on_hover_text("Change default saved annotation dir")
                    .clicked()
                {
                    pending = self.pick_save_dir().map(Command::ChangeSaveDir);
                }
                ui.separator();
                let state = self.controller.state();
                let image_open = state != ControllerState::NoImageOpen;
                if ui.add_enabled(image_open, egui::Button::new("Prev Image")).clicked() {
                    pending = Some(Command::Prev);
                }
                if ui.button("Next Image").clicked() {
                    pending = Some(Command::Next);
                }
                if ui
                    .add_enabled(image_open, egui::Button::new("Verify Image"))
                    .on_hover_text("Save points and open next")
                    .clicked()
                {
                    pending = Some(Command::Verify);
                }
                ui.separator();
                if ui.button("Fit View").clicked() {
                    self.canvas.reset_view();
                }
                let zoom_percentage = (self.canvas.get_zoom() * 100.0) as i32;
                ui.label(format!("Zoom: {}%", zoom_percentage));
            });
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(self.ui_state.status().unwrap_or(""));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if let Some(point) = self.ui_state.cursor_pixel {
                        ui.label(format!("X: {}; Y: {}", point.x, point.y));
                    }
                });
            });
        });

        egui::SidePanel::right("files_panel")
            .resizable(true)
            .default_width(280.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().id_source("side").show(ui, |ui| {
                    ui.heading("Save Dir");
                    match self.controller.session().save_dir() {
                        Some(dir) => ui.label(dir.display().to_string()),
                        None => ui.weak("Not set, you will be asked on save"),
                    };
                    ui.separator();

                    ui.heading("Points");
                    ui.horizontal(|ui| {
                        let has_points =
                            self.controller.state() == ControllerState::ImageOpenWithPoints;
                        if ui
                            .add_enabled(has_points, egui::Button::new("Reset Points"))
                            .clicked()
                        {
                            self.controller.reset_points();
                        }
                        if ui.button("Copy Line").clicked() {
                            if let Some(record) = self.controller.session().snapshot() {
                                self.copy_to_clipboard(record.to_string());
                            }
                        }
                    });
                    if self.controller.session().points().is_empty() {
                        ui.weak("Click on the image to add points");
                    } else {
                        ui.push_id("points_table", |ui| self.points_table(ui));
                    }
                    ui.separator();

                    ui.heading("File List");
                    let session = self.controller.session();
                    let current = session.current_index();
                    let mut activated: Option<PathBuf> = None;
                    egui::ScrollArea::vertical()
                        .id_source("file_list")
                        .max_height(300.0)
                        .show(ui, |ui| {
                            for (i, path) in session.images().iter().enumerate() {
                                let selected = current == Some(i);
                                let response =
                                    ui.selectable_label(selected, path.display().to_string());
                                if selected && self.scroll_to_current {
                                    response.scroll_to_me(Some(egui::Align::Center));
                                }
                                if response.clicked() && !selected {
                                    activated = Some(path.clone());
                                }
                            }
                        });
                    self.scroll_to_current = false;
                    if let Some(path) = activated {
                        pending = Some(Command::Open(path));
                    }

                    ui.collapsing("Recent Files", |ui| {
                        for path in self.controller.session().recent_files() {
                            if ui.link(file_name(path)).on_hover_text(path.display().to_string()).clicked() {
                                pending = Some(Command::Open(path.clone()));
                            }
                        }
                    });

                    ui.collapsing("Appearance", |ui| {
                        ui.checkbox(&mut self.ui_state.dark_mode, "Dark Mode");
                        ui.checkbox(&mut self.ui_state.show_point_numbers, "Number points");
                        ui.horizontal(|ui| {
                            ui.label("Marker Color:");
                            egui::color_picker::color_edit_button_srgba(
                                ui,
                                &mut self.ui_state.marker_color,
                                egui::color_picker::Alpha::Opaque,
                            );
                        });
                    });

                    ui.collapsing("Help", |ui| {
                        ui.label("• Click on the image to place a point");
                        ui.label("• Right-click to remove the point under the cursor");
                        ui.label("• 'Verify Image' saves <name>.txt to the save dir and opens the next image");
                        ui.label("• Middle-click or Alt+drag to pan");
                        ui.label("• Scroll to zoom in/out");
                    });
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            let response = self.draw_canvas(ui);
            self.handle_canvas_interactions(ui, response);
        });

        if let Some(command) = pending {
            self.run(command);
        }

        if self.ui_state.status().is_some() {
            ctx.request_repaint_after(STATUS_TIMEOUT);
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
