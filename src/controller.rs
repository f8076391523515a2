use crate::annotation::{is_label_file, Point};
use crate::error::{LabelError, Result};
use crate::session::Session;
use std::path::PathBuf;

/// User actions that change which image is open or where labels go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open an image or a label file.
    Open(PathBuf),
    OpenDir(PathBuf),
    Next,
    Prev,
    /// Save the current points and move on to the next image.
    Verify,
    ChangeSaveDir(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    NoImageOpen,
    ImageOpen,
    ImageOpenWithPoints,
}

#[derive(Debug)]
pub enum Outcome {
    /// An image was opened (or re-opened).
    Opened(PathBuf),
    /// A directory was imported; `count` images were found.
    DirectoryLoaded { dir: PathBuf, count: usize },
    SaveDirChanged(PathBuf),
    /// The label file was written. If moving on to the next image then
    /// failed, that error is carried here instead of failing the save.
    Saved {
        file: PathBuf,
        advance_error: Option<LabelError>,
    },
    /// Verify needs a save directory first. Nothing was written.
    SaveDirRequired,
    /// Nothing to do: end of list, or no image open.
    Unchanged,
}

/// Single entry point for every navigation and save action.
pub struct Controller {
    session: Session,
}

impl Controller {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> ControllerState {
        if self.session.current_index().is_none() {
            ControllerState::NoImageOpen
        } else if self.session.points().is_empty() {
            ControllerState::ImageOpen
        } else {
            ControllerState::ImageOpenWithPoints
        }
    }

    pub fn dispatch(&mut self, command: Command) -> Result<Outcome> {
        log::debug!("Dispatching {:?}", command);
        match command {
            Command::Open(path) => {
                if is_label_file(&path) {
                    self.session.open_label_file(&path)?;
                } else {
                    self.session.open_file(&path)?;
                }
                Ok(self.opened())
            }
            Command::OpenDir(dir) => {
                self.session.open_directory(&dir)?;
                Ok(Outcome::DirectoryLoaded {
                    count: self.session.images().len(),
                    dir,
                })
            }
            Command::Next => {
                let moved = self.session.open_next()?;
                Ok(if moved { self.opened() } else { Outcome::Unchanged })
            }
            Command::Prev => {
                let moved = self.session.open_prev()?;
                Ok(if moved { self.opened() } else { Outcome::Unchanged })
            }
            Command::Verify => self.verify(),
            Command::ChangeSaveDir(dir) => {
                self.session.set_save_dir(&dir)?;
                Ok(Outcome::SaveDirChanged(dir))
            }
        }
    }

    /// Canvas click. Ignored when no image is open.
    pub fn add_point(&mut self, point: Point) -> bool {
        self.session.add_point(point)
    }

    pub fn remove_point_near(&mut self, point: Point, radius: f32) -> Option<Point> {
        self.session.remove_point_near(point, radius)
    }

    pub fn reset_points(&mut self) {
        self.session.reset_points();
    }

    fn verify(&mut self) -> Result<Outcome> {
        // Snapshot first: nothing below may observe a half-updated session.
        let Some(record) = self.session.snapshot() else {
            return Ok(Outcome::Unchanged);
        };
        let Some(save_dir) = self.session.save_dir().map(PathBuf::from) else {
            return Ok(Outcome::SaveDirRequired);
        };

        let file = record.write(&save_dir)?;
        self.session.reset_points();
        let advance_error = self.session.open_next().err();
        if let Some(e) = &advance_error {
            log::warn!("Saved {} but could not open the next image: {}", file.display(), e);
        }
        Ok(Outcome::Saved {
            file,
            advance_error,
        })
    }

    fn opened(&self) -> Outcome {
        match self.session.current_path() {
            Some(path) => Outcome::Opened(path.to_path_buf()),
            None => Outcome::Unchanged,
        }
    }
}
