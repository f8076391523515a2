use crate::error::{LabelError, Result};
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const LABEL_EXTENSION: &str = "txt";

/// A clicked pixel in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// The persisted labels of one image: `<filename> <x1> <y1> ... <xn> <yn>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationRecord {
    pub filename: String,
    pub points: Vec<Point>,
}

impl AnnotationRecord {
    pub fn new(filename: impl Into<String>, points: Vec<Point>) -> Self {
        Self {
            filename: filename.into(),
            points,
        }
    }

    /// Name of the label file: everything before the first `.` of the image
    /// filename, plus `.txt`. `a.b.png` becomes `a.txt`.
    pub fn label_file_name(&self) -> String {
        let stem = self.filename.split('.').next().unwrap_or_default();
        format!("{stem}.{LABEL_EXTENSION}")
    }

    pub fn target_path(&self, save_dir: &Path) -> PathBuf {
        save_dir.join(self.label_file_name())
    }

    /// Writes the record into `save_dir`, replacing any existing label file.
    pub fn write(&self, save_dir: &Path) -> Result<PathBuf> {
        if !save_dir.is_dir() {
            return Err(LabelError::io(
                save_dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "save directory does not exist"),
            ));
        }
        let target = self.target_path(save_dir);
        fs::write(&target, self.to_string()).map_err(|e| LabelError::io(&target, e))?;
        log::info!("Saved {} points to {}", self.points.len(), target.display());
        Ok(target)
    }

    pub fn parse(line: &str, source: &Path) -> Result<Self> {
        let invalid = |reason: String| LabelError::InvalidRecord {
            path: source.to_path_buf(),
            reason,
        };

        // Coordinates are the trailing integers; the filename may contain spaces.
        let mut rest = line.trim();
        let mut coords = Vec::new();
        while let Some((head, last)) = rest.rsplit_once(char::is_whitespace) {
            match last.parse::<i32>() {
                Ok(value) => {
                    coords.push(value);
                    rest = head.trim_end();
                }
                Err(_) => break,
            }
        }
        coords.reverse();

        if rest.is_empty() {
            return Err(invalid("empty file".to_string()));
        }
        if Path::new(rest).file_name() != Some(OsStr::new(rest)) {
            return Err(invalid(format!("'{rest}' is not a plain file name")));
        }
        let filename = rest.to_string();

        if coords.len() % 2 != 0 {
            return Err(invalid(format!("odd number of coordinates ({})", coords.len())));
        }

        let points = coords
            .chunks_exact(2)
            .map(|pair| Point::new(pair[0], pair[1]))
            .collect();
        Ok(Self { filename, points })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| LabelError::io(path, e))?;
        Self::parse(&content, path)
    }
}

impl fmt::Display for AnnotationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filename)?;
        for point in &self.points {
            write!(f, " {} {}", point.x, point.y)?;
        }
        Ok(())
    }
}

pub fn is_label_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(LABEL_EXTENSION))
        .unwrap_or(false)
}
