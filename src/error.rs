use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, LabelError>;

/// Everything that can go wrong while browsing images or saving labels.
///
/// None of these are fatal: the app shows them to the user and the session
/// stays in the state it had before the failing operation.
#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Make sure {} is a valid image file ({source})", path.display())]
    InvalidImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{} is not in the current image list", .0.display())]
    NotInList(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A label file that does not follow the `<filename> <x> <y> ...` layout
    #[error("Malformed label file {}: {reason}", path.display())]
    InvalidRecord { path: PathBuf, reason: String },

    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),
}

impl LabelError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Short headline for the error dialog.
    pub fn title(&self) -> &'static str {
        match self {
            Self::DirectoryNotFound(_) => "Error opening directory",
            Self::InvalidImage { .. } | Self::NotInList(_) | Self::InvalidRecord { .. } => {
                "Error opening file"
            }
            Self::Io { .. } => "File error",
            Self::Settings(_) => "Error reading settings",
        }
    }
}
