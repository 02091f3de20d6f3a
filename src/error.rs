//! Error types shared by the frame selector, the ffmpeg frame source and the
//! thumbnail dispatcher.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ThumbError>;

#[derive(Debug, Error)]
pub enum ThumbError {
    /// A caller-supplied value is out of range (fps, interval, widths, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{} does not exist", .0.display())]
    FileNotFound(PathBuf),

    /// The container could not be opened or reported no usable frames.
    #[error("unreadable video {}: {reason}", .path.display())]
    UnreadableVideo { path: PathBuf, reason: String },

    /// The output directory could not be created, or a thumbnail write failed.
    #[error("cannot write {}: {reason}", .path.display())]
    OutputUnwritable { path: PathBuf, reason: String },

    #[error("failed to decode frame: {0}")]
    Decode(String),

    #[error("failed to resize frame: {0}")]
    Resize(String),

    #[error("render task panicked: {0}")]
    Panicked(String),
}

impl ThumbError {
    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::UnreadableVideo {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unwritable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::OutputUnwritable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<fast_image_resize::ResizeError> for ThumbError {
    fn from(err: fast_image_resize::ResizeError) -> Self {
        Self::Resize(err.to_string())
    }
}

impl From<fast_image_resize::ImageBufferError> for ThumbError {
    fn from(err: fast_image_resize::ImageBufferError) -> Self {
        Self::Resize(err.to_string())
    }
}
