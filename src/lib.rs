//! # Interval Thumbnails
//!
//! Picks a handful of frames spread evenly over a video and writes a small
//! thumbnail for each one.
//!
//! The frames are chosen from the frame count and frame rate alone (see
//! [`select_frames`]): the first and last frame are always included, and the
//! samples in between are spaced at least `interval_seconds` apart. The video
//! is then decoded once, front to back, by an `ffmpeg` child process; every
//! selected frame is handed to its own blocking task that downscales it with an
//! area filter and writes the result, with a bounded number of tasks in flight.
//!
//! Output layout:
//! - one target width: `thumbnail_<N>.jpg`, where `N` is the 1-based position
//!   of the frame in the selection;
//! - several widths: `thumbnail_<N>/<width>.png`.
//!
//! Thumbnails are never upscaled: a width larger than the video is skipped.
//!
//! ## Requirements
//!
//! - **FFmpeg**: Must be installed and accessible in the system's `PATH`.
//! - **FFprobe**: Must be installed and accessible in the system's `PATH`.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use interval_thumbnails::{ThumbOptions, generate_thumbnails};
//!
//! #[tokio::main]
//! async fn main() -> interval_thumbnails::Result<()> {
//!     let options = ThumbOptions {
//!         interval_seconds: 10.0,
//!         target_widths: vec![640, 320, 160],
//!         ..ThumbOptions::default()
//!     };
//!
//!     let report = generate_thumbnails(
//!         Path::new("path/to/video.mp4"),
//!         Path::new("path/to/thumbnails"),
//!         &options,
//!     )
//!     .await?;
//!     println!("{report}");
//!
//!     Ok(())
//! }
//! ```

mod error;
// Frame source backed by an `ffmpeg` child process.
mod ffmpeg;
// Module for interacting with the `ffprobe` command-line tool.
mod ffprobe;
// Frame selection, rendering and the concurrent dispatcher.
mod thumbnails;

pub use error::{Result, ThumbError};
pub use ffmpeg::FfmpegSource;
pub use ffprobe::{VideoInfo, get_video_info};
pub use thumbnails::{
    DecodedFrame, FrameSource, RunReport, TaskFailure, ThumbOptions, VideoMeta, dispatch,
    generate_thumbnails, render, select_frames, write_jpeg, write_png,
};
