mod dispatcher;
mod frame_selector;
mod frame_source;
mod renderer;

pub use dispatcher::{RunReport, TaskFailure, dispatch};
pub use frame_selector::select_frames;
pub use frame_source::{DecodedFrame, FrameSource, VideoMeta};
pub use renderer::{render, write_jpeg, write_png};

use crate::error::{Result, ThumbError};
use crate::ffmpeg::FfmpegSource;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::thread;
use tokio::fs;

/// Configuration for a thumbnail run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbOptions {
    /// Minimum spacing in seconds between two sampled frames.
    pub interval_seconds: f64,
    /// Thumbnail widths in pixels. A single width writes `thumbnail_<N>.jpg`
    /// files; several widths write `thumbnail_<N>/<width>.png` per sample.
    pub target_widths: Vec<u32>,
    /// Number of render-and-write tasks allowed in flight. Defaults to half the
    /// available parallelism.
    pub worker_concurrency: Option<usize>,
    /// JPEG quality, `1..=100`.
    pub jpeg_quality: u8,
    /// Leave a sample alone when all of its output files already exist.
    pub skip_if_exists: bool,
}

impl Default for ThumbOptions {
    fn default() -> Self {
        Self {
            interval_seconds: 10.0,
            target_widths: vec![160],
            worker_concurrency: None,
            jpeg_quality: 90,
            skip_if_exists: false,
        }
    }
}

impl ThumbOptions {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ThumbError::InvalidInput(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| ThumbError::InvalidInput(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.interval_seconds.is_finite() && self.interval_seconds > 0.0) {
            return Err(ThumbError::InvalidInput(format!(
                "interval must be positive, got {}",
                self.interval_seconds
            )));
        }
        if self.target_widths.is_empty() {
            return Err(ThumbError::InvalidInput("no thumbnail widths given".into()));
        }
        if self.target_widths.contains(&0) {
            return Err(ThumbError::InvalidInput("thumbnail width must be positive".into()));
        }
        if self.worker_concurrency == Some(0) {
            return Err(ThumbError::InvalidInput("worker count must be positive".into()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ThumbError::InvalidInput(format!(
                "jpeg quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }

    pub fn workers(&self) -> usize {
        self.worker_concurrency.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|n| n.get() / 2)
                .unwrap_or(1)
                .max(1)
        })
    }

    pub(crate) fn layout(&self) -> Layout {
        let mut widths = self.target_widths.clone();
        widths.sort_unstable_by(|a, b| b.cmp(a));
        widths.dedup();
        match widths.as_slice() {
            [width] => Layout::Single(*width),
            _ => Layout::PerSample(widths),
        }
    }
}

/// Where the thumbnails of one sample go.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Layout {
    Single(u32),
    /// Distinct widths, largest first.
    PerSample(Vec<u32>),
}

impl Layout {
    pub(crate) fn widths(&self) -> &[u32] {
        match self {
            Layout::Single(width) => std::slice::from_ref(width),
            Layout::PerSample(widths) => widths,
        }
    }

    /// Directory that has to exist before the sample's files can be written.
    pub(crate) fn sample_dir(&self, output_dir: &Path, ordinal: usize) -> PathBuf {
        match self {
            Layout::Single(_) => output_dir.to_path_buf(),
            Layout::PerSample(_) => output_dir.join(format!("thumbnail_{ordinal}")),
        }
    }

    pub(crate) fn file_path(&self, output_dir: &Path, ordinal: usize, width: u32) -> PathBuf {
        match self {
            Layout::Single(_) => output_dir.join(format!("thumbnail_{ordinal}.jpg")),
            Layout::PerSample(_) => self.sample_dir(output_dir, ordinal).join(format!("{width}.png")),
        }
    }
}

async fn create_output_dir(output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)
        .await
        .map_err(|e| ThumbError::unwritable(output_dir, e))
}

/// Samples evenly spaced frames from a video and writes a thumbnail for each.
///
/// The source file is checked before anything else; the output directory is
/// created if missing (never cleared), then the video is decoded once, front
/// to back, by `ffmpeg`. Frame indices are chosen by [`select_frames`] and
/// thumbnails are rendered concurrently by up to
/// [`ThumbOptions::workers`] tasks.
///
/// # Arguments
///
/// * `file` - The video to sample.
/// * `output_dir` - Where to write the thumbnails.
/// * `options` - Interval, widths and pool size.
///
/// # Errors
///
/// Fails before any thumbnail is written if the options are invalid, the file
/// does not exist, the output directory cannot be created, or `ffmpeg` cannot
/// read the video. Individual write failures do not fail the run; they are
/// collected in the returned [`RunReport`].
pub async fn generate_thumbnails(
    file: &Path,
    output_dir: &Path,
    options: &ThumbOptions,
) -> Result<RunReport> {
    options.validate()?;

    let is_file = fs::metadata(file).await.is_ok_and(|m| m.is_file());
    if !is_file {
        return Err(ThumbError::FileNotFound(file.to_path_buf()));
    }

    create_output_dir(output_dir).await?;

    info!("Extracting frames from {}", file.display());
    let source = FfmpegSource::open(file).await?;
    info!(
        "Decoding {}x{} frames from {}",
        source.width(),
        source.height(),
        file.display()
    );
    dispatch(source, output_dir, options).await
}
