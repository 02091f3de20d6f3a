use crate::error::{Result, ThumbError};
use crate::thumbnails::frame_selector::select_frames;
use crate::thumbnails::frame_source::{DecodedFrame, FrameSource};
use crate::thumbnails::renderer::{render, write_jpeg, write_png};
use crate::thumbnails::{Layout, ThumbOptions, create_output_dir};
use fast_image_resize::Resizer;
use log::{error, info, warn};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

/// A sample whose thumbnails could not be produced.
#[derive(Debug)]
pub struct TaskFailure {
    /// 1-based position of the sample in the selected frame set.
    pub ordinal: usize,
    pub frame_index: u64,
    pub error: ThumbError,
}

/// What a [`dispatch`] run did, sample by sample.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Selected frame indices, ascending. Ordinal `N` is `frame_indices[N - 1]`.
    pub frame_indices: Vec<u64>,
    /// Every file written, sorted by path.
    pub written: Vec<PathBuf>,
    /// Ordinals that produced nothing because every width exceeded the frame.
    pub skipped: Vec<usize>,
    /// Ordinals left untouched because their files already existed.
    pub existing: Vec<usize>,
    pub failures: Vec<TaskFailure>,
    /// Selected indices the decoder never reached.
    pub unreached: Vec<u64>,
    dispatched: usize,
    /// Tasks that ended without reporting back.
    lost: usize,
}

impl RunReport {
    /// Number of samples handed to a render task.
    pub fn attempted(&self) -> usize {
        self.dispatched
    }

    pub fn failed(&self) -> usize {
        self.failures.len() + self.lost
    }

    pub fn succeeded(&self) -> usize {
        self.dispatched - self.failed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn summary(&self) -> String {
        if self.is_success() {
            format!(
                "{} thumbnails written for {} frames",
                self.written.len(),
                self.attempted()
            )
        } else {
            format!(
                "{} of {} thumbnails failed",
                self.failed(),
                self.attempted()
            )
        }
    }

    fn record(&mut self, done: SampleDone) {
        // Files that made it to disk count even when a later width failed.
        self.written.extend(done.written);
        match done.outcome {
            Ok(SampleOutcome::Written) => {}
            Ok(SampleOutcome::Skipped) => self.skipped.push(done.ordinal),
            Ok(SampleOutcome::Existing) => self.existing.push(done.ordinal),
            Err(error) => {
                error!(
                    "Thumbnail {} (frame {}) failed: {error}",
                    done.ordinal, done.frame_index
                );
                self.failures.push(TaskFailure {
                    ordinal: done.ordinal,
                    frame_index: done.frame_index,
                    error,
                });
            }
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())?;
        for failure in &self.failures {
            write!(
                f,
                "\n  thumbnail {} (frame {}): {}",
                failure.ordinal, failure.frame_index, failure.error
            )?;
        }
        Ok(())
    }
}

enum SampleOutcome {
    Written,
    Skipped,
    Existing,
}

struct SampleDone {
    ordinal: usize,
    frame_index: u64,
    written: Vec<PathBuf>,
    outcome: Result<SampleOutcome>,
}

/// One selected frame, ready to be rendered on a blocking worker.
struct SampleJob {
    ordinal: usize,
    frame: DecodedFrame,
    output_dir: Arc<Path>,
    layout: Arc<Layout>,
    jpeg_quality: u8,
    skip_if_exists: bool,
}

impl SampleJob {
    fn run(self) -> SampleDone {
        #[cfg(test)]
        let _in_flight = tests::InFlight::enter();

        let ordinal = self.ordinal;
        let frame_index = self.frame.index;
        let mut written = Vec::new();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.render_and_write(&mut written)))
            .unwrap_or_else(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                Err(ThumbError::Panicked(message))
            });
        SampleDone {
            ordinal,
            frame_index,
            written,
            outcome,
        }
    }

    /// Pushes every file onto `written` as soon as it is on disk.
    fn render_and_write(&self, written: &mut Vec<PathBuf>) -> Result<SampleOutcome> {
        let frame_width = self.frame.image.width();
        let widths: Vec<u32> = self
            .layout
            .widths()
            .iter()
            .copied()
            .filter(|&w| w <= frame_width)
            .collect();
        if widths.is_empty() {
            warn!(
                "Thumbnail {} skipped: frame {} is only {frame_width}px wide",
                self.ordinal, self.frame.index
            );
            return Ok(SampleOutcome::Skipped);
        }

        let paths: Vec<PathBuf> = widths
            .iter()
            .map(|&w| self.layout.file_path(&self.output_dir, self.ordinal, w))
            .collect();
        if self.skip_if_exists && paths.iter().all(|p| p.is_file()) {
            return Ok(SampleOutcome::Existing);
        }

        let sample_dir = self.layout.sample_dir(&self.output_dir, self.ordinal);
        std::fs::create_dir_all(&sample_dir).map_err(|e| ThumbError::unwritable(&sample_dir, e))?;

        let mut resizer = Resizer::new();
        for (&width, path) in widths.iter().zip(paths) {
            let Some(thumb) = render(&mut resizer, &self.frame.image, width)? else {
                continue;
            };
            info!("Generating thumbnail {}", path.display());
            match *self.layout {
                Layout::Single(_) => write_jpeg(&thumb, &path, self.jpeg_quality)?,
                Layout::PerSample(_) => write_png(&thumb, &path)?,
            }
            written.push(path);
        }

        if written.is_empty() {
            return Ok(SampleOutcome::Skipped);
        }
        Ok(SampleOutcome::Written)
    }
}

/// Decodes `source` once, front to back, and renders a thumbnail for every
/// frame picked by [`select_frames`].
///
/// Each picked frame becomes an independent blocking task. At most
/// [`ThumbOptions::workers`] tasks are in flight; when the pool is full the
/// decode loop waits for one to finish before handing over the next frame.
/// Decoding stops once the last selected frame has been handed over.
///
/// File names come from the frame's ordinal in the selection, so the output is
/// the same whatever order the tasks finish in.
///
/// # Errors
///
/// Invalid options, an unusable output directory, or a video without frames
/// fail the call before any task starts. A decode error part way through fails
/// it after every started task has finished. Failures of individual tasks only
/// show up in the report.
pub async fn dispatch<S: FrameSource>(
    mut source: S,
    output_dir: &Path,
    options: &ThumbOptions,
) -> Result<RunReport> {
    options.validate()?;
    create_output_dir(output_dir).await?;

    let meta = source.meta();
    if meta.frame_count == 0 {
        return Err(ThumbError::unreadable(source.path(), "video reports no frames"));
    }
    info!(
        "Video duration: ~{:.0} seconds ({} frames at {:.3} fps)",
        meta.duration_seconds(),
        meta.frame_count,
        meta.fps
    );

    let frame_indices = select_frames(meta.frame_count, meta.fps, options.interval_seconds)?;
    info!("Frames required: {} {frame_indices:?}", frame_indices.len());

    let workers = options.workers();
    let output_dir: Arc<Path> = Arc::from(output_dir);
    let layout = Arc::new(options.layout());
    let mut report = RunReport {
        frame_indices: frame_indices.clone(),
        ..RunReport::default()
    };
    let mut tasks: JoinSet<SampleDone> = JoinSet::new();
    let mut targets = frame_indices.into_iter().enumerate().peekable();

    let decoded = async {
        // Index of the frame the source will produce next.
        let mut upcoming = 0;
        while let Some(&(_, target)) = targets.peek() {
            if upcoming < target {
                if !source.skip_frame().await? {
                    break;
                }
                upcoming += 1;
                continue;
            }
            let Some(frame) = source.next_frame().await? else {
                break;
            };
            upcoming = frame.index + 1;
            while let Some((_, missed)) = targets.next_if(|&(_, index)| index < frame.index) {
                warn!("Frame {missed} was skipped by the decoder");
                report.unreached.push(missed);
            }
            let Some((position, _)) = targets.next_if(|&(_, index)| index == frame.index) else {
                continue;
            };

            while tasks.len() >= workers {
                join_one(&mut tasks, &mut report).await;
            }
            let job = SampleJob {
                ordinal: position + 1,
                frame,
                output_dir: Arc::clone(&output_dir),
                layout: Arc::clone(&layout),
                jpeg_quality: options.jpeg_quality,
                skip_if_exists: options.skip_if_exists,
            };
            report.dispatched += 1;
            tasks.spawn_blocking(move || job.run());
        }
        Ok::<(), ThumbError>(())
    }
    .await;
    // Nothing left to decode; let the source go before waiting on the workers.
    drop(source);

    for (_, missed) in targets {
        warn!("Video ended before frame {missed}");
        report.unreached.push(missed);
    }
    while !tasks.is_empty() {
        join_one(&mut tasks, &mut report).await;
    }
    decoded?;

    report.written.sort();
    report.skipped.sort_unstable();
    report.existing.sort_unstable();
    report.failures.sort_by_key(|f| f.ordinal);
    if report.is_success() {
        info!("{}", report.summary());
    } else {
        warn!("{}", report.summary());
    }
    Ok(report)
}

async fn join_one(tasks: &mut JoinSet<SampleDone>, report: &mut RunReport) {
    match tasks.join_next().await {
        Some(Ok(done)) => report.record(done),
        Some(Err(e)) => {
            error!("Render task did not complete: {e}");
            report.lost += 1;
        }
        None => {}
    }
}
