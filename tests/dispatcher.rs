//! Dispatcher behaviour against an in-memory video, no ffmpeg needed.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::{Rgb, RgbImage};
use interval_thumbnails::{
    DecodedFrame, FrameSource, Result, ThumbError, ThumbOptions, VideoMeta, dispatch,
};

/// Flat-coloured frames whose colour encodes the frame index.
struct SyntheticVideo {
    path: PathBuf,
    meta: VideoMeta,
    width: u32,
    height: u32,
    /// Frames actually produced before end of stream.
    available: u64,
    fail_at: Option<u64>,
    next: u64,
    /// Frames handed out as images.
    decoded: Arc<AtomicU64>,
    /// Frames stepped over without building an image.
    skipped: Arc<AtomicU64>,
}

impl SyntheticVideo {
    fn new(frame_count: u64, fps: f64, width: u32, height: u32) -> Self {
        Self {
            path: PathBuf::from("synthetic.mp4"),
            meta: VideoMeta { frame_count, fps },
            width,
            height,
            available: frame_count,
            fail_at: None,
            next: 0,
            decoded: Arc::new(AtomicU64::new(0)),
            skipped: Arc::new(AtomicU64::new(0)),
        }
    }
}

fn colour_of(index: u64) -> Rgb<u8> {
    Rgb([(index % 251) as u8, (index / 251 % 251) as u8, 77])
}

impl FrameSource for SyntheticVideo {
    fn path(&self) -> &Path {
        &self.path
    }

    fn meta(&self) -> VideoMeta {
        self.meta
    }

    async fn next_frame(&mut self) -> Result<Option<DecodedFrame>> {
        let Some(index) = self.advance()? else {
            return Ok(None);
        };
        self.decoded.fetch_add(1, Ordering::SeqCst);
        Ok(Some(DecodedFrame {
            index,
            image: RgbImage::from_pixel(self.width, self.height, colour_of(index)),
        }))
    }

    async fn skip_frame(&mut self) -> Result<bool> {
        let more = self.advance()?.is_some();
        if more {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }
        Ok(more)
    }
}

impl SyntheticVideo {
    fn advance(&mut self) -> Result<Option<u64>> {
        if self.fail_at == Some(self.next) {
            return Err(ThumbError::Decode(format!("corrupt packet at {}", self.next)));
        }
        if self.next >= self.available {
            return Ok(None);
        }
        self.next += 1;
        Ok(Some(self.next - 1))
    }
}

fn options(widths: &[u32]) -> ThumbOptions {
    ThumbOptions {
        interval_seconds: 10.0,
        target_widths: widths.to_vec(),
        worker_concurrency: Some(2),
        ..ThumbOptions::default()
    }
}

#[tokio::test]
async fn single_size_run_writes_one_jpeg_per_sample() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("nested/thumbnails");
    // 100 seconds of video, plus trailing frames beyond the reported count.
    let mut video = SyntheticVideo::new(1500, 15.0, 320, 180);
    video.available = 2000;
    let decoded = Arc::clone(&video.decoded);
    let skipped = Arc::clone(&video.skipped);

    let report = dispatch(video, &out, &options(&[160])).await.unwrap();

    assert_eq!(
        report.frame_indices,
        vec![0, 180, 345, 510, 675, 840, 1005, 1170, 1335, 1499]
    );
    assert!(report.is_success(), "{report}");
    assert_eq!(report.attempted(), 10);
    assert_eq!(report.written.len(), 10);
    for ordinal in 1..=10 {
        let path = out.join(format!("thumbnail_{ordinal}.jpg"));
        assert_eq!(image::image_dimensions(&path).unwrap(), (160, 90));
    }
    assert!(!out.join("thumbnail_11.jpg").exists());
    // only the selected frames become images, and reading stops after the last
    assert_eq!(decoded.load(Ordering::SeqCst), 10);
    assert_eq!(skipped.load(Ordering::SeqCst), 1490);
}

#[tokio::test]
async fn multi_size_run_writes_pngs_per_sample_and_never_upscales() {
    let dir = tempfile::tempdir().unwrap();
    let video = SyntheticVideo::new(900, 30.0, 480, 270);

    let report = dispatch(video, dir.path(), &options(&[160, 640, 320]))
        .await
        .unwrap();

    assert_eq!(report.frame_indices, vec![0, 450, 899]);
    assert_eq!(report.written.len(), 6);
    for (ordinal, index) in [(1, 0), (2, 450), (3, 899)] {
        let sample = dir.path().join(format!("thumbnail_{ordinal}"));
        assert!(!sample.join("640.png").exists());

        let large = image::open(sample.join("320.png")).unwrap().to_rgb8();
        assert_eq!(large.dimensions(), (320, 180));
        let small = image::open(sample.join("160.png")).unwrap().to_rgb8();
        assert_eq!(small.dimensions(), (160, 90));
        // the file for ordinal N holds frame frame_indices[N - 1]
        let got = small.get_pixel(80, 45).0;
        let want = colour_of(index).0;
        assert!(
            got.iter().zip(want).all(|(g, w)| g.abs_diff(w) <= 1),
            "thumbnail {ordinal}: {got:?} != {want:?}"
        );
    }
}

#[tokio::test]
async fn narrow_video_produces_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let video = SyntheticVideo::new(900, 30.0, 100, 100);

    let report = dispatch(video, dir.path(), &options(&[160])).await.unwrap();

    assert!(report.is_success());
    assert!(report.written.is_empty());
    assert_eq!(report.skipped, vec![1, 2, 3]);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn one_failed_write_does_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the third thumbnail should go makes its write fail.
    fs::create_dir(dir.path().join("thumbnail_3.jpg")).unwrap();
    let video = SyntheticVideo::new(500, 10.0, 320, 240);

    let report = dispatch(video, dir.path(), &options(&[160])).await.unwrap();

    assert_eq!(report.frame_indices, vec![0, 125, 250, 375, 499]);
    assert_eq!(report.attempted(), 5);
    assert_eq!(report.succeeded(), 4);
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.ordinal, 3);
    assert_eq!(failure.frame_index, 250);
    assert!(matches!(failure.error, ThumbError::OutputUnwritable { .. }));
    assert_eq!(report.summary(), "1 of 5 thumbnails failed");
    for ordinal in [1, 2, 4, 5] {
        assert!(dir.path().join(format!("thumbnail_{ordinal}.jpg")).is_file());
    }
}

#[tokio::test]
async fn failed_size_keeps_the_sizes_already_written() {
    let dir = tempfile::tempdir().unwrap();
    // 320 is written before 160, which then lands on a directory.
    fs::create_dir_all(dir.path().join("thumbnail_1/160.png")).unwrap();
    let video = SyntheticVideo::new(900, 30.0, 480, 270);

    let report = dispatch(video, dir.path(), &options(&[320, 160])).await.unwrap();

    let partial = dir.path().join("thumbnail_1/320.png");
    assert!(partial.is_file());
    assert!(report.written.contains(&partial));
    assert_eq!(report.written.len(), 5);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].ordinal, 1);
    assert_eq!(report.summary(), "1 of 3 thumbnails failed");
}

#[tokio::test]
async fn rerun_overwrites_the_same_files() {
    let dir = tempfile::tempdir().unwrap();

    let first = dispatch(SyntheticVideo::new(600, 20.0, 320, 180), dir.path(), &options(&[160]))
        .await
        .unwrap();
    let before: Vec<Vec<u8>> = first.written.iter().map(|p| fs::read(p).unwrap()).collect();

    let second = dispatch(SyntheticVideo::new(600, 20.0, 320, 180), dir.path(), &options(&[160]))
        .await
        .unwrap();
    let after: Vec<Vec<u8>> = second.written.iter().map(|p| fs::read(p).unwrap()).collect();

    assert_eq!(first.written, second.written);
    assert_eq!(before, after);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), first.written.len());
}

#[tokio::test]
async fn existing_thumbnails_can_be_kept() {
    let dir = tempfile::tempdir().unwrap();
    let video = || SyntheticVideo::new(900, 30.0, 320, 180);
    dispatch(video(), dir.path(), &options(&[160])).await.unwrap();

    let keep = ThumbOptions {
        skip_if_exists: true,
        ..options(&[160])
    };
    let report = dispatch(video(), dir.path(), &keep).await.unwrap();

    assert!(report.written.is_empty());
    assert_eq!(report.existing, vec![1, 2, 3]);
}

#[tokio::test]
async fn short_stream_reports_unreached_frames() {
    let dir = tempfile::tempdir().unwrap();
    let mut video = SyntheticVideo::new(500, 10.0, 320, 240);
    video.available = 300;

    let report = dispatch(video, dir.path(), &options(&[160])).await.unwrap();

    assert_eq!(report.attempted(), 3);
    assert_eq!(report.unreached, vec![375, 499]);
    assert!(report.is_success());
}

#[tokio::test]
async fn decode_error_fails_after_started_tasks_finish() {
    let dir = tempfile::tempdir().unwrap();
    let mut video = SyntheticVideo::new(500, 10.0, 320, 240);
    video.fail_at = Some(300);

    let err = dispatch(video, dir.path(), &options(&[160])).await.unwrap_err();

    assert!(matches!(err, ThumbError::Decode(_)));
    for ordinal in 1..=3 {
        assert!(dir.path().join(format!("thumbnail_{ordinal}.jpg")).is_file());
    }
}

#[tokio::test]
async fn empty_video_is_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let video = SyntheticVideo::new(0, 30.0, 320, 240);

    let err = dispatch(video, dir.path(), &options(&[160])).await.unwrap_err();
    assert!(matches!(err, ThumbError::UnreadableVideo { .. }));
}

#[tokio::test]
async fn zero_frame_rate_is_invalid_input() {
    let dir = tempfile::tempdir().unwrap();
    let video = SyntheticVideo::new(300, 0.0, 320, 240);

    let err = dispatch(video, dir.path(), &options(&[160])).await.unwrap_err();
    assert!(matches!(err, ThumbError::InvalidInput(_)));
}

#[tokio::test]
async fn single_worker_still_completes() {
    let dir = tempfile::tempdir().unwrap();
    let video = SyntheticVideo::new(3000, 30.0, 320, 180);
    let serial = ThumbOptions {
        worker_concurrency: Some(1),
        ..options(&[160])
    };

    let report = dispatch(video, dir.path(), &serial).await.unwrap();
    assert_eq!(report.written.len(), 10);
}
