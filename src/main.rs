use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::{bail, eyre};
use futures::stream::{self, StreamExt};
use interval_thumbnails::{RunReport, ThumbOptions, generate_thumbnails};
use log::{error, info};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const CONCURRENT_FILES: usize = 2;

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "webm", "av1", "3gp", "mov", "mkv", "flv", "m4v", "m4p", "avi", "wmv", "mpg", "mpeg",
    "ts",
];

/// Write thumbnails of evenly spaced frames from a video.
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Video file, or a directory to search for videos
    input: PathBuf,

    /// Where to write the thumbnails
    #[arg(short, long, default_value = "thumbnails")]
    output: PathBuf,

    /// Minimum number of seconds between two thumbnails
    #[arg(short, long)]
    interval: Option<f64>,

    /// Thumbnail width in pixels; repeat for several sizes per frame
    #[arg(short, long = "width")]
    widths: Vec<u32>,

    /// Render tasks running at once [default: half the CPUs]
    #[arg(short = 'j', long, env = "THUMBNAIL_WORKERS")]
    workers: Option<usize>,

    /// JPEG quality, 1-100
    #[arg(long)]
    quality: Option<u8>,

    /// Keep thumbnails that already exist instead of overwriting them
    #[arg(long)]
    skip_existing: bool,

    /// JSON file with default options; flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show debug output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> Result<ThumbOptions> {
        let mut options = match &self.config {
            Some(path) => ThumbOptions::from_json_file(path)?,
            None => ThumbOptions::default(),
        };
        if let Some(interval) = self.interval {
            options.interval_seconds = interval;
        }
        if !self.widths.is_empty() {
            options.target_widths = self.widths.clone();
        }
        if self.workers.is_some() {
            options.worker_concurrency = self.workers;
        }
        if let Some(quality) = self.quality {
            options.jpeg_quality = quality;
        }
        options.skip_if_exists |= self.skip_existing;
        options.validate()?;
        Ok(options)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let options = cli.options()?;

    if cli.input.is_dir() {
        return run_folder(&cli.input, &cli.output, &options).await;
    }

    let report = generate_thumbnails(&cli.input, &cli.output, &options).await?;
    finish(&cli.input, &report)
}

fn finish(input: &Path, report: &RunReport) -> Result<()> {
    if report.is_success() {
        info!("{}: {}", input.display(), report.summary());
        Ok(())
    } else {
        Err(eyre!("{}: {report}", input.display()))
    }
}

/// Every video below `source_folder` gets its own folder in `thumbnails_dir`,
/// at the same relative path as the file.
async fn run_folder(source_folder: &Path, thumbnails_dir: &Path, options: &ThumbOptions) -> Result<()> {
    let files_to_process = find_videos(source_folder);
    info!(
        "Found {} videos in {}",
        files_to_process.len(),
        source_folder.display()
    );

    let total = files_to_process.len();
    let failed = stream::iter(files_to_process)
        .map(|path| async move {
            let output_dir = output_dir_for(source_folder, thumbnails_dir, &path);
            let result = generate_thumbnails(&path, &output_dir, options)
                .await
                .map_err(color_eyre::Report::from)
                .and_then(|report| finish(&path, &report));
            if let Err(e) = &result {
                error!("Failed to process {}: {e}", path.display());
            }
            result.is_err()
        })
        .buffer_unordered(CONCURRENT_FILES)
        .filter(|failed| std::future::ready(*failed))
        .count()
        .await;

    if failed > 0 {
        bail!("{failed} of {total} videos failed");
    }
    Ok(())
}

fn find_videos(source_folder: &Path) -> Vec<PathBuf> {
    WalkDir::new(source_folder)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| is_video(path))
        .collect()
}

/// `<source_folder>/a/clip.mp4` maps to `<thumbnails_dir>/a/clip.mp4`, so
/// same-named videos in different folders never share an output folder.
fn output_dir_for(source_folder: &Path, thumbnails_dir: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(source_folder) {
        Ok(relative) if !relative.as_os_str().is_empty() => thumbnails_dir.join(relative),
        _ => thumbnails_dir.join(path.file_name().unwrap_or(path.as_os_str())),
    }
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|x| x.to_str())
        .map(|x| x.to_lowercase())
        .is_some_and(|x| VIDEO_EXTENSIONS.contains(&x.as_str()))
}
