use color_eyre::Result;
use interval_thumbnails::{ThumbOptions, generate_thumbnails};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let source_file = Path::new("assets/jellyfish.mp4");

    // One 160px JPEG every 10 seconds.
    let report = generate_thumbnails(
        source_file,
        Path::new("thumbs/single"),
        &ThumbOptions::default(),
    )
    .await?;
    println!("{report}");

    // Three PNG sizes per sample, every 5 seconds.
    let config = ThumbOptions {
        interval_seconds: 5.0,
        target_widths: vec![640, 320, 160],
        worker_concurrency: Some(4),
        ..ThumbOptions::default()
    };
    let report = generate_thumbnails(source_file, Path::new("thumbs/sizes"), &config).await?;
    println!("{report}");
    for path in &report.written {
        println!("  {}", path.display());
    }

    Ok(())
}
