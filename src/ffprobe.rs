use crate::error::{Result, ThumbError};
use crate::thumbnails::VideoMeta;
use log::debug;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Stream properties needed to decode a video into raw RGB frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoInfo {
    pub meta: VideoMeta,
    pub width: u32,
    pub height: u32,
}

#[derive(Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<StreamInfo>,
    format: Option<FormatInfo>,
}

#[derive(Deserialize)]
struct FormatInfo {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct StreamInfo {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

pub async fn get_video_info(input: &Path) -> Result<VideoInfo> {
    let mut command = Command::new("ffprobe");
    command
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,avg_frame_rate,r_frame_rate,nb_frames,duration:format=duration",
            "-of",
            "json",
        ])
        .arg(input)
        .stdin(Stdio::null());
    debug!("running {command:?}");

    let output = command
        .output()
        .await
        .map_err(|e| ThumbError::unreadable(input, format!("failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ThumbError::unreadable(
            input,
            format!("ffprobe failed: {}", stderr.trim()),
        ));
    }

    parse_video_info(&output.stdout).map_err(|reason| ThumbError::unreadable(input, reason))
}

fn parse_video_info(json: &[u8]) -> std::result::Result<VideoInfo, String> {
    let probe: FfprobeOutput =
        serde_json::from_slice(json).map_err(|e| format!("cannot parse ffprobe output: {e}"))?;
    let stream = probe
        .streams
        .first()
        .ok_or_else(|| "no video stream".to_string())?;

    let width = stream.width.filter(|&w| w > 0).ok_or("missing frame width")?;
    let height = stream.height.filter(|&h| h > 0).ok_or("missing frame height")?;

    let fps = [&stream.avg_frame_rate, &stream.r_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|rate| parse_frame_rate(rate))
        .ok_or("missing frame rate")?;

    // Some containers (Matroska, WebM) carry no frame count; estimate it from
    // the duration.
    let frame_count = match stream.nb_frames.as_deref().and_then(|n| n.parse::<u64>().ok()) {
        Some(count) => count,
        None => {
            let duration = stream
                .duration
                .as_deref()
                .or(probe.format.as_ref().and_then(|f| f.duration.as_deref()))
                .and_then(|d| d.parse::<f64>().ok())
                .filter(|d| d.is_finite() && *d > 0.0)
                .ok_or("missing frame count and duration")?;
            (duration * fps).round() as u64
        }
    };
    if frame_count == 0 {
        return Err("video reports no frames".into());
    }

    Ok(VideoInfo {
        meta: VideoMeta { frame_count, fps },
        width,
        height,
    })
}

/// Parses `30/1`, `30000/1001` or `29.97`; zero and negative rates are rejected.
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}
