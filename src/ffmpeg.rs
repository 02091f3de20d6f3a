use crate::error::{Result, ThumbError};
use crate::ffprobe::{VideoInfo, get_video_info};
use crate::thumbnails::{DecodedFrame, FrameSource, VideoMeta};
use image::RgbImage;
use log::debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

/// Decodes the first video stream of a file to packed RGB24 through an
/// `ffmpeg` child process, one frame at a time.
///
/// Dropping the source kills the child, so a caller can stop as soon as it has
/// every frame it needs.
pub struct FfmpegSource {
    path: PathBuf,
    info: VideoInfo,
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    /// Reused for frames that are read only to be thrown away.
    scratch: Vec<u8>,
    next_index: u64,
    finished: bool,
}

impl FfmpegSource {
    pub async fn open(path: &Path) -> Result<Self> {
        let info = get_video_info(path).await?;

        let mut command = Command::new("ffmpeg");
        command
            .args(["-nostdin", "-v", "error", "-noautorotate", "-i"])
            .arg(path)
            .args([
                "-map", "0:v:0", "-vsync", "passthrough", "-f", "rawvideo", "-pix_fmt", "rgb24",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        debug!("running {command:?}");

        let mut child = command
            .spawn()
            .map_err(|e| ThumbError::unreadable(path, format!("failed to run ffmpeg: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ThumbError::unreadable(path, "ffmpeg stdout unavailable"))?;
        // Drained in the background so a chatty decoder never blocks on a full pipe.
        let stderr = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text).await;
                text
            })
        });

        Ok(Self {
            path: path.to_path_buf(),
            info,
            child,
            stdout,
            stderr,
            scratch: vec![0u8; frame_len(&info)],
            next_index: 0,
            finished: false,
        })
    }

    pub fn width(&self) -> u32 {
        self.info.width
    }

    pub fn height(&self) -> u32 {
        self.info.height
    }

    /// Waits for ffmpeg after the pipe hit EOF and turns a failed exit into an error.
    async fn finish(&mut self) -> Result<()> {
        self.finished = true;
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| ThumbError::Decode(format!("{}: {e}", self.path.display())))?;
        if status.success() {
            return Ok(());
        }
        let stderr = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        Err(ThumbError::Decode(format!(
            "ffmpeg exited with {status} while decoding {}: {}",
            self.path.display(),
            stderr.trim()
        )))
    }

    /// Turns the byte count of one frame read into "got a frame" or "end of
    /// stream", failing on a partial frame.
    async fn complete_read(&mut self, filled: usize) -> Result<bool> {
        let expected = frame_len(&self.info);
        if filled == expected {
            self.next_index += 1;
            return Ok(true);
        }
        self.finish().await?;
        if filled == 0 {
            return Ok(false);
        }
        Err(ThumbError::Decode(format!(
            "truncated frame {} in {} ({filled} of {expected} bytes)",
            self.next_index,
            self.path.display(),
        )))
    }
}

/// Reads until `buffer` is full or the pipe closes; returns the bytes read.
async fn read_frame(stdout: &mut ChildStdout, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match stdout.read(&mut buffer[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ThumbError::Decode(e.to_string())),
        }
    }
    Ok(filled)
}

impl FrameSource for FfmpegSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn meta(&self) -> VideoMeta {
        self.info.meta
    }

    async fn next_frame(&mut self) -> Result<Option<DecodedFrame>> {
        if self.finished {
            return Ok(None);
        }

        let index = self.next_index;
        let mut buffer = vec![0u8; frame_len(&self.info)];
        let filled = read_frame(&mut self.stdout, &mut buffer).await?;
        if !self.complete_read(filled).await? {
            return Ok(None);
        }

        let image = RgbImage::from_raw(self.info.width, self.info.height, buffer)
            .ok_or_else(|| ThumbError::Decode("frame buffer size mismatch".into()))?;
        Ok(Some(DecodedFrame { index, image }))
    }

    async fn skip_frame(&mut self) -> Result<bool> {
        if self.finished {
            return Ok(false);
        }
        let filled = read_frame(&mut self.stdout, &mut self.scratch).await?;
        self.complete_read(filled).await
    }
}

fn frame_len(info: &VideoInfo) -> usize {
    info.width as usize * info.height as usize * 3
}
