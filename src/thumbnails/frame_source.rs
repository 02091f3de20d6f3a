use crate::error::Result;
use image::RgbImage;
use std::future::Future;
use std::path::Path;

/// What the decoder reports about a video before any frame is read.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoMeta {
    pub frame_count: u64,
    pub fps: f64,
}

impl VideoMeta {
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count as f64 / self.fps
    }
}

/// One decoded picture and its 0-based position in decode order.
#[derive(Clone, Debug)]
pub struct DecodedFrame {
    pub index: u64,
    pub image: RgbImage,
}

/// A sequential, forward-only video decoder.
///
/// Implementations yield frames with consecutive indices starting at 0 and
/// return `Ok(None)` once the stream is exhausted. Advancing is inherently
/// stateful, so the dispatcher drives a source from a single task.
pub trait FrameSource: Send {
    /// The video this source decodes, for messages.
    fn path(&self) -> &Path;

    fn meta(&self) -> VideoMeta;

    fn next_frame(&mut self) -> impl Future<Output = Result<Option<DecodedFrame>>> + Send;

    /// Advances past one frame without handing it out. Returns `false` at the
    /// end of the stream.
    fn skip_frame(&mut self) -> impl Future<Output = Result<bool>> + Send {
        async move { Ok(self.next_frame().await?.is_some()) }
    }
}
