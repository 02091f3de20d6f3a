use crate::error::{Result, ThumbError};

/// Picks the frame indices to turn into thumbnails.
///
/// The video is split into `floor(duration / interval_seconds)` parts. Interior
/// samples sit at multiples of `1 / (parts - 1)` of the duration, each rounded
/// *up* to the next hundredth, which spreads near-coincident positions onto a
/// fixed grid instead of letting float drift cluster them. The first and last
/// frame are always included.
///
/// The returned indices are strictly increasing and all `< frame_count`.
///
/// # Errors
///
/// Returns [`ThumbError::InvalidInput`] when `fps` or `interval_seconds` is not
/// a positive finite number.
pub fn select_frames(frame_count: u64, fps: f64, interval_seconds: f64) -> Result<Vec<u64>> {
    if !(fps.is_finite() && fps > 0.0) {
        return Err(ThumbError::InvalidInput(format!(
            "frame rate must be positive, got {fps}"
        )));
    }
    if !(interval_seconds.is_finite() && interval_seconds > 0.0) {
        return Err(ThumbError::InvalidInput(format!(
            "interval must be positive, got {interval_seconds}"
        )));
    }
    if frame_count == 0 {
        return Ok(Vec::new());
    }

    let last = frame_count - 1;
    let duration = frame_count as f64 / fps;
    let target_count = (duration / interval_seconds).floor() as u64;

    let mut indices = vec![0];
    if target_count > 1 {
        indices.extend(
            sample_hundredths(target_count - 1)
                .map(|hundredths| frame_at(frame_count, hundredths).min(last)),
        );
    }
    indices.push(last);
    indices.dedup();
    Ok(indices)
}

/// Interior positions, in hundredths of the duration, for `steps` equal steps.
///
/// Position `k` is `ceil(100 * k / steps)`, computed exactly in integers; a
/// position that reaches 100 (the end of the video) is dropped.
fn sample_hundredths(steps: u64) -> impl Iterator<Item = u64> {
    // From 100 steps on, every hundredth in 1..=99 is hit; more steps only
    // produce duplicates.
    let steps = steps.min(100);
    (1..steps)
        .map(move |k| (100 * k).div_ceil(steps))
        .filter(|&hundredths| hundredths < 100)
}

/// `round(frame_count * hundredths / 100)`, halves rounded up.
fn frame_at(frame_count: u64, hundredths: u64) -> u64 {
    let scaled = u128::from(frame_count) * u128::from(hundredths);
    ((scaled + 50) / 100) as u64
}
