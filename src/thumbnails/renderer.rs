use crate::error::{Result, ThumbError};
use fast_image_resize::images::{Image, ImageRef};
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Downscales `frame` to `target_width`, keeping the aspect ratio.
///
/// Returns `None` instead of upscaling when the frame is narrower than
/// `target_width`, and when the scaled height would round down to zero.
/// The output height is `floor(height * target_width / width)`.
pub fn render(
    resizer: &mut Resizer,
    frame: &RgbImage,
    target_width: u32,
) -> Result<Option<RgbImage>> {
    let (width, height) = frame.dimensions();
    if target_width == 0 || width < target_width {
        return Ok(None);
    }
    if width == target_width {
        return Ok(Some(frame.clone()));
    }

    let target_height = (u64::from(height) * u64::from(target_width) / u64::from(width)) as u32;
    if target_height == 0 {
        return Ok(None);
    }

    let src = ImageRef::new(width, height, frame.as_raw(), PixelType::U8x3)?;
    let mut dst = Image::new(target_width, target_height, PixelType::U8x3);

    // A box filter averages every source pixel under the destination pixel,
    // i.e. area resampling when shrinking.
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Box));
    resizer.resize(&src, &mut dst, &options)?;

    RgbImage::from_raw(target_width, target_height, dst.into_vec())
        .map(Some)
        .ok_or_else(|| ThumbError::Resize("resized buffer has the wrong length".into()))
}

/// Writes `image` as a baseline JPEG, replacing any existing file.
pub fn write_jpeg(image: &RgbImage, path: &Path, quality: u8) -> Result<()> {
    let mut writer = create(path)?;
    JpegEncoder::new_with_quality(&mut writer, quality)
        .encode_image(image)
        .map_err(|e| ThumbError::unwritable(path, e))?;
    writer.flush().map_err(|e| ThumbError::unwritable(path, e))
}

/// Writes `image` as PNG, replacing any existing file.
pub fn write_png(image: &RgbImage, path: &Path) -> Result<()> {
    let mut writer = create(path)?;
    image
        .write_to(&mut writer, ImageFormat::Png)
        .map_err(|e| ThumbError::unwritable(path, e))?;
    writer.flush().map_err(|e| ThumbError::unwritable(path, e))
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| ThumbError::unwritable(path, e))
}
