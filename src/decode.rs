//! Image decoding for cached photo bytes.

use image::DynamicImage;

use crate::error::FetchResult;

/// Decode encoded photo bytes, downscaling anything larger than
/// `max_dimension` on either side.
pub fn decode_photo(bytes: &[u8], max_dimension: u32) -> FetchResult<DynamicImage> {
    let image = image::load_from_memory(bytes)?;
    Ok(resize_if_needed(image, max_dimension))
}

/// Resize image if it's too large (to save memory and rendering time).
fn resize_if_needed(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());

    if max_dimension == 0 || (width <= max_dimension && height <= max_dimension) {
        return image;
    }

    // Calculate new dimensions maintaining aspect ratio
    let ratio = f64::from(width) / f64::from(height);
    let (new_width, new_height) = if width > height {
        (max_dimension, (f64::from(max_dimension) / ratio) as u32)
    } else {
        ((f64::from(max_dimension) * ratio) as u32, max_dimension)
    };

    image.resize(
        new_width.max(1),
        new_height.max(1),
        image::imageops::FilterType::Triangle,
    )
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height))
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}
