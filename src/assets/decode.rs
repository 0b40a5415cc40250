use std::sync::Arc;

use crate::{
    assets::cache::PreparedImage,
    foundation::error::{PackshotError, PackshotResult},
    foundation::math::premultiply_rgba8_in_place,
};

/// Decode an encoded image (PNG, JPEG, ...) into premultiplied RGBA8.
pub fn decode_image(bytes: &[u8]) -> PackshotResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| PackshotError::resource_load(format!("decode image: {e}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn decode_image_png_dimensions_and_premul() {
        let src_rgba = vec![100u8, 50u8, 200u8, 128u8];
        let img = image::RgbaImage::from_raw(1, 1, src_rgba).unwrap();

        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let prepared = decode_image(&buf).unwrap();
        assert_eq!(prepared.width, 1);
        assert_eq!(prepared.height, 1);
        assert_eq!(
            prepared.rgba8_premul.as_slice(),
            &[
                ((100u16 * 128 + 127) / 255) as u8,
                ((50u16 * 128 + 127) / 255) as u8,
                ((200u16 * 128 + 127) / 255) as u8,
                128u8
            ]
        );
    }

    #[test]
    fn decode_garbage_is_resource_load_error() {
        let err = decode_image(b"not an image").unwrap_err();
        assert!(matches!(err, PackshotError::ResourceLoad(_)));
    }
}
