//! PNG helpers for checking rendered charts.

use image::{DynamicImage, GenericImageView, ImageFormat, Rgba};

/// Width of the colourbar strip added to the right of every map
pub const COLORBAR_STRIP: u32 = 70;

/// Decode PNG bytes, failing the test on anything else
pub fn decode_png(bytes: &[u8]) -> DynamicImage {
    assert_eq!(
        image::guess_format(bytes).ok(),
        Some(ImageFormat::Png),
        "body is not a PNG"
    );
    image::load_from_memory(bytes).expect("PNG did not decode")
}

/// Check a chart has the map area plus the colourbar strip
pub fn assert_chart_dimensions(image: &DynamicImage, map_width: u32, map_height: u32) {
    assert_eq!(
        image.dimensions(),
        (map_width + COLORBAR_STRIP, map_height),
        "chart has unexpected dimensions"
    );
}

/// Share of map-area pixels that are not plain white
pub fn painted_fraction(image: &DynamicImage, map_width: u32) -> f64 {
    let (_, height) = image.dimensions();
    let white = Rgba([255, 255, 255, 255]);
    let mut painted = 0u64;
    for y in 0..height {
        for x in 0..map_width {
            if image.get_pixel(x, y) != white {
                painted += 1;
            }
        }
    }
    painted as f64 / (map_width as u64 * height as u64) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    #[test]
    fn test_painted_fraction() {
        let mut img = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_pixel(4, 2, Rgba([255, 255, 255, 255]));
        img.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 1, Rgba([10, 200, 10, 255]));
        let image = DynamicImage::ImageRgba8(img);
        assert!((painted_fraction(&image, 4) - 0.25).abs() < 1e-12);
    }
}
