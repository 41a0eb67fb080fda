use crate::error::ExtractionError;
use crate::morphology::reconstruct_by_erosion;
use crate::raster::{luma_apply_mask, luma_from_vec, luma_max, mask_is_full, FloatImage, Mask};

/// Estimate the background under the particles and subtract it.
///
/// The masked-out particles leave holes in the background-only image; a seed
/// at the image maximum everywhere except the outer ring is eroded back down
/// onto the background, which fills each hole at the level of its rim.
/// Returns `|raw - background|`.
pub fn correct_background(raw: &FloatImage, mask: &Mask) -> Result<FloatImage, ExtractionError> {
    if mask_is_full(mask) {
        return Err(ExtractionError::SaturatedMask);
    }

    let background_only = luma_apply_mask(raw, mask, true);
    let filled = fill_holes(&background_only);

    let data = raw
        .as_raw()
        .iter()
        .zip(filled.as_raw())
        .map(|(&p, &b)| (p - b).abs())
        .collect();
    Ok(luma_from_vec(raw.width(), raw.height(), data))
}

fn fill_holes(img: &FloatImage) -> FloatImage {
    let (width, height) = img.dimensions();
    let max_value = luma_max(img);
    let mut seed = img.clone();
    for y in 1..height.saturating_sub(1) {
        for x in 1..width.saturating_sub(1) {
            seed.get_pixel_mut(x, y).0[0] = max_value;
        }
    }
    reconstruct_by_erosion(&seed, img)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_background_is_removed_under_the_particle() {
        let mut raw = vec![100.0; 9 * 9];
        let mut mask = vec![0u8; 9 * 9];
        for y in 3..6 {
            for x in 3..6 {
                raw[y * 9 + x] = 160.0;
                mask[y * 9 + x] = 1;
            }
        }
        let raw = luma_from_vec(9, 9, raw);
        let mask: Mask = luma_from_vec(9, 9, mask);

        let corrected = correct_background(&raw, &mask).unwrap();
        assert_eq!(corrected.get_pixel(4, 4).0[0], 60.0);
        assert_eq!(corrected.get_pixel(0, 0).0[0], 0.0);
        assert_eq!(corrected.get_pixel(7, 2).0[0], 0.0);
    }

    #[test]
    fn tilted_background_follows_the_rim() {
        // background rises by 10 per column, particle sits 50 above it
        let mut raw = Vec::new();
        let mut mask = Vec::new();
        for y in 0..7 {
            for x in 0..7 {
                let inside = (2..5).contains(&x) && (2..5).contains(&y);
                raw.push(10.0 * x as f64 + if inside { 50.0 } else { 0.0 });
                mask.push(inside as u8);
            }
        }
        let raw = luma_from_vec(7, 7, raw);
        let mask: Mask = luma_from_vec(7, 7, mask);

        let corrected = correct_background(&raw, &mask).unwrap();
        // the hole fills to the lowest rim level on its boundary (column 1)
        assert_eq!(corrected.get_pixel(2, 3).0[0], 60.0);
        assert_eq!(corrected.get_pixel(4, 3).0[0], 80.0);
        assert_eq!(corrected.get_pixel(6, 6).0[0], 0.0);
    }

    #[test]
    fn saturated_mask_is_rejected() {
        let raw = luma_from_vec(3, 3, vec![1.0; 9]);
        let mask: Mask = luma_from_vec(3, 3, vec![1; 9]);
        assert!(matches!(
            correct_background(&raw, &mask),
            Err(ExtractionError::SaturatedMask)
        ));
    }
}
