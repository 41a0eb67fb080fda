use crate::raster::FloatImage;
use image::Luma;

#[inline]
fn source_coordinate(dst: u32, scale: f64, src_len: u32) -> (usize, usize, f64) {
    let max = (src_len - 1) as f64;
    let s = ((dst as f64 + 0.5) * scale - 0.5).max(0.0).min(max);
    let lo = s.floor() as usize;
    let hi = std::cmp::min(lo + 1, src_len as usize - 1);
    (lo, hi, s - lo as f64)
}

/// Bilinear resize with pixel centres aligned, edge pixels replicated.
pub(crate) fn resize_bilinear(img: &FloatImage, width: u32, height: u32) -> FloatImage {
    let (src_width, src_height) = img.dimensions();
    if (src_width, src_height) == (width, height) {
        return img.clone();
    }
    if src_width == 0 || src_height == 0 {
        return FloatImage::new(width, height);
    }

    let scale_x = src_width as f64 / width as f64;
    let scale_y = src_height as f64 / height as f64;
    let src = img.as_raw();
    let stride = src_width as usize;

    let columns = (0..width)
        .map(|x| source_coordinate(x, scale_x, src_width))
        .collect::<Vec<_>>();

    FloatImage::from_fn(width, height, |x, y| {
        let (y0, y1, ty) = source_coordinate(y, scale_y, src_height);
        let (x0, x1, tx) = columns[x as usize];
        let top = src[y0 * stride + x0] * (1.0 - tx) + src[y0 * stride + x1] * tx;
        let bottom = src[y1 * stride + x0] * (1.0 - tx) + src[y1 * stride + x1] * tx;
        Luma([top * (1.0 - ty) + bottom * ty])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::luma_from_vec;
    use approx::assert_relative_eq;

    #[test]
    fn same_size_is_identity() {
        let img = luma_from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(resize_bilinear(&img, 2, 2), img);
    }

    #[test]
    fn linear_ramp_stays_linear_inside() {
        let img = luma_from_vec(4, 1, vec![0.0, 1.0, 2.0, 3.0]);
        let up = resize_bilinear(&img, 8, 1);
        // centre of output pixel 3 sits at source 1.25
        assert_relative_eq!(up.get_pixel(3, 0).0[0], 1.25, epsilon = 1e-12);
        assert_relative_eq!(up.get_pixel(0, 0).0[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(up.get_pixel(7, 0).0[0], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn constant_survives_any_resize() {
        let img = luma_from_vec(5, 3, vec![7.0; 15]);
        let out = resize_bilinear(&img, 11, 9);
        assert_eq!(out.dimensions(), (11, 9));
        assert!(out.as_raw().iter().all(|&v| (v - 7.0).abs() < 1e-12));
    }
}
