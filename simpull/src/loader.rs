use crate::error::ImageReadError;
use crate::raster::{luma_from_vec, FloatImage};
use image::Luma;
use std::{fs::File, io::BufReader, path};
use tiff::decoder::{Decoder, DecodingResult};

/// Load a field of view as a single floating point frame.
///
/// TIFF files are read page by page and a multi-page stack is averaged over
/// its frames. Anything else goes through `image` and is converted to 16-bit
/// grayscale first.
pub fn load_from_path<P: AsRef<path::Path>>(p: P) -> Result<FloatImage, ImageReadError> {
    let p = p.as_ref();
    if is_tiff(p) {
        load_tiff_stack(p)
    } else {
        load_single(p)
    }
}

fn is_tiff(p: &path::Path) -> bool {
    p.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
        .unwrap_or(false)
}

fn load_single(p: &path::Path) -> Result<FloatImage, ImageReadError> {
    let img = image::open(p).map_err(|source| ImageReadError::Image {
        path: p.to_owned(),
        source,
    })?;
    let gray = img.to_luma16();
    Ok(FloatImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([gray.get_pixel(x, y).0[0] as f64])
    }))
}

fn load_tiff_stack(p: &path::Path) -> Result<FloatImage, ImageReadError> {
    let tiff_err = |source| ImageReadError::Tiff {
        path: p.to_owned(),
        source,
    };

    let f = File::open(p).map_err(|source| ImageReadError::Io {
        path: p.to_owned(),
        source,
    })?;
    let mut decoder = Decoder::new(BufReader::new(f)).map_err(tiff_err)?;
    let expected = decoder.dimensions().map_err(tiff_err)?;
    let npix = expected.0 as usize * expected.1 as usize;

    let mut sum = vec![0f64; npix];
    let mut frames = 0usize;
    loop {
        let found = decoder.dimensions().map_err(tiff_err)?;
        if found != expected {
            return Err(ImageReadError::FrameMismatch {
                path: p.to_owned(),
                frame: frames,
                expected,
                found,
            });
        }
        let frame = frame_to_f64(decoder.read_image().map_err(tiff_err)?);
        if frame.len() != npix {
            return Err(ImageReadError::NotGrayscale {
                path: p.to_owned(),
                samples: frame.len() / npix.max(1),
            });
        }
        for (s, v) in sum.iter_mut().zip(frame) {
            *s += v;
        }
        frames += 1;

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(tiff_err)?;
    }

    log::trace!("averaged {} frame(s) of {:?}", frames, p);
    let n = frames as f64;
    for s in &mut sum {
        *s /= n;
    }
    Ok(luma_from_vec(expected.0, expected.1, sum))
}

#[allow(unreachable_patterns)]
fn frame_to_f64(frame: DecodingResult) -> Vec<f64> {
    match frame {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|p| p as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|p| p as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufWriter;
    use tiff::encoder::{colortype, TiffEncoder};

    fn write_stack(path: &path::Path, width: u32, height: u32, frames: &[Vec<u16>]) {
        let f = BufWriter::new(File::create(path).unwrap());
        let mut encoder = TiffEncoder::new(f).unwrap();
        for frame in frames {
            encoder
                .write_image::<colortype::Gray16>(width, height, frame)
                .unwrap();
        }
    }

    #[test]
    fn stack_is_averaged_over_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("X1Y1R1W1.tif");
        write_stack(
            &path,
            3,
            2,
            &[vec![0, 10, 20, 30, 40, 50], vec![10, 10, 10, 10, 10, 11]],
        );

        let img = load_from_path(&path).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(
            img.into_raw(),
            vec![5.0, 10.0, 15.0, 20.0, 25.0, 30.5]
        );
    }

    #[test]
    fn single_frame_is_cast() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Pos0.tif");
        write_stack(&path, 2, 1, &[vec![7, 65535]]);

        let img = load_from_path(&path).unwrap();
        assert_eq!(img.into_raw(), vec![7.0, 65535.0]);
    }

    #[test]
    fn mismatched_frames_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tif");
        let f = BufWriter::new(File::create(&path).unwrap());
        let mut encoder = TiffEncoder::new(f).unwrap();
        encoder
            .write_image::<colortype::Gray16>(2, 2, &[1, 2, 3, 4])
            .unwrap();
        encoder
            .write_image::<colortype::Gray16>(1, 2, &[1, 2])
            .unwrap();
        drop(encoder);

        match load_from_path(&path) {
            Err(ImageReadError::FrameMismatch { frame, .. }) => assert_eq!(frame, 1),
            other => panic!("unexpected {:?}", other.map(|i| i.dimensions())),
        }
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_from_path("/definitely/not/here.tif").unwrap_err();
        assert!(matches!(err, ImageReadError::Io { .. }));
    }
}
