use image::{ImageBuffer, Luma, Primitive};

/// Single channel image, the storage type of every pipeline stage.
pub type LumaImage<T> = ImageBuffer<Luma<T>, Vec<T>>;

/// Intensities after stack averaging, and everything derived from them.
pub type FloatImage = LumaImage<f64>;

/// Binary particle mask. Pixels are 0 or 1.
pub type Mask = LumaImage<u8>;

/// Connected regions of a mask. 0 is background, `1..=N` are regions.
pub type LabelImage = LumaImage<u32>;

pub(crate) fn luma_from_vec<T: Primitive + 'static>(
    width: u32,
    height: u32,
    data: Vec<T>,
) -> LumaImage<T> {
    assert_eq!(
        data.len(),
        width as usize * height as usize,
        "buffer does not match {}x{}",
        width,
        height
    );
    ImageBuffer::from_raw(width, height, data).expect("invalid container")
}

pub(crate) fn luma_max<T: Primitive + 'static>(img: &LumaImage<T>) -> T {
    img.as_raw()
        .iter()
        .cloned()
        .fold(None, |a: Option<T>, b| match a {
            Some(inner) if inner > b => Some(inner),
            _ => Some(b),
        })
        .unwrap_or_else(T::zero)
}

pub(crate) fn luma_min<T: Primitive + 'static>(img: &LumaImage<T>) -> T {
    img.as_raw()
        .iter()
        .cloned()
        .fold(None, |a: Option<T>, b| match a {
            Some(inner) if inner < b => Some(inner),
            _ => Some(b),
        })
        .unwrap_or_else(T::zero)
}

/// Keep the pixels of `img` where the mask is set (or, with `invert`, where
/// it is clear) and zero the rest.
pub(crate) fn luma_apply_mask<T: Primitive + 'static>(
    img: &LumaImage<T>,
    mask: &Mask,
    invert: bool,
) -> LumaImage<T> {
    assert_eq!(img.dimensions(), mask.dimensions());
    let data = img
        .as_raw()
        .iter()
        .zip(mask.as_raw())
        .map(|(&p, &m)| if (m > 0) != invert { p } else { T::zero() })
        .collect();
    luma_from_vec(img.width(), img.height(), data)
}

pub(crate) fn mask_is_full(mask: &Mask) -> bool {
    mask.as_raw().iter().all(|&m| m > 0)
}
