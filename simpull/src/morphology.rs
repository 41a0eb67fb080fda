//! Grayscale morphology on disk and square structuring elements.
//!
//! Windows are clipped at the image border: pixels outside the image never
//! take part in a min or max.

use crate::raster::{luma_from_vec, FloatImage, LumaImage};
use image::Primitive;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extreme {
    Min,
    Max,
}

impl Extreme {
    #[inline]
    fn dominates<T: PartialOrd + Copy>(self, a: T, b: T) -> bool {
        match self {
            Extreme::Min => a <= b,
            Extreme::Max => a >= b,
        }
    }

    #[inline]
    fn pick<T: PartialOrd + Copy>(self, a: T, b: T) -> T {
        if self.dominates(a, b) {
            a
        } else {
            b
        }
    }
}

/// Half widths of the horizontal chords of a digital disk, indexed by row
/// offset `0..=radius`. A pixel belongs to the disk when `dx² + dy² <= r²`.
fn disk_chords(radius: u32) -> Vec<usize> {
    let r2 = radius as u64 * radius as u64;
    (0..=radius as u64)
        .map(|dy| {
            let mut half = ((r2 - dy * dy) as f64).sqrt() as u64;
            while half * half + dy * dy > r2 {
                half -= 1;
            }
            while (half + 1) * (half + 1) + dy * dy <= r2 {
                half += 1;
            }
            half as usize
        })
        .collect()
}

/// Running min/max over `[x - half, x + half]` using a monotonic deque.
fn sliding_extreme<T: Copy + PartialOrd>(src: &[T], half: usize, out: &mut [T], op: Extreme) {
    let n = src.len();
    let mut window: VecDeque<usize> = VecDeque::with_capacity(2 * half + 1);
    let mut next = 0;
    for x in 0..n {
        let hi = std::cmp::min(x + half, n - 1);
        while next <= hi {
            while let Some(&back) = window.back() {
                if op.dominates(src[next], src[back]) {
                    window.pop_back();
                } else {
                    break;
                }
            }
            window.push_back(next);
            next += 1;
        }
        let lo = x.saturating_sub(half);
        while let Some(&front) = window.front() {
            if front < lo {
                window.pop_front();
            } else {
                break;
            }
        }
        out[x] = src[window[0]];
    }
}

fn disk_filter<T: Primitive + 'static>(
    img: &LumaImage<T>,
    radius: u32,
    op: Extreme,
) -> LumaImage<T> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let src = img.as_raw();
    let mut out = src.clone();
    if radius == 0 || width == 0 || height == 0 {
        return luma_from_vec(img.width(), img.height(), out);
    }

    let mut rows = vec![T::zero(); width * height];
    for (dy, &half) in disk_chords(radius).iter().enumerate() {
        for (src_row, row) in src.chunks(width).zip(rows.chunks_mut(width)) {
            sliding_extreme(src_row, half, row, op);
        }
        for y in 0..height {
            let sources = [y.checked_sub(dy), Some(y + dy).filter(|&s| s < height)];
            for sy in sources.iter().flatten() {
                let dst = &mut out[y * width..(y + 1) * width];
                let chord = &rows[sy * width..(sy + 1) * width];
                for (d, &c) in dst.iter_mut().zip(chord) {
                    *d = op.pick(*d, c);
                }
            }
        }
    }
    luma_from_vec(img.width(), img.height(), out)
}

/// Minimum over a disk of the given radius.
pub fn erode<T: Primitive + 'static>(img: &LumaImage<T>, radius: u32) -> LumaImage<T> {
    disk_filter(img, radius, Extreme::Min)
}

/// Maximum over a disk of the given radius.
pub fn dilate<T: Primitive + 'static>(img: &LumaImage<T>, radius: u32) -> LumaImage<T> {
    disk_filter(img, radius, Extreme::Max)
}

pub fn opening<T: Primitive + 'static>(img: &LumaImage<T>, radius: u32) -> LumaImage<T> {
    dilate(&erode(img, radius), radius)
}

/// `img - opening(img)`: what is left after removing everything the disk
/// cannot fit inside. Never negative.
pub fn white_tophat(img: &FloatImage, radius: u32) -> FloatImage {
    let opened = opening(img, radius);
    let data = img
        .as_raw()
        .iter()
        .zip(opened.as_raw())
        .map(|(&p, &o)| p - o)
        .collect();
    luma_from_vec(img.width(), img.height(), data)
}

fn square_filter<T: Primitive + 'static>(img: &LumaImage<T>, half: usize, op: Extreme) -> LumaImage<T> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let mut horizontal = vec![T::zero(); width * height];
    for (src_row, row) in img.as_raw().chunks(width).zip(horizontal.chunks_mut(width)) {
        sliding_extreme(src_row, half, row, op);
    }

    let mut out = vec![T::zero(); width * height];
    let mut column = Vec::with_capacity(height);
    let mut filtered = vec![T::zero(); height];
    for x in 0..width {
        column.clear();
        column.extend((0..height).map(|y| horizontal[y * width + x]));
        sliding_extreme(&column, half, &mut filtered, op);
        for (y, v) in filtered.iter().enumerate() {
            out[y * width + x] = *v;
        }
    }
    luma_from_vec(img.width(), img.height(), out)
}

/// Maximum over the `(2 * half + 1)` square around each pixel.
pub fn maximum_filter<T: Primitive + 'static>(img: &LumaImage<T>, half: usize) -> LumaImage<T> {
    square_filter(img, half, Extreme::Max)
}

/// Minimum over the `(2 * half + 1)` square around each pixel.
pub fn minimum_filter<T: Primitive + 'static>(img: &LumaImage<T>, half: usize) -> LumaImage<T> {
    square_filter(img, half, Extreme::Min)
}

const PRIOR: [(isize, isize); 4] = [(-1, 0), (-1, -1), (0, -1), (1, -1)];
const POSTERIOR: [(isize, isize); 4] = [(1, 0), (1, 1), (0, 1), (-1, 1)];
const ALL: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

#[inline]
fn neighbours<'a>(
    idx: usize,
    width: usize,
    height: usize,
    offsets: &'a [(isize, isize)],
) -> impl Iterator<Item = usize> + 'a {
    let x = (idx % width) as isize;
    let y = (idx / width) as isize;
    offsets.iter().filter_map(move |&(dx, dy)| {
        let nx = x + dx;
        let ny = y + dy;
        if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
            None
        } else {
            Some(ny as usize * width + nx as usize)
        }
    })
}

/// 8-connected reconstruction by dilation of `marker` under `mask`, in place.
/// Raster and anti-raster sweeps followed by queue propagation.
fn reconstruct_by_dilation(marker: &mut [f64], mask: &[f64], width: usize, height: usize) {
    for (m, &limit) in marker.iter_mut().zip(mask) {
        *m = m.min(limit);
    }

    for idx in 0..marker.len() {
        let v = neighbours(idx, width, height, &PRIOR).fold(marker[idx], |a, n| a.max(marker[n]));
        marker[idx] = v.min(mask[idx]);
    }

    let mut fifo = VecDeque::new();
    for idx in (0..marker.len()).rev() {
        let v = neighbours(idx, width, height, &POSTERIOR)
            .fold(marker[idx], |a, n| a.max(marker[n]));
        marker[idx] = v.min(mask[idx]);
        let current = marker[idx];
        if neighbours(idx, width, height, &POSTERIOR)
            .any(|n| marker[n] < current && marker[n] < mask[n])
        {
            fifo.push_back(idx);
        }
    }

    while let Some(idx) = fifo.pop_front() {
        let current = marker[idx];
        for n in neighbours(idx, width, height, &ALL) {
            if marker[n] < current && marker[n] != mask[n] {
                marker[n] = current.min(mask[n]);
                fifo.push_back(n);
            }
        }
    }
}

/// Grayscale reconstruction by erosion: erode `seed` repeatedly, never going
/// below `mask`, until nothing changes. `seed` must be pointwise `>= mask`.
pub fn reconstruct_by_erosion(seed: &FloatImage, mask: &FloatImage) -> FloatImage {
    assert_eq!(seed.dimensions(), mask.dimensions());
    let (width, height) = (seed.width() as usize, seed.height() as usize);
    let mut marker = seed.as_raw().iter().map(|v| -v).collect::<Vec<_>>();
    let negated_mask = mask.as_raw().iter().map(|v| -v).collect::<Vec<_>>();
    reconstruct_by_dilation(&mut marker, &negated_mask, width, height);
    let data = marker.into_iter().map(|v| -v).collect();
    luma_from_vec(seed.width(), seed.height(), data)
}
