use crate::error::ExtractionError;
use crate::raster::{luma_from_vec, LabelImage, LumaImage};
use image::Primitive;

const INITIAL_GROUPS: usize = 64;

/// Which neighbours join two set pixels into the same region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// edge neighbours only
    Four,
    /// edge and corner neighbours
    Eight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Label(u32);

impl Label {
    const BACKGROUND: Label = Label(0);

    #[inline]
    fn as_index(self) -> usize {
        self.0 as usize
    }
}

fn collapsing_find_minlabel(label: Label, equivs: &mut [Label]) -> Label {
    let mut min = label;
    let mut label = label;
    while equivs[min.as_index()] != min {
        min = equivs[min.as_index()]
    }
    while label != min {
        let next = equivs[label.as_index()];
        equivs[label.as_index()] = min;
        label = next;
    }
    min
}

/// Label the set (non-zero) pixels of `img` into connected regions.
///
/// Regions are numbered `1..=N` in raster order of their first pixel, so the
/// labels are contiguous. Returns the label image and `N`.
pub fn label<T: Primitive + 'static>(
    img: &LumaImage<T>,
    connectivity: Connectivity,
) -> Result<(LabelImage, usize), ExtractionError> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    let src = img.as_raw();

    let mut equivs = Vec::with_capacity(INITIAL_GROUPS);
    equivs.push(Label::BACKGROUND);
    let mut provisional = vec![Label::BACKGROUND; width * height];

    let mut prior = Vec::with_capacity(4);
    for iy in 0..height {
        for ix in 0..width {
            let idx = iy * width + ix;
            if src[idx].is_zero() {
                continue;
            }

            prior.clear();
            if ix > 0 {
                prior.push(idx - 1);
            }
            if iy > 0 {
                prior.push(idx - width);
                if connectivity == Connectivity::Eight {
                    if ix > 0 {
                        prior.push(idx - width - 1);
                    }
                    if ix + 1 < width {
                        prior.push(idx - width + 1);
                    }
                }
            }

            let mut thislabelmin: Option<Label> = None;
            for &n in &prior {
                let other = provisional[n];
                if other == Label::BACKGROUND {
                    continue;
                }
                let otherlabelmin = collapsing_find_minlabel(other, &mut equivs);
                thislabelmin = Some(match thislabelmin {
                    None => otherlabelmin,
                    Some(current) if current == otherlabelmin => current,
                    Some(current) => {
                        let oldlabelmin = std::cmp::max(current, otherlabelmin);
                        let newlabelmin = std::cmp::min(current, otherlabelmin);
                        equivs[oldlabelmin.as_index()] = newlabelmin;
                        newlabelmin
                    }
                });
            }

            provisional[idx] = match thislabelmin {
                Some(l) => l,
                None => {
                    if equivs.len() > u32::MAX as usize {
                        return Err(ExtractionError::ExhaustedLabels);
                    }
                    let fresh = Label(equivs.len() as u32);
                    equivs.push(fresh);
                    fresh
                }
            };
        }
    }

    // relabel roots to 1..=N in order of first appearance
    let mut final_labels = vec![0u32; equivs.len()];
    let mut count = 0u32;
    let mut labels = vec![0u32; width * height];
    for (idx, &prov) in provisional.iter().enumerate() {
        if prov == Label::BACKGROUND {
            continue;
        }
        let root = collapsing_find_minlabel(prov, &mut equivs);
        if final_labels[root.as_index()] == 0 {
            count += 1;
            final_labels[root.as_index()] = count;
        }
        labels[idx] = final_labels[root.as_index()];
    }
    log::trace!("labelled {} regions from {} provisional labels", count, equivs.len() - 1);

    Ok((luma_from_vec(img.width(), img.height(), labels), count as usize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Mask;

    fn mask(width: u32, rows: &[&str]) -> Mask {
        let data = rows
            .iter()
            .flat_map(|r| r.chars().map(|c| (c == '#') as u8))
            .collect::<Vec<_>>();
        luma_from_vec(width, rows.len() as u32, data)
    }

    #[test]
    fn diagonal_touch_depends_on_connectivity() {
        let m = mask(4, &["#...", ".#..", "...#"]);
        let (_, n8) = label(&m, Connectivity::Eight).unwrap();
        let (_, n4) = label(&m, Connectivity::Four).unwrap();
        assert_eq!(n8, 2);
        assert_eq!(n4, 3);
    }

    #[test]
    fn u_shape_merges_into_one_region() {
        let m = mask(5, &["#...#", "#...#", "#####"]);
        let (labels, n) = label(&m, Connectivity::Four).unwrap();
        assert_eq!(n, 1);
        assert!(labels
            .as_raw()
            .iter()
            .zip(m.as_raw())
            .all(|(&l, &p)| (l == 1) == (p == 1)));
    }

    #[test]
    fn labels_are_contiguous_in_raster_order() {
        let m = mask(7, &["..#...#", "#......", "#..##.."]);
        let (labels, n) = label(&m, Connectivity::Eight).unwrap();
        assert_eq!(n, 4);
        assert_eq!(labels.dimensions(), m.dimensions());
        assert_eq!(labels.get_pixel(2, 0).0[0], 1);
        assert_eq!(labels.get_pixel(6, 0).0[0], 2);
        assert_eq!(labels.get_pixel(0, 1).0[0], 3);
        assert_eq!(labels.get_pixel(0, 2).0[0], 3);
        assert_eq!(labels.get_pixel(4, 2).0[0], 4);

        let mut seen = labels.as_raw().iter().filter(|&&l| l > 0).cloned().collect::<Vec<_>>();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen, vec![1, 2, 3, 4]);
    }

    #[test]
    fn empty_mask_has_no_regions() {
        let m = mask(3, &["...", "..."]);
        let (labels, n) = label(&m, Connectivity::Eight).unwrap();
        assert_eq!(n, 0);
        assert!(labels.as_raw().iter().all(|&l| l == 0));
    }
}
