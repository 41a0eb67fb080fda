use crate::point::{BoundingBox, Point};
use crate::raster::{luma_max, luma_min, FloatImage, LabelImage};
use image::{ImageBuffer, Pixel, Rgb, Rgba};
use imageproc::drawing::{draw_cross_mut, draw_hollow_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Where per-FoV debug images go. Nothing is written when `dir` is unset.
#[derive(Debug, Clone, Default)]
pub struct ImageDebugConfig {
    pub dir: Option<PathBuf>,
}

impl ImageDebugConfig {
    pub fn in_dir<P: Into<PathBuf>>(dir: P) -> ImageDebugConfig {
        ImageDebugConfig {
            dir: Some(dir.into()),
        }
    }

    /// Same setting, one directory further down.
    pub(crate) fn subdir(&self, name: &str) -> ImageDebugConfig {
        ImageDebugConfig {
            dir: self.dir.as_ref().map(|d| d.join(name)),
        }
    }

    pub(crate) fn path(&self, fov: &str, stage: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|d| d.join(format!("{}_{}.png", fov, stage)))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum BasicColor {
    Red,
    Green,
}

impl BasicColor {
    fn rgba(self) -> Rgba<u8> {
        match self {
            BasicColor::Red => Rgba::from_channels(255, 0, 0, 255),
            BasicColor::Green => Rgba::from_channels(0, 255, 0, 255),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Mark {
    Cross(Point),
    Box(BoundingBox),
    Disk { center: Point, radius: u32 },
}

/// Renders a float image stretched to 8 bits with marks drawn on top.
pub(crate) struct ImageDebugger<'a> {
    inner: &'a FloatImage,
    marks: Vec<(Mark, BasicColor)>,
}

impl<'a> ImageDebugger<'a> {
    pub(crate) fn new(img: &'a FloatImage) -> ImageDebugger<'a> {
        ImageDebugger {
            inner: img,
            marks: vec![],
        }
    }

    pub(crate) fn add_mark(&mut self, m: Mark, c: BasicColor) {
        self.marks.push((m, c))
    }

    pub(crate) fn save<P: AsRef<Path>>(&self, name: P) -> anyhow::Result<()> {
        let p = with_png_extension(name.as_ref());
        let img = self.create_printable_image();
        if let Some(parent) = p.parent() {
            std::fs::create_dir_all(parent)?;
        }
        img.save(p)?;
        Ok(())
    }

    fn create_printable_image(&self) -> ImageBuffer<Rgba<u8>, Vec<u8>> {
        let lo = luma_min(self.inner);
        let hi = luma_max(self.inner);
        let span = if hi > lo { hi - lo } else { 1.0 };

        let mut out = ImageBuffer::from_fn(self.inner.width(), self.inner.height(), |x, y| {
            let p = self.inner.get_pixel(x, y).0[0];
            let flux = ((p - lo) / span * 255.0).round().max(0.0).min(255.0) as u8;
            Rgba::from_channels(flux, flux, flux, 255)
        });

        for (mark, color) in &self.marks {
            let c = color.rgba();
            match *mark {
                Mark::Cross(p) => draw_cross_mut(&mut out, c, p.x.round() as i32, p.y.round() as i32),
                Mark::Box(b) => draw_hollow_rect_mut(
                    &mut out,
                    Rect::at(b.x_min as i32, b.y_min as i32).of_size(b.width(), b.height()),
                    c,
                ),
                Mark::Disk { center, radius } => draw_hollow_circle_mut(
                    &mut out,
                    (center.x.round() as i32, center.y.round() as i32),
                    radius as i32,
                    c,
                ),
            }
        }
        out
    }
}

/// Paint each region in its own random color, background black.
pub(crate) fn dump_colored_labels<P: AsRef<Path>>(labels: &LabelImage, name: P) -> anyhow::Result<()> {
    let mut colors = HashMap::new();
    colors.insert(0u32, Rgb::from_channels(0, 0, 0, 0));

    let mut get_color = |obj: u32| {
        *colors.entry(obj).or_insert_with(|| {
            let [r, g, b] = random_color::RandomColor::new().to_rgb_array();
            Rgb::from_channels(r, g, b, 0)
        })
    };

    let pretty = ImageBuffer::from_fn(labels.width(), labels.height(), |x, y| {
        get_color(labels.get_pixel(x, y).0[0])
    });
    let p = with_png_extension(name.as_ref());
    if let Some(parent) = p.parent() {
        std::fs::create_dir_all(parent)?;
    }
    pretty.save(p)?;
    Ok(())
}

fn with_png_extension(p: &Path) -> PathBuf {
    if p.extension().is_none() {
        p.with_extension("png")
    } else {
        p.to_owned()
    }
}
