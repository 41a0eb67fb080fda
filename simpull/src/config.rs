use crate::detector::{ExternalBackend, ExternalDetector, ParticleDetector};
use crate::error::ConfigError;
use crate::object_debugger::ImageDebugConfig;
use crate::trevor::TrevorExtractor;

const TREVOR_DEFAULT_THRESHOLD_SD: f64 = 3.0;
const TREVOR_DEFAULT_TOPHAT_RADIUS: u32 = 50;
const TREVOR_DEFAULT_KERNEL_WIDTH: f64 = 1.0;
const TREVOR_DEFAULT_ERODE_RADIUS: u32 = 1;

const EXTERNAL_DEFAULT_SIZE: f64 = 4.0;
const EXTERNAL_DEFAULT_THRESHOLD_SD: f64 = 3.0;

const LIPOSOME_DEFAULT_THRESHOLD: f64 = 80.0;
const LIPOSOME_DEFAULT_RADIUS: u32 = 3;
const LIPOSOME_DEFAULT_MARGIN: u32 = 30;

fn require(ok: bool, name: &'static str, expected: &'static str, value: f64) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            expected,
            value,
        })
    }
}

/// Settings for the built-in matched filter detector.
#[derive(Debug, Clone, PartialEq)]
pub struct TrevorSettings {
    /// `k` in the `μ + kσ` threshold on the filtered image
    pub threshold_sd: f64,
    /// disk radius of the background removing top-hat
    pub tophat_radius: u32,
    /// width of the Ricker wavelet
    pub kernel_width: f64,
    /// disk radius of the opening that cleans the mask
    pub erode_radius: u32,
}

impl Default for TrevorSettings {
    fn default() -> Self {
        TrevorSettings {
            threshold_sd: TREVOR_DEFAULT_THRESHOLD_SD,
            tophat_radius: TREVOR_DEFAULT_TOPHAT_RADIUS,
            kernel_width: TREVOR_DEFAULT_KERNEL_WIDTH,
            erode_radius: TREVOR_DEFAULT_ERODE_RADIUS,
        }
    }
}

impl TrevorSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(
            self.threshold_sd.is_finite(),
            "threshold",
            "a finite number of standard deviations",
            self.threshold_sd,
        )?;
        require(
            self.tophat_radius > 0,
            "tophat radius",
            "at least 1 pixel",
            self.tophat_radius as f64,
        )?;
        require(
            self.kernel_width.is_finite() && self.kernel_width > 0.0,
            "kernel width",
            "a positive number of pixels",
            self.kernel_width,
        )?;
        if self.threshold_sd <= 2.0 || self.threshold_sd >= 20.0 {
            log::warn!(
                "threshold set as {} SD, suggested range would be 3-20 SD",
                self.threshold_sd
            );
        }
        Ok(())
    }
}

/// Parameters handed to an external particle detector.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalSettings {
    /// estimated particle size in pixels
    pub size: f64,
    /// detection threshold in standard deviations
    pub threshold: f64,
}

impl Default for ExternalSettings {
    fn default() -> Self {
        ExternalSettings {
            size: EXTERNAL_DEFAULT_SIZE,
            threshold: EXTERNAL_DEFAULT_THRESHOLD_SD,
        }
    }
}

impl ExternalSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(
            self.size.is_finite() && self.size > 0.0,
            "particle size",
            "a positive number of pixels",
            self.size,
        )?;
        require(
            self.threshold.is_finite(),
            "threshold",
            "a finite number of standard deviations",
            self.threshold,
        )?;
        if self.threshold <= 2.0 || self.threshold >= 20.0 {
            log::warn!(
                "threshold set as {} SD, suggested range would be 3-20 SD",
                self.threshold
            );
        }
        if self.size >= 15.0 {
            log::warn!(
                "estimated particle size of {} pixels is quite high, particles close to each other might be considered as one",
                self.size
            );
        }
        Ok(())
    }
}

/// How particles are found in a SimPull field of view.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionMethod {
    Trevor(TrevorSettings),
    External(ExternalSettings),
}

impl Default for DetectionMethod {
    fn default() -> Self {
        DetectionMethod::Trevor(TrevorSettings::default())
    }
}

impl DetectionMethod {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            DetectionMethod::Trevor(s) => s.validate(),
            DetectionMethod::External(s) => s.validate(),
        }
    }

    /// Build the detector for this method. The external method needs a
    /// backend; the built-in one ignores it.
    pub fn into_detector(
        self,
        backend: Option<Box<dyn ExternalBackend>>,
        debug: ImageDebugConfig,
    ) -> Result<Box<dyn ParticleDetector>, ConfigError> {
        self.validate()?;
        match self {
            DetectionMethod::Trevor(settings) => Ok(Box::new(TrevorExtractor { settings, debug })),
            DetectionMethod::External(settings) => {
                let backend = backend.ok_or(ConfigError::MissingBackend)?;
                Ok(Box::new(ExternalDetector::new(settings, backend)))
            }
        }
    }
}

/// How the sample and blank channels are registered onto the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentMethod {
    /// integer shift at the peak of the FFT cross-correlation
    CrossCorrelation,
    /// channels are used as recorded
    Identity,
}

impl Default for AlignmentMethod {
    fn default() -> Self {
        AlignmentMethod::CrossCorrelation
    }
}

/// Settings for the liposome influx assay.
#[derive(Debug, Clone, PartialEq)]
pub struct LiposomeSettings {
    /// minimum local max - local min difference for a peak
    pub threshold: f64,
    /// radius of the disk summed around each peak
    pub radius: u32,
    /// peaks closer than this to any border are dropped
    pub margin: u32,
    pub alignment: AlignmentMethod,
}

impl Default for LiposomeSettings {
    fn default() -> Self {
        LiposomeSettings {
            threshold: LIPOSOME_DEFAULT_THRESHOLD,
            radius: LIPOSOME_DEFAULT_RADIUS,
            margin: LIPOSOME_DEFAULT_MARGIN,
            alignment: AlignmentMethod::default(),
        }
    }
}

impl LiposomeSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(
            self.threshold.is_finite() && self.threshold >= 0.0,
            "liposome threshold",
            "a non-negative intensity difference",
            self.threshold,
        )?;
        if self.threshold <= 20.0 || self.threshold >= 160.0 {
            log::warn!(
                "threshold set as {}, suggested range would be 20-160",
                self.threshold
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(TrevorSettings::default().validate().is_ok());
        assert!(ExternalSettings::default().validate().is_ok());
        assert!(LiposomeSettings::default().validate().is_ok());
        assert_eq!(LiposomeSettings::default().radius, 3);
        assert_eq!(LiposomeSettings::default().margin, 30);
        assert_eq!(TrevorSettings::default().tophat_radius, 50);
    }

    #[test]
    fn bad_numbers_are_config_errors() {
        let s = TrevorSettings {
            kernel_width: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            s.validate(),
            Err(ConfigError::InvalidParameter {
                name: "kernel width",
                ..
            })
        ));

        let s = ExternalSettings {
            size: f64::NAN,
            threshold: 3.0,
        };
        assert!(s.validate().is_err());

        let s = LiposomeSettings {
            threshold: f64::INFINITY,
            ..Default::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn out_of_range_is_only_a_warning() {
        let s = TrevorSettings {
            threshold_sd: 1.0,
            ..Default::default()
        };
        assert!(s.validate().is_ok());
    }

    #[test]
    fn external_method_needs_a_backend() {
        let method = DetectionMethod::External(ExternalSettings::default());
        assert!(matches!(
            method.into_detector(None, ImageDebugConfig::default()),
            Err(ConfigError::MissingBackend)
        ));

        let detector = DetectionMethod::default()
            .into_detector(None, ImageDebugConfig::default())
            .unwrap();
        assert_eq!(detector.name(), "trevor");
    }
}
