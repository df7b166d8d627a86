//! Processing pipelines described in YAML or TOML files.
//!
//! ```yaml
//! mode: high-quality
//! steps:
//!   - op: hotpixel
//!     sensitivity: level4
//!   - op: convert
//!     format: RGB8
//!   - op: gamma
//!     value: 1.8
//!   - op: rotate
//!     angle: 90
//! ```

use std::path::Path;

use color_eyre::eyre::{self, WrapErr};
use serde::{Deserialize, Serialize};

use ipl_convert::{ConversionMode, ImageConverter};
use ipl_formats::PixelFormat;
use ipl_image::Image;
use ipl_imops::{
    Binning, BinningConfig, ColorCorrector, ColorCorrectorConfig, Decimation, DecimationConfig,
    EdgeEnhancement, EdgeEnhancementConfig, Gain, GainConfig, GammaConfig, GammaCorrector,
    HotpixelConfig, HotpixelCorrection, Mirror, Operator, RotationAngle,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Step {
    Convert { format: PixelFormat },
    Binning(BinningConfig),
    Decimation(DecimationConfig),
    Gamma(GammaConfig),
    ColorCorrection(ColorCorrectorConfig),
    EdgeEnhancement(EdgeEnhancementConfig),
    Hotpixel(HotpixelConfig),
    Gain(GainConfig),
    Mirror { axis: Mirror },
    Rotate { angle: RotationAngle },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Debayering quality used by every conversion step.
    pub mode: ConversionMode,
    pub steps: Vec<Step>,
}

impl PipelineConfig {
    pub fn example() -> Self {
        Self {
            mode: ConversionMode::HighQuality,
            steps: vec![
                Step::Hotpixel(HotpixelConfig::default()),
                Step::Convert {
                    format: PixelFormat::RGB8,
                },
                Step::Gamma(GammaConfig { value: 1.8 }),
                Step::Rotate {
                    angle: RotationAngle::Degree90,
                },
            ],
        }
    }

    /// Parse a YAML or TOML file, chosen by extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let buf = std::fs::read_to_string(path)
            .with_context(|| format!("reading pipeline file \"{}\"", path.display()))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let cfg = match ext.as_deref() {
            Some("yaml" | "yml") => serde_yaml::from_str(&buf)
                .with_context(|| format!("parsing YAML pipeline \"{}\"", path.display()))?,
            Some("toml") => toml::from_str(&buf)
                .with_context(|| format!("parsing TOML pipeline \"{}\"", path.display()))?,
            _ => eyre::bail!(
                "unrecognized file extension for pipeline: \"{}\"",
                path.display()
            ),
        };
        Ok(cfg)
    }
}

enum Stage {
    Convert(PixelFormat),
    Operator(Box<dyn Operator>),
}

/// A validated, ready to run pipeline.
pub struct Pipeline {
    converter: ImageConverter,
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(cfg: &PipelineConfig) -> eyre::Result<Self> {
        let stages = cfg
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                stage_for(step).with_context(|| format!("pipeline step {} ({step:?})", i + 1))
            })
            .collect::<eyre::Result<Vec<_>>>()?;
        Ok(Self {
            converter: ImageConverter::with_mode(cfg.mode),
            stages,
        })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn run(&mut self, image: &Image<'_>) -> eyre::Result<Image<'static>> {
        let mut current = image.to_owned_image();
        for (i, stage) in self.stages.iter_mut().enumerate() {
            current = match stage {
                Stage::Convert(target) => {
                    tracing::debug!("step {}: convert {} to {target}", i + 1, current.pixel_format());
                    self.converter.convert(&current, *target)?
                }
                Stage::Operator(op) => {
                    tracing::debug!("step {}: {} on {}", i + 1, op.name(), current.pixel_format());
                    op.apply(&current)
                        .with_context(|| format!("step {} ({})", i + 1, op.name()))?
                }
            };
        }
        Ok(current)
    }
}

fn stage_for(step: &Step) -> ipl_formats::Result<Stage> {
    let op: Box<dyn Operator> = match step {
        Step::Convert { format } => return Ok(Stage::Convert(*format)),
        Step::Binning(c) => Box::new(Binning::with_config(*c)?),
        Step::Decimation(c) => Box::new(Decimation::with_config(*c)?),
        Step::Gamma(c) => Box::new(GammaCorrector::with_config(*c)?),
        Step::ColorCorrection(c) => Box::new(ColorCorrector::with_config(*c)?),
        Step::EdgeEnhancement(c) => Box::new(EdgeEnhancement::with_config(*c)?),
        Step::Hotpixel(c) => Box::new(HotpixelCorrection::with_config(*c)?),
        Step::Gain(c) => Box::new(Gain::with_config(*c)?),
        Step::Mirror { axis } => Box::new(*axis),
        Step::Rotate { angle } => Box::new(*angle),
    };
    Ok(Stage::Operator(op))
}
