//! Geometry specifiers
//!
//! | specifier | mode         | target box                                  |
//! |-----------|--------------|---------------------------------------------|
//! | `[WxH]`   | fit inside   | W x H                                       |
//! | `WxH`     | crop to fill | W x H                                       |
//! | `Nw`      | fit inside   | width N-1, height from aspect ratio         |
//! | `Nh`      | fit inside   | height N-1, width from aspect ratio         |
//! | `Nl`      | fit inside   | `Nw` for landscape sources, otherwise `Nh`  |

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use uploader_core::{UploadError, UploadResult};

static BOUNDED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[(\d+)x(\d+)\]$").expect("valid regex"));
static CROPPED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)x(\d+)$").expect("valid regex"));
static SINGLE_SIDE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)([whl])$").expect("valid regex"));

/// How an image is fitted into a target box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeMode {
    /// Scale down until the whole image fits; output may be smaller than the box
    FitInside,
    /// Scale until the box is covered, then crop the overflow around the centre
    CropToFill,
}

impl fmt::Display for ResizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FitInside => write!(f, "fit-inside"),
            Self::CropToFill => write!(f, "crop-to-fill"),
        }
    }
}

/// Pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A parsed geometry specifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Geometry {
    /// `[WxH]`
    Bounded { width: u32, height: u32 },
    /// `WxH`
    Cropped { width: u32, height: u32 },
    /// `Nw`
    Width(u32),
    /// `Nh`
    Height(u32),
    /// `Nl`
    Longest(u32),
}

impl Geometry {
    pub fn parse(input: &str) -> UploadResult<Self> {
        let unsupported = || UploadError::UnsupportedGeometry(input.to_string());
        let number = |s: &str| s.parse::<u32>().map_err(|_| unsupported());

        if let Some(caps) = BOUNDED.captures(input) {
            return Ok(Self::Bounded {
                width: number(&caps[1])?,
                height: number(&caps[2])?,
            });
        }
        if let Some(caps) = CROPPED.captures(input) {
            return Ok(Self::Cropped {
                width: number(&caps[1])?,
                height: number(&caps[2])?,
            });
        }
        if let Some(caps) = SINGLE_SIDE.captures(input) {
            let n = number(&caps[1])?;
            return Ok(match &caps[2] {
                "w" => Self::Width(n),
                "h" => Self::Height(n),
                _ => Self::Longest(n),
            });
        }
        Err(unsupported())
    }

    pub fn mode(&self) -> ResizeMode {
        match self {
            Self::Cropped { .. } => ResizeMode::CropToFill,
            _ => ResizeMode::FitInside,
        }
    }

    /// Target box for a source image.
    ///
    /// Single-side specifiers constrain that side to N-1 and derive the other
    /// side from the source aspect ratio, truncating toward zero.
    pub fn target(&self, source: Dimensions) -> UploadResult<Dimensions> {
        let unsupported = || UploadError::UnsupportedGeometry(self.to_string());

        let (width, height) = match *self {
            Self::Bounded { width, height } | Self::Cropped { width, height } => {
                (width as f64, height as f64)
            }
            Self::Width(n) => by_width(n, source).ok_or_else(unsupported)?,
            Self::Height(n) => by_height(n, source).ok_or_else(unsupported)?,
            Self::Longest(n) => {
                let sides = if source.is_landscape() {
                    by_width(n, source)
                } else {
                    by_height(n, source)
                };
                sides.ok_or_else(unsupported)?
            }
        };

        let (width, height) = (width.trunc(), height.trunc());
        if width < 1.0 || height < 1.0 || width > u32::MAX as f64 || height > u32::MAX as f64 {
            return Err(unsupported());
        }
        Ok(Dimensions::new(width as u32, height as u32))
    }
}

fn by_width(n: u32, source: Dimensions) -> Option<(f64, f64)> {
    if source.width == 0 {
        return None;
    }
    let width = n.checked_sub(1)? as f64;
    Some((width, width * source.height as f64 / source.width as f64))
}

fn by_height(n: u32, source: Dimensions) -> Option<(f64, f64)> {
    if source.height == 0 {
        return None;
    }
    let height = n.checked_sub(1)? as f64;
    Some((height * source.width as f64 / source.height as f64, height))
}

impl FromStr for Geometry {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded { width, height } => write!(f, "[{}x{}]", width, height),
            Self::Cropped { width, height } => write!(f, "{}x{}", width, height),
            Self::Width(n) => write!(f, "{}w", n),
            Self::Height(n) => write!(f, "{}h", n),
            Self::Longest(n) => write!(f, "{}l", n),
        }
    }
}

/// A computed derivative for one style
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativeJob {
    pub style: String,
    pub geometry: String,
    pub width: u32,
    pub height: u32,
    pub mode: ResizeMode,
}

impl DerivativeJob {
    /// Parse `geometry` and compute the target box for `source`
    pub fn plan(style: impl Into<String>, geometry: &str, source: Dimensions) -> UploadResult<Self> {
        let parsed = Geometry::parse(geometry)?;
        let target = parsed.target(source)?;
        Ok(Self {
            style: style.into(),
            geometry: geometry.to_string(),
            width: target.width,
            height: target.height,
            mode: parsed.mode(),
        })
    }

    pub fn target(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

/// Resize and crop steps that turn a source into a thumbnail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailPlan {
    /// Scaled size, `None` when the source is kept as is
    pub resize: Option<Dimensions>,
    /// Centred crop applied after scaling
    pub crop: Option<Dimensions>,
}

impl ThumbnailPlan {
    /// Sources are never enlarged. A crop-to-fill box the source does not
    /// contain shrinks to the source on the short side and is cut out of the
    /// unscaled image.
    pub fn compute(source: Dimensions, target: Dimensions, mode: ResizeMode) -> Self {
        if source.width == 0
            || source.height == 0
            || (target.width >= source.width && target.height >= source.height)
        {
            return Self { resize: None, crop: None };
        }

        if mode == ResizeMode::CropToFill
            && (target.width > source.width || target.height > source.height)
        {
            let cropped = Dimensions::new(
                target.width.min(source.width),
                target.height.min(source.height),
            );
            return Self {
                resize: None,
                crop: (cropped != source).then_some(cropped),
            };
        }

        let ratio_w = target.width as f64 / source.width as f64;
        let ratio_h = target.height as f64 / source.height as f64;
        let ratio = match mode {
            ResizeMode::FitInside => ratio_w.min(ratio_h),
            ResizeMode::CropToFill => ratio_w.max(ratio_h),
        };

        let scaled = Dimensions::new(
            ((source.width as f64 * ratio).round() as u32).max(1),
            ((source.height as f64 * ratio).round() as u32).max(1),
        );

        let crop = match mode {
            ResizeMode::FitInside => None,
            ResizeMode::CropToFill => {
                let cropped = Dimensions::new(
                    target.width.min(scaled.width),
                    target.height.min(scaled.height),
                );
                (cropped != scaled).then_some(cropped)
            }
        };

        Self {
            resize: (scaled != source).then_some(scaled),
            crop,
        }
    }

    /// Final output size
    pub fn output(&self, source: Dimensions) -> Dimensions {
        self.crop.or(self.resize).unwrap_or(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDSCAPE: Dimensions = Dimensions { width: 400, height: 200 };
    const PORTRAIT: Dimensions = Dimensions { width: 200, height: 400 };

    #[test]
    fn test_parse_grammar() {
        assert_eq!(
            Geometry::parse("[100x80]").unwrap(),
            Geometry::Bounded { width: 100, height: 80 }
        );
        assert_eq!(
            Geometry::parse("100x80").unwrap(),
            Geometry::Cropped { width: 100, height: 80 }
        );
        assert_eq!(Geometry::parse("200w").unwrap(), Geometry::Width(200));
        assert_eq!(Geometry::parse("200h").unwrap(), Geometry::Height(200));
        assert_eq!(Geometry::parse("200l").unwrap(), Geometry::Longest(200));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        for input in ["banana", "", "100", "[100x80", "100 x 80", "x100", "100X80", "-5w", "99999999999w"] {
            assert!(
                matches!(Geometry::parse(input), Err(UploadError::UnsupportedGeometry(_))),
                "Input: {:?}",
                input
            );
        }
    }

    #[test]
    fn test_display_round_trips() {
        for input in ["[100x80]", "100x80", "5w", "6h", "7l"] {
            assert_eq!(Geometry::parse(input).unwrap().to_string(), input);
        }
    }

    #[test]
    fn test_bracketed_box_is_fit_inside() {
        let job = DerivativeJob::plan("thumb", "[100x100]", LANDSCAPE).unwrap();
        assert_eq!(job.target(), Dimensions::new(100, 100));
        assert_eq!(job.mode, ResizeMode::FitInside);
    }

    #[test]
    fn test_bare_box_is_crop_to_fill() {
        let job = DerivativeJob::plan("square", "100x100", LANDSCAPE).unwrap();
        assert_eq!(job.target(), Dimensions::new(100, 100));
        assert_eq!(job.mode, ResizeMode::CropToFill);
    }

    #[test]
    fn test_width_constraint_uses_n_minus_one() {
        let job = DerivativeJob::plan("medium", "200w", LANDSCAPE).unwrap();
        assert_eq!(job.width, 199);
        assert_eq!(job.height, 99);
        assert_eq!(job.mode, ResizeMode::FitInside);
    }

    #[test]
    fn test_height_constraint_uses_n_minus_one() {
        let job = DerivativeJob::plan("medium", "101h", LANDSCAPE).unwrap();
        assert_eq!(job.target(), Dimensions::new(200, 100));
    }

    #[test]
    fn test_longest_side_constraint() {
        assert_eq!(
            Geometry::Longest(101).target(LANDSCAPE).unwrap(),
            Dimensions::new(100, 50)
        );
        assert_eq!(
            Geometry::Longest(101).target(PORTRAIT).unwrap(),
            Dimensions::new(50, 100)
        );
        // square sources are treated as "not wider", i.e. height-constrained
        assert_eq!(
            Geometry::Longest(11).target(Dimensions::new(30, 30)).unwrap(),
            Dimensions::new(10, 10)
        );
    }

    #[test]
    fn test_degenerate_targets_are_unsupported() {
        assert!(Geometry::Width(1).target(LANDSCAPE).is_err());
        assert!(Geometry::Width(0).target(LANDSCAPE).is_err());
        assert!(Geometry::Width(3).target(Dimensions::new(400, 1)).is_err());
        assert!(Geometry::Bounded { width: 0, height: 10 }.target(LANDSCAPE).is_err());
        assert!(Geometry::Height(10).target(Dimensions::new(10, 0)).is_err());
    }

    #[test]
    fn test_thumbnail_fit_inside() {
        let plan = ThumbnailPlan::compute(LANDSCAPE, Dimensions::new(100, 100), ResizeMode::FitInside);
        assert_eq!(plan.resize, Some(Dimensions::new(100, 50)));
        assert_eq!(plan.crop, None);
        assert_eq!(plan.output(LANDSCAPE), Dimensions::new(100, 50));
    }

    #[test]
    fn test_thumbnail_crop_to_fill() {
        let plan = ThumbnailPlan::compute(LANDSCAPE, Dimensions::new(100, 100), ResizeMode::CropToFill);
        assert_eq!(plan.resize, Some(Dimensions::new(200, 100)));
        assert_eq!(plan.crop, Some(Dimensions::new(100, 100)));
        assert_eq!(plan.output(LANDSCAPE), Dimensions::new(100, 100));
    }

    #[test]
    fn test_thumbnail_never_enlarges() {
        let plan = ThumbnailPlan::compute(LANDSCAPE, Dimensions::new(800, 800), ResizeMode::CropToFill);
        assert_eq!(plan.output(LANDSCAPE), LANDSCAPE);
        assert!(plan.resize.is_none());
    }

    #[test]
    fn test_crop_to_fill_box_wider_than_source_crops_without_scaling() {
        let source = Dimensions::new(400, 50);
        let plan = ThumbnailPlan::compute(source, Dimensions::new(100, 100), ResizeMode::CropToFill);
        assert_eq!(plan.resize, None);
        assert_eq!(plan.crop, Some(Dimensions::new(100, 50)));
        assert_eq!(plan.output(source), Dimensions::new(100, 50));

        let sliver = Dimensions::new(20000, 1);
        let plan = ThumbnailPlan::compute(sliver, Dimensions::new(100, 100), ResizeMode::CropToFill);
        assert_eq!(plan.resize, None);
        assert_eq!(plan.output(sliver), Dimensions::new(100, 1));
    }

    #[test]
    fn test_fit_inside_box_taller_than_source_still_shrinks() {
        let source = Dimensions::new(400, 50);
        let plan = ThumbnailPlan::compute(source, Dimensions::new(100, 100), ResizeMode::FitInside);
        assert_eq!(plan.resize, Some(Dimensions::new(100, 13)));
        assert_eq!(plan.crop, None);
    }

    #[test]
    fn test_thumbnail_for_width_constrained_box() {
        let target = Geometry::Width(200).target(LANDSCAPE).unwrap();
        let plan = ThumbnailPlan::compute(LANDSCAPE, target, ResizeMode::FitInside);
        let output = plan.output(LANDSCAPE);
        assert!(output.width <= 199 && output.height <= 99);
        assert_eq!(output, Dimensions::new(198, 99));
    }
}
