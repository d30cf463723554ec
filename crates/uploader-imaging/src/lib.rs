//! # uploader-imaging
//!
//! Geometry specifiers and derivative image generation for Uploader RS.
//!
//! - `geometry`: the `[WxH]` / `WxH` / `Nw` / `Nh` / `Nl` grammar and target box math
//! - `backend`: the image backend capability and its `image`-crate engines
//! - `derivative`: per-style resizing driven by a geometry specifier

pub mod backend;
pub mod derivative;
pub mod geometry;

pub use backend::{backend_for, probe_dimensions, ImageBackend, ImageHandle, RasterBackend, Sampling};
pub use derivative::{DerivativeGenerator, ResizeOptions};
pub use geometry::{DerivativeJob, Dimensions, Geometry, ResizeMode, ThumbnailPlan};
