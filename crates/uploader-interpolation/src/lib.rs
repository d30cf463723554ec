//! # uploader-interpolation
//!
//! Turns attachment path and URL templates into concrete strings.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uploader_interpolation::{InterpolationContext, Interpolator, PathResolver};
//!
//! let resolver = PathResolver::new(registry, Arc::new(Interpolator::new()), "/srv/webroot", salt);
//! let paths = resolver.get_paths("Image", Some(1), "file", "cat.png", "thumb", &InterpolationContext::new())?;
//! // paths.path == Some("/srv/webroot/uploads/images/1/thumb-cat.png")
//! ```

pub mod interpolator;
pub mod resolver;

pub use interpolator::{substitute, FileContext, InterpolationContext, Interpolator, Resolver};
pub use resolver::{filename_hash, PathResolver, ResolvedPaths};
