//! Derivative generation
//!
//! Produces one resized file per style from a primary image, and downscales
//! primaries that exceeded a max-width limit.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, instrument};
use uploader_core::{ImageEngine, UploadResult};

use crate::backend::{backend_for, ImageBackend};
use crate::geometry::{DerivativeJob, Geometry};

/// Everything one resize needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeOptions {
    /// The file to read
    pub source: PathBuf,
    /// Where to write the result; may equal `source`
    pub destination: PathBuf,
    /// Geometry specifier, e.g. `[100x100]`
    pub geometry: String,
    pub engine: ImageEngine,
    pub quality: u8,
}

/// Resizes images through the backend selected by each call's engine
#[derive(Clone, Default)]
pub struct DerivativeGenerator {
    /// Replaces engine selection when set
    backend: Option<Arc<dyn ImageBackend>>,
}

impl std::fmt::Debug for DerivativeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivativeGenerator")
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .finish()
    }
}

impl DerivativeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator that always uses `backend`
    pub fn with_backend(backend: Arc<dyn ImageBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    fn backend(&self, engine: ImageEngine) -> &dyn ImageBackend {
        match &self.backend {
            Some(backend) => backend.as_ref(),
            None => backend_for(engine),
        }
    }

    /// Produce the derivative for `style`.
    ///
    /// Fails with `UnsupportedGeometry` before touching the source when the
    /// specifier does not parse. Whether the source exists is up to the
    /// backend; [`RasterBackend`](crate::backend::RasterBackend) reports
    /// `SourceMissing`.
    #[instrument(skip(self, options), fields(geometry = %options.geometry))]
    pub fn resize(&self, style: &str, options: &ResizeOptions) -> UploadResult<DerivativeJob> {
        Geometry::parse(&options.geometry)?;

        let backend = self.backend(options.engine);
        let image = backend.open(&options.source)?;
        let job = DerivativeJob::plan(style, &options.geometry, image.dimensions())?;

        let thumbnail = image.thumbnail(job.target(), job.mode)?;
        thumbnail.save(&options.destination, options.quality)?;

        debug!(
            backend = backend.name(),
            source = ?options.source,
            destination = ?options.destination,
            target = %job.target(),
            output = %thumbnail.dimensions(),
            mode = %job.mode,
            "Derivative written"
        );

        Ok(job)
    }

    /// Downscale a file in place so it fits `max_width` (as geometry `{max_width}w`)
    pub fn downscale_to_width(
        &self,
        path: PathBuf,
        max_width: u32,
        engine: ImageEngine,
        quality: u8,
    ) -> UploadResult<DerivativeJob> {
        let options = ResizeOptions {
            source: path.clone(),
            destination: path,
            geometry: format!("{}w", max_width),
            engine,
            quality,
        };
        self.resize(uploader_core::ORIGINAL_STYLE, &options)
    }
}
