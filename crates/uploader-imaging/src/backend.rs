//! Image backend capability
//!
//! The derivative generator only talks to [`ImageBackend`] / [`ImageHandle`].
//! Both engines of [`ImageEngine`] are implemented by [`RasterBackend`] on top
//! of the `image` crate and differ in how pixels are resampled.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use uploader_core::{ImageEngine, UploadError, UploadResult};

use crate::geometry::{Dimensions, ResizeMode, ThumbnailPlan};

/// Opens images from disk
pub trait ImageBackend: Send + Sync {
    /// Open an image file
    fn open(&self, path: &Path) -> UploadResult<Box<dyn ImageHandle>>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// A decoded image
pub trait ImageHandle {
    fn dimensions(&self) -> Dimensions;

    /// Scaled (and for crop-to-fill, cropped) copy fitted to `size`
    fn thumbnail(&self, size: Dimensions, mode: ResizeMode) -> UploadResult<Box<dyn ImageHandle>>;

    /// Encode to `path`, format chosen by extension; quality applies to JPEG
    fn save(&self, path: &Path, quality: u8) -> UploadResult<()>;
}

/// Resampling strategy of a [`RasterBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    Filtered(FilterType),
    Fast,
}

/// `image`-crate backed engine
#[derive(Debug, Clone, Copy)]
pub struct RasterBackend {
    sampling: Sampling,
}

static STANDARD: RasterBackend = RasterBackend {
    sampling: Sampling::Filtered(FilterType::Lanczos3),
};

static FAST: RasterBackend = RasterBackend {
    sampling: Sampling::Fast,
};

/// The backend implementing an engine
pub fn backend_for(engine: ImageEngine) -> &'static dyn ImageBackend {
    match engine {
        ImageEngine::Standard => &STANDARD,
        ImageEngine::Fast => &FAST,
    }
}

impl RasterBackend {
    pub fn new(sampling: Sampling) -> Self {
        Self { sampling }
    }
}

impl ImageBackend for RasterBackend {
    fn open(&self, path: &Path) -> UploadResult<Box<dyn ImageHandle>> {
        if !path.is_file() {
            return Err(UploadError::SourceMissing(path.to_path_buf()));
        }
        let image = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(image_error)?;

        Ok(Box::new(RasterImage {
            image,
            sampling: self.sampling,
        }))
    }

    fn name(&self) -> &'static str {
        match self.sampling {
            Sampling::Filtered(_) => "standard",
            Sampling::Fast => "fast",
        }
    }
}

struct RasterImage {
    image: DynamicImage,
    sampling: Sampling,
}

impl RasterImage {
    fn resized(&self, size: Dimensions) -> DynamicImage {
        match self.sampling {
            Sampling::Filtered(filter) => self.image.resize_exact(size.width, size.height, filter),
            Sampling::Fast => self.image.thumbnail_exact(size.width, size.height),
        }
    }
}

impl ImageHandle for RasterImage {
    fn dimensions(&self) -> Dimensions {
        let (width, height) = self.image.dimensions();
        Dimensions::new(width, height)
    }

    fn thumbnail(&self, size: Dimensions, mode: ResizeMode) -> UploadResult<Box<dyn ImageHandle>> {
        let plan = ThumbnailPlan::compute(self.dimensions(), size, mode);

        let mut image = match plan.resize {
            Some(scaled) => self.resized(scaled),
            None => self.image.clone(),
        };
        if let Some(crop) = plan.crop {
            let x = (image.width() - crop.width) / 2;
            let y = (image.height() - crop.height) / 2;
            image = image.crop_imm(x, y, crop.width, crop.height);
        }

        Ok(Box::new(RasterImage {
            image,
            sampling: self.sampling,
        }))
    }

    fn save(&self, path: &Path, quality: u8) -> UploadResult<()> {
        let format = ImageFormat::from_path(path).map_err(image_error)?;

        match format {
            ImageFormat::Jpeg => {
                let mut writer = BufWriter::new(File::create(path)?);
                let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
                DynamicImage::ImageRgb8(self.image.to_rgb8())
                    .write_with_encoder(encoder)
                    .map_err(image_error)?;
                writer.flush()?;
            }
            _ => self
                .image
                .save_with_format(path, format)
                .map_err(image_error)?,
        }
        Ok(())
    }
}

fn image_error(err: image::ImageError) -> UploadError {
    match err {
        image::ImageError::IoError(io) => UploadError::Io(io),
        other => UploadError::Image(other.to_string()),
    }
}

/// Read pixel dimensions without decoding the whole image
pub fn probe_dimensions(path: &Path) -> UploadResult<Dimensions> {
    if !path.is_file() {
        return Err(UploadError::SourceMissing(path.to_path_buf()));
    }
    let (width, height) = ImageReader::open(path)?
        .with_guessed_format()?
        .into_dimensions()
        .map_err(image_error)?;
    Ok(Dimensions::new(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn fixture(dir: &Path, name: &str, width: u32, height: u32) -> std::path::PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(width, height, Rgb([200, 40, 40]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_open_reports_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture(dir.path(), "wide.png", 400, 200);

        let image = backend_for(ImageEngine::Standard).open(&path).unwrap();
        assert_eq!(image.dimensions(), Dimensions::new(400, 200));
        assert_eq!(probe_dimensions(&path).unwrap(), Dimensions::new(400, 200));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = backend_for(ImageEngine::Fast).open(&dir.path().join("nope.png"));
        assert!(matches!(result, Err(UploadError::SourceMissing(_))));
    }

    #[test]
    fn test_open_guesses_format_from_contents() {
        let dir = tempfile::tempdir().unwrap();
        let png = fixture(dir.path(), "upload.png", 10, 20);
        let disguised = dir.path().join("php4Ab3x");
        std::fs::rename(&png, &disguised).unwrap();

        assert_eq!(probe_dimensions(&disguised).unwrap(), Dimensions::new(10, 20));
    }

    #[test]
    fn test_thumbnail_and_save_both_engines() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixture(dir.path(), "wide.png", 400, 200);

        for engine in [ImageEngine::Standard, ImageEngine::Fast] {
            let backend = backend_for(engine);
            let image = backend.open(&source).unwrap();

            let fitted = image
                .thumbnail(Dimensions::new(100, 100), ResizeMode::FitInside)
                .unwrap();
            assert_eq!(fitted.dimensions(), Dimensions::new(100, 50), "{}", backend.name());

            let cropped = image
                .thumbnail(Dimensions::new(100, 100), ResizeMode::CropToFill)
                .unwrap();
            assert_eq!(cropped.dimensions(), Dimensions::new(100, 100), "{}", backend.name());

            let out = dir.path().join(format!("{}.jpg", backend.name()));
            cropped.save(&out, 80).unwrap();
            assert_eq!(probe_dimensions(&out).unwrap(), Dimensions::new(100, 100));
        }
    }

    #[test]
    fn test_save_unknown_extension_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixture(dir.path(), "a.png", 4, 4);
        let image = backend_for(ImageEngine::Standard).open(&source).unwrap();
        assert!(image.save(&dir.path().join("out.unknownext"), 90).is_err());
    }

    #[test]
    fn test_open_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(matches!(
            backend_for(ImageEngine::Standard).open(&path),
            Err(UploadError::Image(_))
        ));
    }
}
