//! Captured frames and the model-ready images derived from them.

use crate::config::Preprocess;
use crate::error::CaptureError;
use image::imageops::FilterType;
use image::DynamicImage;
use std::sync::Arc;

type ReleaseFn = Box<dyn FnOnce() + Send + 'static>;

/// A camera frame borrowed from the camera's buffer pool.
///
/// The release callback hands the buffer back upstream. It runs exactly
/// once: on `close()`, or on drop if the frame was never closed. Every exit
/// path therefore returns the buffer, including early returns and errors.
pub struct CapturedFrame {
    image: DynamicImage,
    rotation_degrees: u32,
    release: Option<ReleaseFn>,
}

impl CapturedFrame {
    pub fn new(image: DynamicImage, rotation_degrees: u32) -> Self {
        Self {
            image,
            rotation_degrees,
            release: None,
        }
    }

    /// Attach the callback that returns the buffer to its pool.
    pub fn with_release<F>(mut self, release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.release = Some(Box::new(release));
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Clockwise rotation needed to match display orientation.
    pub fn rotation_degrees(&self) -> u32 {
        self.rotation_degrees
    }

    /// Build the scaled + rotated image a model expects.
    ///
    /// Does not release the frame; callers close it once they no longer
    /// need the pixels.
    pub fn preprocess(&self, geometry: Preprocess) -> Result<ModelImage, CaptureError> {
        scale_and_rotate(&self.image, self.rotation_degrees, geometry).map(ModelImage::new)
    }

    /// Release the buffer now.
    pub fn close(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for CapturedFrame {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for CapturedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedFrame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("rotation_degrees", &self.rotation_degrees)
            .field("released", &self.release.is_none())
            .finish()
    }
}

/// Fixed-size, display-oriented image handed to a classifier.
///
/// Cheap to clone; UI state keeps one as the preview.
#[derive(Clone)]
pub struct ModelImage(Arc<DynamicImage>);

impl ModelImage {
    pub fn new(image: DynamicImage) -> Self {
        Self(Arc::new(image))
    }

    pub fn image(&self) -> &DynamicImage {
        &self.0
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }
}

impl PartialEq for ModelImage {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for ModelImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ModelImage({}x{})", self.width(), self.height())
    }
}

/// Scale, then rotate clockwise by `rotation_degrees` (a quarter-turn multiple).
pub fn scale_and_rotate(
    image: &DynamicImage,
    rotation_degrees: u32,
    geometry: Preprocess,
) -> Result<DynamicImage, CaptureError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(CaptureError::EmptyFrame { width, height });
    }
    let rotation = rotation_degrees % 360;
    if rotation % 90 != 0 {
        return Err(CaptureError::UnsupportedRotation(rotation_degrees));
    }

    let (target_w, target_h) = match geometry {
        Preprocess::Exact { width, height } => (width.max(1), height.max(1)),
        Preprocess::FitLongestSide { longest_side } => {
            let scale = longest_side as f64 / width.max(height) as f64;
            (
                ((width as f64 * scale).round() as u32).max(1),
                ((height as f64 * scale).round() as u32).max(1),
            )
        }
    };

    let scaled = if (target_w, target_h) == (width, height) {
        image.clone()
    } else {
        image.resize_exact(target_w, target_h, FilterType::Triangle)
    };

    Ok(match rotation {
        90 => scaled.rotate90(),
        180 => scaled.rotate180(),
        270 => scaled.rotate270(),
        _ => scaled,
    })
}
