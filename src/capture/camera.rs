//! Camera lifecycle: bind on screen attach, unbind on detach.
//!
//! The platform camera stack is opaque; this only fixes the contract a
//! screen relies on so camera hardware is never held across screens.

use super::frame::CapturedFrame;
use crate::error::CaptureError;
use std::sync::Arc;

/// Platform camera provider.
pub trait Camera: Send + Sync + 'static {
    /// Attach preview + capture use cases to the camera.
    fn bind(&self) -> Result<(), CaptureError>;

    /// Detach every use case and shut the camera down.
    fn unbind_all(&self);

    /// Capture a single still frame.
    fn take_picture(&self) -> Result<CapturedFrame, CaptureError>;
}

/// A bound camera. Unbinds when dropped.
pub struct CameraBinding<C: Camera> {
    camera: Arc<C>,
}

impl<C: Camera> CameraBinding<C> {
    pub fn bind(camera: Arc<C>) -> Result<Self, CaptureError> {
        camera.bind()?;
        log::info!("[CAPTURE] Camera bound");
        Ok(Self { camera })
    }

    /// Capture a frame. Failures are returned for the caller to log and surface.
    pub fn take_picture(&self) -> Result<CapturedFrame, CaptureError> {
        self.camera.take_picture()
    }
}

impl<C: Camera> Drop for CameraBinding<C> {
    fn drop(&mut self) {
        self.camera.unbind_all();
        log::info!("[CAPTURE] Camera unbound");
    }
}
