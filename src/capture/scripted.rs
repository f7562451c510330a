//! Scripted camera for tests and headless runs.
//!
//! Frames are synthetic solid-color images; every frame it hands out
//! reports its release to a shared counter.

use super::camera::Camera;
use super::frame::CapturedFrame;
use crate::error::CaptureError;
use image::{DynamicImage, Rgb, RgbImage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Counts buffer releases across frames.
#[derive(Debug, Clone, Default)]
pub struct ReleaseCounter(Arc<AtomicUsize>);

impl ReleaseCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// A solid frame whose release bumps this counter.
    pub fn frame(&self, width: u32, height: u32, rotation_degrees: u32) -> CapturedFrame {
        let counter = self.0.clone();
        CapturedFrame::new(solid_image(width, height), rotation_degrees).with_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }
}

/// Solid mid-grey test image.
pub fn solid_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([128, 128, 128])))
}

/// Camera that replays queued captures.
///
/// When the queue is empty, `take_picture` yields a default 640x480 frame.
#[derive(Default)]
pub struct ScriptedCamera {
    queue: Mutex<VecDeque<Result<(u32, u32, u32), CaptureError>>>,
    releases: ReleaseCounter,
    binds: AtomicUsize,
    unbinds: AtomicUsize,
    bind_error: Mutex<Option<CaptureError>>,
}

impl ScriptedCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame of the given size and rotation.
    pub fn push_frame(&self, width: u32, height: u32, rotation_degrees: u32) {
        if let Ok(mut q) = self.queue.lock() {
            q.push_back(Ok((width, height, rotation_degrees)));
        }
    }

    /// Queue a capture failure.
    pub fn push_error(&self, message: &str) {
        if let Ok(mut q) = self.queue.lock() {
            q.push_back(Err(CaptureError::Camera(message.to_string())));
        }
    }

    /// Make the next `bind` fail.
    pub fn fail_bind(&self, message: &str) {
        if let Ok(mut e) = self.bind_error.lock() {
            *e = Some(CaptureError::Camera(message.to_string()));
        }
    }

    pub fn releases(&self) -> &ReleaseCounter {
        &self.releases
    }

    pub fn bind_count(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }

    pub fn unbind_count(&self) -> usize {
        self.unbinds.load(Ordering::SeqCst)
    }
}

impl Camera for ScriptedCamera {
    fn bind(&self) -> Result<(), CaptureError> {
        if let Some(err) = self.bind_error.lock().ok().and_then(|mut e| e.take()) {
            return Err(err);
        }
        self.binds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn unbind_all(&self) {
        self.unbinds.fetch_add(1, Ordering::SeqCst);
    }

    fn take_picture(&self) -> Result<CapturedFrame, CaptureError> {
        let next = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        let (w, h, rot) = next.unwrap_or(Ok((640, 480, 0)))?;
        Ok(self.releases.frame(w, h, rot))
    }
}
