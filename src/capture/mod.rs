//! Capture domain: public API.
//!
//! Owns camera binding, frame buffers and the scale/rotate step that turns
//! a raw frame into a model input. External code should only use the
//! items exported here.

mod camera;
mod frame;
pub mod scripted;

pub use camera::{Camera, CameraBinding};
pub use frame::{scale_and_rotate, CapturedFrame, ModelImage};
