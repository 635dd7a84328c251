//! cognatten-camera — Webcam capture for live attendance.
//!
//! Provides V4L2-based camera access with RGB24 frame conversion
//! (YUYV and MJPG sources) and device discovery.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::Frame;
