//! Core types for the lane-scan pipeline.
//!
//! This crate is intentionally small: image containers, sub-pixel sampling,
//! projective transforms and the pinhole camera model. It knows nothing about
//! lane markings or how frames are acquired.

mod camera;
mod homography;
mod image;
mod logger;

pub use camera::CameraModel;
pub use homography::{warp_perspective_gray, Homography, Interpolation};
pub use image::{
    sample_bicubic, sample_bicubic_u8, sample_bilinear, sample_bilinear_u8, ColorImage,
    ColorImageView, GrayImage, GrayImageView, ImageError,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, parse_level};
