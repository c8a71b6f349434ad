//! `image` crate adapters and a directory-backed capture device.

use crate::error::{CliError, CliResult};
use lane_scan::{CaptureDevice, LaneScanError};
use lane_scan_core::{ColorImage, GrayImage};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tif"];

pub fn color_from_dynamic(img: &image::DynamicImage) -> ColorImage {
    let rgb = img.to_rgb8();
    ColorImage {
        width: rgb.width() as usize,
        height: rgb.height() as usize,
        data: rgb.into_raw(),
    }
}

pub fn load_rgb(path: &Path) -> CliResult<ColorImage> {
    let img = image::open(path).map_err(|source| CliError::Image {
        path: path.display().to_string(),
        source,
    })?;
    Ok(color_from_dynamic(&img))
}

pub fn save_gray(path: &Path, mask: &GrayImage) -> CliResult<()> {
    let out = image::GrayImage::from_raw(mask.width as u32, mask.height as u32, mask.data.clone())
        .ok_or_else(|| {
            CliError::Usage(format!(
                "mask buffer does not match {}x{}",
                mask.width, mask.height
            ))
        })?;
    out.save(path).map_err(|source| CliError::Image {
        path: path.display().to_string(),
        source,
    })
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Replays the images of a directory in file-name order, as if they came from
/// a camera. Files that fail to decode are skipped with a warning.
#[derive(Debug)]
pub struct ImageSequenceDevice {
    name: String,
    paths: VecDeque<PathBuf>,
}

impl ImageSequenceDevice {
    pub fn open(dir: &Path) -> Result<Self, LaneScanError> {
        let unavailable = |reason: String| LaneScanError::DeviceUnavailable {
            device: dir.display().to_string(),
            reason,
        };
        let entries = fs::read_dir(dir).map_err(|e| unavailable(e.to_string()))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| is_image(p))
            .collect();
        paths.sort();
        log::info!("{} images in {}", paths.len(), dir.display());
        Ok(Self::from_paths(dir.display().to_string(), paths))
    }

    pub fn from_paths(name: impl Into<String>, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            name: name.into(),
            paths: paths.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl CaptureDevice for ImageSequenceDevice {
    fn read(&mut self) -> Option<ColorImage> {
        while let Some(path) = self.paths.pop_front() {
            match load_rgb(&path) {
                Ok(frame) => {
                    log::debug!("read {}", path.display());
                    return Some(frame);
                }
                Err(err) => log::warn!("skipping frame: {err}"),
            }
        }
        None
    }

    fn name(&self) -> &str {
        &self.name
    }
}
