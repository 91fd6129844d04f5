//! Screen grabbing and cropping behind the `CaptureSurface` seam.
//!
//! The grab covers the whole virtual screen: every monitor is captured and
//! composited onto one canvas positioned by its desktop origin, so a
//! selection rectangle can span monitors. The selection overlay then crops
//! the region it wants.

use std::io::Cursor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::error::{AppError, Result};

/// A PNG-encoded grab plus where it sits on the virtual desktop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Screenshot {
    pub image_png: Vec<u8>,
    pub origin: (i32, i32),
    pub size: (u32, u32),
}

#[async_trait]
pub trait CaptureSurface: Send + Sync {
    async fn capture_screen_region(&self) -> Result<Screenshot>;

    fn crop_image(&self, shot: &Screenshot, origin: (i32, i32), size: (u32, u32))
        -> Result<Screenshot>;
}

pub struct ScreenCapture;

#[async_trait]
impl CaptureSurface for ScreenCapture {
    async fn capture_screen_region(&self) -> Result<Screenshot> {
        tokio::task::spawn_blocking(grab_virtual_screen)
            .await
            .map_err(|e| AppError::CaptureFailed(format!("capture task panicked: {}", e)))?
    }

    fn crop_image(
        &self,
        shot: &Screenshot,
        origin: (i32, i32),
        size: (u32, u32),
    ) -> Result<Screenshot> {
        crop_png(shot, origin, size)
    }
}

fn grab_virtual_screen() -> Result<Screenshot> {
    let screens = screenshots::Screen::all()
        .map_err(|e| AppError::CaptureFailed(format!("failed to enumerate screens: {}", e)))?;
    if screens.is_empty() {
        return Err(AppError::CaptureFailed("no screens found".to_string()));
    }

    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_right = i32::MIN;
    let mut max_bottom = i32::MIN;
    for screen in &screens {
        let info = screen.display_info;
        min_x = min_x.min(info.x);
        min_y = min_y.min(info.y);
        max_right = max_right.max(info.x + info.width as i32);
        max_bottom = max_bottom.max(info.y + info.height as i32);
    }
    let width = (max_right - min_x) as u32;
    let height = (max_bottom - min_y) as u32;

    let mut canvas = image::RgbaImage::new(width, height);
    for screen in &screens {
        let info = screen.display_info;
        let captured = screen
            .capture()
            .map_err(|e| AppError::CaptureFailed(format!("failed to capture screen: {}", e)))?;
        let (w, h) = (captured.width(), captured.height());
        let raw = captured.into_raw();
        let tile = image::RgbaImage::from_raw(w, h, raw).ok_or_else(|| {
            AppError::CaptureFailed("captured buffer has unexpected size".to_string())
        })?;
        image::imageops::overlay(
            &mut canvas,
            &tile,
            (info.x - min_x) as i64,
            (info.y - min_y) as i64,
        );
    }
    debug!(width, height, screens = screens.len(), "captured virtual screen");

    Ok(Screenshot {
        image_png: encode_png(&canvas)?,
        origin: (min_x, min_y),
        size: (width, height),
    })
}

fn crop_png(shot: &Screenshot, origin: (i32, i32), size: (u32, u32)) -> Result<Screenshot> {
    if origin.0 < 0 || origin.1 < 0 {
        return Err(AppError::CaptureFailed("crop origin must not be negative".to_string()));
    }
    if size.0 == 0 || size.1 == 0 {
        return Err(AppError::CaptureFailed("crop size must not be zero".to_string()));
    }

    let image = image::load_from_memory(&shot.image_png)
        .map_err(|e| AppError::CaptureFailed(format!("failed to decode capture: {}", e)))?;
    let (x, y) = (origin.0 as u32, origin.1 as u32);
    if x + size.0 > image.width() || y + size.1 > image.height() {
        return Err(AppError::CaptureFailed("crop region exceeds capture bounds".to_string()));
    }

    let cropped = image.crop_imm(x, y, size.0, size.1).to_rgba8();
    Ok(Screenshot {
        image_png: encode_png(&cropped)?,
        origin,
        size,
    })
}

fn encode_png(image: &image::RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| AppError::CaptureFailed(format!("failed to encode PNG: {}", e)))?;
    Ok(buf)
}
