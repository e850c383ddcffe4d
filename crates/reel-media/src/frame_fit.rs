//! Fitting arbitrary sources into the output frame.
//!
//! Sources are centre-cropped to the target aspect ratio and then scaled, so
//! nothing is letterboxed and nothing is stretched.

use reel_models::TargetFrame;

use crate::error::{MediaError, MediaResult};

/// Crop rectangle and output size for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFit {
    pub source_width: u32,
    pub source_height: u32,
    pub crop_width: u32,
    pub crop_height: u32,
    pub crop_x: u32,
    pub crop_y: u32,
    pub target: TargetFrame,
}

impl FrameFit {
    /// Compute the centre crop of a `width`x`height` source for `target`.
    pub fn compute(width: u32, height: u32, target: TargetFrame) -> MediaResult<Self> {
        if width < 2 || height < 2 {
            return Err(MediaError::InvalidVideo(format!(
                "Source frame {}x{} is too small",
                width, height
            )));
        }
        if target.width == 0 || target.height == 0 {
            return Err(MediaError::InvalidInput(format!("Target frame {} is empty", target)));
        }

        let (sw, sh) = (width as u64, height as u64);
        let (tw, th) = (target.width as u64, target.height as u64);

        // Compare sw/sh against tw/th without floats.
        let (crop_w, crop_h) = if sw * th > sh * tw {
            (even_floor(sh * tw / th).min(sw), even_floor(sh))
        } else {
            (even_floor(sw), even_floor(sw * th / tw).min(sh))
        };
        let crop_w = crop_w.max(2);
        let crop_h = crop_h.max(2);

        Ok(Self {
            source_width: width,
            source_height: height,
            crop_width: crop_w as u32,
            crop_height: crop_h as u32,
            crop_x: ((sw - crop_w.min(sw)) / 2) as u32,
            crop_y: ((sh - crop_h.min(sh)) / 2) as u32,
            target,
        })
    }

    /// Whether the source is already exactly the target size.
    pub fn is_identity(&self) -> bool {
        self.source_width == self.target.width && self.source_height == self.target.height
    }

    /// ffmpeg filter chain: crop, scale, square pixels.
    pub fn to_filter(&self) -> String {
        if self.is_identity() {
            return "setsar=1".to_string();
        }
        format!(
            "crop={}:{}:{}:{},scale={}:{}:flags=lanczos,setsar=1",
            self.crop_width,
            self.crop_height,
            self.crop_x,
            self.crop_y,
            self.target.width,
            self.target.height
        )
    }
}

fn even_floor(v: u64) -> u64 {
    v & !1
}
