use config_model::CameraConfig;
use image::{DynamicImage, Rgb, RgbImage};
use tracing::{debug, info};

use super::{Camera, CaptureBuffer, ExposureControls, validate_rotation};
use crate::error::Result;
use crate::processing::layout::{Rect, preview_area};
use crate::processing::photo_effects::{CAPTURE_EFFECTS, apply_capture_effect, ensure_supported};

/// Sensorless camera producing synthetic frames; used on benches and in tests.
#[derive(Debug)]
pub struct SimulatedCamera {
    resolution: [u32; 2],
    exposure: ExposureControls,
    preview: Option<Rect>,
    captures: CaptureBuffer,
    shots: u32,
    closed: bool,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self {
            resolution: [640, 480],
            exposure: ExposureControls::new(100),
            preview: None,
            captures: CaptureBuffer::default(),
            shots: 0,
            closed: false,
        }
    }

    pub fn preview_rect(&self) -> Option<Rect> {
        self.preview
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn render_frame(&self) -> RgbImage {
        let [w, h] = self.resolution;
        let tint = (self.shots.wrapping_mul(53) % 256) as u8;
        RgbImage::from_fn(w, h, |x, y| {
            let r = ((x * 255) / w.max(1)) as u8;
            let g = ((y * 255) / h.max(1)) as u8;
            Rgb([r, g, tint])
        })
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera for SimulatedCamera {
    fn initialize(&mut self, config: &CameraConfig) -> Result<()> {
        validate_rotation(config)?;
        self.resolution = config.resolution;
        self.exposure = ExposureControls::new(config.iso);
        info!(resolution = ?self.resolution, "simulated camera ready");
        Ok(())
    }

    fn preview(&mut self, area: Rect) -> Result<()> {
        if self.preview.is_none() {
            debug!(?area, "simulated preview started");
            self.preview = Some(area);
        }
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<()> {
        if self.preview.take().is_some() {
            debug!("simulated preview stopped");
        }
        Ok(())
    }

    fn is_previewing(&self) -> bool {
        self.preview.is_some()
    }

    fn capture(&mut self, effect: &str) -> Result<()> {
        ensure_supported(effect, self.supported_effects())?;
        let frame = apply_capture_effect(DynamicImage::ImageRgb8(self.render_frame()), effect)?;
        self.shots += 1;
        self.captures.push(frame);
        Ok(())
    }

    fn supported_effects(&self) -> &[&'static str] {
        &CAPTURE_EFFECTS
    }

    fn captures(&self) -> &CaptureBuffer {
        &self.captures
    }

    fn captures_mut(&mut self) -> &mut CaptureBuffer {
        &mut self.captures
    }

    fn set_shutter(&mut self, index: Option<i32>) -> Result<(usize, u32)> {
        Ok(self.exposure.set_shutter(index))
    }

    fn set_auto_shutter(&mut self) -> Result<(usize, u32)> {
        Ok(self.exposure.set_auto_shutter())
    }

    fn set_iso(&mut self, index: Option<i32>) -> Result<(usize, u32)> {
        Ok(self.exposure.set_iso(index))
    }

    fn set_auto_iso(&mut self) -> Result<(usize, u32)> {
        Ok(self.exposure.set_auto_iso())
    }

    fn set_white_balance(&mut self, index: Option<i32>) -> Result<String> {
        Ok(self.exposure.set_white_balance(index).to_string())
    }

    fn get_preview_area(&self, window: Rect) -> Rect {
        preview_area(window, self.resolution, 0, 0)
    }

    fn quit(&mut self) {
        self.preview = None;
        self.captures.clear();
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> SimulatedCamera {
        let mut camera = SimulatedCamera::new();
        let config = CameraConfig {
            resolution: [32, 24],
            ..CameraConfig::default()
        };
        camera.initialize(&config).unwrap();
        camera
    }

    #[test]
    fn captures_accumulate_and_drop() {
        let mut camera = small();
        camera.capture("none").unwrap();
        camera.capture("grayscale").unwrap();
        assert_eq!(camera.capture_count(), 2);
        let last = camera.get_last_capture().unwrap();
        assert_eq!((last.width(), last.height()), (32, 24));
        camera.drop_last_capture();
        assert_eq!(camera.capture_count(), 1);
        assert_eq!(camera.get_captures().len(), 1);
        assert_eq!(camera.capture_count(), 0);
    }

    #[test]
    fn preview_is_idempotent() {
        let mut camera = small();
        let first = Rect::new(0, 0, 10, 10);
        camera.preview(first).unwrap();
        camera.preview(Rect::new(5, 5, 1, 1)).unwrap();
        assert_eq!(camera.preview_rect(), Some(first));
        camera.stop_preview().unwrap();
        camera.stop_preview().unwrap();
        assert!(!camera.is_previewing());
    }

    #[test]
    fn quit_can_be_repeated() {
        let mut camera = small();
        camera.quit();
        camera.quit();
        assert!(camera.is_closed());
    }
}
