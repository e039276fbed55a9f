//! Raspberry Pi camera driven through the `rpicam-apps` command line tools.

use std::process::{Child, Command, Stdio};

use config_model::CameraConfig;
use image::DynamicImage;
use tracing::{debug, info, warn};

use super::{Camera, CaptureBuffer, ExposureControls, validate_rotation};
use crate::error::{BoothError, Result};
use crate::platform::command::{CommandLine, CommandRunner, default_runner};
use crate::processing::layout::{Rect, preview_area};
use crate::processing::photo_effects::{CAPTURE_EFFECTS, apply_capture_effect, ensure_supported};

const STILL_PROGRAM: &str = "rpicam-still";
const PREVIEW_PROGRAM: &str = "rpicam-hello";

pub struct RpicamCamera {
    runner: CommandRunner,
    resolution: [u32; 2],
    preview_rotation: u16,
    capture_rotation: u16,
    hflip: bool,
    exposure: ExposureControls,
    preview: Option<Child>,
    captures: CaptureBuffer,
    closed: bool,
}

impl RpicamCamera {
    /// Probe for an attached sensor; `Ok(None)` when the tools report none.
    pub fn detect() -> Result<Option<Self>> {
        Self::detect_with(default_runner())
    }

    pub fn detect_with(runner: CommandRunner) -> Result<Option<Self>> {
        let args = vec!["--list-cameras".to_string()];
        let output = match runner(PREVIEW_PROGRAM, &args) {
            Ok(output) => output,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("{PREVIEW_PROGRAM} is not installed");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        let listing = output.stdout_text();
        if !output.success || !listing.contains("Available cameras") {
            debug!(listing = listing.trim(), "no rpicam sensor listed");
            return Ok(None);
        }
        info!("rpicam sensor detected");
        Ok(Some(Self::with_runner(runner)))
    }

    pub fn with_runner(runner: CommandRunner) -> Self {
        Self {
            runner,
            resolution: [1934, 2464],
            preview_rotation: 0,
            capture_rotation: 0,
            hflip: false,
            exposure: ExposureControls::new(100),
            preview: None,
            captures: CaptureBuffer::default(),
            closed: false,
        }
    }

    fn still_args(&self) -> Vec<String> {
        let mut args = vec![
            "--nopreview".to_string(),
            "--immediate".to_string(),
            "--encoding".to_string(),
            "jpg".to_string(),
            "--quality".to_string(),
            "100".to_string(),
            "--width".to_string(),
            self.resolution[0].to_string(),
            "--height".to_string(),
            self.resolution[1].to_string(),
            "--rotation".to_string(),
            self.capture_rotation.to_string(),
            "--awb".to_string(),
            self.exposure.white_balance_mode().to_string(),
        ];
        if self.hflip {
            args.push("--hflip".to_string());
        }
        if let Some(us) = self.exposure.shutter_us() {
            args.push("--shutter".to_string());
            args.push(us.to_string());
        }
        let iso = self.exposure.iso();
        if iso > 0 {
            args.push("--gain".to_string());
            args.push(format!("{:.2}", iso as f32 / 100.0));
        }
        args.push("--output".to_string());
        args.push("-".to_string());
        args
    }

    fn preview_args(&self, area: Rect) -> Vec<String> {
        let mut args = vec![
            "--timeout".to_string(),
            "0".to_string(),
            "--preview".to_string(),
            format!("{},{},{},{}", area.x, area.y, area.width, area.height),
            "--rotation".to_string(),
            self.preview_rotation.to_string(),
        ];
        // The preview is mirrored unless the capture itself is already flipped.
        if !self.hflip {
            args.push("--hflip".to_string());
        }
        args
    }
}

impl Camera for RpicamCamera {
    fn initialize(&mut self, config: &CameraConfig) -> Result<()> {
        validate_rotation(config)?;
        self.resolution = config.resolution;
        self.preview_rotation = config.rotation.preview();
        self.capture_rotation = config.rotation.capture();
        self.hflip = config.flip;
        self.exposure = ExposureControls::new(config.iso);
        if config.delete_internal_memory {
            debug!("rpicam keeps no internal memory; nothing to delete");
        }
        info!(
            resolution = ?self.resolution,
            rotation = self.capture_rotation,
            flip = self.hflip,
            iso = config.iso,
            "rpicam camera initialized"
        );
        Ok(())
    }

    fn preview(&mut self, area: Rect) -> Result<()> {
        if self.preview.is_some() {
            return Ok(());
        }
        let args = self.preview_args(area);
        debug!(command = %CommandLine(PREVIEW_PROGRAM, &args), "starting preview");
        let child = Command::new(PREVIEW_PROGRAM)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| BoothError::CameraCommand {
                command: PREVIEW_PROGRAM.to_string(),
                detail: err.to_string(),
            })?;
        self.preview = Some(child);
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<()> {
        if let Some(mut child) = self.preview.take() {
            if let Err(err) = child.kill() {
                warn!(%err, "preview process already gone");
            }
            child.wait()?;
            debug!("preview stopped");
        }
        Ok(())
    }

    fn is_previewing(&self) -> bool {
        self.preview.is_some()
    }

    fn capture(&mut self, effect: &str) -> Result<()> {
        ensure_supported(effect, self.supported_effects())?;
        let args = self.still_args();
        let command = CommandLine(STILL_PROGRAM, &args).to_string();
        let output = (self.runner)(STILL_PROGRAM, &args)?;
        if !output.success {
            return Err(BoothError::CameraCommand {
                command,
                detail: output.failure_detail(),
            });
        }
        let frame = image::load_from_memory(&output.stdout)?;
        let frame: DynamicImage = apply_capture_effect(frame, effect)?;
        debug!(
            effect,
            width = frame.width(),
            height = frame.height(),
            "capture stored"
        );
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
        if self.closed {
            return;
        }
        if let Err(err) = self.stop_preview() {
            warn!(%err, "failed to stop preview while closing camera");
        }
        self.captures.clear();
        self.closed = true;
        info!("rpicam camera closed");
    }
}

impl Drop for RpicamCamera {
    fn drop(&mut self) {
        self.quit();
    }
}
