//! Camera capability: the uniform contract every driver satisfies, plus the
//! bookkeeping shared by the drivers (capture buffer, exposure tables).

pub mod rpicam;
pub mod simulated;

use config_model::{CameraConfig, CameraDriver, VALID_ROTATIONS};
use image::DynamicImage;
use tracing::{info, warn};

use crate::error::{BoothError, Result};
use crate::processing::layout::Rect;

pub use rpicam::RpicamCamera;
pub use simulated::SimulatedCamera;

/// Shutter speeds as denominators of one second (1/15 s .. 1/4860 s).
pub const SHUTTER_SPEEDS: [u32; 19] = [
    15, 30, 60, 120, 180, 240, 300, 360, 480, 600, 780, 960, 1200, 1500, 1920, 2400, 3060, 3840,
    4860,
];
pub const ISO_VALUES: [u32; 6] = [100, 200, 320, 400, 640, 800];
pub const WHITE_BALANCE_MODES: [&str; 9] = [
    "auto",
    "sunlight",
    "cloudy",
    "shade",
    "tungsten",
    "fluorescent",
    "incandescent",
    "flash",
    "horizon",
];

pub trait Camera: Send {
    /// Apply the configured sensor setup; fails on an invalid rotation.
    fn initialize(&mut self, config: &CameraConfig) -> Result<()>;

    /// Start the live preview inside `area`. No-op when already running.
    fn preview(&mut self, area: Rect) -> Result<()>;
    fn stop_preview(&mut self) -> Result<()>;
    fn is_previewing(&self) -> bool;

    /// Take a picture with `effect` and append it to the capture buffer.
    fn capture(&mut self, effect: &str) -> Result<()>;
    fn supported_effects(&self) -> &[&'static str];

    fn captures(&self) -> &CaptureBuffer;
    fn captures_mut(&mut self) -> &mut CaptureBuffer;

    /// `None` reports the current index without changing anything.
    fn set_shutter(&mut self, index: Option<i32>) -> Result<(usize, u32)>;
    fn set_auto_shutter(&mut self) -> Result<(usize, u32)>;
    fn set_iso(&mut self, index: Option<i32>) -> Result<(usize, u32)>;
    fn set_auto_iso(&mut self) -> Result<(usize, u32)>;
    /// `None` cycles to the next mode.
    fn set_white_balance(&mut self, index: Option<i32>) -> Result<String>;

    /// Rectangle of `window` the preview should occupy.
    fn get_preview_area(&self, window: Rect) -> Rect;

    /// Release the hardware. Safe to call more than once.
    fn quit(&mut self);

    fn get_last_capture(&self) -> Option<DynamicImage> {
        self.captures().last().cloned()
    }

    fn get_captures(&mut self) -> Vec<DynamicImage> {
        self.captures_mut().take_all()
    }

    fn capture_count(&self) -> usize {
        self.captures().len()
    }

    fn drop_last_capture(&mut self) {
        self.captures_mut().drop_last();
    }

    fn drop_captures(&mut self) {
        self.captures_mut().clear();
    }
}

/// Captures taken during the current session, oldest first.
#[derive(Debug, Default, Clone)]
pub struct CaptureBuffer {
    frames: Vec<DynamicImage>,
}

impl CaptureBuffer {
    pub fn push(&mut self, frame: DynamicImage) {
        self.frames.push(frame);
    }

    pub fn last(&self) -> Option<&DynamicImage> {
        self.frames.last()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn drop_last(&mut self) -> Option<DynamicImage> {
        self.frames.pop()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn take_all(&mut self) -> Vec<DynamicImage> {
        std::mem::take(&mut self.frames)
    }
}

/// Manual exposure state shared by the drivers. `None` means automatic.
#[derive(Debug, Clone)]
pub struct ExposureControls {
    shutter: Option<usize>,
    iso: Option<usize>,
    base_iso: u32,
    white_balance: usize,
}

impl ExposureControls {
    pub fn new(base_iso: u32) -> Self {
        Self {
            shutter: None,
            iso: None,
            base_iso,
            white_balance: 0,
        }
    }

    pub fn set_shutter(&mut self, index: Option<i32>) -> (usize, u32) {
        if let Some(index) = index {
            self.shutter = Some(clamp_index(index, SHUTTER_SPEEDS.len()));
        }
        match self.shutter {
            Some(idx) => (idx, SHUTTER_SPEEDS[idx]),
            None => (0, 0),
        }
    }

    pub fn set_auto_shutter(&mut self) -> (usize, u32) {
        self.shutter = None;
        (0, 0)
    }

    pub fn set_iso(&mut self, index: Option<i32>) -> (usize, u32) {
        if let Some(index) = index {
            self.iso = Some(clamp_index(index, ISO_VALUES.len()));
        }
        match self.iso {
            Some(idx) => (idx, ISO_VALUES[idx]),
            None => (nearest_index(&ISO_VALUES, self.base_iso), self.base_iso),
        }
    }

    pub fn set_auto_iso(&mut self) -> (usize, u32) {
        self.iso = None;
        self.base_iso = 0;
        (0, 0)
    }

    /// Out-of-range indices fall back to automatic white balance.
    pub fn set_white_balance(&mut self, index: Option<i32>) -> &'static str {
        self.white_balance = match index {
            None => (self.white_balance + 1) % WHITE_BALANCE_MODES.len(),
            Some(idx) => usize::try_from(idx)
                .ok()
                .filter(|idx| *idx < WHITE_BALANCE_MODES.len())
                .unwrap_or(0),
        };
        self.white_balance_mode()
    }

    /// Exposure time in microseconds, `None` when automatic.
    pub fn shutter_us(&self) -> Option<u32> {
        self.shutter.map(|idx| 1_000_000 / SHUTTER_SPEEDS[idx])
    }

    /// Effective ISO, 0 when automatic.
    pub fn iso(&self) -> u32 {
        self.iso.map(|idx| ISO_VALUES[idx]).unwrap_or(self.base_iso)
    }

    pub fn white_balance_mode(&self) -> &'static str {
        WHITE_BALANCE_MODES[self.white_balance]
    }
}

pub fn clamp_index(index: i32, len: usize) -> usize {
    let max = len.saturating_sub(1) as i32;
    index.clamp(0, max.max(0)) as usize
}

pub fn nearest_index(values: &[u32], target: u32) -> usize {
    values
        .iter()
        .enumerate()
        .min_by_key(|(_, value)| value.abs_diff(target))
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

pub fn validate_rotation(config: &CameraConfig) -> Result<()> {
    for (stream, value) in [
        ("preview", config.rotation.preview()),
        ("capture", config.rotation.capture()),
    ] {
        if !VALID_ROTATIONS.contains(&value) {
            return Err(BoothError::InvalidRotation { stream, value });
        }
    }
    Ok(())
}

/// Something able to hand out a camera before the default probe runs.
pub trait CameraProvider {
    fn provide_camera(&mut self, config: &CameraConfig) -> Result<Option<Box<dyn Camera>>>;
}

/// Probe for a usable camera according to the configured driver.
pub fn find_camera(config: &CameraConfig) -> Result<Box<dyn Camera>> {
    match config.driver {
        CameraDriver::Simulated => Ok(Box::new(SimulatedCamera::new())),
        CameraDriver::Rpicam | CameraDriver::Auto => match RpicamCamera::detect()? {
            Some(camera) => Ok(Box::new(camera)),
            None => Err(BoothError::NoCamera),
        },
    }
}

/// Two-phase camera setup: ask every provider in order, keep the first
/// camera offered (falling back to [`find_camera`]), then initialize it.
pub fn setup_camera(
    providers: &mut [&mut dyn CameraProvider],
    config: &CameraConfig,
) -> Result<Box<dyn Camera>> {
    let mut chosen = None;
    for provider in providers.iter_mut() {
        let offered = provider.provide_camera(config)?;
        match (&chosen, offered) {
            (None, Some(camera)) => chosen = Some(camera),
            (Some(_), Some(mut extra)) => {
                warn!("ignoring additional camera offered by a provider");
                extra.quit();
            }
            (_, None) => {}
        }
    }

    let mut camera = match chosen {
        Some(camera) => camera,
        None => {
            info!(driver = ?config.driver, "no provider supplied a camera; probing hardware");
            find_camera(config)?
        }
    };
    if let Err(err) = camera.initialize(config) {
        camera.quit();
        return Err(err);
    }
    Ok(camera)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_model::RotationSetting;

    #[test]
    fn shutter_index_clamps_to_table() {
        let mut controls = ExposureControls::new(100);
        assert_eq!(controls.set_shutter(Some(-3)), (0, 15));
        assert_eq!(controls.set_shutter(Some(99)), (18, 4860));
        assert_eq!(controls.set_shutter(None), (18, 4860));
        assert_eq!(controls.shutter_us(), Some(1_000_000 / 4860));
        assert_eq!(controls.set_auto_shutter(), (0, 0));
        assert_eq!(controls.shutter_us(), None);
    }

    #[test]
    fn iso_reports_base_until_set() {
        let mut controls = ExposureControls::new(320);
        assert_eq!(controls.set_iso(None), (2, 320));
        assert_eq!(controls.set_iso(Some(5)), (5, 800));
        assert_eq!(controls.set_auto_iso(), (0, 0));
        assert_eq!(controls.iso(), 0);
    }

    #[test]
    fn white_balance_cycles_and_wraps() {
        let mut controls = ExposureControls::new(100);
        assert_eq!(controls.set_white_balance(None), "sunlight");
        assert_eq!(controls.set_white_balance(Some(8)), "horizon");
        assert_eq!(controls.set_white_balance(None), "auto");
        assert_eq!(controls.set_white_balance(Some(42)), "auto");
    }

    #[test]
    fn rotation_outside_quarter_turns_is_rejected() {
        let mut config = CameraConfig::default();
        config.rotation = RotationSetting::Split([90, 45]);
        let err = validate_rotation(&config).unwrap_err();
        assert!(matches!(
            err,
            BoothError::InvalidRotation {
                stream: "capture",
                value: 45
            }
        ));
    }

    struct Offer(bool);

    impl CameraProvider for Offer {
        fn provide_camera(&mut self, _: &CameraConfig) -> Result<Option<Box<dyn Camera>>> {
            Ok(self.0.then(|| Box::new(SimulatedCamera::new()) as Box<dyn Camera>))
        }
    }

    #[test]
    fn setup_takes_first_offer_and_initializes_it() {
        let mut config = CameraConfig::default();
        config.driver = CameraDriver::Rpicam;
        config.resolution = [64, 48];
        let mut none = Offer(false);
        let mut some = Offer(true);
        let mut providers: [&mut dyn CameraProvider; 2] = [&mut none, &mut some];
        let camera = setup_camera(&mut providers, &config).expect("camera offered");
        assert_eq!(camera.get_preview_area(Rect::from_size([200, 200])).width, 200);
    }

    #[test]
    fn setup_rejects_invalid_rotation() {
        let mut config = CameraConfig::default();
        config.driver = CameraDriver::Simulated;
        config.rotation = RotationSetting::Both(30);
        let err = setup_camera(&mut [], &config).err().expect("invalid rotation");
        assert!(matches!(err, BoothError::InvalidRotation { .. }));
    }
}
