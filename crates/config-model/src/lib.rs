//! Shared configuration model for the photo booth and its helper daemons.
//!
//! Only the serde shapes and their validation live here; loading from disk
//! is left to the binaries so each can attach its own context.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

pub use camera::{CameraConfig, CameraDriver, RotationSetting};
pub use control::ControlCommand;
pub use picture::{CaptureEffects, PictureConfig};

pub const DEFAULT_CONTROL_SOCKET_PATH: &str = "/run/photo-booth/control.sock";
pub const VALID_ROTATIONS: [u16; 4] = [0, 90, 180, 270];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct BoothConfig {
    pub general: GeneralConfig,
    pub camera: CameraConfig,
    pub picture: PictureConfig,
    pub printer: PrinterConfig,
    pub window: WindowConfig,
    pub controls: ControlsConfig,
}

impl BoothConfig {
    pub fn validate(&self) -> Result<()> {
        self.general.validate()?;
        self.camera.validate()?;
        self.picture.validate(self.general.max_capture_choice())?;
        self.window.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GeneralConfig {
    /// Number of captures the user may pick from (one or two entries).
    pub capture_choices: Vec<u32>,
    /// Where raw captures and composed pictures are written.
    pub directory: PathBuf,
    /// Pause between two ticks of the state machine.
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            capture_choices: vec![1, 4],
            directory: PathBuf::from("/var/lib/photo-booth/pictures"),
            tick_interval: Duration::from_millis(33),
        }
    }
}

impl GeneralConfig {
    pub fn max_capture_choice(&self) -> u32 {
        self.capture_choices.iter().copied().max().unwrap_or(0)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            !self.capture_choices.is_empty(),
            "general.capture-choices must list at least one capture count"
        );
        ensure!(
            self.capture_choices.len() <= 2,
            "general.capture-choices supports at most two entries (got {})",
            self.capture_choices.len()
        );
        ensure!(
            self.capture_choices.iter().all(|&n| n > 0),
            "general.capture-choices entries must be positive"
        );
        if let [first, second] = self.capture_choices.as_slice() {
            ensure!(
                first != second,
                "general.capture-choices entries must be distinct"
            );
        }
        ensure!(
            !self.tick_interval.is_zero(),
            "general.tick-interval must be greater than zero"
        );
        Ok(())
    }
}

mod camera {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum CameraDriver {
        /// Probe for hardware and fail when nothing is detected.
        Auto,
        Rpicam,
        Simulated,
    }

    /// Either one rotation for both streams or a `[preview, capture]` pair.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
    #[serde(untagged)]
    pub enum RotationSetting {
        Both(u16),
        Split([u16; 2]),
    }

    impl RotationSetting {
        pub fn preview(self) -> u16 {
            match self {
                Self::Both(value) => value,
                Self::Split([preview, _]) => preview,
            }
        }

        pub fn capture(self) -> u16 {
            match self {
                Self::Both(value) => value,
                Self::Split([_, capture]) => capture,
            }
        }
    }

    #[derive(Debug, Clone, Deserialize)]
    #[serde(rename_all = "kebab-case", default)]
    pub struct CameraConfig {
        pub driver: CameraDriver,
        pub iso: u32,
        pub resolution: [u32; 2],
        pub rotation: RotationSetting,
        pub flip: bool,
        pub delete_internal_memory: bool,
    }

    impl Default for CameraConfig {
        fn default() -> Self {
            Self {
                driver: CameraDriver::Auto,
                iso: 100,
                resolution: [1934, 2464],
                rotation: RotationSetting::Both(0),
                flip: false,
                delete_internal_memory: false,
            }
        }
    }

    impl CameraConfig {
        pub(super) fn validate(&self) -> Result<()> {
            for (name, value) in [
                ("preview", self.rotation.preview()),
                ("capture", self.rotation.capture()),
            ] {
                ensure!(
                    VALID_ROTATIONS.contains(&value),
                    "camera.rotation: invalid {} rotation {} (should be 0, 90, 180 or 270)",
                    name,
                    value
                );
            }
            ensure!(
                self.resolution[0] > 0 && self.resolution[1] > 0,
                "camera.resolution must be non-zero"
            );
            Ok(())
        }
    }
}

mod picture {
    use super::*;

    /// One effect applied to every shot, or one effect per shot index.
    #[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
    #[serde(untagged)]
    pub enum CaptureEffects {
        Single(String),
        PerShot(Vec<String>),
    }

    impl Default for CaptureEffects {
        fn default() -> Self {
            Self::Single("none".to_string())
        }
    }

    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "kebab-case", default)]
    pub struct PictureConfig {
        pub captures_effects: CaptureEffects,
    }

    impl PictureConfig {
        pub(super) fn validate(&self, max_captures: u32) -> Result<()> {
            match &self.captures_effects {
                CaptureEffects::Single(name) => ensure!(
                    !name.trim().is_empty(),
                    "picture.captures-effects must not be blank"
                ),
                CaptureEffects::PerShot(list) => {
                    ensure!(
                        list.len() >= max_captures as usize,
                        "picture.captures-effects lists {} effects but up to {} captures may be taken",
                        list.len(),
                        max_captures
                    );
                    ensure!(
                        list.iter().all(|name| !name.trim().is_empty()),
                        "picture.captures-effects entries must not be blank"
                    );
                }
            }
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PrinterConfig {
    /// CUPS queue name; the booth runs without printing when unset.
    pub name: Option<String>,
    /// How many times one composed picture may be printed.
    pub max_duplicates: u32,
    /// Copies per print request.
    pub copies: u32,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            name: None,
            max_duplicates: 3,
            copies: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WindowConfig {
    pub size: [u32; 2],
    /// Margin kept around the camera preview, in pixels.
    pub preview_border: u32,
    /// Vertical shift of the preview to leave room for the indicators.
    pub preview_y_offset: i32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            size: [800, 480],
            preview_border: 50,
            preview_y_offset: -25,
        }
    }
}

impl WindowConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.size[0] > 0 && self.size[1] > 0,
            "window.size must be non-zero"
        );
        ensure!(
            self.preview_border * 2 < self.size[0].min(self.size[1]),
            "window.preview-border leaves no room for the preview"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ControlsConfig {
    pub socket: PathBuf,
    /// evdev key name used as capture trigger by the button daemon.
    pub capture_key: String,
    #[serde(with = "humantime_serde")]
    pub debounce: Duration,
    #[serde(with = "humantime_serde")]
    pub single_window: Duration,
    #[serde(with = "humantime_serde")]
    pub double_window: Duration,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            socket: PathBuf::from(DEFAULT_CONTROL_SOCKET_PATH),
            capture_key: "KEY_ENTER".to_string(),
            debounce: Duration::from_millis(20),
            single_window: Duration::from_millis(250),
            double_window: Duration::from_millis(400),
        }
    }
}

mod control {
    use super::*;

    /// Line-delimited JSON commands accepted on the booth control socket.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "command", rename_all = "kebab-case")]
    pub enum ControlCommand {
        /// Either a named zone (`"center-left"`) or a point in window pixels.
        Touch {
            #[serde(default, skip_serializing_if = "Option::is_none")]
            zone: Option<String>,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            x: Option<f32>,
            #[serde(default, skip_serializing_if = "Option::is_none")]
            y: Option<f32>,
        },
        Capture,
        Print,
        PrintStatus,
        Quit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg: BoothConfig = serde_yaml::from_str("{}").expect("parse config");
        assert_eq!(cfg.general.capture_choices, vec![1, 4]);
        assert_eq!(cfg.camera.driver, CameraDriver::Auto);
        assert_eq!(cfg.picture.captures_effects, CaptureEffects::default());
        assert_eq!(cfg.general.tick_interval, Duration::from_millis(33));
        cfg.validate().expect("defaults are valid");
    }

    #[test]
    fn rotation_accepts_single_value_or_pair() {
        let cfg: CameraConfig = serde_yaml::from_str("rotation: 90").unwrap();
        assert_eq!((cfg.rotation.preview(), cfg.rotation.capture()), (90, 90));

        let cfg: CameraConfig = serde_yaml::from_str("rotation: [0, 180]").unwrap();
        assert_eq!((cfg.rotation.preview(), cfg.rotation.capture()), (0, 180));
    }

    #[test]
    fn rejects_invalid_rotation() {
        let cfg: BoothConfig = serde_yaml::from_str(
            r#"
camera:
  rotation: [0, 45]
"#,
        )
        .unwrap();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("capture rotation 45"), "{err}");
    }

    #[test]
    fn rejects_short_effect_list() {
        let cfg: BoothConfig = serde_yaml::from_str(
            r#"
general:
  capture-choices: [1, 4]
picture:
  captures-effects: [none, sepia]
"#,
        )
        .unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_more_than_two_choices() {
        let cfg: BoothConfig = serde_yaml::from_str(
            r#"
general:
  capture-choices: [1, 2, 4]
"#,
        )
        .unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn control_commands_are_tagged() {
        let cmd: ControlCommand =
            serde_json::from_str(r#"{"command":"touch","zone":"center-left"}"#).unwrap();
        assert_eq!(
            cmd,
            ControlCommand::Touch {
                zone: Some("center-left".into()),
                x: None,
                y: None
            }
        );
        let cmd: ControlCommand = serde_json::from_str(r#"{"command":"print-status"}"#).unwrap();
        assert_eq!(cmd, ControlCommand::PrintStatus);
        assert_eq!(
            serde_json::to_string(&ControlCommand::Capture).unwrap(),
            r#"{"command":"capture"}"#
        );
    }
}
