//! Per-customer data carried through one capture sequence.

use std::path::PathBuf;

use chrono::{DateTime, Local};

/// Effective camera values mirrored for the preview indicators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraSettings {
    pub shutter_speed: u32,
    pub iso: u32,
    pub white_balance: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    /// Allowed capture counts; fixed for the lifetime of the process.
    capture_choices: Vec<u32>,
    /// Count picked for this session, unset until CHOOSE resolves it.
    pub capture_nbr: Option<u32>,
    /// 1-based index of the photo being taken or confirmed.
    pub capture_count: u32,
    /// Stamped at the first PREVIEW of the session.
    pub capture_date: Option<DateTime<Local>>,
    pub camera_settings: CameraSettings,
    /// Last composed picture, kept across sessions for reprints.
    pub previous_picture: Option<PathBuf>,
    pub remaining_duplicates: u32,
    /// Operator-facing text of the fault that led to FAILSAFE.
    pub last_error: Option<String>,
}

impl Session {
    pub fn new(capture_choices: Vec<u32>) -> Self {
        Self {
            capture_choices,
            capture_nbr: None,
            capture_count: 1,
            capture_date: None,
            camera_settings: CameraSettings::default(),
            previous_picture: None,
            remaining_duplicates: 0,
            last_error: None,
        }
    }

    pub fn capture_choices(&self) -> &[u32] {
        &self.capture_choices
    }

    pub fn has_several_choices(&self) -> bool {
        self.capture_choices.len() > 1
    }

    /// Capture count for the session, falling back to the first choice.
    pub fn capture_target(&self) -> u32 {
        self.capture_nbr
            .or_else(|| self.capture_choices.first().copied())
            .unwrap_or(1)
    }

    /// Name prefix grouping every file written for this session.
    pub fn capture_stamp(&self) -> Option<String> {
        self.capture_date
            .map(|date| date.format("%Y-%m-%d-%H-%M-%S").to_string())
    }

    /// Clear the data of the customer in progress; reprint state is kept.
    pub fn reset(&mut self) {
        self.capture_date = None;
        self.capture_count = 1;
        self.capture_nbr = match self.capture_choices.as_slice() {
            [only] => Some(*only),
            _ => None,
        };
    }
}
