use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use config_model::ControlCommand;

/// Discrete region of the touch surface: two columns by five rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchZone {
    TopLeft,
    MiddleTopLeft,
    CenterLeft,
    MiddleBottomLeft,
    BottomLeft,
    TopRight,
    MiddleTopRight,
    CenterRight,
    MiddleBottomRight,
    BottomRight,
}

impl TouchZone {
    const LEFT: [TouchZone; 5] = [
        TouchZone::TopLeft,
        TouchZone::MiddleTopLeft,
        TouchZone::CenterLeft,
        TouchZone::MiddleBottomLeft,
        TouchZone::BottomLeft,
    ];
    const RIGHT: [TouchZone; 5] = [
        TouchZone::TopRight,
        TouchZone::MiddleTopRight,
        TouchZone::CenterRight,
        TouchZone::MiddleBottomRight,
        TouchZone::BottomRight,
    ];

    /// Map a point inside a `width` x `height` surface to its zone.
    pub fn locate(x: f32, y: f32, width: u32, height: u32) -> Option<TouchZone> {
        let (w, h) = (width as f32, height as f32);
        if !(0.0..w).contains(&x) || !(0.0..h).contains(&y) {
            return None;
        }
        let row = ((y / h) * 5.0).floor().clamp(0.0, 4.0) as usize;
        let column = if x < w / 2.0 { &Self::LEFT } else { &Self::RIGHT };
        Some(column[row])
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TouchZone::TopLeft => "top-left",
            TouchZone::MiddleTopLeft => "middle-top-left",
            TouchZone::CenterLeft => "center-left",
            TouchZone::MiddleBottomLeft => "middle-bottom-left",
            TouchZone::BottomLeft => "bottom-left",
            TouchZone::TopRight => "top-right",
            TouchZone::MiddleTopRight => "middle-top-right",
            TouchZone::CenterRight => "center-right",
            TouchZone::MiddleBottomRight => "middle-bottom-right",
            TouchZone::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for TouchZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TouchZone {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::LEFT
            .iter()
            .chain(Self::RIGHT.iter())
            .copied()
            .find(|zone| zone.as_str() == normalized)
            .ok_or_else(|| anyhow!("unknown touch zone '{s}'"))
    }
}

/// Input observed during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoothEvent {
    Touch(TouchZone),
    /// Hardware capture-trigger button.
    Capture,
    /// Hardware print button.
    Print,
    /// The printer queue changed.
    PrintStatus,
    Quit,
}

impl BoothEvent {
    /// Translate a control-socket command; `window` resolves point touches.
    pub fn from_command(command: &ControlCommand, window: [u32; 2]) -> Result<Self> {
        match command {
            ControlCommand::Touch {
                zone: Some(zone), ..
            } => Ok(BoothEvent::Touch(zone.parse()?)),
            ControlCommand::Touch {
                zone: None,
                x: Some(x),
                y: Some(y),
            } => TouchZone::locate(*x, *y, window[0], window[1])
                .map(BoothEvent::Touch)
                .ok_or_else(|| anyhow!("touch at ({x}, {y}) is outside the window")),
            ControlCommand::Touch { .. } => bail!("touch command needs a zone or x/y"),
            ControlCommand::Capture => Ok(BoothEvent::Capture),
            ControlCommand::Print => Ok(BoothEvent::Print),
            ControlCommand::PrintStatus => Ok(BoothEvent::PrintStatus),
            ControlCommand::Quit => Ok(BoothEvent::Quit),
        }
    }
}

/// First touch of the tick, if any.
pub fn find_touch(events: &[BoothEvent]) -> Option<TouchZone> {
    events.iter().find_map(|event| match event {
        BoothEvent::Touch(zone) => Some(*zone),
        _ => None,
    })
}

pub fn capture_requested(events: &[BoothEvent]) -> bool {
    events.contains(&BoothEvent::Capture)
}

pub fn print_requested(events: &[BoothEvent]) -> bool {
    events.contains(&BoothEvent::Print)
}

pub fn print_status_changed(events: &[BoothEvent]) -> bool {
    events.contains(&BoothEvent::PrintStatus)
}

pub fn quit_requested(events: &[BoothEvent]) -> bool {
    events.contains(&BoothEvent::Quit)
}
