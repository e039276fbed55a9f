//! Display capability. Rendering itself lives outside the booth core; the
//! core only names screens, mirrors indicators and pulls input events.

use std::path::{Path, PathBuf};

use crossbeam_channel::Receiver;
use image::DynamicImage;
use tracing::{debug, info};

use crate::events::BoothEvent;
use crate::processing::layout::Rect;

pub trait Display: Send {
    /// Drawable area of the booth window.
    fn window(&self) -> Rect;

    fn show_intro(&mut self, previous_picture: Option<&Path>, with_print: bool);
    fn show_choice(&mut self, choices: &[u32]);
    fn show_capture(&mut self, preview: Rect);
    fn show_confirm(&mut self, capture: Option<&DynamicImage>);
    fn show_work_in_progress(&mut self);
    fn show_print(&mut self, picture: Option<&Path>);
    fn show_oops(&mut self, message: Option<&str>);
    /// Remove the picture currently drawn over the background.
    fn clear_image(&mut self);

    fn set_capture_number(&mut self, current: u32, total: u32);
    fn set_print_number(&mut self, pending: usize, disabled: bool);
    fn set_shutter_speed(&mut self, value: u32);
    fn set_iso(&mut self, value: u32);
    fn set_white_balance(&mut self, value: &str);

    /// Drain input received since the previous call.
    fn poll_events(&mut self) -> Vec<BoothEvent>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Screen {
    #[default]
    Blank,
    Intro {
        previous_picture: Option<PathBuf>,
        with_print: bool,
    },
    Choice(Vec<u32>),
    Capture(Rect),
    Confirm {
        has_capture: bool,
    },
    WorkInProgress,
    Print(Option<PathBuf>),
    Oops(Option<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Indicators {
    pub capture_number: (u32, u32),
    pub print_number: (usize, bool),
    pub shutter_speed: u32,
    pub iso: u32,
    pub white_balance: String,
}

/// Display without a renderer: keeps the active screen and indicator values,
/// logs every change, and reads input from a channel fed by the control
/// socket and stdin.
pub struct ChannelDisplay {
    window: Rect,
    screen: Screen,
    indicators: Indicators,
    events: Receiver<BoothEvent>,
}

impl ChannelDisplay {
    pub fn new(size: [u32; 2], events: Receiver<BoothEvent>) -> Self {
        Self {
            window: Rect::from_size(size),
            screen: Screen::Blank,
            indicators: Indicators::default(),
            events,
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn indicators(&self) -> &Indicators {
        &self.indicators
    }

    fn show(&mut self, screen: Screen) {
        info!(screen = ?screen, "screen");
        self.screen = screen;
    }
}

impl Display for ChannelDisplay {
    fn window(&self) -> Rect {
        self.window
    }

    fn show_intro(&mut self, previous_picture: Option<&Path>, with_print: bool) {
        self.show(Screen::Intro {
            previous_picture: previous_picture.map(Path::to_path_buf),
            with_print,
        });
    }

    fn show_choice(&mut self, choices: &[u32]) {
        self.show(Screen::Choice(choices.to_vec()));
    }

    fn show_capture(&mut self, preview: Rect) {
        self.show(Screen::Capture(preview));
    }

    fn show_confirm(&mut self, capture: Option<&DynamicImage>) {
        self.show(Screen::Confirm {
            has_capture: capture.is_some(),
        });
    }

    fn show_work_in_progress(&mut self) {
        self.show(Screen::WorkInProgress);
    }

    fn show_print(&mut self, picture: Option<&Path>) {
        self.show(Screen::Print(picture.map(Path::to_path_buf)));
    }

    fn show_oops(&mut self, message: Option<&str>) {
        self.show(Screen::Oops(message.map(str::to_string)));
    }

    fn clear_image(&mut self) {
        if let Screen::Intro {
            previous_picture, ..
        } = &mut self.screen
        {
            *previous_picture = None;
        }
    }

    fn set_capture_number(&mut self, current: u32, total: u32) {
        debug!(current, total, "capture number");
        self.indicators.capture_number = (current, total);
    }

    fn set_print_number(&mut self, pending: usize, disabled: bool) {
        debug!(pending, disabled, "print number");
        self.indicators.print_number = (pending, disabled);
    }

    fn set_shutter_speed(&mut self, value: u32) {
        self.indicators.shutter_speed = value;
    }

    fn set_iso(&mut self, value: u32) {
        self.indicators.iso = value;
    }

    fn set_white_balance(&mut self, value: &str) {
        self.indicators.white_balance = value.to_string();
    }

    fn poll_events(&mut self) -> Vec<BoothEvent> {
        self.events.try_iter().collect()
    }
}
