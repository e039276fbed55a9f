#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use config_model::{BoothConfig, CameraConfig};
use image::DynamicImage;
use photobooth::camera::{Camera, CaptureBuffer, SimulatedCamera};
use photobooth::display::Display;
use photobooth::error::{BoothError, Result};
use photobooth::events::{BoothEvent, TouchZone};
use photobooth::machine::{Capabilities, Plugin, StateMachine};
use photobooth::printer::{PrintTask, Printer};
use photobooth::processing::layout::Rect;

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Simulated camera whose captures can be made to fail.
pub struct FaultyCamera {
    inner: SimulatedCamera,
    pub fail_capture: Arc<AtomicBool>,
    /// Effect of every successful capture, in order.
    pub effects: Log,
}

impl FaultyCamera {
    pub fn new() -> Self {
        let mut inner = SimulatedCamera::new();
        let config = CameraConfig {
            resolution: [32, 24],
            ..CameraConfig::default()
        };
        inner.initialize(&config).unwrap();
        Self {
            inner,
            fail_capture: Arc::new(AtomicBool::new(false)),
            effects: Log::default(),
        }
    }
}

impl Camera for FaultyCamera {
    fn initialize(&mut self, config: &CameraConfig) -> Result<()> {
        self.inner.initialize(config)
    }
    fn preview(&mut self, area: Rect) -> Result<()> {
        self.inner.preview(area)
    }
    fn stop_preview(&mut self) -> Result<()> {
        self.inner.stop_preview()
    }
    fn is_previewing(&self) -> bool {
        self.inner.is_previewing()
    }
    fn capture(&mut self, effect: &str) -> Result<()> {
        if self.fail_capture.load(Ordering::SeqCst) {
            return Err(BoothError::CameraCommand {
                command: "capture".into(),
                detail: "sensor unplugged".into(),
            });
        }
        self.inner.capture(effect)?;
        self.effects.lock().unwrap().push(effect.to_string());
        Ok(())
    }
    fn supported_effects(&self) -> &[&'static str] {
        self.inner.supported_effects()
    }
    fn captures(&self) -> &CaptureBuffer {
        self.inner.captures()
    }
    fn captures_mut(&mut self) -> &mut CaptureBuffer {
        self.inner.captures_mut()
    }
    fn set_shutter(&mut self, index: Option<i32>) -> Result<(usize, u32)> {
        self.inner.set_shutter(index)
    }
    fn set_auto_shutter(&mut self) -> Result<(usize, u32)> {
        self.inner.set_auto_shutter()
    }
    fn set_iso(&mut self, index: Option<i32>) -> Result<(usize, u32)> {
        self.inner.set_iso(index)
    }
    fn set_auto_iso(&mut self) -> Result<(usize, u32)> {
        self.inner.set_auto_iso()
    }
    fn set_white_balance(&mut self, index: Option<i32>) -> Result<String> {
        self.inner.set_white_balance(index)
    }
    fn get_preview_area(&self, window: Rect) -> Rect {
        self.inner.get_preview_area(window)
    }
    fn quit(&mut self) {
        self.inner.quit()
    }
}

/// Display recording every screen change; input is pushed by the test.
pub struct FakeDisplay {
    pub log: Log,
    pub inbox: Arc<Mutex<Vec<BoothEvent>>>,
}

impl FakeDisplay {
    pub fn new() -> Self {
        Self {
            log: Log::default(),
            inbox: Arc::default(),
        }
    }

    fn record(&self, entry: impl Into<String>) {
        self.log.lock().unwrap().push(entry.into());
    }
}

impl Display for FakeDisplay {
    fn window(&self) -> Rect {
        Rect::from_size([800, 480])
    }
    fn show_intro(&mut self, _previous: Option<&Path>, with_print: bool) {
        self.record(format!("intro print={with_print}"));
    }
    fn show_choice(&mut self, choices: &[u32]) {
        self.record(format!("choice {choices:?}"));
    }
    fn show_capture(&mut self, _preview: Rect) {
        self.record("capture");
    }
    fn show_confirm(&mut self, capture: Option<&DynamicImage>) {
        self.record(format!("confirm image={}", capture.is_some()));
    }
    fn show_work_in_progress(&mut self) {
        self.record("work-in-progress");
    }
    fn show_print(&mut self, _picture: Option<&Path>) {
        self.record("print");
    }
    fn show_oops(&mut self, message: Option<&str>) {
        self.record(format!("oops {}", message.unwrap_or("")));
    }
    fn clear_image(&mut self) {
        self.record("clear");
    }
    fn set_capture_number(&mut self, current: u32, total: u32) {
        self.record(format!("capture-number {current}/{total}"));
    }
    fn set_print_number(&mut self, pending: usize, disabled: bool) {
        self.record(format!("print-number {pending} disabled={disabled}"));
    }
    fn set_shutter_speed(&mut self, _value: u32) {}
    fn set_iso(&mut self, _value: u32) {}
    fn set_white_balance(&mut self, _value: &str) {}
    fn poll_events(&mut self) -> Vec<BoothEvent> {
        std::mem::take(&mut *self.inbox.lock().unwrap())
    }
}

#[derive(Debug, Default)]
pub struct PrinterState {
    pub ready: bool,
    pub printed: Vec<(String, u32)>,
}

pub struct FakePrinter(pub Arc<Mutex<PrinterState>>);

impl Printer for FakePrinter {
    fn is_installed(&self) -> bool {
        true
    }
    fn is_ready(&self) -> bool {
        self.0.lock().unwrap().ready
    }
    fn get_all_tasks(&self) -> Vec<PrintTask> {
        Vec::new()
    }
    fn print(&mut self, picture: &Path, copies: u32) -> Result<()> {
        self.0
            .lock()
            .unwrap()
            .printed
            .push((picture.display().to_string(), copies));
        Ok(())
    }
}

/// Handles on the fakes wired into a machine.
pub struct Rig {
    pub machine: StateMachine,
    pub display_log: Log,
    pub inbox: Arc<Mutex<Vec<BoothEvent>>>,
    pub printer: Arc<Mutex<PrinterState>>,
    pub fail_capture: Arc<AtomicBool>,
    pub effects: Log,
    pub now: Instant,
}

impl Rig {
    pub fn new(plugins: Vec<Box<dyn Plugin>>, config: BoothConfig) -> Self {
        let camera = FaultyCamera::new();
        let fail_capture = Arc::clone(&camera.fail_capture);
        let effects = Arc::clone(&camera.effects);
        let display = FakeDisplay::new();
        let display_log = Arc::clone(&display.log);
        let inbox = Arc::clone(&display.inbox);
        let printer = Arc::new(Mutex::new(PrinterState {
            ready: true,
            ..PrinterState::default()
        }));
        let caps = Capabilities {
            camera: Box::new(camera),
            display: Box::new(display),
            printer: Box::new(FakePrinter(Arc::clone(&printer))),
        };
        let mut machine = StateMachine::new(plugins, caps, config);
        let now = Instant::now();
        machine.start(now);
        Self {
            machine,
            display_log,
            inbox,
            printer,
            fail_capture,
            effects,
            now,
        }
    }

    /// Queue `events` and run one loop iteration `ms` after the previous one.
    pub fn step_after(&mut self, ms: u64, events: &[BoothEvent]) {
        self.inbox.lock().unwrap().extend_from_slice(events);
        self.now += std::time::Duration::from_millis(ms);
        self.machine.step(self.now);
    }

    pub fn step(&mut self, events: &[BoothEvent]) {
        self.step_after(33, events);
    }

    pub fn touch(&mut self, zone: TouchZone) {
        self.step(&[BoothEvent::Touch(zone)]);
    }

    pub fn previewing(&self) -> bool {
        self.machine.capabilities().camera.is_previewing()
    }
}

/// Booth configuration writing pictures under `dir`.
pub fn config_in(dir: &Path, choices: &[u32]) -> BoothConfig {
    let mut config = BoothConfig::default();
    config.general.capture_choices = choices.to_vec();
    config.general.directory = dir.to_path_buf();
    config.camera.resolution = [32, 24];
    config
}
