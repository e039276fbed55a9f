use std::fmt;
use std::time::{Duration, Instant};

/// One phase of the booth workflow. Exactly one is active at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BoothState {
    Failsafe,
    Wait,
    Choose,
    Preview,
    Capture,
    Confirm,
    Processing,
    Print,
}

impl BoothState {
    pub const ALL: [BoothState; 8] = [
        BoothState::Failsafe,
        BoothState::Wait,
        BoothState::Choose,
        BoothState::Preview,
        BoothState::Capture,
        BoothState::Confirm,
        BoothState::Processing,
        BoothState::Print,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BoothState::Failsafe => "failsafe",
            BoothState::Wait => "wait",
            BoothState::Choose => "choose",
            BoothState::Preview => "preview",
            BoothState::Capture => "capture",
            BoothState::Confirm => "confirm",
            BoothState::Processing => "processing",
            BoothState::Print => "print",
        }
    }
}

impl fmt::Display for BoothState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hook phase invoked for the active state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Enter,
    Do,
    Validate,
    Exit,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Enter => "enter",
            Phase::Do => "do",
            Phase::Validate => "validate",
            Phase::Exit => "exit",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timer that only fires when polled.
#[derive(Debug, Clone)]
pub struct PollingTimer {
    timeout: Duration,
    started_at: Option<Instant>,
}

impl PollingTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            started_at: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.started_at = Some(now);
    }

    pub fn stop(&mut self) {
        self.started_at = None;
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_timeout(&self, now: Instant) -> bool {
        self.started_at
            .is_some_and(|start| now.saturating_duration_since(start) >= self.timeout)
    }
}
