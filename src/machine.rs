//! Booth state machine: an ordered hook registry and the tick loop that
//! drives it.
//!
//! Every tick pumps input once, runs the `do` hooks of the active state and
//! then its `validate` hooks. The first validate hook returning a state wins;
//! later ones still run for their side effects. A selected transition runs
//! the `exit` hooks of the old state, switches the current state, then runs
//! the `enter` hooks of the new one. Any hook error routes the machine to
//! FAILSAFE, which falls back to WAIT on its own after [`FAILSAFE_TIMEOUT`].

use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use config_model::{BoothConfig, CameraConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::camera::{Camera, CameraProvider};
use crate::display::Display;
use crate::events::{self, BoothEvent};
use crate::printer::Printer;
use crate::session::Session;
use crate::state::{BoothState, Phase, PollingTimer};

pub const FAILSAFE_TIMEOUT: Duration = Duration::from_secs(3);

/// External collaborators reachable from hooks.
pub struct Capabilities {
    pub camera: Box<dyn Camera>,
    pub display: Box<dyn Display>,
    pub printer: Box<dyn Printer>,
}

/// Everything a hook may look at or change during one invocation.
pub struct HookContext<'a> {
    /// State the machine is in while the hook runs.
    pub state: BoothState,
    pub session: &'a mut Session,
    pub caps: &'a mut Capabilities,
    pub config: &'a BoothConfig,
    pub now: Instant,
    quit: &'a mut bool,
}

impl HookContext<'_> {
    /// Ask the run loop to stop after the current tick.
    pub fn request_quit(&mut self) {
        *self.quit = true;
    }
}

/// A set of callbacks contributed to the registry.
///
/// Only the `(state, phase)` pairs listed by [`Plugin::hooks`] are invoked;
/// the remaining trait methods keep their no-op defaults.
pub trait Plugin: Send {
    fn name(&self) -> &'static str;

    fn hooks(&self) -> &'static [(BoothState, Phase)];

    fn enter(&mut self, _state: BoothState, _ctx: &mut HookContext<'_>) -> Result<()> {
        Ok(())
    }

    fn run(
        &mut self,
        _state: BoothState,
        _ctx: &mut HookContext<'_>,
        _events: &[BoothEvent],
    ) -> Result<()> {
        Ok(())
    }

    fn validate(
        &mut self,
        _state: BoothState,
        _ctx: &mut HookContext<'_>,
        _events: &[BoothEvent],
    ) -> Result<Option<BoothState>> {
        Ok(None)
    }

    fn exit(&mut self, _state: BoothState, _ctx: &mut HookContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Offer a camera before the default probe; see [`crate::camera::setup_camera`].
    fn provide_camera(&mut self, _config: &CameraConfig) -> Result<Option<Box<dyn Camera>>> {
        Ok(None)
    }

    /// Release resources at process teardown. Called exactly once.
    fn cleanup(&mut self, _caps: &mut Capabilities) -> Result<()> {
        Ok(())
    }
}

/// Adapter letting plugins take part in the two-phase camera setup.
impl CameraProvider for Box<dyn Plugin> {
    fn provide_camera(
        &mut self,
        config: &CameraConfig,
    ) -> crate::error::Result<Option<Box<dyn Camera>>> {
        let name = self.name();
        Plugin::provide_camera(self.as_mut(), config).map_err(|err| {
            crate::error::BoothError::CameraCommand {
                command: format!("{name} camera provider"),
                detail: format!("{err:#}"),
            }
        })
    }
}

/// `(state, phase)` -> plugin indices, in registration order. Built once.
#[derive(Debug, Default)]
pub struct HookRegistry {
    table: BTreeMap<(BoothState, Phase), Vec<usize>>,
}

impl HookRegistry {
    pub fn build(plugins: &[Box<dyn Plugin>]) -> Self {
        let mut table: BTreeMap<(BoothState, Phase), Vec<usize>> = BTreeMap::new();
        for (idx, plugin) in plugins.iter().enumerate() {
            for &key in plugin.hooks() {
                let handlers = table.entry(key).or_default();
                if !handlers.contains(&idx) {
                    handlers.push(idx);
                }
            }
        }
        Self { table }
    }

    pub fn handlers(&self, state: BoothState, phase: Phase) -> &[usize] {
        self.table
            .get(&(state, phase))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// A hook returned an error.
#[derive(Debug)]
pub struct HookFailure {
    pub plugin: &'static str,
    pub state: BoothState,
    pub phase: Phase,
    pub source: anyhow::Error,
}

impl HookFailure {
    fn operator_message(&self) -> String {
        format!(
            "{} hook of {} failed during {}: {:#}",
            self.phase, self.plugin, self.state, self.source
        )
    }
}

pub struct StateMachine {
    plugins: Vec<Box<dyn Plugin>>,
    registry: HookRegistry,
    session: Session,
    caps: Capabilities,
    config: BoothConfig,
    current: BoothState,
    entered_at: Instant,
    failsafe_timer: PollingTimer,
    started: bool,
    quit: bool,
    cleaned_up: bool,
}

impl StateMachine {
    pub fn new(plugins: Vec<Box<dyn Plugin>>, caps: Capabilities, config: BoothConfig) -> Self {
        let registry = HookRegistry::build(&plugins);
        let session = Session::new(config.general.capture_choices.clone());
        Self {
            plugins,
            registry,
            session,
            caps,
            config,
            current: BoothState::Wait,
            entered_at: Instant::now(),
            failsafe_timer: PollingTimer::new(FAILSAFE_TIMEOUT),
            started: false,
            quit: false,
            cleaned_up: false,
        }
    }

    pub fn current(&self) -> BoothState {
        self.current
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    pub fn time_in_state(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.entered_at)
    }

    /// Enter the initial state. A failing enter hook lands in FAILSAFE.
    pub fn start(&mut self, now: Instant) {
        if self.started {
            return;
        }
        self.started = true;
        self.current = BoothState::Wait;
        self.entered_at = now;
        info!(state = %self.current, "booth starting");
        if let Err(failure) = self.dispatch(self.current, Phase::Enter, &[], now) {
            self.record(failure);
            self.transition(BoothState::Failsafe, now);
        }
    }

    /// Pump input once, then tick and apply the selected transition.
    pub fn step(&mut self, now: Instant) -> Option<BoothState> {
        let events = self.caps.display.poll_events();
        if events::quit_requested(&events) {
            info!("quit event received");
            self.quit = true;
        }
        let next = self.tick(&events, now);
        if let Some(next) = next {
            self.transition(next, now);
        }
        next
    }

    /// Run `do` then `validate` hooks of the active state.
    ///
    /// Returns the state to move to, or `None` to stay.
    pub fn tick(&mut self, events: &[BoothEvent], now: Instant) -> Option<BoothState> {
        let state = self.current;
        let outcome = self
            .dispatch(state, Phase::Do, events, now)
            .and_then(|_| self.dispatch(state, Phase::Validate, events, now));
        if state == BoothState::Failsafe {
            // The delay runs whatever the hooks report.
            let selected = match outcome {
                Ok(next) => next,
                Err(failure) => {
                    self.record(failure);
                    None
                }
            };
            if selected.is_none() && self.failsafe_timer.is_timeout(now) {
                info!("failsafe delay elapsed");
                return Some(BoothState::Wait);
            }
            return selected;
        }
        match outcome {
            Ok(next) => next,
            Err(failure) => {
                self.record(failure);
                Some(BoothState::Failsafe)
            }
        }
    }

    /// Leave the current state and enter `next`.
    pub fn transition(&mut self, next: BoothState, now: Instant) {
        let mut target = next;
        loop {
            let from = self.current;
            info!(from = %from, to = %target, "state transition");
            if let Err(failure) = self.dispatch(from, Phase::Exit, &[], now) {
                self.record(failure);
                target = BoothState::Failsafe;
            }

            self.current = target;
            self.entered_at = now;
            if target == BoothState::Failsafe {
                self.failsafe_timer.start(now);
            } else {
                self.failsafe_timer.stop();
            }

            match self.dispatch(target, Phase::Enter, &[], now) {
                Ok(_) => break,
                Err(failure) => {
                    self.record(failure);
                    if target == BoothState::Failsafe {
                        error!("failsafe enter hooks failed; staying in failsafe");
                        break;
                    }
                    target = BoothState::Failsafe;
                }
            }
        }
    }

    /// Tick until a quit is requested or `cancel` fires, then clean up.
    pub fn run(&mut self, cancel: &CancellationToken, tick_interval: Duration) {
        self.start(Instant::now());
        while !cancel.is_cancelled() {
            let started = Instant::now();
            self.step(started);
            if self.quit {
                info!(state = %self.current, "quit requested");
                break;
            }
            if let Some(rest) = tick_interval.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
        self.shutdown();
    }

    /// Run every plugin's cleanup once.
    pub fn shutdown(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;
        for plugin in &mut self.plugins {
            if let Err(err) = plugin.cleanup(&mut self.caps) {
                warn!(plugin = plugin.name(), "cleanup failed: {err:#}");
            }
        }
        info!("booth shut down");
    }

    fn record(&mut self, failure: HookFailure) {
        let message = failure.operator_message();
        error!(
            plugin = failure.plugin,
            state = %failure.state,
            phase = %failure.phase,
            "{message}"
        );
        self.session.last_error = Some(message);
    }

    fn dispatch(
        &mut self,
        state: BoothState,
        phase: Phase,
        events: &[BoothEvent],
        now: Instant,
    ) -> Result<Option<BoothState>, HookFailure> {
        let Self {
            plugins,
            registry,
            session,
            caps,
            config,
            quit,
            ..
        } = self;
        let mut ctx = HookContext {
            state,
            session,
            caps,
            config,
            now,
            quit,
        };

        let mut selected = None;
        for &idx in registry.handlers(state, phase) {
            let plugin = &mut plugins[idx];
            trace!(plugin = plugin.name(), state = %state, phase = %phase, "hook");
            let outcome = match phase {
                Phase::Enter => plugin.enter(state, &mut ctx).map(|_| None),
                Phase::Do => plugin.run(state, &mut ctx, events).map(|_| None),
                Phase::Validate => plugin.validate(state, &mut ctx, events),
                Phase::Exit => plugin.exit(state, &mut ctx).map(|_| None),
            };
            match outcome {
                Ok(Some(next)) if selected.is_none() => {
                    debug!(plugin = plugin.name(), from = %state, to = %next, "transition selected");
                    selected = Some(next);
                }
                Ok(Some(next)) => {
                    debug!(plugin = plugin.name(), ignored = %next, "later validate result discarded");
                }
                Ok(None) => {}
                Err(source) => {
                    return Err(HookFailure {
                        plugin: plugin.name(),
                        state,
                        phase,
                        source,
                    });
                }
            }
        }
        Ok(selected)
    }
}

impl Drop for StateMachine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
