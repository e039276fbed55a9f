mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use common::{Log, Rig, entries};
use config_model::BoothConfig;
use photobooth::events::{BoothEvent, TouchZone};
use photobooth::machine::{Capabilities, FAILSAFE_TIMEOUT, HookContext, HookRegistry, Plugin};
use photobooth::state::{BoothState, Phase};

const RECORDED_HOOKS: &[(BoothState, Phase)] = &[
    (BoothState::Wait, Phase::Enter),
    (BoothState::Wait, Phase::Do),
    (BoothState::Wait, Phase::Validate),
    (BoothState::Wait, Phase::Exit),
    (BoothState::Preview, Phase::Enter),
    (BoothState::Failsafe, Phase::Enter),
    (BoothState::Failsafe, Phase::Do),
    (BoothState::Failsafe, Phase::Validate),
];

/// Logs every hook call and fails or redirects on demand.
struct Recorder {
    name: &'static str,
    log: Log,
    next: Option<BoothState>,
    fail: Vec<(BoothState, Phase)>,
    cleanups: Arc<Mutex<u32>>,
}

impl Recorder {
    fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: Arc::clone(log),
            next: None,
            fail: Vec::new(),
            cleanups: Arc::default(),
        }
    }

    fn redirect(mut self, next: BoothState) -> Self {
        self.next = Some(next);
        self
    }

    fn failing(mut self, state: BoothState, phase: Phase) -> Self {
        self.fail.push((state, phase));
        self
    }

    fn hit(&self, state: BoothState, phase: Phase) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{phase}:{state}", self.name));
        if self.fail.contains(&(state, phase)) {
            bail!("{} refused {phase} of {state}", self.name);
        }
        Ok(())
    }
}

impl Plugin for Recorder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn hooks(&self) -> &'static [(BoothState, Phase)] {
        RECORDED_HOOKS
    }

    fn enter(&mut self, state: BoothState, _ctx: &mut HookContext<'_>) -> Result<()> {
        self.hit(state, Phase::Enter)
    }

    fn run(
        &mut self,
        state: BoothState,
        _ctx: &mut HookContext<'_>,
        _events: &[BoothEvent],
    ) -> Result<()> {
        self.hit(state, Phase::Do)
    }

    fn validate(
        &mut self,
        state: BoothState,
        _ctx: &mut HookContext<'_>,
        _events: &[BoothEvent],
    ) -> Result<Option<BoothState>> {
        self.hit(state, Phase::Validate)?;
        Ok(self.next)
    }

    fn exit(&mut self, state: BoothState, _ctx: &mut HookContext<'_>) -> Result<()> {
        self.hit(state, Phase::Exit)
    }

    fn cleanup(&mut self, _caps: &mut Capabilities) -> Result<()> {
        *self.cleanups.lock().unwrap() += 1;
        Ok(())
    }
}

fn rig(plugins: Vec<Box<dyn Plugin>>) -> Rig {
    Rig::new(plugins, BoothConfig::default())
}

#[test]
fn registry_keeps_registration_order() {
    let log = Log::default();
    let plugins: Vec<Box<dyn Plugin>> = vec![
        Box::new(Recorder::new("a", &log)),
        Box::new(Recorder::new("b", &log)),
    ];
    let registry = HookRegistry::build(&plugins);
    assert_eq!(registry.handlers(BoothState::Wait, Phase::Do), &[0, 1]);
    assert!(registry.handlers(BoothState::Print, Phase::Do).is_empty());
}

#[test]
fn tick_runs_do_hooks_before_validate_hooks() {
    let log = Log::default();
    let mut rig = rig(vec![
        Box::new(Recorder::new("a", &log)),
        Box::new(Recorder::new("b", &log)),
    ]);
    rig.step(&[]);
    assert_eq!(
        entries(&log),
        [
            "a:enter:wait",
            "b:enter:wait",
            "a:do:wait",
            "b:do:wait",
            "a:validate:wait",
            "b:validate:wait",
        ]
    );
    assert_eq!(rig.machine.current(), BoothState::Wait);
}

#[test]
fn first_validate_result_wins_and_later_hooks_still_run() {
    let log = Log::default();
    let mut rig = rig(vec![
        Box::new(Recorder::new("a", &log).redirect(BoothState::Preview)),
        Box::new(Recorder::new("b", &log).redirect(BoothState::Failsafe)),
    ]);
    log.lock().unwrap().clear();
    rig.step(&[]);

    assert_eq!(rig.machine.current(), BoothState::Preview);
    assert_eq!(
        entries(&log),
        [
            "a:do:wait",
            "b:do:wait",
            "a:validate:wait",
            "b:validate:wait",
            "a:exit:wait",
            "b:exit:wait",
            "a:enter:preview",
            "b:enter:preview",
        ]
    );
}

#[test]
fn do_hook_error_routes_to_failsafe() {
    let log = Log::default();
    let mut rig = rig(vec![
        Box::new(Recorder::new("a", &log).failing(BoothState::Wait, Phase::Do)),
        Box::new(Recorder::new("b", &log)),
    ]);
    log.lock().unwrap().clear();
    rig.step(&[]);

    assert_eq!(rig.machine.current(), BoothState::Failsafe);
    let error = rig.machine.session().last_error.clone().unwrap();
    assert!(error.contains("a refused do of wait"), "{error}");
    // Validate hooks of the failed tick are skipped.
    assert!(!entries(&log).iter().any(|e| e.contains("validate")));
    assert!(entries(&log).contains(&"b:enter:failsafe".to_string()));
}

#[test]
fn failing_enter_at_start_lands_in_failsafe() {
    let log = Log::default();
    let rig = rig(vec![Box::new(
        Recorder::new("a", &log).failing(BoothState::Wait, Phase::Enter),
    )]);
    assert_eq!(rig.machine.current(), BoothState::Failsafe);
}

#[test]
fn failing_exit_diverts_the_transition() {
    let log = Log::default();
    let mut rig = rig(vec![Box::new(
        Recorder::new("a", &log)
            .redirect(BoothState::Preview)
            .failing(BoothState::Wait, Phase::Exit),
    )]);
    rig.step(&[]);
    assert_eq!(rig.machine.current(), BoothState::Failsafe);
    assert!(!entries(&log).contains(&"a:enter:preview".to_string()));
}

#[test]
fn failing_failsafe_enter_does_not_loop() {
    let log = Log::default();
    let mut rig = rig(vec![Box::new(
        Recorder::new("a", &log)
            .failing(BoothState::Wait, Phase::Do)
            .failing(BoothState::Failsafe, Phase::Enter),
    )]);
    rig.step(&[]);
    assert_eq!(rig.machine.current(), BoothState::Failsafe);
    let failsafe_enters = entries(&log)
        .iter()
        .filter(|e| *e == "a:enter:failsafe")
        .count();
    assert_eq!(failsafe_enters, 1);
}

#[test]
fn failsafe_waits_its_delay_then_returns_to_wait() {
    let log = Log::default();
    let mut rig = rig(vec![Box::new(
        Recorder::new("a", &log).failing(BoothState::Wait, Phase::Do),
    )]);
    rig.step(&[]);
    assert_eq!(rig.machine.current(), BoothState::Failsafe);

    let just_short = FAILSAFE_TIMEOUT - Duration::from_millis(1);
    rig.step_after(just_short.as_millis() as u64, &[]);
    assert_eq!(rig.machine.current(), BoothState::Failsafe);

    rig.step_after(1, &[]);
    assert_eq!(rig.machine.current(), BoothState::Wait);
}

fn assert_failsafe_times_out_despite(phase: Phase) {
    let log = Log::default();
    let mut rig = rig(vec![Box::new(
        Recorder::new("a", &log)
            .failing(BoothState::Wait, Phase::Do)
            .failing(BoothState::Failsafe, phase),
    )]);
    rig.step(&[]);
    assert_eq!(rig.machine.current(), BoothState::Failsafe);

    let mut elapsed = Duration::ZERO;
    while rig.machine.current() == BoothState::Failsafe && elapsed < Duration::from_secs(7) {
        rig.step(&[]);
        elapsed += Duration::from_millis(33);
    }
    assert_eq!(rig.machine.current(), BoothState::Wait, "stuck after {elapsed:?}");
    assert!(elapsed >= FAILSAFE_TIMEOUT);
    assert!(elapsed < FAILSAFE_TIMEOUT + Duration::from_millis(33));
    let error = rig.machine.session().last_error.clone().unwrap();
    assert!(error.contains(&format!("refused {phase} of failsafe")), "{error}");
}

#[test]
fn failsafe_delay_elapses_while_its_do_hook_keeps_failing() {
    assert_failsafe_times_out_despite(Phase::Do);
}

#[test]
fn failsafe_delay_elapses_while_its_validate_hook_keeps_failing() {
    assert_failsafe_times_out_despite(Phase::Validate);
}

#[test]
fn quit_event_is_reported() {
    let log = Log::default();
    let mut rig = rig(vec![Box::new(Recorder::new("a", &log))]);
    assert!(!rig.machine.quit_requested());
    rig.step(&[BoothEvent::Quit]);
    assert!(rig.machine.quit_requested());
}

#[test]
fn time_in_state_follows_the_injected_clock() {
    let log = Log::default();
    let mut rig = rig(vec![Box::new(Recorder::new("a", &log))]);
    let started = rig.now;
    rig.step_after(500, &[BoothEvent::Touch(TouchZone::CenterLeft)]);
    assert_eq!(
        rig.machine.time_in_state(rig.now),
        rig.now - started
    );
}

#[test]
fn cleanup_runs_once() {
    let log = Log::default();
    let recorder = Recorder::new("a", &log);
    let cleanups = Arc::clone(&recorder.cleanups);
    let mut rig = rig(vec![Box::new(recorder)]);
    rig.machine.shutdown();
    rig.machine.shutdown();
    drop(rig);
    assert_eq!(*cleanups.lock().unwrap(), 1);
}
