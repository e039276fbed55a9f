//! Screen flow: maps touch zones to transitions and keeps the display in
//! step with the active state.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::events::{self, BoothEvent, TouchZone};
use crate::machine::{HookContext, Plugin};
use crate::state::{BoothState, Phase};

/// Zones that start a session from the intro screen.
pub const START_ZONES: &[TouchZone] = &[
    TouchZone::MiddleTopLeft,
    TouchZone::CenterLeft,
    TouchZone::MiddleBottomLeft,
];
pub const QUIT_ZONE: TouchZone = TouchZone::TopLeft;
pub const CANCEL_ZONE: TouchZone = TouchZone::BottomLeft;
/// Left half of the choice screen picks the first count.
pub const FIRST_CHOICE_ZONES: &[TouchZone] = START_ZONES;
pub const SECOND_CHOICE_ZONES: &[TouchZone] = &[
    TouchZone::MiddleTopRight,
    TouchZone::CenterRight,
    TouchZone::MiddleBottomRight,
];
pub const SHOOT_ZONES: &[TouchZone] = &[TouchZone::CenterLeft, TouchZone::CenterRight];
pub const ACCEPT_ZONES: &[TouchZone] = &[TouchZone::TopRight, TouchZone::MiddleTopRight];
pub const REJECT_ZONES: &[TouchZone] = &[TouchZone::MiddleBottomRight, TouchZone::BottomRight];
pub const PRINT_ZONE: TouchZone = TouchZone::MiddleTopRight;
pub const SKIP_PRINT_ZONE: TouchZone = TouchZone::MiddleBottomRight;

const HOOKS: &[(BoothState, Phase)] = &[
    (BoothState::Failsafe, Phase::Enter),
    (BoothState::Wait, Phase::Enter),
    (BoothState::Wait, Phase::Do),
    (BoothState::Wait, Phase::Validate),
    (BoothState::Wait, Phase::Exit),
    (BoothState::Choose, Phase::Enter),
    (BoothState::Choose, Phase::Validate),
    (BoothState::Preview, Phase::Enter),
    (BoothState::Preview, Phase::Do),
    (BoothState::Preview, Phase::Validate),
    (BoothState::Preview, Phase::Exit),
    (BoothState::Capture, Phase::Do),
    (BoothState::Capture, Phase::Validate),
    (BoothState::Confirm, Phase::Enter),
    (BoothState::Confirm, Phase::Validate),
    (BoothState::Processing, Phase::Enter),
    (BoothState::Processing, Phase::Validate),
    (BoothState::Print, Phase::Enter),
    (BoothState::Print, Phase::Validate),
];

#[derive(Debug, Default)]
pub struct ViewPlugin;

impl ViewPlugin {
    pub fn new() -> Self {
        Self
    }
}

fn touched(events: &[BoothEvent], zones: &[TouchZone]) -> bool {
    events::find_touch(events).is_some_and(|zone| zones.contains(&zone))
}

/// A reprint of the previous picture would be accepted right now.
pub(crate) fn can_print(ctx: &HookContext<'_>) -> bool {
    ctx.session.previous_picture.is_some()
        && ctx.session.remaining_duplicates > 0
        && ctx.caps.printer.is_ready()
}

fn refresh_print_number(ctx: &mut HookContext<'_>) {
    let printer = &ctx.caps.printer;
    if printer.is_installed() {
        let pending = printer.get_all_tasks().len();
        let disabled = !printer.is_ready();
        ctx.caps.display.set_print_number(pending, disabled);
    }
}

/// Preview stops outside PREVIEW no matter how the state was reached.
fn stop_preview(ctx: &mut HookContext<'_>) {
    if let Err(err) = ctx.caps.camera.stop_preview() {
        warn!("could not stop preview: {err}");
    }
}

impl Plugin for ViewPlugin {
    fn name(&self) -> &'static str {
        "view"
    }

    fn hooks(&self) -> &'static [(BoothState, Phase)] {
        HOOKS
    }

    fn enter(&mut self, state: BoothState, ctx: &mut HookContext<'_>) -> Result<()> {
        match state {
            BoothState::Failsafe => {
                stop_preview(ctx);
                let message = ctx.session.last_error.as_deref();
                ctx.caps.display.show_oops(message);
            }
            BoothState::Wait => {
                stop_preview(ctx);
                ctx.session.capture_count = 1;
                let with_print = can_print(ctx);
                let previous = ctx.session.previous_picture.as_deref();
                ctx.caps.display.show_intro(previous, with_print);
                refresh_print_number(ctx);
            }
            BoothState::Choose => {
                ctx.caps.display.set_print_number(0, false);
                ctx.caps.display.show_choice(ctx.session.capture_choices());
            }
            BoothState::Preview => {
                let window = &ctx.config.window;
                let frame = ctx.caps.display.window().inset(window.preview_border);
                let area = ctx
                    .caps
                    .camera
                    .get_preview_area(frame)
                    .translated(0, window.preview_y_offset);
                ctx.caps.camera.preview(area)?;
                ctx.caps.display.show_capture(area);
                ctx.caps
                    .display
                    .set_capture_number(ctx.session.capture_count, ctx.session.capture_target());
                let settings = &ctx.session.camera_settings;
                ctx.caps.display.set_shutter_speed(settings.shutter_speed);
                ctx.caps.display.set_iso(settings.iso);
                ctx.caps.display.set_white_balance(&settings.white_balance);
            }
            BoothState::Confirm => {
                stop_preview(ctx);
                let last = ctx.caps.camera.get_last_capture();
                ctx.caps.display.show_confirm(last.as_ref());
            }
            BoothState::Processing => {
                stop_preview(ctx);
                ctx.session.capture_count = 1;
                ctx.caps.display.show_work_in_progress();
            }
            BoothState::Print => {
                let picture = ctx.session.previous_picture.as_deref();
                ctx.caps.display.show_print(picture);
                refresh_print_number(ctx);
            }
            _ => {}
        }
        Ok(())
    }

    fn run(
        &mut self,
        state: BoothState,
        ctx: &mut HookContext<'_>,
        events: &[BoothEvent],
    ) -> Result<()> {
        match state {
            BoothState::Wait => {
                if events::print_status_changed(events) {
                    refresh_print_number(ctx);
                }
            }
            BoothState::Preview => {
                let settings = &ctx.session.camera_settings;
                ctx.caps.display.set_shutter_speed(settings.shutter_speed);
                ctx.caps.display.set_iso(settings.iso);
                ctx.caps.display.set_white_balance(&settings.white_balance);
            }
            BoothState::Capture => {
                ctx.caps
                    .display
                    .set_capture_number(ctx.session.capture_count, ctx.session.capture_target());
            }
            _ => {}
        }
        Ok(())
    }

    fn validate(
        &mut self,
        state: BoothState,
        ctx: &mut HookContext<'_>,
        events: &[BoothEvent],
    ) -> Result<Option<BoothState>> {
        let next = match state {
            BoothState::Wait => match events::find_touch(events) {
                Some(zone) if START_ZONES.contains(&zone) => {
                    if ctx.session.has_several_choices() {
                        Some(BoothState::Choose)
                    } else {
                        Some(BoothState::Preview)
                    }
                }
                Some(QUIT_ZONE) => {
                    info!("quit requested from the intro screen");
                    ctx.request_quit();
                    None
                }
                _ => None,
            },
            BoothState::Choose => {
                let picked = if touched(events, FIRST_CHOICE_ZONES) {
                    ctx.session.capture_choices().first().copied()
                } else if touched(events, SECOND_CHOICE_ZONES) {
                    ctx.session.capture_choices().get(1).copied()
                } else {
                    None
                };
                if let Some(count) = picked {
                    debug!(count, "capture count chosen");
                    ctx.session.capture_nbr = Some(count);
                    Some(BoothState::Preview)
                } else if touched(events, &[CANCEL_ZONE]) {
                    Some(BoothState::Wait)
                } else {
                    None
                }
            }
            BoothState::Preview => {
                if touched(events, &[CANCEL_ZONE]) {
                    Some(BoothState::Wait)
                } else if touched(events, SHOOT_ZONES) || events::capture_requested(events) {
                    Some(BoothState::Capture)
                } else {
                    None
                }
            }
            BoothState::Capture => Some(BoothState::Confirm),
            BoothState::Confirm => {
                if touched(events, ACCEPT_ZONES) || events::capture_requested(events) {
                    let session = &mut *ctx.session;
                    if session.capture_count < session.capture_target() {
                        session.capture_count += 1;
                        Some(BoothState::Preview)
                    } else {
                        Some(BoothState::Processing)
                    }
                } else if touched(events, REJECT_ZONES) {
                    info!(shot = ctx.session.capture_count, "capture rejected");
                    ctx.caps.camera.drop_last_capture();
                    Some(BoothState::Preview)
                } else {
                    None
                }
            }
            BoothState::Processing => {
                if can_print(ctx) {
                    Some(BoothState::Print)
                } else {
                    Some(BoothState::Wait)
                }
            }
            BoothState::Print => match events::find_touch(events) {
                Some(PRINT_ZONE) => {
                    refresh_print_number(ctx);
                    Some(BoothState::Wait)
                }
                Some(SKIP_PRINT_ZONE) => Some(BoothState::Wait),
                _ => None,
            },
            _ => None,
        };
        Ok(next)
    }

    fn exit(&mut self, state: BoothState, ctx: &mut HookContext<'_>) -> Result<()> {
        match state {
            BoothState::Wait => ctx.caps.display.clear_image(),
            BoothState::Preview => ctx.caps.camera.stop_preview()?,
            _ => {}
        }
        Ok(())
    }
}
