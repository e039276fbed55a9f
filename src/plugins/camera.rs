//! Camera orchestration: exposure adjustments from touch zones, per-shot
//! effects and the capture sequence.

use anyhow::{Context, Result};
use chrono::Local;
use config_model::CaptureEffects;
use tracing::{debug, info};

use crate::error::BoothError;
use crate::events::{self, BoothEvent, TouchZone};
use crate::machine::{Capabilities, HookContext, Plugin};
use crate::processing::photo_effects::ensure_supported;
use crate::state::{BoothState, Phase};

const HOOKS: &[(BoothState, Phase)] = &[
    (BoothState::Failsafe, Phase::Enter),
    (BoothState::Wait, Phase::Enter),
    (BoothState::Preview, Phase::Enter),
    (BoothState::Preview, Phase::Do),
    (BoothState::Capture, Phase::Do),
    (BoothState::Processing, Phase::Enter),
];

#[derive(Debug, Default)]
pub struct CameraPlugin {
    /// Shots taken in the current session; also the next effect index.
    shots: u32,
    shutter: i32,
    iso: i32,
}

impl CameraPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn adjust(&mut self, zone: TouchZone, ctx: &mut HookContext<'_>) -> Result<()> {
        let camera = &mut ctx.caps.camera;
        let settings = &mut ctx.session.camera_settings;
        match zone {
            TouchZone::TopLeft => {
                let (idx, speed) = camera.set_auto_shutter()?;
                (self.shutter, settings.shutter_speed) = (idx as i32, speed);
            }
            TouchZone::MiddleTopLeft | TouchZone::MiddleBottomLeft => {
                let step = if zone == TouchZone::MiddleTopLeft { 1 } else { -1 };
                let (idx, speed) = camera.set_shutter(Some(self.shutter + step))?;
                (self.shutter, settings.shutter_speed) = (idx as i32, speed);
            }
            TouchZone::TopRight => {
                let (idx, iso) = camera.set_auto_iso()?;
                (self.iso, settings.iso) = (idx as i32, iso);
            }
            TouchZone::MiddleTopRight | TouchZone::MiddleBottomRight => {
                let step = if zone == TouchZone::MiddleTopRight { 1 } else { -1 };
                let (idx, iso) = camera.set_iso(Some(self.iso + step))?;
                (self.iso, settings.iso) = (idx as i32, iso);
            }
            TouchZone::BottomRight => {
                settings.white_balance = camera.set_white_balance(None)?;
            }
            _ => return Ok(()),
        }
        debug!(
            %zone,
            shutter = settings.shutter_speed,
            iso = settings.iso,
            white_balance = %settings.white_balance,
            "camera setting adjusted"
        );
        Ok(())
    }
}

/// Effect for the shot at `index` (0-based) of a `captures`-long session.
pub fn effect_for_shot(effects: &CaptureEffects, index: u32, captures: u32) -> Result<&str, BoothError> {
    match effects {
        CaptureEffects::Single(effect) => Ok(effect.as_str()),
        CaptureEffects::PerShot(list) if list.len() >= captures as usize => list
            .get(index as usize)
            .map(String::as_str)
            .ok_or(BoothError::NotEnoughEffects {
                captures: index + 1,
                defined: list.len(),
            }),
        CaptureEffects::PerShot(list) => Err(BoothError::NotEnoughEffects {
            captures,
            defined: list.len(),
        }),
    }
}

impl Plugin for CameraPlugin {
    fn name(&self) -> &'static str {
        "camera"
    }

    fn hooks(&self) -> &'static [(BoothState, Phase)] {
        HOOKS
    }

    fn enter(&mut self, state: BoothState, ctx: &mut HookContext<'_>) -> Result<()> {
        match state {
            BoothState::Failsafe => {
                ctx.session.capture_date = None;
                ctx.session.capture_nbr = None;
                ctx.caps.camera.drop_captures();
                self.shots = 0;
                let (idx, speed) = ctx.caps.camera.set_shutter(None)?;
                self.shutter = idx as i32;
                ctx.session.camera_settings.shutter_speed = speed;
            }
            BoothState::Wait => {
                ctx.session.reset();
                ctx.caps.camera.drop_captures();
                self.shots = 0;
            }
            BoothState::Preview => {
                if ctx.session.capture_date.is_none() {
                    ctx.session.capture_date = Some(Local::now());
                }
                // A rejected shot leaves the buffer one short of the counter.
                self.shots = ctx.caps.camera.capture_count() as u32;
                info!(
                    shot = self.shots + 1,
                    of = ctx.session.capture_target(),
                    "show preview before next capture"
                );
            }
            BoothState::Processing => self.shots = 0,
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
            BoothState::Preview => {
                if let Some(zone) = events::find_touch(events) {
                    self.adjust(zone, ctx)?;
                }
            }
            BoothState::Capture => {
                let captures = ctx.session.capture_target();
                let effect =
                    effect_for_shot(&ctx.config.picture.captures_effects, self.shots, captures)?;
                ensure_supported(effect, ctx.caps.camera.supported_effects())?;
                info!(shot = self.shots + 1, of = captures, effect, "take a capture");
                ctx.caps
                    .camera
                    .capture(effect)
                    .with_context(|| format!("capture {} of {captures} failed", self.shots + 1))?;
                self.shots += 1;
            }
            _ => {}
        }
        Ok(())
    }

    fn cleanup(&mut self, caps: &mut Capabilities) -> Result<()> {
        caps.camera.quit();
        Ok(())
    }
}
