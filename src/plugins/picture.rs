//! Final picture: composition of the session shots, storage and prints.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{info, warn};

use crate::error::BoothError;
use crate::events::{self, BoothEvent};
use crate::machine::{HookContext, Plugin};
use crate::plugins::view::{PRINT_ZONE, can_print};
use crate::processing::compose::{compose, save_jpeg};
use crate::state::{BoothState, Phase};

const HOOKS: &[(BoothState, Phase)] = &[
    (BoothState::Wait, Phase::Do),
    (BoothState::Processing, Phase::Enter),
    (BoothState::Print, Phase::Do),
];

#[derive(Debug, Default)]
pub struct PicturePlugin;

impl PicturePlugin {
    pub fn new() -> Self {
        Self
    }
}

/// Path of the composed picture for a session stamp.
pub fn picture_path(directory: &Path, stamp: &str) -> PathBuf {
    directory.join(format!("{stamp}_photobooth.jpg"))
}

/// Path of one raw shot (1-based) for a session stamp.
pub fn shot_path(directory: &Path, stamp: &str, shot: usize) -> PathBuf {
    directory
        .join("raw")
        .join(format!("{stamp}_photobooth_{shot:02}.jpg"))
}

fn print_previous(ctx: &mut HookContext<'_>) -> Result<()> {
    let Some(picture) = ctx.session.previous_picture.clone() else {
        info!("nothing to print yet");
        return Ok(());
    };
    if ctx.session.remaining_duplicates == 0 {
        info!(picture = %picture.display(), "duplicate limit reached");
        return Ok(());
    }
    if !ctx.caps.printer.is_ready() {
        warn!("printer not ready, print request ignored");
        return Ok(());
    }

    let copies = ctx.config.printer.copies;
    ctx.caps
        .printer
        .print(&picture, copies)
        .with_context(|| format!("failed to print {}", picture.display()))?;
    ctx.session.remaining_duplicates -= 1;
    info!(
        picture = %picture.display(),
        copies,
        remaining = ctx.session.remaining_duplicates,
        "picture sent to printer"
    );

    let pending = ctx.caps.printer.get_all_tasks().len();
    let disabled = !ctx.caps.printer.is_ready();
    ctx.caps.display.set_print_number(pending, disabled);
    Ok(())
}

impl Plugin for PicturePlugin {
    fn name(&self) -> &'static str {
        "picture"
    }

    fn hooks(&self) -> &'static [(BoothState, Phase)] {
        HOOKS
    }

    fn enter(&mut self, state: BoothState, ctx: &mut HookContext<'_>) -> Result<()> {
        if state != BoothState::Processing {
            return Ok(());
        }
        let frames = ctx.caps.camera.get_captures();
        if frames.is_empty() {
            return Err(BoothError::NoCapture.into());
        }
        let stamp = ctx
            .session
            .capture_stamp()
            .unwrap_or_else(|| Local::now().format("%Y-%m-%d-%H-%M-%S").to_string());
        let directory = &ctx.config.general.directory;

        for (idx, frame) in frames.iter().enumerate() {
            let path = shot_path(directory, &stamp, idx + 1);
            save_jpeg(&frame.to_rgb8(), &path)
                .with_context(|| format!("failed to save {}", path.display()))?;
        }

        let picture = compose(&frames)?;
        let path = picture_path(directory, &stamp);
        save_jpeg(&picture, &path)
            .with_context(|| format!("failed to save {}", path.display()))?;
        info!(
            picture = %path.display(),
            shots = frames.len(),
            width = picture.width(),
            height = picture.height(),
            "picture saved"
        );

        ctx.session.previous_picture = Some(path);
        ctx.session.remaining_duplicates = ctx.config.printer.max_duplicates;
        Ok(())
    }

    fn run(
        &mut self,
        state: BoothState,
        ctx: &mut HookContext<'_>,
        events: &[BoothEvent],
    ) -> Result<()> {
        let wanted = match state {
            BoothState::Wait => events::print_requested(events),
            BoothState::Print => {
                events::print_requested(events) || events::find_touch(events) == Some(PRINT_ZONE)
            }
            _ => false,
        };
        if wanted {
            print_previous(ctx)?;
        }
        if wanted && state == BoothState::Wait {
            // Redraw once the duplicate count reflects this print.
            let with_print = can_print(ctx);
            let previous = ctx.session.previous_picture.as_deref();
            ctx.caps.display.show_intro(previous, with_print);
        }
        Ok(())
    }
}
