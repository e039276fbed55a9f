pub mod camera;
pub mod config;
pub mod control;
pub mod display;
pub mod error;
pub mod events;
pub mod machine;
pub mod printer;
pub mod session;
pub mod state;
pub mod platform {
    pub mod command;
}
pub mod plugins {
    pub mod camera;
    pub mod picture;
    pub mod view;
}
pub mod processing {
    pub mod compose;
    pub mod layout;
    pub mod photo_effects;
}

use anyhow::{Context, Result};
use config_model::BoothConfig;

use crate::camera::{CameraProvider, setup_camera};
use crate::display::Display;
use crate::machine::{Capabilities, Plugin, StateMachine};
use crate::printer::Printer;

/// The stock plugins, in hook order.
pub fn default_plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(plugins::camera::CameraPlugin::new()),
        Box::new(plugins::view::ViewPlugin::new()),
        Box::new(plugins::picture::PicturePlugin::new()),
    ]
}

/// Resolve the camera through the plugins, then wire the machine.
pub fn build_machine(
    config: BoothConfig,
    mut plugins: Vec<Box<dyn Plugin>>,
    display: Box<dyn Display>,
    printer: Box<dyn Printer>,
) -> Result<StateMachine> {
    let camera = {
        let mut providers: Vec<&mut dyn CameraProvider> = plugins
            .iter_mut()
            .map(|plugin| plugin as &mut dyn CameraProvider)
            .collect();
        setup_camera(&mut providers, &config.camera).context("camera setup failed")?
    };
    let caps = Capabilities {
        camera,
        display,
        printer,
    };
    Ok(StateMachine::new(plugins, caps, config))
}
