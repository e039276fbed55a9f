use thiserror::Error;

pub type Result<T, E = BoothError> = std::result::Result<T, E>;

/// Errors raised by the hardware capabilities and the booth configuration.
#[derive(Debug, Error)]
pub enum BoothError {
    /// Rotation outside {0, 90, 180, 270}.
    #[error("invalid {stream} camera rotation value '{value}' (should be 0, 90, 180 or 270)")]
    InvalidRotation { stream: &'static str, value: u16 },

    /// The camera driver does not know this effect.
    #[error("invalid capture effect '{effect}' (choose among {supported})")]
    UnsupportedEffect { effect: String, supported: String },

    /// A per-shot effect list does not cover every capture of the session.
    #[error("not enough effects defined for {captures} captures ({defined} defined)")]
    NotEnoughEffects { captures: u32, defined: usize },

    /// No camera answered the startup probe.
    #[error("no camera detected")]
    NoCamera,

    /// A camera helper process failed.
    #[error("camera command `{command}` failed: {detail}")]
    CameraCommand { command: String, detail: String },

    /// A printer helper process failed.
    #[error("printer command `{command}` failed: {detail}")]
    PrinterCommand { command: String, detail: String },

    /// An operation needed a buffered capture but none was taken.
    #[error("no capture available")]
    NoCapture,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}
