use std::fs;
use std::io::{self, Write};
use std::os::fd::AsFd;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use config_model::{BoothConfig, ControlCommand, ControlsConfig};
use evdev::{Device, EventSummary, KeyCode};
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "photo-buttond",
    about = "Capture and print button handler for the Rust photo booth"
)]
struct Args {
    /// Booth YAML config; its `controls` section provides the defaults below.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input device path (evdev). Auto-detects when omitted.
    #[arg(long)]
    device: Option<PathBuf>,

    /// evdev key name of the button (e.g. KEY_ENTER).
    #[arg(long)]
    key: Option<String>,

    /// Maximum press duration to treat as a short press (milliseconds).
    #[arg(long)]
    single_window_ms: Option<u64>,

    /// Window to detect a second press and trigger a print (milliseconds).
    #[arg(long)]
    double_window_ms: Option<u64>,

    /// Debounce window applied to press/release transitions (milliseconds).
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Photo booth control socket.
    #[arg(long)]
    control_socket: Option<PathBuf>,

    /// Logging level (error|warn|info|debug|trace).
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Controls section of the booth config with the command-line overrides applied.
fn resolve_controls(args: &Args) -> Result<ControlsConfig> {
    let mut controls = match &args.config {
        Some(path) => {
            let yaml = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let config: BoothConfig = serde_yaml::from_str(&yaml)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            config.controls
        }
        None => ControlsConfig::default(),
    };
    if let Some(key) = &args.key {
        controls.capture_key = key.clone();
    }
    if let Some(socket) = &args.control_socket {
        controls.socket = socket.clone();
    }
    if let Some(ms) = args.debounce_ms {
        controls.debounce = Duration::from_millis(ms);
    }
    if let Some(ms) = args.single_window_ms {
        controls.single_window = Duration::from_millis(ms);
    }
    if let Some(ms) = args.double_window_ms {
        controls.double_window = Duration::from_millis(ms);
    }
    Ok(controls)
}

fn parse_key(name: &str) -> Result<KeyCode> {
    name.trim()
        .to_ascii_uppercase()
        .parse::<KeyCode>()
        .map_err(|_| anyhow!("unknown evdev key '{name}'"))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let controls = resolve_controls(&args)?;
    let key = parse_key(&controls.capture_key)?;
    let (mut device, path) = open_device(args.device.as_deref(), key)?;
    set_nonblocking(&device)
        .with_context(|| format!("failed to set {} non-blocking", path.display()))?;
    info!(device = %path.display(), ?key, "listening for button events");

    let socket = controls.socket.clone();
    let mut tracker = PressTracker::new(controls);

    loop {
        let now = Instant::now();
        if let Some(action) = tracker.poll(now) {
            perform_action(action, &socket);
            continue;
        }

        let mut got_events = false;
        match device.fetch_events() {
            Ok(events) => {
                for event in events {
                    got_events = true;
                    let EventSummary::Key(_, code, value) = event.destructure() else {
                        continue;
                    };
                    if code != key {
                        continue;
                    }
                    let at = Instant::now();
                    let action = match value {
                        1 => {
                            tracker.on_press(at);
                            None
                        }
                        0 => tracker.on_release(at),
                        _ => None,
                    };
                    if let Some(action) = action {
                        perform_action(action, &socket);
                    }
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
            Err(err) => return Err(err).context("failed reading input events"),
        }

        if !got_events {
            let nap = tracker
                .time_to_deadline(Instant::now())
                .unwrap_or(Duration::from_millis(50))
                .min(Duration::from_millis(100));
            if !nap.is_zero() {
                thread::sleep(nap);
            }
        }
    }
}

fn set_nonblocking(device: &Device) -> Result<()> {
    let current = fcntl(device.as_fd(), FcntlArg::F_GETFL).context("F_GETFL failed")?;
    let mut flags = OFlag::from_bits_retain(current);
    flags.insert(OFlag::O_NONBLOCK);
    fcntl(device.as_fd(), FcntlArg::F_SETFL(flags)).context("F_SETFL failed")?;
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::builder()
        .parse(level)
        .with_context(|| format!("invalid log level '{level}'"))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Device sending `key`: the explicit path, else the first match by path.
fn open_device(path: Option<&Path>, key: KeyCode) -> Result<(Device, PathBuf)> {
    if let Some(path) = path {
        let device =
            Device::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        ensure_key(&device, path, key)?;
        return Ok((device, path.to_path_buf()));
    }

    // Button boards enumerate as keyboards; raw nodes are the fallback.
    let mut candidates = input_nodes("/dev/input/by-path", |name| name.ends_with("event-kbd"))?;
    candidates.extend(input_nodes("/dev/input", |name| name.starts_with("event"))?);
    for path in candidates {
        match Device::open(&path) {
            Ok(device) => match ensure_key(&device, &path, key) {
                Ok(()) => return Ok((device, path)),
                Err(err) => debug!(device = %path.display(), "{err}"),
            },
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                warn!(device = %path.display(), "no permission to read device");
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to open {}", path.display()));
            }
        }
    }
    bail!("no input devices advertising {key:?} found");
}

/// Sorted device nodes of `dir` whose lowercase name passes `accept`.
fn input_nodes(dir: &str, accept: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err).with_context(|| format!("failed to read directory {dir}")),
    };
    let mut nodes = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path();
        let accepted = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| accept(&name.to_ascii_lowercase()));
        if accepted {
            nodes.push(path);
        }
    }
    nodes.sort();
    Ok(nodes)
}

fn ensure_key(device: &Device, path: &Path, key: KeyCode) -> Result<()> {
    let Some(keys) = device.supported_keys() else {
        bail!("{} does not advertise any keys", path.display());
    };
    if !keys.contains(key) {
        bail!("{} does not support {key:?}", path.display());
    }
    Ok(())
}

/// What a completed press sequence asks the booth to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    /// Single press: trigger a capture.
    Capture,
    /// Double press: print the last picture again.
    Print,
}

impl Action {
    fn command(self) -> ControlCommand {
        match self {
            Action::Capture => ControlCommand::Capture,
            Action::Print => ControlCommand::Print,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Press {
    Idle,
    Down { since: Instant, second: bool },
    /// A short press ended; a capture fires unless a second press lands first.
    Released { until: Instant },
}

/// Turns debounced key edges into booth actions.
struct PressTracker {
    controls: ControlsConfig,
    state: Press,
    last_edge: Option<Instant>,
}

impl PressTracker {
    fn new(controls: ControlsConfig) -> Self {
        Self {
            controls,
            state: Press::Idle,
            last_edge: None,
        }
    }

    fn on_press(&mut self, now: Instant) {
        if self.bounced(now) {
            return;
        }
        self.state = match self.state {
            Press::Released { until } if now <= until => Press::Down {
                since: now,
                second: true,
            },
            Press::Down { .. } => self.state,
            Press::Idle | Press::Released { .. } => Press::Down {
                since: now,
                second: false,
            },
        };
    }

    fn on_release(&mut self, now: Instant) -> Option<Action> {
        if self.bounced(now) {
            return None;
        }
        let Press::Down { since, second } = self.state else {
            return None;
        };
        self.state = Press::Idle;
        let held = now.saturating_duration_since(since);
        if held > self.controls.single_window {
            debug!(?held, "long press ignored");
            return None;
        }
        if second {
            return Some(Action::Print);
        }
        self.state = Press::Released {
            until: now + self.controls.double_window,
        };
        None
    }

    /// Fire the pending capture once the double-press window has closed.
    fn poll(&mut self, now: Instant) -> Option<Action> {
        match self.state {
            Press::Released { until } if now > until => {
                self.state = Press::Idle;
                Some(Action::Capture)
            }
            _ => None,
        }
    }

    fn time_to_deadline(&self, now: Instant) -> Option<Duration> {
        match self.state {
            Press::Released { until } => Some(until.saturating_duration_since(now)),
            _ => None,
        }
    }

    fn bounced(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_edge
            && now.saturating_duration_since(last) < self.controls.debounce
        {
            debug!("edge within debounce window");
            return true;
        }
        self.last_edge = Some(now);
        false
    }
}

fn perform_action(action: Action, socket: &Path) {
    let command = action.command();
    info!(?action, ?command, "button sequence complete");
    if let Err(err) = send_command(socket, &command) {
        error!(?err, "failed to send control command");
    }
}

/// One line of JSON, as read by the booth control socket.
fn encode_command(command: &ControlCommand) -> Result<String> {
    let mut line = serde_json::to_string(command).context("failed to encode command")?;
    line.push('\n');
    Ok(line)
}

fn send_command(socket: &Path, command: &ControlCommand) -> Result<()> {
    let mut stream = UnixStream::connect(socket).with_context(|| {
        format!("failed to connect to control socket at {}", socket.display())
    })?;
    stream
        .write_all(encode_command(command)?.as_bytes())
        .context("failed to send control command")?;
    Ok(())
}
