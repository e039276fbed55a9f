//! Helper-process plumbing shared by the camera and printer drivers.

use std::fmt;
use std::io;
use std::process::Command;
use std::sync::Arc;

use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl CommandOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Short human-readable reason for a failed run.
    pub fn failure_detail(&self) -> String {
        let code = self
            .exit_code
            .map(|code| format!("exit code {code}"))
            .unwrap_or_else(|| "terminated by signal".to_string());
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            code
        } else {
            format!("{code}: {stderr}")
        }
    }
}

/// Runs `program` with `args` to completion. Injectable so drivers can be
/// tested without the real tools installed.
pub type CommandRunner =
    Arc<dyn Fn(&str, &[String]) -> io::Result<CommandOutput> + Send + Sync>;

pub fn default_runner() -> CommandRunner {
    Arc::new(run_process)
}

fn run_process(program: &str, args: &[String]) -> io::Result<CommandOutput> {
    debug!(program, args = ?args, "running helper");
    let output = Command::new(program).args(args).output()?;
    Ok(CommandOutput {
        success: output.status.success(),
        exit_code: output.status.code(),
        stdout: output.stdout,
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Display form used in logs and error messages.
pub struct CommandLine<'a>(pub &'a str, pub &'a [String]);

impl fmt::Display for CommandLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)?;
        for arg in self.1 {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
