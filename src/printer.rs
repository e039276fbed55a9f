//! Printer capability backed by the CUPS command line tools.

use std::path::Path;

use config_model::PrinterConfig;
use tracing::{debug, info, warn};

use crate::error::{BoothError, Result};
use crate::platform::command::{CommandLine, CommandRunner, default_runner};

/// One job waiting in the printer queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintTask {
    pub id: String,
    pub owner: String,
}

pub trait Printer: Send {
    fn is_installed(&self) -> bool;
    fn is_ready(&self) -> bool;
    fn get_all_tasks(&self) -> Vec<PrintTask>;
    /// Submit the composed picture.
    fn print(&mut self, picture: &Path, copies: u32) -> Result<()>;
}

/// Used when no printer is configured.
#[derive(Debug, Default)]
pub struct NoPrinter;

impl Printer for NoPrinter {
    fn is_installed(&self) -> bool {
        false
    }

    fn is_ready(&self) -> bool {
        false
    }

    fn get_all_tasks(&self) -> Vec<PrintTask> {
        Vec::new()
    }

    fn print(&mut self, picture: &Path, _copies: u32) -> Result<()> {
        warn!(picture = %picture.display(), "print requested but no printer is installed");
        Ok(())
    }
}

pub struct CupsPrinter {
    name: String,
    runner: CommandRunner,
    installed: bool,
}

impl CupsPrinter {
    pub fn connect(name: &str) -> Self {
        Self::with_runner(name, default_runner())
    }

    pub fn with_runner(name: &str, runner: CommandRunner) -> Self {
        let mut printer = Self {
            name: name.to_string(),
            runner,
            installed: false,
        };
        printer.installed = printer.status().is_some();
        if printer.installed {
            info!(printer = name, "printer found");
        } else {
            warn!(printer = name, "printer not installed; printing disabled");
        }
        printer
    }

    fn lpstat(&self, flag: &str) -> Option<String> {
        let args = vec![flag.to_string(), self.name.clone()];
        match (self.runner)("lpstat", &args) {
            Ok(output) if output.success => Some(output.stdout_text()),
            Ok(output) => {
                debug!(
                    command = %CommandLine("lpstat", &args),
                    detail = output.failure_detail(),
                    "lpstat failed"
                );
                None
            }
            Err(err) => {
                debug!(%err, "lpstat unavailable");
                None
            }
        }
    }

    fn status(&self) -> Option<String> {
        self.lpstat("-p")
    }
}

impl Printer for CupsPrinter {
    fn is_installed(&self) -> bool {
        self.installed
    }

    fn is_ready(&self) -> bool {
        if !self.installed {
            return false;
        }
        self.status().is_some_and(|status| {
            !status.contains("disabled")
                && (status.contains("is idle") || status.contains("now printing"))
        })
    }

    fn get_all_tasks(&self) -> Vec<PrintTask> {
        if !self.installed {
            return Vec::new();
        }
        self.lpstat("-o")
            .map(|listing| parse_jobs(&listing))
            .unwrap_or_default()
    }

    fn print(&mut self, picture: &Path, copies: u32) -> Result<()> {
        let args = vec![
            "-d".to_string(),
            self.name.clone(),
            "-n".to_string(),
            copies.max(1).to_string(),
            picture.display().to_string(),
        ];
        let command = CommandLine("lp", &args).to_string();
        let output = (self.runner)("lp", &args)?;
        if !output.success {
            return Err(BoothError::PrinterCommand {
                command,
                detail: output.failure_detail(),
            });
        }
        info!(printer = %self.name, picture = %picture.display(), copies, "print job submitted");
        Ok(())
    }
}

fn parse_jobs(listing: &str) -> Vec<PrintTask> {
    listing
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let id = fields.next()?;
            let owner = fields.next().unwrap_or_default();
            Some(PrintTask {
                id: id.to_string(),
                owner: owner.to_string(),
            })
        })
        .collect()
}

/// Printer selected by the configuration.
pub fn from_config(config: &PrinterConfig) -> Box<dyn Printer> {
    match config.name.as_deref() {
        Some(name) if !name.trim().is_empty() => Box::new(CupsPrinter::connect(name)),
        _ => {
            info!("no printer configured");
            Box::new(NoPrinter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::command::CommandOutput;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    fn stub(responses: &[(&str, bool, &str)]) -> (CommandRunner, Arc<Mutex<Vec<String>>>) {
        let map: HashMap<String, (bool, String)> = responses
            .iter()
            .map(|(cmd, ok, out)| (cmd.to_string(), (*ok, out.to_string())))
            .collect();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = calls.clone();
        let runner: CommandRunner = Arc::new(move |program: &str, args: &[String]| {
            let line = CommandLine(program, args).to_string();
            seen.lock().unwrap().push(line.clone());
            let (success, stdout) = map
                .iter()
                .find(|(prefix, _)| line.starts_with(prefix.as_str()))
                .map(|(_, value)| value.clone())
                .unwrap_or((false, String::new()));
            Ok(CommandOutput {
                success,
                exit_code: Some(if success { 0 } else { 1 }),
                stdout: stdout.into_bytes(),
                stderr: String::new(),
            })
        });
        (runner, calls)
    }

    #[test]
    fn idle_printer_is_ready_and_lists_jobs() {
        let (runner, _) = stub(&[
            ("lpstat -p", true, "printer booth is idle.  enabled since Mon"),
            (
                "lpstat -o",
                true,
                "booth-12 pi 1024 Mon 10:00\nbooth-13 pi 2048 Mon 10:01\n",
            ),
        ]);
        let printer = CupsPrinter::with_runner("booth", runner);
        assert!(printer.is_installed());
        assert!(printer.is_ready());
        let tasks = printer.get_all_tasks();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, "booth-12");
        assert_eq!(tasks[1].owner, "pi");
    }

    #[test]
    fn disabled_printer_is_not_ready() {
        let (runner, _) = stub(&[(
            "lpstat -p",
            true,
            "printer booth disabled since Mon - paused",
        )]);
        let printer = CupsPrinter::with_runner("booth", runner);
        assert!(printer.is_installed());
        assert!(!printer.is_ready());
    }

    #[test]
    fn missing_printer_is_not_installed() {
        let (runner, calls) = stub(&[]);
        let printer = CupsPrinter::with_runner("ghost", runner);
        assert!(!printer.is_installed());
        assert!(printer.get_all_tasks().is_empty());
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn print_submits_copies() {
        let (runner, calls) = stub(&[("lpstat -p", true, "printer booth is idle."), ("lp ", true, "")]);
        let mut printer = CupsPrinter::with_runner("booth", runner);
        printer.print(&PathBuf::from("/tmp/pic.jpg"), 2).unwrap();
        assert_eq!(
            calls.lock().unwrap().last().unwrap(),
            "lp -d booth -n 2 /tmp/pic.jpg"
        );
    }

    #[test]
    fn failed_submission_is_an_error() {
        let (runner, _) = stub(&[("lpstat -p", true, "printer booth is idle.")]);
        let mut printer = CupsPrinter::with_runner("booth", runner);
        let err = printer.print(Path::new("/tmp/pic.jpg"), 1).unwrap_err();
        assert!(matches!(err, BoothError::PrinterCommand { .. }));
    }
}
