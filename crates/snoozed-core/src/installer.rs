//! Crontab-backed trigger installation.
//!
//! Every managed line carries a trailing marker comment. Replacement is
//! wholesale: read the current table, drop every marked line, append the
//! new generation, write the table back. Unmanaged lines are preserved
//! byte-for-byte.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::alarm::DayType;
use crate::error::InstallError;
use crate::triggers::{TriggerKind, TriggerSpec};

/// Marker comment identifying crontab lines owned by this tool.
pub const MARKER: &str = "# snoozed:managed";

/// External scheduler contract: idempotent replace-all keyed by the marker.
pub trait TriggerInstaller {
    /// Replace every previously installed entry with the new set.
    fn replace_all(&self, triggers: &[TriggerSpec]) -> Result<(), InstallError>;

    /// Currently installed managed entries, rendered.
    fn installed(&self) -> Result<Vec<String>, InstallError>;

    /// Remove every managed entry.
    fn remove_all(&self) -> Result<(), InstallError> {
        self.replace_all(&[])
    }
}

/// Installs triggers into the user's crontab via `crontab -l` / `crontab -`.
pub struct CronInstaller {
    /// Binary invoked by the generated lines.
    binary: String,
}

impl CronInstaller {
    /// Point generated lines at the currently running binary.
    pub fn new() -> Self {
        let binary = std::env::current_exe()
            .ok()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "snoozed".to_string());
        Self { binary }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn read_crontab(&self) -> Result<Vec<String>, InstallError> {
        let output = Command::new("crontab")
            .arg("-l")
            .output()
            .map_err(|source| InstallError::Spawn {
                program: "crontab".into(),
                source,
            })?;
        if output.status.success() {
            let text = String::from_utf8_lossy(&output.stdout);
            Ok(text.lines().map(str::to_string).collect())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            // `crontab -l` fails when the user has no table yet.
            if stderr.contains("no crontab") {
                Ok(Vec::new())
            } else {
                Err(InstallError::Rejected {
                    program: "crontab -l".into(),
                    status: output.status,
                    stderr,
                })
            }
        }
    }

    fn write_crontab(&self, lines: &[String]) -> Result<(), InstallError> {
        let spawn_err = |source| InstallError::Spawn {
            program: "crontab".into(),
            source,
        };
        let mut child = Command::new("crontab")
            .arg("-")
            .stdin(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;
        if let Some(stdin) = child.stdin.as_mut() {
            let mut table = lines.join("\n");
            table.push('\n');
            stdin.write_all(table.as_bytes()).map_err(spawn_err)?;
        }
        let output = child.wait_with_output().map_err(spawn_err)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(InstallError::Rejected {
                program: "crontab -".into(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        }
    }
}

impl Default for CronInstaller {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerInstaller for CronInstaller {
    fn replace_all(&self, triggers: &[TriggerSpec]) -> Result<(), InstallError> {
        let mut lines = strip_managed(self.read_crontab()?);
        for spec in triggers {
            lines.push(render_line(&self.binary, spec));
        }
        self.write_crontab(&lines)?;
        if triggers.is_empty() {
            debug!("removed all managed crontab entries");
        } else {
            info!(count = triggers.len(), "installed crontab entries");
        }
        Ok(())
    }

    fn installed(&self) -> Result<Vec<String>, InstallError> {
        Ok(self
            .read_crontab()?
            .into_iter()
            .filter(|l| l.trim_end().ends_with(MARKER))
            .collect())
    }
}

fn strip_managed(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .filter(|l| !l.trim_end().ends_with(MARKER))
        .collect()
}

fn dow_field(day_type: DayType) -> &'static str {
    match day_type {
        DayType::Weekday => "1-5",
        DayType::Weekend => "0,6",
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r#"'\''"#))
}

/// One crontab line for a trigger spec.
///
/// Action lines omit `--action`: the action is resolved from the live
/// configuration when the trigger fires.
fn render_line(binary: &str, spec: &TriggerSpec) -> String {
    let command = match spec.kind {
        TriggerKind::Warning { minutes_before } => format!(
            "{binary} warn --alarm {} --minutes {minutes_before}",
            shell_quote(&spec.alarm)
        ),
        TriggerKind::Action => {
            format!("{binary} execute --alarm {}", shell_quote(&spec.alarm))
        }
    };
    format!(
        "{} {} * * {} {command} {MARKER}",
        spec.time.minute(),
        spec.time.hour(),
        dow_field(spec.day_type)
    )
}
