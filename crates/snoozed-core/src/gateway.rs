//! Presentation and system-action seams.
//!
//! The state machine talks to the outside world through two capability
//! traits so tests can substitute fakes:
//! - [`NotificationGateway`]: informational warnings and the blocking final
//!   decision prompt
//! - [`ActionExecutor`]: the real suspend/shutdown/hibernate, best-effort
//!
//! The production implementations shell out to desktop tooling
//! (`notify-send`, `zenity`, `kdialog`) and to `systemctl`/`loginctl`.

use std::process::Command;

use tracing::{debug, warn};

use crate::alarm::Action;
use crate::error::GatewayError;

/// The user's answer to a final decision prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    SuspendNow,
    Snooze,
}

/// Presentation surface for warnings and decision prompts.
pub trait NotificationGateway {
    /// Fire-and-forget informational notice.
    fn inform(&self, alarm: &str, message: &str, minutes: u32);

    /// Blocking final prompt. Must not return until one of the offered
    /// choices is taken; with `remaining == 0` the only legal return value
    /// is [`Decision::SuspendNow`]. Improper dismissal redisplays.
    fn decide(&self, alarm: &str, remaining: u32, max: u32) -> Result<Decision, GatewayError>;
}

/// Performs the real system action. Failures are logged, never retried.
pub trait ActionExecutor {
    fn perform(&self, action: Action);
}

// ── Dialog gateway ───────────────────────────────────────────────────

/// Map a dialog tool's exit code to a decision.
///
/// Convention shared by zenity and kdialog two-button dialogs: 0 is the
/// affirmative button, 1 the alternative. Anything else (timeout, kill,
/// no code) is an improper dismissal and yields no decision.
fn map_exit_code(code: Option<i32>, remaining: u32) -> Option<Decision> {
    match code {
        Some(0) => Some(Decision::SuspendNow),
        Some(1) if remaining > 0 => Some(Decision::Snooze),
        _ => None,
    }
}

/// Desktop-dialog gateway: `notify-send` for warnings, `zenity` (falling
/// back to `kdialog`) for decision prompts.
pub struct DialogGateway {
    /// Seconds an informational warning stays on screen.
    display_secs: u32,
}

impl DialogGateway {
    pub fn new(display_secs: u32) -> Self {
        Self { display_secs }
    }

    fn decide_zenity(&self, text: &str, remaining: u32) -> Result<Option<Decision>, GatewayError> {
        let mut cmd = Command::new("zenity");
        cmd.arg("--title").arg("snoozed");
        if remaining > 0 {
            cmd.arg("--question")
                .arg("--text")
                .arg(text)
                .arg("--ok-label")
                .arg("Sleep now")
                .arg("--cancel-label")
                .arg(format!("Snooze ({remaining} left)"));
        } else {
            // No deferrals left: a single-button dialog only offers sleep.
            cmd.arg("--warning").arg("--text").arg(text);
        }
        let status = cmd
            .status()
            .map_err(|e| GatewayError::Unavailable(format!("zenity: {e}")))?;
        Ok(map_exit_code(status.code(), remaining))
    }

    fn decide_kdialog(&self, text: &str, remaining: u32) -> Result<Option<Decision>, GatewayError> {
        let mut cmd = Command::new("kdialog");
        cmd.arg("--title").arg("snoozed");
        if remaining > 0 {
            cmd.arg("--warningyesno")
                .arg(text)
                .arg("--yes-label")
                .arg("Sleep now")
                .arg("--no-label")
                .arg(format!("Snooze ({remaining} left)"));
        } else {
            cmd.arg("--msgbox").arg(text);
        }
        let status = cmd
            .status()
            .map_err(|e| GatewayError::Unavailable(format!("kdialog: {e}")))?;
        Ok(map_exit_code(status.code(), remaining))
    }
}

impl NotificationGateway for DialogGateway {
    fn inform(&self, alarm: &str, message: &str, minutes: u32) {
        let expire_ms = (self.display_secs * 1000).to_string();
        let result = Command::new("notify-send")
            .arg("--app-name")
            .arg("snoozed")
            .arg("--expire-time")
            .arg(&expire_ms)
            .arg(alarm)
            .arg(message)
            .status();
        match result {
            Ok(status) if status.success() => {}
            Ok(status) => warn!(alarm, %status, "notify-send failed"),
            Err(_) => {
                // Fall back to a self-dismissing dialog.
                let fallback = Command::new("zenity")
                    .arg("--info")
                    .arg("--title")
                    .arg("snoozed")
                    .arg("--timeout")
                    .arg(self.display_secs.to_string())
                    .arg("--text")
                    .arg(message)
                    .status();
                if let Err(e) = fallback {
                    warn!(alarm, minutes, error = %e, "no way to display warning");
                }
            }
        }
    }

    fn decide(&self, alarm: &str, remaining: u32, max: u32) -> Result<Decision, GatewayError> {
        let text = if remaining > 0 {
            format!("Time for '{alarm}'. Sleep now, or snooze? ({remaining} of {max} snoozes left)")
        } else {
            format!("Time for '{alarm}'. No snoozes left.")
        };
        // The decision is mandatory: an improperly dismissed dialog is
        // redisplayed until a button is chosen.
        loop {
            match self.decide_zenity(&text, remaining) {
                Ok(Some(decision)) => return Ok(decision),
                Ok(None) => {
                    debug!(alarm, "prompt dismissed without a choice, redisplaying");
                    continue;
                }
                Err(_) => {}
            }
            match self.decide_kdialog(&text, remaining) {
                Ok(Some(decision)) => return Ok(decision),
                Ok(None) => {
                    debug!(alarm, "prompt dismissed without a choice, redisplaying");
                    continue;
                }
                Err(_) => {
                    return Err(GatewayError::Unavailable(
                        "neither zenity nor kdialog could be spawned".into(),
                    ))
                }
            }
        }
    }
}

// ── Action executor ──────────────────────────────────────────────────

/// Fallback chain per action: the first command that runs and exits
/// successfully wins.
fn candidates(action: Action) -> &'static [(&'static str, &'static [&'static str])] {
    match action {
        Action::Suspend => &[
            ("systemctl", &["suspend"]),
            ("loginctl", &["suspend"]),
        ],
        Action::Shutdown => &[
            ("systemctl", &["poweroff"]),
            ("loginctl", &["poweroff"]),
            ("shutdown", &["-h", "now"]),
        ],
        Action::Hibernate => &[
            ("systemctl", &["hibernate"]),
            ("loginctl", &["hibernate"]),
        ],
    }
}

/// Executes actions through `systemctl` with `loginctl`/`shutdown`
/// fallbacks.
pub struct SystemActionExecutor;

impl ActionExecutor for SystemActionExecutor {
    fn perform(&self, action: Action) {
        for (program, args) in candidates(action) {
            match Command::new(program).args(*args).status() {
                Ok(status) if status.success() => {
                    debug!(%action, program, "system action dispatched");
                    return;
                }
                Ok(status) => warn!(%action, program, %status, "action command failed"),
                Err(e) => debug!(%action, program, error = %e, "action command unavailable"),
            }
        }
        warn!(%action, "no action command succeeded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_zero_is_sleep_now() {
        assert_eq!(map_exit_code(Some(0), 3), Some(Decision::SuspendNow));
        assert_eq!(map_exit_code(Some(0), 0), Some(Decision::SuspendNow));
    }

    #[test]
    fn exit_code_one_is_snooze_only_with_remaining() {
        assert_eq!(map_exit_code(Some(1), 2), Some(Decision::Snooze));
        // At the limit the alternative button does not exist.
        assert_eq!(map_exit_code(Some(1), 0), None);
    }

    #[test]
    fn other_exit_codes_redisplay() {
        assert_eq!(map_exit_code(Some(5), 3), None);
        assert_eq!(map_exit_code(Some(255), 3), None);
        assert_eq!(map_exit_code(None, 3), None);
    }

    #[test]
    fn every_action_has_a_fallback_chain() {
        for action in [Action::Suspend, Action::Shutdown, Action::Hibernate] {
            let chain = candidates(action);
            assert!(!chain.is_empty());
            assert_eq!(chain[0].0, "systemctl");
        }
    }
}
