//! Snooze state machine orchestration.
//!
//! Per-alarm cycle:
//!
//! ```text
//! Idle -> Prompting -> (Executed | Snoozed)
//! ```
//!
//! `Prompting` is the duration of the blocking [`NotificationGateway::decide`]
//! call; it is never persisted. The only ways out of a cycle are `Executed`
//! (counter reset, queue cleared, action performed) and `Snoozed` (counter
//! incremented, one deferred job enqueued). All durable state lives in the
//! [`Database`]; an engine is cheap to build per invocation.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::alarm::Action;
use crate::error::{CoreError, GatewayError};
use crate::gateway::{ActionExecutor, Decision, NotificationGateway};
use crate::storage::{Config, Database};

/// Delay before unattended execution, when prompting is disabled or no
/// prompt surface can be reached.
const GRACE_DELAY: std::time::Duration = std::time::Duration::from_secs(10);

/// How an execute/sleep-now invocation resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The system action was performed; counter reset, queue cleared.
    Executed,
    /// The action was deferred; a pending job holds the next due time.
    Snoozed {
        count: u32,
        due: DateTime<Utc>,
    },
    /// A deferral was requested with no snoozes left; nothing changed.
    LimitReached,
    /// The alarm is unknown or disabled; stale state was cleaned up.
    Skipped,
}

/// Orchestrates warnings, decision prompts, deferrals and execution for
/// the alarms in one configuration snapshot.
pub struct AlarmEngine<G, X> {
    db: Database,
    config: Config,
    gateway: G,
    executor: X,
    grace: std::time::Duration,
}

impl<G: NotificationGateway, X: ActionExecutor> AlarmEngine<G, X> {
    pub fn new(db: Database, config: Config, gateway: G, executor: X) -> Self {
        Self {
            db,
            config,
            gateway,
            executor,
            grace: GRACE_DELAY,
        }
    }

    /// Override the unattended-execution grace delay (tests).
    pub fn with_grace(mut self, grace: std::time::Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Show a pre-alarm warning. Stateless: never touches counters or jobs.
    pub fn warn(&self, name: &str, minutes: u32) -> Result<(), CoreError> {
        let alarm = self
            .config
            .alarm(name)
            .ok_or_else(|| CoreError::UnknownAlarm(name.to_string()))?;
        if !self.config.notifications.enabled {
            info!(alarm = name, minutes, "notifications disabled, warning suppressed");
            return Ok(());
        }
        let message = alarm.message_for(minutes);
        self.gateway.inform(name, &message, minutes);
        Ok(())
    }

    /// Run one alarm cycle.
    ///
    /// `snoozed = false` marks a regular firing: any stale snooze history is
    /// reset first. Either way the alarm's pending jobs are cleared, since
    /// this invocation supersedes any earlier deferred one.
    pub fn execute(&self, name: &str, action: Action, snoozed: bool) -> Result<Outcome, CoreError> {
        if !snoozed {
            self.db.reset_snooze(name)?;
        }
        self.db.clear_pending(name)?;

        if !self.config.enabled || !self.config.alarm(name).is_some_and(|a| a.enabled) {
            // A stale trigger or job for an alarm no longer in play.
            warn!(alarm = name, "alarm disabled or removed, not executing");
            self.db.reset_snooze(name)?;
            return Ok(Outcome::Skipped);
        }

        if !self.config.notifications.enabled {
            info!(alarm = name, %action, "notifications disabled, executing after grace delay");
            std::thread::sleep(self.grace);
            return self.finish(name, action);
        }

        let max = self.config.snooze.max_snoozes;
        loop {
            let count = self.db.snooze_count(name)?;
            let remaining = max.saturating_sub(count);
            match self.gateway.decide(name, remaining, max) {
                Ok(Decision::SuspendNow) => return self.finish(name, action),
                Ok(Decision::Snooze) => match self.snooze(name, action)? {
                    Outcome::Snoozed { count, due } => return Ok(Outcome::Snoozed { count, due }),
                    // The gateway must not offer snooze at the limit; hold
                    // the line and prompt again.
                    _ => {}
                },
                Err(GatewayError::Unavailable(reason)) => {
                    warn!(alarm = name, reason = %reason, "no prompt surface, executing after grace delay");
                    std::thread::sleep(self.grace);
                    return self.finish(name, action);
                }
            }
        }
    }

    /// Defer an alarm: bump the counter and enqueue the next due
    /// re-evaluation, superseding any earlier pending job. Rejected with no
    /// state change once the counter has reached the policy maximum.
    pub fn snooze(&self, name: &str, action: Action) -> Result<Outcome, CoreError> {
        let max = self.config.snooze.max_snoozes;
        if self.db.snooze_count(name)? >= max {
            warn!(alarm = name, max, "snooze rejected, limit reached");
            return Ok(Outcome::LimitReached);
        }
        let count = self.db.increment_snooze(name, Utc::now())?;
        let due = Utc::now() + Duration::minutes(self.config.snooze.duration_min as i64);
        self.db.create_job(name, due, action, count, Utc::now())?;
        info!(alarm = name, count, due = %due, "alarm snoozed");
        Ok(Outcome::Snoozed { count, due })
    }

    /// User-initiated immediate action, bypassing the final prompt.
    pub fn sleep_now(&self, name: &str, action: Action) -> Result<Outcome, CoreError> {
        self.finish(name, action)
    }

    fn finish(&self, name: &str, action: Action) -> Result<Outcome, CoreError> {
        self.db.reset_snooze(name)?;
        self.db.clear_pending(name)?;
        info!(alarm = name, %action, "executing system action");
        self.executor.perform(action);
        Ok(Outcome::Executed)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{Alarm, Warning};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeGateway {
        decisions: RefCell<VecDeque<Decision>>,
        informed: RefCell<Vec<(String, String, u32)>>,
        prompts: RefCell<Vec<(u32, u32)>>,
        unavailable: bool,
    }

    impl FakeGateway {
        fn with_decisions(decisions: &[Decision]) -> Self {
            Self {
                decisions: RefCell::new(decisions.iter().copied().collect()),
                ..Default::default()
            }
        }
    }

    impl NotificationGateway for FakeGateway {
        fn inform(&self, alarm: &str, message: &str, minutes: u32) {
            self.informed
                .borrow_mut()
                .push((alarm.to_string(), message.to_string(), minutes));
        }

        fn decide(&self, _alarm: &str, remaining: u32, max: u32) -> Result<Decision, GatewayError> {
            if self.unavailable {
                return Err(GatewayError::Unavailable("fake".into()));
            }
            self.prompts.borrow_mut().push((remaining, max));
            Ok(self
                .decisions
                .borrow_mut()
                .pop_front()
                .unwrap_or(Decision::SuspendNow))
        }
    }

    #[derive(Default)]
    struct FakeExecutor {
        performed: RefCell<Vec<Action>>,
    }

    impl ActionExecutor for FakeExecutor {
        fn perform(&self, action: Action) {
            self.performed.borrow_mut().push(action);
        }
    }

    fn test_config(max_snoozes: u32, duration_min: u32) -> Config {
        let mut config = Config::default();
        config.snooze.max_snoozes = max_snoozes;
        config.snooze.duration_min = duration_min;
        config.alarms.push(Alarm {
            name: "bedtime".into(),
            enabled: true,
            action: None,
            weekday_time: "23:00".parse().ok(),
            weekend_time: None,
            warnings: vec![Warning {
                minutes_before: 10,
                message: "{name} in {minutes} minutes".into(),
            }],
        });
        config
    }

    fn engine(
        config: Config,
        gateway: FakeGateway,
    ) -> AlarmEngine<FakeGateway, FakeExecutor> {
        AlarmEngine::new(
            Database::open_memory().unwrap(),
            config,
            gateway,
            FakeExecutor::default(),
        )
        .with_grace(std::time::Duration::ZERO)
    }

    #[test]
    fn warn_renders_and_forwards() {
        let e = engine(test_config(3, 2), FakeGateway::default());
        e.warn("bedtime", 10).unwrap();
        let informed = e.gateway.informed.borrow();
        assert_eq!(informed.len(), 1);
        assert_eq!(informed[0].1, "bedtime in 10 minutes");
    }

    #[test]
    fn warn_unknown_alarm_errors() {
        let e = engine(test_config(3, 2), FakeGateway::default());
        assert!(matches!(
            e.warn("missing", 10),
            Err(CoreError::UnknownAlarm(_))
        ));
    }

    #[test]
    fn warn_does_not_touch_state() {
        let e = engine(test_config(3, 2), FakeGateway::default());
        e.db.increment_snooze("bedtime", Utc::now()).unwrap();
        e.warn("bedtime", 10).unwrap();
        assert_eq!(e.db.snooze_count("bedtime").unwrap(), 1);
    }

    #[test]
    fn suspend_now_resets_and_performs() {
        let e = engine(
            test_config(3, 2),
            FakeGateway::with_decisions(&[Decision::SuspendNow]),
        );
        e.db.increment_snooze("bedtime", Utc::now()).unwrap();

        let outcome = e.execute("bedtime", Action::Suspend, true).unwrap();
        assert_eq!(outcome, Outcome::Executed);
        assert_eq!(e.db.snooze_count("bedtime").unwrap(), 0);
        assert!(e.db.pending_jobs_for("bedtime").unwrap().is_empty());
        assert_eq!(*e.executor.performed.borrow(), vec![Action::Suspend]);
    }

    #[test]
    fn fresh_execute_resets_stale_count() {
        let e = engine(
            test_config(3, 2),
            FakeGateway::with_decisions(&[Decision::Snooze]),
        );
        // Leftover history from a previous day.
        for _ in 0..3 {
            e.db.increment_snooze("bedtime", Utc::now()).unwrap();
        }

        let outcome = e.execute("bedtime", Action::Suspend, false).unwrap();
        // Counter was reset before prompting, so this snooze was the first.
        assert!(matches!(outcome, Outcome::Snoozed { count: 1, .. }));
    }

    #[test]
    fn snooze_increments_and_enqueues() {
        let e = engine(
            test_config(3, 2),
            FakeGateway::with_decisions(&[Decision::Snooze]),
        );
        let before = Utc::now();
        let outcome = e.execute("bedtime", Action::Suspend, false).unwrap();

        let Outcome::Snoozed { count, due } = outcome else {
            panic!("expected snooze");
        };
        assert_eq!(count, 1);
        assert!(due >= before + Duration::minutes(2));

        let pending = e.db.pending_jobs_for("bedtime").unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].snooze_count, 1);
        assert!(e.executor.performed.borrow().is_empty());
    }

    #[test]
    fn snooze_chain_stops_at_limit() {
        let config = test_config(3, 2);
        for expected in 1..=3 {
            let e = engine(
                config.clone(),
                FakeGateway::with_decisions(&[Decision::Snooze]),
            );
            for _ in 1..expected {
                e.db.increment_snooze("bedtime", Utc::now()).unwrap();
            }
            let outcome = e.execute("bedtime", Action::Suspend, true).unwrap();
            assert!(matches!(outcome, Outcome::Snoozed { count, .. } if count == expected));
        }

        // At the limit a snooze answer is rejected and the prompt re-runs.
        let e = engine(
            config,
            FakeGateway::with_decisions(&[Decision::Snooze, Decision::SuspendNow]),
        );
        for _ in 0..3 {
            e.db.increment_snooze("bedtime", Utc::now()).unwrap();
        }
        let outcome = e.execute("bedtime", Action::Suspend, true).unwrap();
        assert_eq!(outcome, Outcome::Executed);
        // The rejected snooze created no job and left the count capped.
        assert!(e.db.pending_jobs_for("bedtime").unwrap().is_empty());
        assert_eq!(e.db.snooze_count("bedtime").unwrap(), 0);

        // The second prompt offered zero remaining snoozes.
        let prompts = e.gateway.prompts.borrow();
        assert_eq!(prompts.as_slice(), &[(0, 3), (0, 3)]);
    }

    #[test]
    fn direct_snooze_rejected_at_limit() {
        let e = engine(test_config(2, 5), FakeGateway::default());
        for _ in 0..2 {
            e.db.increment_snooze("bedtime", Utc::now()).unwrap();
        }

        let outcome = e.snooze("bedtime", Action::Suspend).unwrap();
        assert_eq!(outcome, Outcome::LimitReached);
        assert_eq!(e.db.snooze_count("bedtime").unwrap(), 2);
        assert!(e.db.pending_jobs_for("bedtime").unwrap().is_empty());
    }

    #[test]
    fn sleep_now_clears_pending_jobs() {
        let e = engine(test_config(3, 2), FakeGateway::default());
        e.db.increment_snooze("bedtime", Utc::now()).unwrap();
        e.db.create_job(
            "bedtime",
            Utc::now() + Duration::minutes(2),
            Action::Suspend,
            1,
            Utc::now(),
        )
        .unwrap();

        let outcome = e.sleep_now("bedtime", Action::Suspend).unwrap();
        assert_eq!(outcome, Outcome::Executed);
        assert!(e.db.pending_jobs_for("bedtime").unwrap().is_empty());
        assert_eq!(e.db.snooze_count("bedtime").unwrap(), 0);
        assert_eq!(*e.executor.performed.borrow(), vec![Action::Suspend]);
    }

    #[test]
    fn notifications_disabled_executes_unattended() {
        let mut config = test_config(3, 2);
        config.notifications.enabled = false;
        let e = engine(config, FakeGateway::default());

        let outcome = e.execute("bedtime", Action::Shutdown, false).unwrap();
        assert_eq!(outcome, Outcome::Executed);
        assert!(e.gateway.prompts.borrow().is_empty());
        assert_eq!(*e.executor.performed.borrow(), vec![Action::Shutdown]);
    }

    #[test]
    fn unavailable_gateway_executes_after_grace() {
        let gateway = FakeGateway {
            unavailable: true,
            ..Default::default()
        };
        let e = engine(test_config(3, 2), gateway);

        let outcome = e.execute("bedtime", Action::Suspend, false).unwrap();
        assert_eq!(outcome, Outcome::Executed);
        assert_eq!(*e.executor.performed.borrow(), vec![Action::Suspend]);
    }

    #[test]
    fn stale_invocation_for_removed_alarm_is_skipped() {
        let e = engine(Config::default(), FakeGateway::default());
        e.db.create_job(
            "ghost",
            Utc::now(),
            Action::Suspend,
            1,
            Utc::now(),
        )
        .unwrap();

        let outcome = e.execute("ghost", Action::Suspend, true).unwrap();
        assert_eq!(outcome, Outcome::Skipped);
        assert!(e.db.pending_jobs_for("ghost").unwrap().is_empty());
        assert!(e.executor.performed.borrow().is_empty());
    }

    #[test]
    fn globally_disabled_skips_execution() {
        let mut config = test_config(3, 2);
        config.enabled = false;
        let e = engine(config, FakeGateway::default());

        let outcome = e.execute("bedtime", Action::Suspend, false).unwrap();
        assert_eq!(outcome, Outcome::Skipped);
        assert!(e.executor.performed.borrow().is_empty());
    }
}
