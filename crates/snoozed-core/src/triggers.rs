//! Compiles a configuration snapshot into absolute trigger specifications.
//!
//! Triggers are derived, never persisted: every compilation produces the full
//! set for the current configuration, and the installer replaces the previous
//! generation wholesale.

use serde::{Deserialize, Serialize};

use crate::alarm::{DayType, TimeOfDay};
use crate::storage::Config;

/// What a trigger fires: a pre-alarm warning or the action itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TriggerKind {
    Warning { minutes_before: u32 },
    Action,
}

/// An absolute (day-type, time-of-day) point to install into the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub alarm: String,
    pub day_type: DayType,
    pub kind: TriggerKind,
    pub time: TimeOfDay,
}

/// Time at which a warning fires, `minutes_before` minutes ahead of `time`.
///
/// Computed on the 1440-minute ring: a warning for a very-early action wraps
/// onto the previous day's tail end.
pub fn warning_time(time: TimeOfDay, minutes_before: u32) -> TimeOfDay {
    time.wrapping_sub(minutes_before)
}

/// Compile the full trigger set for a configuration snapshot.
///
/// Disabled alarms and alarms with neither time configured contribute nothing.
/// The output is deterministically ordered, so an unchanged snapshot compiles
/// to an identical set.
pub fn compile(config: &Config) -> Vec<TriggerSpec> {
    let mut specs = Vec::new();
    for alarm in &config.alarms {
        if !alarm.enabled {
            continue;
        }
        for day_type in [DayType::Weekday, DayType::Weekend] {
            let Some(time) = alarm.time_for(day_type) else {
                continue;
            };
            specs.push(TriggerSpec {
                alarm: alarm.name.clone(),
                day_type,
                kind: TriggerKind::Action,
                time,
            });
            for warning in &alarm.warnings {
                specs.push(TriggerSpec {
                    alarm: alarm.name.clone(),
                    day_type,
                    kind: TriggerKind::Warning {
                        minutes_before: warning.minutes_before,
                    },
                    time: warning_time(time, warning.minutes_before),
                });
            }
        }
    }
    specs.sort();
    specs.dedup();
    specs
}
