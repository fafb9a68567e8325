//! Alarm definitions: actions, day types, times of day and warnings.

use std::fmt;
use std::str::FromStr;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Length of the time-of-day ring in minutes.
pub const MINUTES_PER_DAY: u32 = 1440;

/// The system action enforced when an alarm fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Suspend,
    Shutdown,
    Hibernate,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Suspend => "suspend",
            Action::Shutdown => "shutdown",
            Action::Hibernate => "hibernate",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "suspend" => Ok(Action::Suspend),
            "shutdown" => Ok(Action::Shutdown),
            "hibernate" => Ok(Action::Hibernate),
            other => Err(ConfigError::InvalidValue {
                key: "action".into(),
                message: format!("'{other}' is not one of suspend, shutdown, hibernate"),
            }),
        }
    }
}

/// Scheduling partition: Mon-Fri or Sat-Sun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    pub fn contains(&self, day: Weekday) -> bool {
        let weekend = matches!(day, Weekday::Sat | Weekday::Sun);
        match self {
            DayType::Weekday => !weekend,
            DayType::Weekend => weekend,
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayType::Weekday => f.write_str("weekday"),
            DayType::Weekend => f.write_str("weekend"),
        }
    }
}

/// A wall-clock time of day, stored as minutes since midnight (always < 1440).
///
/// Serialized as `"HH:MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        (minutes < MINUTES_PER_DAY).then_some(Self(minutes))
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn hour(&self) -> u32 {
        self.0 / 60
    }

    pub fn minute(&self) -> u32 {
        self.0 % 60
    }

    /// Subtract an offset on the 1440-minute ring, wrapping past midnight.
    pub fn wrapping_sub(self, minutes: u32) -> Self {
        Self((self.0 + MINUTES_PER_DAY - minutes % MINUTES_PER_DAY) % MINUTES_PER_DAY)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidValue {
            key: "time".into(),
            message: format!("'{s}' is not a valid HH:MM time"),
        };
        let (h, m) = s.split_once(':').ok_or_else(invalid)?;
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(Self(hour * 60 + minute))
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}

/// A pre-alarm informational notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    /// Minutes before the alarm's action time. Must be below 1440.
    pub minutes_before: u32,
    /// Message template; `{name}` and `{minutes}` are substituted.
    #[serde(default = "default_warning_message")]
    pub message: String,
}

pub(crate) fn default_warning_message() -> String {
    "{name} in {minutes} minutes".into()
}

fn render_message(template: &str, name: &str, minutes: u32) -> String {
    template
        .replace("{name}", name)
        .replace("{minutes}", &minutes.to_string())
}

/// A named, recurring event with separate weekday/weekend trigger times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alarm {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Overrides the global default action when set.
    #[serde(default)]
    pub action: Option<Action>,
    #[serde(default)]
    pub weekday_time: Option<TimeOfDay>,
    #[serde(default)]
    pub weekend_time: Option<TimeOfDay>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
}

fn default_true() -> bool {
    true
}

impl Alarm {
    pub fn time_for(&self, day: DayType) -> Option<TimeOfDay> {
        match day {
            DayType::Weekday => self.weekday_time,
            DayType::Weekend => self.weekend_time,
        }
    }

    /// An alarm with neither time configured never produces a trigger.
    pub fn is_inert(&self) -> bool {
        self.weekday_time.is_none() && self.weekend_time.is_none()
    }

    /// Rendered warning message for the given offset.
    ///
    /// Falls back to the default template when no warning is configured for
    /// exactly `minutes` minutes.
    pub fn message_for(&self, minutes: u32) -> String {
        let default = default_warning_message();
        let template = self
            .warnings
            .iter()
            .find(|w| w.minutes_before == minutes)
            .map(|w| w.message.as_str())
            .unwrap_or(&default);
        render_message(template, &self.name, minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_of_day_parses_and_displays() {
        let t: TimeOfDay = "23:05".parse().unwrap();
        assert_eq!(t.minutes(), 23 * 60 + 5);
        assert_eq!(t.to_string(), "23:05");
    }

    #[test]
    fn time_of_day_rejects_out_of_range() {
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("12:60".parse::<TimeOfDay>().is_err());
        assert!("noon".parse::<TimeOfDay>().is_err());
        assert!("".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn wrapping_sub_crosses_midnight() {
        let t: TimeOfDay = "00:05".parse().unwrap();
        assert_eq!(t.wrapping_sub(10).to_string(), "23:55");
        assert_eq!(t.wrapping_sub(0), t);
    }

    #[test]
    fn day_type_partition() {
        assert!(DayType::Weekday.contains(Weekday::Mon));
        assert!(DayType::Weekday.contains(Weekday::Fri));
        assert!(!DayType::Weekday.contains(Weekday::Sat));
        assert!(DayType::Weekend.contains(Weekday::Sun));
        assert!(!DayType::Weekend.contains(Weekday::Wed));
    }

    #[test]
    fn action_round_trips_through_str() {
        for action in [Action::Suspend, Action::Shutdown, Action::Hibernate] {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
        assert!("reboot".parse::<Action>().is_err());
    }

    #[test]
    fn message_lookup_prefers_configured_template() {
        let alarm = Alarm {
            name: "bedtime".into(),
            enabled: true,
            action: None,
            weekday_time: "23:00".parse().ok(),
            weekend_time: None,
            warnings: vec![Warning {
                minutes_before: 10,
                message: "Lights out in {minutes}!".into(),
            }],
        };
        assert_eq!(alarm.message_for(10), "Lights out in 10!");
        assert_eq!(alarm.message_for(2), "bedtime in 2 minutes");
    }

    #[test]
    fn alarm_without_times_is_inert() {
        let alarm = Alarm {
            name: "nap".into(),
            enabled: true,
            action: None,
            weekday_time: None,
            weekend_time: None,
            warnings: vec![],
        };
        assert!(alarm.is_inert());
        assert_eq!(alarm.time_for(DayType::Weekday), None);
    }
}
