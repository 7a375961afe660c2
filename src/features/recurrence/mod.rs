//! # Feature: Recurrence
//!
//! Repetition patterns for reminders and the pure advancement rule that
//! computes the next occurrence after a firing.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Initial release with fixed patterns and every-N variants

use anyhow::Result;
use chrono::{DateTime, Duration, Months, Utc};

/// How often a reminder repeats.
///
/// A non-repeating reminder carries no `Recurrence` at all
/// (`Option<Recurrence>::None`); after its single firing it is retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurrence {
    Daily,
    Weekly,
    Monthly,
    Hourly,
    /// Every N hours, N >= 1
    EveryHours(u32),
    /// Every N days, N >= 1
    EveryDays(u32),
}

impl Recurrence {
    /// Compute the occurrence that follows `current`.
    ///
    /// Pure: depends only on its inputs, never on the wall clock, so repeated
    /// application is composable and testable by simulation.
    ///
    /// Monthly advancement adds one calendar month keeping the day-of-month;
    /// when the target month is shorter the day is clamped to the month's
    /// last valid day (Jan 31 -> Feb 28/29), never skipped to March.
    pub fn next_occurrence(&self, current: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Recurrence::Daily => current + Duration::days(1),
            Recurrence::Weekly => current + Duration::days(7),
            Recurrence::Monthly => current + Months::new(1),
            Recurrence::Hourly => current + Duration::hours(1),
            Recurrence::EveryHours(n) => current + Duration::hours(i64::from(*n).max(1)),
            Recurrence::EveryDays(n) => current + Duration::days(i64::from(*n).max(1)),
        }
    }

    /// Human label in the bot's locale, used in confirmations and listings.
    pub fn label(&self) -> String {
        match self {
            Recurrence::Daily => "cada día".to_string(),
            Recurrence::Weekly => "cada semana".to_string(),
            Recurrence::Monthly => "cada mes".to_string(),
            Recurrence::Hourly => "cada hora".to_string(),
            Recurrence::EveryHours(n) => format!("cada {n} horas"),
            Recurrence::EveryDays(n) => format!("cada {n} días"),
        }
    }
}

impl std::fmt::Display for Recurrence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recurrence::Daily => write!(f, "daily"),
            Recurrence::Weekly => write!(f, "weekly"),
            Recurrence::Monthly => write!(f, "monthly"),
            Recurrence::Hourly => write!(f, "hourly"),
            Recurrence::EveryHours(n) => write!(f, "every_{n}_hours"),
            Recurrence::EveryDays(n) => write!(f, "every_{n}_days"),
        }
    }
}

impl std::str::FromStr for Recurrence {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            "hourly" => Ok(Recurrence::Hourly),
            other => {
                let mut parts = other.split('_');
                if parts.next() == Some("every") {
                    let n: u32 = parts
                        .next()
                        .and_then(|v| v.parse().ok())
                        .filter(|n| *n >= 1)
                        .ok_or_else(|| anyhow::anyhow!("invalid recurrence: {}", s))?;
                    match parts.next() {
                        Some("hours") => return Ok(Recurrence::EveryHours(n)),
                        Some("days") => return Ok(Recurrence::EveryDays(n)),
                        _ => {}
                    }
                }
                Err(anyhow::anyhow!("invalid recurrence: {}", s))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_daily_advances_one_day() {
        let t = at(2024, 3, 10, 8, 0);
        assert_eq!(Recurrence::Daily.next_occurrence(t), at(2024, 3, 11, 8, 0));
    }

    #[test]
    fn test_weekly_round_trip() {
        // advance(advance(t)) == advance(t) + 7 days
        let t = at(2024, 3, 10, 8, 0);
        let once = Recurrence::Weekly.next_occurrence(t);
        let twice = Recurrence::Weekly.next_occurrence(once);
        assert_eq!(twice, once + Duration::days(7));
    }

    #[test]
    fn test_monthly_keeps_day_of_month() {
        let t = at(2024, 1, 15, 9, 30);
        assert_eq!(
            Recurrence::Monthly.next_occurrence(t),
            at(2024, 2, 15, 9, 30)
        );
    }

    #[test]
    fn test_monthly_clamps_to_last_valid_day() {
        // Jan 31 -> Feb 29 (2024 is a leap year), not Mar 2
        let t = at(2024, 1, 31, 10, 0);
        assert_eq!(
            Recurrence::Monthly.next_occurrence(t),
            at(2024, 2, 29, 10, 0)
        );

        // Non-leap year clamps to Feb 28
        let t = at(2023, 1, 31, 10, 0);
        assert_eq!(
            Recurrence::Monthly.next_occurrence(t),
            at(2023, 2, 28, 10, 0)
        );
    }

    #[test]
    fn test_hourly_and_every_n() {
        let t = at(2024, 3, 10, 22, 0);
        assert_eq!(Recurrence::Hourly.next_occurrence(t), at(2024, 3, 10, 23, 0));
        assert_eq!(
            Recurrence::EveryHours(4).next_occurrence(t),
            at(2024, 3, 11, 2, 0)
        );
        assert_eq!(
            Recurrence::EveryDays(3).next_occurrence(t),
            at(2024, 3, 13, 22, 0)
        );
    }

    #[test]
    fn test_storage_format_round_trip() {
        let patterns = [
            Recurrence::Daily,
            Recurrence::Weekly,
            Recurrence::Monthly,
            Recurrence::Hourly,
            Recurrence::EveryHours(4),
            Recurrence::EveryDays(3),
        ];
        for p in patterns {
            let parsed: Recurrence = p.to_string().parse().unwrap();
            assert_eq!(parsed, p);
        }
    }

    #[test]
    fn test_invalid_storage_strings_rejected() {
        assert!("yearly".parse::<Recurrence>().is_err());
        assert!("every_0_hours".parse::<Recurrence>().is_err());
        assert!("every_x_days".parse::<Recurrence>().is_err());
        assert!("".parse::<Recurrence>().is_err());
    }
}
