//! # Feature: Temporal Expression Parser
//!
//! Deterministic parser that turns free-form Spanish text into a reminder:
//! target date, time, repetition pattern and payload message. No AI involved;
//! just ordered tables of patterns evaluated in a fixed precedence, each pass
//! independent and with an explicit default, so parsing is total over any
//! input once the trigger-word gate passes.
//!
//! Supported phrasings include:
//! - "genera recordatorio para el 25/12 a las 12hs que diga: llamar rodolfo"
//! - "recordame mañana a las 10 pedir presupuesto"
//! - "avisame el lunes 9hs reunión con Juan"
//! - "recordatorio cada día a las 8 revisar emails"
//!
//! - **Version**: 1.3.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.3.0: Strip the matched repetition phrase from extracted messages
//! - 1.2.0: "pasado mañana" resolved before "mañana"; weekday names resolve
//!   to the next strictly-future occurrence
//! - 1.1.0: every-N-hours / every-N-days repetition
//! - 1.0.0: Initial release

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Timelike, Weekday};
use chrono_tz::Tz;
use regex::Regex;

use crate::features::recurrence::Recurrence;

/// Parser output: everything needed to build a stored reminder.
///
/// Transient by design; the command layer combines `date` and `time` in the
/// configured timezone and persists the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReminder {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub recurrence: Option<Recurrence>,
    pub message: String,
}

/// Intent vocabulary. Text without at least one of these is not a reminder.
const TRIGGER_WORDS: &[&str] = &[
    "recordatorio",
    "recordame",
    "recuerdame",
    "recordar",
    "avisame",
    "avísame",
    "aviso",
    "alarma",
    "alerta",
    "genera recordatorio",
    "crear recordatorio",
    "nuevo recordatorio",
];

/// Relative-date keywords, longest phrase first so "pasado mañana" is not
/// swallowed by the plain "mañana" rule. Values are day offsets from today.
const RELATIVE_DAYS: &[(&str, i64)] = &[
    ("pasado mañana", 2),
    ("pasado manana", 2),
    ("hoy", 0),
    ("mañana", 1),
    ("manana", 1),
];

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("hard-coded pattern must compile")
}

enum RecurrenceRule {
    Fixed(Recurrence),
    EveryHours,
    EveryDays,
}

/// Order-sensitive pattern tables, compiled once.
pub struct TemporalParser {
    recurrence_rules: Vec<(Regex, RecurrenceRule)>,
    numeric_date: Regex,
    weekday_rules: Vec<(Regex, Weekday)>,
    time_rules: Vec<Regex>,
    message_rules: Vec<Regex>,
    strip_date: Regex,
    strip_at_time: Regex,
    strip_clock: Regex,
    strip_hour_suffix: Regex,
    strip_relative: Regex,
    strip_fillers: Regex,
}

impl Default for TemporalParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TemporalParser {
    pub fn new() -> Self {
        use RecurrenceRule::*;

        let recurrence_rules = vec![
            (re(r"cada\s+d[ií]a"), Fixed(Recurrence::Daily)),
            (re(r"todos\s+los\s+d[ií]as"), Fixed(Recurrence::Daily)),
            (re(r"diariamente"), Fixed(Recurrence::Daily)),
            (re(r"cada\s+semana"), Fixed(Recurrence::Weekly)),
            (re(r"semanalmente"), Fixed(Recurrence::Weekly)),
            (re(r"cada\s+mes"), Fixed(Recurrence::Monthly)),
            (re(r"mensualmente"), Fixed(Recurrence::Monthly)),
            (re(r"cada\s+hora"), Fixed(Recurrence::Hourly)),
            (re(r"cada\s+(\d+)\s+horas?"), EveryHours),
            (re(r"cada\s+(\d+)\s+d[ií]as?"), EveryDays),
        ];

        let weekday_rules = vec![
            (re(r"\b(?:lunes|lun)\b"), Weekday::Mon),
            (re(r"\b(?:martes|mar)\b"), Weekday::Tue),
            (re(r"\b(?:miércoles|miercoles|mie)\b"), Weekday::Wed),
            (re(r"\b(?:jueves|jue)\b"), Weekday::Thu),
            (re(r"\b(?:viernes|vie)\b"), Weekday::Fri),
            (re(r"\b(?:sábado|sabado|sab)\b"), Weekday::Sat),
            (re(r"\b(?:domingo|dom)\b"), Weekday::Sun),
        ];

        // Evaluated in order; the first matching rule decides the time.
        let time_rules = vec![
            re(r"a\s+las?\s+(\d{1,2})[:h]?(\d{2})?\s*(?:hs?|horas?)?"),
            re(r"(\d{1,2})[:h](\d{2})\s*(?:hs?|horas?)?"),
            re(r"(\d{1,2})\s*(?:hs|horas?)"),
            re(r"(\d{1,2})\s*(?:am|pm)"),
        ];

        // Explicit message delimiters, matched against the original-case text.
        let message_rules = vec![
            re(r"(?i)que\s+diga[:\s]+(.+)$"),
            re(r"(?i)mensaje[:\s]+(.+)$"),
            re(r"(?i)texto[:\s]+(.+)$"),
            re(r"(?i)para[:\s]+(.+)$"),
        ];

        TemporalParser {
            recurrence_rules,
            numeric_date: re(r"(\d{1,2})[/-](\d{1,2})(?:[/-](\d{2,4}))?"),
            weekday_rules,
            time_rules,
            message_rules,
            strip_date: re(r"\d{1,2}[/-]\d{1,2}(?:[/-]\d{2,4})?"),
            strip_at_time: re(r"a\s+las?\s+\d{1,2}[:h]?\d{0,2}\s*(?:hs?|horas?)?"),
            strip_clock: re(r"\d{1,2}[:h]\d{2}\s*(?:hs?|horas?)?"),
            strip_hour_suffix: re(r"\d{1,2}\s*(?:hs|horas?)"),
            strip_relative: re(r"(?:pasado\s+ma[ñn]ana|ma[ñn]ana|hoy)"),
            strip_fillers: re(r"\b(?:para|el|la|los|las|del|de)\s+"),
        }
    }

    /// Parse free text into a reminder.
    ///
    /// Returns `None` only when the text carries no reminder intent (trigger
    /// gate). Any other input yields a complete `ParsedReminder`: each
    /// sub-extraction returns an optional and the defaults are applied here,
    /// centrally — date defaults to today, time to one hour from `now`
    /// truncated to the minute, message to the whole text when stripping
    /// leaves fewer than 3 characters.
    pub fn parse(&self, text: &str, now: DateTime<Tz>) -> Option<ParsedReminder> {
        let lower = text.trim().to_lowercase();
        if !TRIGGER_WORDS.iter().any(|w| lower.contains(w)) {
            return None;
        }

        let (recurrence, recurrence_span) = self.extract_recurrence(&lower);
        let date = self.extract_date(&lower, now.date_naive());
        let time = self.extract_time(&lower);
        let message = self.extract_delimited_message(text.trim());

        let date = date.unwrap_or_else(|| now.date_naive());
        let time = time.unwrap_or_else(|| default_time(now));
        let message = message.unwrap_or_else(|| {
            let residue = self.strip_known_tokens(&lower, recurrence_span.as_deref());
            if residue.chars().count() >= 3 {
                residue
            } else {
                text.trim().to_string()
            }
        });

        Some(ParsedReminder {
            date,
            time,
            recurrence,
            message,
        })
    }

    /// First matching repetition rule wins; returns the pattern plus the
    /// matched phrase so message extraction can strip it.
    fn extract_recurrence(&self, lower: &str) -> (Option<Recurrence>, Option<String>) {
        for (regex, rule) in &self.recurrence_rules {
            if let Some(caps) = regex.captures(lower) {
                let span = caps.get(0).map(|m| m.as_str().to_string());
                let recurrence = match rule {
                    RecurrenceRule::Fixed(r) => Some(*r),
                    RecurrenceRule::EveryHours => caps
                        .get(1)
                        .and_then(|n| n.as_str().parse::<u32>().ok())
                        .map(|n| Recurrence::EveryHours(n.max(1))),
                    RecurrenceRule::EveryDays => caps
                        .get(1)
                        .and_then(|n| n.as_str().parse::<u32>().ok())
                        .map(|n| Recurrence::EveryDays(n.max(1))),
                };
                if recurrence.is_some() {
                    return (recurrence, span);
                }
            }
        }
        (None, None)
    }

    fn extract_date(&self, lower: &str, today: NaiveDate) -> Option<NaiveDate> {
        if let Some(date) = self.extract_numeric_date(lower, today) {
            return Some(date);
        }
        if let Some(date) = self.extract_relative_date(lower, today) {
            return Some(date);
        }
        self.extract_weekday_date(lower, today)
    }

    /// `D/M`, `D-M`, optionally with a 2- or 4-digit year. A past date with
    /// no explicit year rolls forward to next year; an impossible calendar
    /// date falls through to the lower-priority rules.
    fn extract_numeric_date(&self, lower: &str, today: NaiveDate) -> Option<NaiveDate> {
        let caps = self.numeric_date.captures(lower)?;
        let day: u32 = caps.get(1)?.as_str().parse().ok()?;
        let month: u32 = caps.get(2)?.as_str().parse().ok()?;
        let (year, year_given) = match caps.get(3) {
            Some(m) => {
                let mut y: i32 = m.as_str().parse().ok()?;
                if y < 100 {
                    y += 2000;
                }
                (y, true)
            }
            None => (today.year(), false),
        };

        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        if date < today && !year_given {
            // Feb 29 may not exist next year; keep the current-year date then
            return Some(NaiveDate::from_ymd_opt(year + 1, month, day).unwrap_or(date));
        }
        Some(date)
    }

    fn extract_relative_date(&self, lower: &str, today: NaiveDate) -> Option<NaiveDate> {
        for (keyword, offset) in RELATIVE_DAYS {
            if lower.contains(keyword) {
                return Some(today + Duration::days(*offset));
            }
        }
        None
    }

    /// Weekday names resolve to the next occurrence strictly after today;
    /// naming today's weekday means next week, not in a moment.
    fn extract_weekday_date(&self, lower: &str, today: NaiveDate) -> Option<NaiveDate> {
        for (regex, weekday) in &self.weekday_rules {
            if regex.is_match(lower) {
                let ahead = (weekday.num_days_from_monday() + 7
                    - today.weekday().num_days_from_monday())
                    % 7;
                let ahead = if ahead == 0 { 7 } else { ahead };
                return Some(today + Duration::days(i64::from(ahead)));
            }
        }
        None
    }

    /// First matching time rule decides; an out-of-range hour on that rule
    /// falls back to the default rather than re-scanning later rules.
    fn extract_time(&self, lower: &str) -> Option<NaiveTime> {
        for regex in &self.time_rules {
            if let Some(caps) = regex.captures(lower) {
                let mut hour: u32 = caps.get(1)?.as_str().parse().ok()?;
                let minute: u32 = caps
                    .get(2)
                    .and_then(|m| m.as_str().parse().ok())
                    .unwrap_or(0);

                if lower.contains("pm") && hour < 12 {
                    hour += 12;
                } else if lower.contains("am") && hour == 12 {
                    hour = 0;
                }

                return NaiveTime::from_hms_opt(hour, minute, 0);
            }
        }
        None
    }

    /// Delimiter phrases win over token stripping and preserve the original
    /// casing of everything after the delimiter.
    fn extract_delimited_message(&self, original: &str) -> Option<String> {
        for regex in &self.message_rules {
            if let Some(caps) = regex.captures(original) {
                let message = caps.get(1)?.as_str().trim();
                if !message.is_empty() {
                    return Some(message.to_string());
                }
            }
        }
        None
    }

    /// Fallback message: the lower-cased text minus every token another pass
    /// already consumed, whitespace collapsed.
    fn strip_known_tokens(&self, lower: &str, recurrence_span: Option<&str>) -> String {
        let mut cleaned = lower.to_string();
        for word in TRIGGER_WORDS {
            cleaned = cleaned.replace(word, "");
        }
        if let Some(span) = recurrence_span {
            cleaned = cleaned.replace(span, "");
        }
        cleaned = self.strip_date.replace_all(&cleaned, "").into_owned();
        cleaned = self.strip_at_time.replace_all(&cleaned, "").into_owned();
        cleaned = self.strip_clock.replace_all(&cleaned, "").into_owned();
        cleaned = self.strip_hour_suffix.replace_all(&cleaned, "").into_owned();
        cleaned = self.strip_relative.replace_all(&cleaned, "").into_owned();
        cleaned = self.strip_fillers.replace_all(&cleaned, " ").into_owned();
        for (regex, _) in &self.weekday_rules {
            cleaned = regex.replace_all(&cleaned, "").into_owned();
        }

        cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Default when no time pattern matched: one hour from now, truncated to the
/// minute.
fn default_time(now: DateTime<Tz>) -> NaiveTime {
    let fallback = now + Duration::hours(1);
    NaiveTime::from_hms_opt(fallback.hour(), fallback.minute(), 0)
        .unwrap_or_else(|| fallback.time())
}
