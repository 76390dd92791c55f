//! Natural language date/time expression parsing.
//!
//! Turns phrases such as "tomorrow at 6pm", "2 days ago", "last Monday" or
//! "October 18" into an absolute local date-time relative to a given `now`.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use regex::{Captures, Regex};

const NUMBER: &str = r"(\d+|a|an|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)";
const UNIT: &str = r"(minute|min|hour|hr|day|week)s?";
const MONTH: &str = r"(january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec)";
const WEEKDAY: &str = r"(monday|tuesday|wednesday|thursday|friday|saturday|sunday|mon|tues|tue|wed|thurs|thur|thu|fri|sat|sun)";

/// Words that carry no date information on their own
const FILLER: &[&str] = &[
    "at", "on", "in", "the", "of", "for", "around", "about", "by", "and", "this",
];

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("Invalid time expression regex")
}

static CLOCK_12H: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b"));
static CLOCK_24H: LazyLock<Regex> = LazyLock::new(|| compile(r"\b(\d{1,2}):(\d{2})\b"));
static CLOCK_OCLOCK: LazyLock<Regex> = LazyLock::new(|| compile(r"\b(\d{1,2})\s*o'?clock\b"));
static OFFSET_RELATIVE: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"\b{NUMBER}\s+{UNIT}\s+(ago|from\s+now|later)\b")));
static OFFSET_IN: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!(r"\bin\s+{NUMBER}\s+{UNIT}\b")));
static KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"\b(day\s+after\s+tomorrow|day\s+before\s+yesterday|last\s+night|tonight|tomorrow|yesterday|today|now)\b",
    )
});
static PART_OF_DAY: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\b(noon|midday|midnight|morning|afternoon|evening|night)\b"));
static RELATIVE_WEEK: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\b(next|last|this)\s+week\b"));
static WEEKDAY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"\b(?:(next|coming|this|last|past|previous)\s+)?{WEEKDAY}\b"
    ))
});
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\b(\d{4})[-/](\d{1,2})[-/](\d{1,2})\b"));
static US_DATE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b"));
static MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"\b{MONTH}\s+(\d{{1,2}})(?:st|nd|rd|th)?(?:\s+(\d{{4}}))?\b"
    ))
});
static DAY_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTH}(?:\s+(\d{{4}}))?\b"
    ))
});

/// Which way to resolve a bare weekday such as "Monday"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePreference {
    /// Next occurrence on or after today
    Future,
    /// Most recent occurrence strictly before today
    Past,
}

/// Date component found in an expression
#[derive(Debug, Clone, Copy)]
enum Anchor {
    /// A precise instant ("now", "in 3 hours")
    Instant(NaiveDateTime),
    /// A relative day; keeps the current time of day unless a time is given
    RelativeDay(NaiveDate),
    /// A calendar date; midnight unless a time is given
    CalendarDay(NaiveDate),
}

/// Working state while consuming an expression piece by piece
struct Expression {
    text: String,
    anchors: Vec<Anchor>,
    clock: Option<NaiveTime>,
    default_clock: Option<NaiveTime>,
    valid: bool,
}

impl Expression {
    fn new(raw: &str) -> Self {
        let text = raw
            .to_lowercase()
            .replace("a.m.", "am")
            .replace("p.m.", "pm")
            .replace([',', '?', '!', '.'], " ");

        Self {
            text,
            anchors: Vec::new(),
            clock: None,
            default_clock: None,
            valid: true,
        }
    }

    /// Remove the first match of `re` and hand its captures to `apply`
    fn consume<F>(&mut self, re: &Regex, apply: F) -> bool
    where
        F: FnOnce(&Captures<'_>) -> Option<Step>,
    {
        let Some((range, step)) = re
            .captures(&self.text)
            .and_then(|caps| caps.get(0).map(|m| (m.range(), apply(&caps))))
        else {
            return false;
        };

        self.text.replace_range(range, " ");
        match step {
            Some(Step::Anchor(anchor)) => self.anchors.push(anchor),
            Some(Step::Clock(time)) => {
                if self.clock.is_none() {
                    self.clock = Some(time);
                }
            }
            Some(Step::AnchorWithDefault(anchor, time)) => {
                self.anchors.push(anchor);
                self.default_clock = Some(time);
            }
            None => self.valid = false,
        }
        true
    }

    fn leftovers_are_filler(&self) -> bool {
        self.text
            .split_whitespace()
            .all(|word| FILLER.contains(&word))
    }
}

enum Step {
    Anchor(Anchor),
    Clock(NaiveTime),
    AnchorWithDefault(Anchor, NaiveTime),
}

fn number_word(value: &str) -> Option<i64> {
    let n = match value {
        "a" | "an" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        digits => digits.parse().ok()?,
    };
    Some(n)
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name {
        "january" | "jan" => 1,
        "february" | "feb" => 2,
        "march" | "mar" => 3,
        "april" | "apr" => 4,
        "may" => 5,
        "june" | "jun" => 6,
        "july" | "jul" => 7,
        "august" | "aug" => 8,
        "september" | "sept" | "sep" => 9,
        "october" | "oct" => 10,
        "november" | "nov" => 11,
        "december" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn weekday(name: &str) -> Option<Weekday> {
    let day = match name {
        "monday" | "mon" => Weekday::Mon,
        "tuesday" | "tues" | "tue" => Weekday::Tue,
        "wednesday" | "wed" => Weekday::Wed,
        "thursday" | "thurs" | "thur" | "thu" => Weekday::Thu,
        "friday" | "fri" => Weekday::Fri,
        "saturday" | "sat" => Weekday::Sat,
        "sunday" | "sun" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

fn group<'t>(caps: &Captures<'t>, index: usize) -> Option<&'t str> {
    caps.get(index).map(|m| m.as_str())
}

fn clock_12h(caps: &Captures<'_>) -> Option<Step> {
    let hour: u32 = group(caps, 1)?.parse().ok()?;
    let minute: u32 = group(caps, 2).map_or(Some(0), |m| m.parse().ok())?;
    if !(1..=12).contains(&hour) {
        return None;
    }
    let hour = match (group(caps, 3)?, hour) {
        ("am", 12) => 0,
        ("am", h) => h,
        ("pm", 12) => 12,
        (_, h) => h + 12,
    };
    NaiveTime::from_hms_opt(hour, minute, 0).map(Step::Clock)
}

fn clock_24h(caps: &Captures<'_>) -> Option<Step> {
    let hour: u32 = group(caps, 1)?.parse().ok()?;
    let minute: u32 = group(caps, 2).map_or(Some(0), |m| m.parse().ok())?;
    NaiveTime::from_hms_opt(hour, minute, 0).map(Step::Clock)
}

fn part_of_day(caps: &Captures<'_>) -> Option<Step> {
    let hour = match group(caps, 1)? {
        "noon" | "midday" => 12,
        "midnight" => 0,
        "morning" => 9,
        "afternoon" => 15,
        "evening" => 18,
        _ => 21,
    };
    NaiveTime::from_hms_opt(hour, 0, 0).map(Step::Clock)
}

/// `date` moved by `days`, or `None` past the supported calendar range
fn shift_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::try_days(days)?)
}

fn offset(now: NaiveDateTime, amount: i64, unit: &str) -> Option<Anchor> {
    let anchor = match unit {
        "minute" | "min" => Anchor::Instant(now.checked_add_signed(Duration::try_minutes(amount)?)?),
        "hour" | "hr" => Anchor::Instant(now.checked_add_signed(Duration::try_hours(amount)?)?),
        "day" => Anchor::RelativeDay(shift_days(now.date(), amount)?),
        _ => Anchor::RelativeDay(now.date().checked_add_signed(Duration::try_weeks(amount)?)?),
    };
    Some(anchor)
}

fn calendar_day(year: i32, month: u32, day: u32) -> Option<Step> {
    NaiveDate::from_ymd_opt(year, month, day).map(|d| Step::Anchor(Anchor::CalendarDay(d)))
}

fn weekday_anchor(
    today: NaiveDate,
    modifier: Option<&str>,
    target: Weekday,
    prefer: DatePreference,
) -> Option<Anchor> {
    let current = i64::from(today.weekday().num_days_from_monday());
    let wanted = i64::from(target.num_days_from_monday());
    let forward = (wanted - current).rem_euclid(7);
    let backward = (current - wanted).rem_euclid(7);
    let strictly_next = if forward == 0 { 7 } else { forward };
    let strictly_previous = if backward == 0 { 7 } else { backward };

    let days = match modifier {
        Some("next" | "coming") => strictly_next,
        Some("last" | "past" | "previous") => -strictly_previous,
        Some(_) => forward,
        None => match prefer {
            DatePreference::Future => forward,
            DatePreference::Past => -strictly_previous,
        },
    };
    shift_days(today, days).map(Anchor::RelativeDay)
}

/// Parse a free-form time expression relative to `now`.
///
/// Returns `None` when the expression is empty, contains words that are not
/// understood, names an impossible date or time, or names more than one date.
#[must_use]
pub fn parse_expression(
    raw: &str,
    now: NaiveDateTime,
    prefer: DatePreference,
) -> Option<NaiveDateTime> {
    let today = now.date();
    let mut expr = Expression::new(raw);

    // Explicit clock times first so their digits are not read as dates
    expr.consume(&CLOCK_12H, clock_12h);
    expr.consume(&CLOCK_24H, clock_24h);
    expr.consume(&CLOCK_OCLOCK, clock_24h);

    for re in [&*OFFSET_RELATIVE, &*OFFSET_IN] {
        expr.consume(re, |caps| {
            let amount = number_word(group(caps, 1)?)?;
            let unit = group(caps, 2)?;
            let signed = match group(caps, 3) {
                Some("ago") => -amount,
                _ => amount,
            };
            offset(now, signed, unit).map(Step::Anchor)
        });
    }

    expr.consume(&KEYWORD, |caps| {
        let keyword = group(caps, 1)?;
        let keyword = keyword.split_whitespace().collect::<Vec<_>>().join(" ");
        let night = NaiveTime::from_hms_opt(21, 0, 0)?;
        let step = match keyword.as_str() {
            "now" => Step::Anchor(Anchor::Instant(now)),
            "today" => Step::Anchor(Anchor::RelativeDay(today)),
            "tomorrow" => Step::Anchor(Anchor::RelativeDay(shift_days(today, 1)?)),
            "yesterday" => Step::Anchor(Anchor::RelativeDay(shift_days(today, -1)?)),
            "day after tomorrow" => Step::Anchor(Anchor::RelativeDay(shift_days(today, 2)?)),
            "day before yesterday" => Step::Anchor(Anchor::RelativeDay(shift_days(today, -2)?)),
            "tonight" => Step::AnchorWithDefault(Anchor::RelativeDay(today), night),
            _ => Step::AnchorWithDefault(Anchor::RelativeDay(shift_days(today, -1)?), night),
        };
        Some(step)
    });

    expr.consume(&PART_OF_DAY, part_of_day);

    expr.consume(&RELATIVE_WEEK, |caps| {
        let days = match group(caps, 1)? {
            "next" => 7,
            "last" => -7,
            _ => 0,
        };
        shift_days(today, days).map(|date| Step::Anchor(Anchor::RelativeDay(date)))
    });

    expr.consume(&WEEKDAY_NAME, |caps| {
        let target = weekday(group(caps, 2)?)?;
        weekday_anchor(today, group(caps, 1), target, prefer).map(Step::Anchor)
    });

    expr.consume(&ISO_DATE, |caps| {
        calendar_day(
            group(caps, 1)?.parse().ok()?,
            group(caps, 2)?.parse().ok()?,
            group(caps, 3)?.parse().ok()?,
        )
    });
    expr.consume(&US_DATE, |caps| {
        calendar_day(
            group(caps, 3)?.parse().ok()?,
            group(caps, 1)?.parse().ok()?,
            group(caps, 2)?.parse().ok()?,
        )
    });
    expr.consume(&MONTH_DAY, |caps| {
        let year = group(caps, 3).map_or(Some(today.year()), |y| y.parse().ok())?;
        calendar_day(
            year,
            month_number(group(caps, 1)?)?,
            group(caps, 2)?.parse().ok()?,
        )
    });
    expr.consume(&DAY_MONTH, |caps| {
        let year = group(caps, 3).map_or(Some(today.year()), |y| y.parse().ok())?;
        calendar_day(
            year,
            month_number(group(caps, 2)?)?,
            group(caps, 1)?.parse().ok()?,
        )
    });

    if !expr.valid || !expr.leftovers_are_filler() || expr.anchors.len() > 1 {
        return None;
    }

    let clock = expr.clock.or(expr.default_clock);
    let resolved = match (expr.anchors.first().copied(), clock) {
        (None, None) => return None,
        (None, Some(time)) => today.and_time(time),
        (Some(Anchor::Instant(instant)), None) => instant,
        (Some(Anchor::Instant(instant)), Some(time)) => instant.date().and_time(time),
        (Some(Anchor::RelativeDay(date)), time) => date.and_time(time.unwrap_or(now.time())),
        (Some(Anchor::CalendarDay(date)), time) => {
            date.and_time(time.unwrap_or(NaiveTime::MIN))
        }
    };

    Some(resolved)
}
