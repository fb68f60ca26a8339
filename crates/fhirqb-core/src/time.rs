use crate::error::{Result, ValidationError};
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use time::macros::format_description;
use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

/// Flexible ISO 8601 prefix: year, year-month, date, date-hour, minute, second, instant.
static PARTIAL_DATETIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4})(?:-(\d{2})(?:-(\d{2})(?:T(\d{2})(?::(\d{2})(?::(\d{2})(?:\.(\d{1,9}))?)?)?(Z|[+-]\d{2}:?\d{2})?)?)?)?$",
    )
    .expect("Invalid partial datetime regex")
});

/// How many date components were supplied. Anything down to the second is an exact instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePrecision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Exact,
}

/// A FHIR search date, remembering the offset and precision it was written with.
///
/// Equality and hashing compare the instant, not the offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FhirDateTime {
    written: OffsetDateTime,
    precision: DatePrecision,
}

impl FhirDateTime {
    pub fn new(written: OffsetDateTime, precision: DatePrecision) -> Self {
        Self { written, precision }
    }

    /// Start of the interval, in UTC.
    pub fn instant(&self) -> OffsetDateTime {
        self.written.to_offset(UtcOffset::UTC)
    }

    pub fn precision(&self) -> DatePrecision {
        self.precision
    }

    pub fn is_exact(&self) -> bool {
        self.precision == DatePrecision::Exact
    }

    /// Last millisecond of the interval implied by the precision, in UTC.
    ///
    /// The interval is truncated in the offset the value was written in, so
    /// `2019-03-04T10+05:30` spans one hour of local time. Exact instants are
    /// their own end.
    pub fn end_of_interval(&self) -> OffsetDateTime {
        let offset = self.written.offset();
        let date = self.written.date();
        let time = self.written.time();
        let at = |date: Date, time: Time| date.with_time(time).assume_offset(offset);
        let first_of_month = |year: i32, month: Month| {
            Date::from_calendar_date(year, month, 1)
                .ok()
                .map(|d| at(d, Time::MIDNIGHT))
        };

        let next_start = match self.precision {
            DatePrecision::Exact => return self.instant(),
            DatePrecision::Year => first_of_month(date.year() + 1, Month::January),
            DatePrecision::Month => match date.month() {
                Month::December => first_of_month(date.year() + 1, Month::January),
                month => first_of_month(date.year(), month.next()),
            },
            DatePrecision::Day => date.next_day().map(|d| at(d, Time::MIDNIGHT)),
            DatePrecision::Hour => Time::from_hms(time.hour(), 0, 0)
                .ok()
                .and_then(|t| at(date, t).checked_add(Duration::HOUR)),
            DatePrecision::Minute => Time::from_hms(time.hour(), time.minute(), 0)
                .ok()
                .and_then(|t| at(date, t).checked_add(Duration::MINUTE)),
        };
        // Only the last representable date has no successor.
        next_start
            .map_or(self.written, |next| next - Duration::MILLISECOND)
            .to_offset(UtcOffset::UTC)
    }
}

/// Format an instant the way search backends store them: UTC with millisecond precision.
pub fn format_instant(instant: &OffsetDateTime) -> std::result::Result<String, time::error::Format> {
    instant.to_offset(UtcOffset::UTC).format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    ))
}

impl fmt::Display for FhirDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = format_instant(&self.written).map_err(|_| fmt::Error)?;
        f.write_str(&formatted)
    }
}

impl FromStr for FhirDateTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ValidationError::type_mismatch("date", s);
        let caps = PARTIAL_DATETIME_REGEX.captures(s).ok_or_else(invalid)?;
        let number = |idx: usize| -> Option<u32> {
            caps.get(idx).and_then(|m| m.as_str().parse::<u32>().ok())
        };

        let year = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<i32>().ok())
            .ok_or_else(invalid)?;
        let month = number(2);
        let day = number(3);
        let hour = number(4);
        let minute = number(5);
        let second = number(6);

        let precision = match (month, day, hour, minute, second) {
            (None, ..) => DatePrecision::Year,
            (Some(_), None, ..) => DatePrecision::Month,
            (Some(_), Some(_), None, ..) => DatePrecision::Day,
            (Some(_), Some(_), Some(_), None, _) => DatePrecision::Hour,
            (Some(_), Some(_), Some(_), Some(_), None) => DatePrecision::Minute,
            _ => DatePrecision::Exact,
        };

        let month = u8::try_from(month.unwrap_or(1))
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .ok_or_else(invalid)?;
        let day = u8::try_from(day.unwrap_or(1)).map_err(|_| invalid())?;
        let date = Date::from_calendar_date(year, month, day).map_err(|_| invalid())?;

        let nanos = caps
            .get(7)
            .map(|m| format!("{:0<9}", m.as_str()))
            .and_then(|padded| padded.parse::<u32>().ok())
            .unwrap_or(0);
        let to_u8 = |v: Option<u32>| u8::try_from(v.unwrap_or(0)).map_err(|_| invalid());
        let time = Time::from_hms_nano(to_u8(hour)?, to_u8(minute)?, to_u8(second)?, nanos)
            .map_err(|_| invalid())?;

        let offset = match caps.get(8).map(|m| m.as_str()) {
            None | Some("Z") => UtcOffset::UTC,
            Some(tz) => parse_offset(tz).ok_or_else(invalid)?,
        };

        let instant = PrimitiveDateTime::new(date, time).assume_offset(offset);
        Ok(Self::new(instant, precision))
    }
}

fn parse_offset(tz: &str) -> Option<UtcOffset> {
    let sign: i8 = if tz.starts_with('-') { -1 } else { 1 };
    let digits: String = tz[1..].chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 4 {
        return None;
    }
    let hours: i8 = digits[..2].parse().ok()?;
    let minutes: i8 = digits[2..].parse().ok()?;
    UtcOffset::from_hms(sign * hours, sign * minutes, 0).ok()
}

impl Serialize for FhirDateTime {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = format_instant(&self.written).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }
}

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn parse(s: &str) -> FhirDateTime {
        s.parse().unwrap()
    }

    #[test]
    fn test_year_precision_and_interval() {
        let dt = parse("2018");
        assert_eq!(dt.precision(), DatePrecision::Year);
        assert_eq!(dt.to_string(), "2018-01-01T00:00:00.000Z");
        assert_eq!(
            format_instant(&dt.end_of_interval()).unwrap(),
            "2018-12-31T23:59:59.999Z"
        );
    }

    #[test]
    fn test_month_interval_handles_leap_february() {
        let dt = parse("2020-02");
        assert_eq!(dt.precision(), DatePrecision::Month);
        assert_eq!(
            format_instant(&dt.end_of_interval()).unwrap(),
            "2020-02-29T23:59:59.999Z"
        );
        let december = parse("2019-12");
        assert_eq!(
            format_instant(&december.end_of_interval()).unwrap(),
            "2019-12-31T23:59:59.999Z"
        );
    }

    #[test]
    fn test_day_hour_minute_precision() {
        assert_eq!(parse("2019-03-04").precision(), DatePrecision::Day);
        let hour = parse("2019-03-04T10");
        assert_eq!(hour.precision(), DatePrecision::Hour);
        assert_eq!(
            format_instant(&hour.end_of_interval()).unwrap(),
            "2019-03-04T10:59:59.999Z"
        );
        let minute = parse("2019-03-04T10:15");
        assert_eq!(minute.precision(), DatePrecision::Minute);
        assert_eq!(
            format_instant(&minute.end_of_interval()).unwrap(),
            "2019-03-04T10:15:59.999Z"
        );
    }

    #[test]
    fn test_seconds_are_exact() {
        let dt = parse("2019-03-04T10:15:30");
        assert!(dt.is_exact());
        assert_eq!(dt.end_of_interval(), dt.instant());
        assert!(parse("2019-03-04T10:15:30.123Z").is_exact());
    }

    #[test]
    fn test_offset_is_normalized_to_utc() {
        let dt = parse("2019-03-04T10:15:30+02:00");
        assert_eq!(dt.instant(), datetime!(2019-03-04 08:15:30 UTC));
        assert_eq!(dt.to_string(), "2019-03-04T08:15:30.000Z");
    }

    #[test]
    fn test_partial_interval_follows_written_offset() {
        let hour = parse("2019-03-04T10+05:30");
        assert_eq!(hour.instant(), datetime!(2019-03-04 04:30 UTC));
        assert_eq!(
            format_instant(&hour.end_of_interval()).unwrap(),
            "2019-03-04T05:29:59.999Z"
        );

        let minute = parse("2019-03-04T23:59-02:00");
        assert_eq!(
            format_instant(&minute.end_of_interval()).unwrap(),
            "2019-03-05T01:59:59.999Z"
        );
    }

    #[test]
    fn test_format_instant_pads_milliseconds() {
        assert_eq!(
            format_instant(&datetime!(2019-03-04 10:15:30.5 +02:00)).unwrap(),
            "2019-03-04T08:15:30.500Z"
        );
    }

    #[test]
    fn test_fraction_keeps_milliseconds() {
        let dt = parse("2019-03-04T10:15:30.5Z");
        assert_eq!(dt.to_string(), "2019-03-04T10:15:30.500Z");
    }

    #[test]
    fn test_invalid_dates_are_rejected() {
        for bad in ["", "abc", "2019-13", "2019-02-30", "2019-01-01T25", "19-01-01", "2019/01/01"] {
            assert!(bad.parse::<FhirDateTime>().is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&parse("2018")).unwrap();
        assert_eq!(json, "\"2018-01-01T00:00:00.000Z\"");
    }
}
