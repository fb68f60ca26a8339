//! Date search compilation.
//!
//! Precision decides the implicit interval of a value:
//! - Year: 2023 -> [2023-01-01T00:00:00.000Z, 2023-12-31T23:59:59.999Z]
//! - Month, day, hour and minute likewise
//! - Seconds or finer: an exact instant
//!
//! `eq`/`ne` match (or exclude) the whole interval. `gt`/`sa` compare against
//! the end of the interval, every other comparator against the written instant.
//! `ap` matches within 10% of the distance between the value and now.

use fhirqb_core::{FhirDateTime, Result, ValidationError, format_instant};
use time::{Duration, OffsetDateTime};

use crate::parameters::SearchPrefix;
use crate::predicate::{ComparatorOp, Predicate, PredicateValue};
use crate::sanitize::sanitize_date;

fn date_value(name: &str, instant: OffsetDateTime) -> Result<PredicateValue> {
    format_instant(&instant)
        .map(PredicateValue::Date)
        .map_err(|_| ValidationError::type_mismatch("date", name))
}

pub fn compile(name: &str, field: &str, raw: &str, now: OffsetDateTime) -> Result<Predicate> {
    let value = sanitize_date(name, raw)?;
    build_date_predicate(name, field, value.prefix, &value.date, now)
}

pub fn build_date_predicate(
    name: &str,
    field: &str,
    prefix: SearchPrefix,
    date: &FhirDateTime,
    now: OffsetDateTime,
) -> Result<Predicate> {
    let start = date.instant();
    let predicate = match prefix {
        SearchPrefix::Eq | SearchPrefix::Ne => {
            let invert = prefix == SearchPrefix::Ne;
            if date.is_exact() {
                Predicate::Equals {
                    field: field.to_string(),
                    value: date_value(name, start)?,
                    invert,
                }
            } else {
                Predicate::range(
                    field,
                    date_value(name, start)?,
                    date_value(name, date.end_of_interval())?,
                    invert,
                )
            }
        }
        SearchPrefix::Ap => {
            let delta = approximate_delta(start, now);
            let out_of_range =
                || ValidationError::invalid_value(name, "approximate range leaves the supported dates");
            let lower = start.checked_sub(delta).ok_or_else(out_of_range)?;
            let upper = start.checked_add(delta).ok_or_else(out_of_range)?;
            Predicate::range(field, date_value(name, lower)?, date_value(name, upper)?, false)
        }
        SearchPrefix::Gt | SearchPrefix::Sa => Predicate::comparator(
            field,
            date_value(name, date.end_of_interval())?,
            ComparatorOp::Gt,
        ),
        SearchPrefix::Ge => Predicate::comparator(field, date_value(name, start)?, ComparatorOp::Ge),
        SearchPrefix::Lt | SearchPrefix::Eb => {
            Predicate::comparator(field, date_value(name, start)?, ComparatorOp::Lt)
        }
        SearchPrefix::Le => Predicate::comparator(field, date_value(name, start)?, ComparatorOp::Le),
    };
    Ok(predicate)
}

/// A tenth of the absolute distance between the target and now.
fn approximate_delta(target: OffsetDateTime, now: OffsetDateTime) -> Duration {
    (now - target).abs() / 10_i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2020-01-01 00:00:00 UTC);

    fn date(s: &str) -> PredicateValue {
        PredicateValue::Date(s.to_string())
    }

    fn compile_now(raw: &str) -> Predicate {
        compile("date", "effectiveDateTime", raw, NOW).unwrap()
    }

    #[test]
    fn test_eq_year_spans_whole_year() {
        assert_eq!(
            compile_now("eq2018"),
            Predicate::range(
                "effectiveDateTime",
                date("2018-01-01T00:00:00.000Z"),
                date("2018-12-31T23:59:59.999Z"),
                false
            )
        );
    }

    #[test]
    fn test_default_prefix_is_eq() {
        assert_eq!(compile_now("2018"), compile_now("eq2018"));
    }

    #[test]
    fn test_ne_on_interval_is_or_of_comparators() {
        assert_eq!(
            compile_now("ne2018-03"),
            Predicate::or(vec![
                Predicate::comparator("effectiveDateTime", date("2018-03-01T00:00:00.000Z"), ComparatorOp::Lt),
                Predicate::comparator("effectiveDateTime", date("2018-03-31T23:59:59.999Z"), ComparatorOp::Gt),
            ])
        );
    }

    #[test]
    fn test_exact_instant_uses_equals() {
        assert_eq!(
            compile_now("2018-03-04T10:11:12Z"),
            Predicate::equals("effectiveDateTime", date("2018-03-04T10:11:12.000Z"))
        );
        assert_eq!(
            compile_now("ne2018-03-04T10:11:12Z"),
            Predicate::not_equals("effectiveDateTime", date("2018-03-04T10:11:12.000Z"))
        );
    }

    #[test]
    fn test_gt_and_sa_anchor_to_interval_end() {
        let expected = Predicate::comparator(
            "effectiveDateTime",
            date("2018-12-31T23:59:59.999Z"),
            ComparatorOp::Gt,
        );
        assert_eq!(compile_now("gt2018"), expected);
        assert_eq!(compile_now("sa2018"), expected);
    }

    #[test]
    fn test_other_comparators_use_literal_instant() {
        assert_eq!(
            compile_now("lt2018"),
            Predicate::comparator("effectiveDateTime", date("2018-01-01T00:00:00.000Z"), ComparatorOp::Lt)
        );
        assert_eq!(
            compile_now("eb2018"),
            Predicate::comparator("effectiveDateTime", date("2018-01-01T00:00:00.000Z"), ComparatorOp::Lt)
        );
        assert_eq!(
            compile_now("ge2018"),
            Predicate::comparator("effectiveDateTime", date("2018-01-01T00:00:00.000Z"), ComparatorOp::Ge)
        );
        assert_eq!(
            compile_now("le2018"),
            Predicate::comparator("effectiveDateTime", date("2018-01-01T00:00:00.000Z"), ComparatorOp::Le)
        );
    }

    #[test]
    fn test_ap_is_ten_percent_of_distance_to_now() {
        // 10 days before now: +/- 1 day
        assert_eq!(
            compile_now("ap2019-12-22"),
            Predicate::range(
                "effectiveDateTime",
                date("2019-12-21T00:00:00.000Z"),
                date("2019-12-23T00:00:00.000Z"),
                false
            )
        );
    }

    #[test]
    fn test_ap_in_future_is_not_inverted() {
        // 10 days after now: +/- 1 day, lower bound first
        assert_eq!(
            compile_now("ap2020-01-11"),
            Predicate::range(
                "effectiveDateTime",
                date("2020-01-10T00:00:00.000Z"),
                date("2020-01-12T00:00:00.000Z"),
                false
            )
        );
    }

    #[test]
    fn test_ap_overflow_is_rejected() {
        assert_eq!(
            compile("date", "effectiveDateTime", "ap9999-12", NOW).unwrap_err(),
            ValidationError::invalid_value("date", "approximate range leaves the supported dates")
        );
    }

    #[test]
    fn test_hour_precision_in_written_offset() {
        assert_eq!(
            compile_now("eq2019-03-04T10+05:30"),
            Predicate::range(
                "effectiveDateTime",
                date("2019-03-04T04:30:00.000Z"),
                date("2019-03-04T05:29:59.999Z"),
                false
            )
        );
    }

    #[test]
    fn test_invalid_date_is_type_mismatch() {
        let err = compile("birthdate", "birthDate", "gt20x8", NOW).unwrap_err();
        assert_eq!(err.to_string(), "Type mismatch, expected date for parameter birthdate");
    }
}
