//! Conversion of oracle values into the declared type of an action field.
//!
//! Parsing is locale independent: numbers use `.` as the decimal separator and
//! dates are ISO-8601, so a deployment in any region binds the same utterance
//! to the same values.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::errors::FormatError;
use crate::value::{FieldType, RawValue, ScalarKind, TypedValue};

const DATE_TIME_FORMATS: [&str; 4] =
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

pub fn coerce(raw: &RawValue, target: &FieldType) -> Result<TypedValue, FormatError> {
    match target {
        FieldType::Optional(inner) => coerce(raw, inner),
        FieldType::Array(element) => coerce_array(raw, element),
        FieldType::Enumeration(symbols) => {
            let text = single_scalar(raw, target)?;
            parse_symbol(text, symbols, target)
        }
        FieldType::Scalar(kind) => {
            let text = single_scalar(raw, target)?;
            parse_scalar(text, *kind)
        }
    }
}

/// Unwraps single-element collections down to one scalar string.
fn single_scalar<'a>(raw: &'a RawValue, target: &FieldType) -> Result<&'a str, FormatError> {
    match raw {
        RawValue::Scalar(text) => Ok(text.as_str()),
        RawValue::Collection(values) if values.len() == 1 => single_scalar(&values[0], target),
        RawValue::Collection(values) if values.is_empty() => {
            Err(FormatError::new(raw.to_string(), target, "no value to assign"))
        }
        RawValue::Collection(_) => Err(FormatError::new(
            raw.to_string(),
            target,
            "cannot assign multiple values to a single field",
        )),
    }
}

fn coerce_array(raw: &RawValue, element: &FieldType) -> Result<TypedValue, FormatError> {
    let values = match raw {
        RawValue::Collection(values) => {
            values.iter().map(|value| coerce(value, element)).collect::<Result<Vec<_>, _>>()?
        }
        RawValue::Scalar(text) => text
            .split(',')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(|segment| coerce(&RawValue::scalar(segment), element))
            .collect::<Result<Vec<_>, _>>()?,
    };

    Ok(TypedValue::List(values))
}

fn parse_symbol(
    text: &str,
    symbols: &[&'static str],
    target: &FieldType,
) -> Result<TypedValue, FormatError> {
    let candidate = text.trim();
    symbols
        .iter()
        .find(|symbol| **symbol == candidate)
        .map(|symbol| TypedValue::Symbol((*symbol).to_owned()))
        .ok_or_else(|| FormatError::new(text, target, "not a declared symbol"))
}

fn parse_scalar(text: &str, kind: ScalarKind) -> Result<TypedValue, FormatError> {
    let trimmed = text.trim();
    let invalid = |reason: String| FormatError::new(text, kind.label(), reason);

    match kind {
        ScalarKind::Text => Ok(TypedValue::Text(text.to_owned())),
        ScalarKind::Integer => trimmed
            .parse::<i64>()
            .map(TypedValue::Integer)
            .map_err(|error| invalid(error.to_string())),
        ScalarKind::Decimal => Decimal::from_str(trimmed)
            .map(TypedValue::Decimal)
            .map_err(|error| invalid(error.to_string())),
        ScalarKind::Float => {
            let value = trimmed.parse::<f64>().map_err(|error| invalid(error.to_string()))?;
            if value.is_finite() {
                Ok(TypedValue::Float(value))
            } else {
                Err(invalid("value is not finite".to_owned()))
            }
        }
        ScalarKind::Boolean => {
            if trimmed.eq_ignore_ascii_case("true") {
                Ok(TypedValue::Boolean(true))
            } else if trimmed.eq_ignore_ascii_case("false") {
                Ok(TypedValue::Boolean(false))
            } else {
                Err(invalid("expected `true` or `false`".to_owned()))
            }
        }
        ScalarKind::Date => parse_date(trimmed)
            .or_else(|| parse_date_time(trimmed).map(|value| value.date()))
            .map(TypedValue::Date)
            .ok_or_else(|| invalid("expected an ISO-8601 date".to_owned())),
        ScalarKind::DateTime => parse_date_time(trimmed)
            .or_else(|| parse_date(trimmed).and_then(|date| date.and_hms_opt(0, 0, 0)))
            .map(TypedValue::DateTime)
            .ok_or_else(|| invalid("expected an ISO-8601 date-time".to_owned())),
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    if let Ok(value) = DateTime::parse_from_rfc3339(text) {
        return Some(value.naive_local());
    }

    DATE_TIME_FORMATS.iter().find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::coerce;
    use crate::value::{FieldType, RawValue, TypedValue};

    const GENRES: &[&str] = &["Action", "Drama", "Fantasy", "Horror"];

    #[test]
    fn every_enumeration_symbol_round_trips() {
        let target = FieldType::enumeration(GENRES);
        for symbol in GENRES {
            let value = coerce(&RawValue::scalar(*symbol), &target).expect("symbol coerces");
            assert_eq!(value, TypedValue::Symbol((*symbol).to_owned()));
        }
    }

    #[test]
    fn unknown_symbol_is_a_format_error() {
        let error = coerce(&RawValue::scalar("Romance"), &FieldType::enumeration(GENRES))
            .expect_err("undeclared symbol must fail");
        assert_eq!(error.raw, "Romance");
    }

    #[test]
    fn delimited_string_splits_into_text_array() {
        let value = coerce(&RawValue::scalar("a,b,c"), &FieldType::array_of(FieldType::text()))
            .expect("array coerces");
        assert_eq!(
            value,
            TypedValue::List(vec![
                TypedValue::Text("a".to_owned()),
                TypedValue::Text("b".to_owned()),
                TypedValue::Text("c".to_owned()),
            ])
        );
    }

    #[test]
    fn delimited_string_trims_and_drops_empty_segments() {
        let value = coerce(
            &RawValue::scalar(" 3, ,4 ,, "),
            &FieldType::array_of(FieldType::integer()),
        )
        .expect("array coerces");
        assert_eq!(value, TypedValue::List(vec![TypedValue::Integer(3), TypedValue::Integer(4)]));
    }

    #[test]
    fn empty_input_yields_empty_array_not_error() {
        let value = coerce(&RawValue::scalar(" , "), &FieldType::array_of(FieldType::text()))
            .expect("empty array is fine");
        assert_eq!(value, TypedValue::List(Vec::new()));
    }

    #[test]
    fn collection_feeds_array_elements_independently() {
        let value = coerce(
            &RawValue::collection(["Drama", "Horror"]),
            &FieldType::array_of(FieldType::enumeration(GENRES)),
        )
        .expect("collection coerces");
        assert_eq!(
            value,
            TypedValue::List(vec![
                TypedValue::Symbol("Drama".to_owned()),
                TypedValue::Symbol("Horror".to_owned()),
            ])
        );
    }

    #[test]
    fn multi_value_collection_cannot_fill_a_scalar() {
        let result = coerce(&RawValue::collection(["1", "2"]), &FieldType::integer());
        assert!(result.is_err());
    }

    #[test]
    fn single_value_collection_fills_a_scalar() {
        let value =
            coerce(&RawValue::collection(["42"]), &FieldType::integer()).expect("single element");
        assert_eq!(value, TypedValue::Integer(42));
    }

    #[test]
    fn optional_wrapper_is_stripped() {
        let value = coerce(&RawValue::scalar("7"), &FieldType::optional(FieldType::integer()))
            .expect("optional integer");
        assert_eq!(value, TypedValue::Integer(7));
    }

    #[test]
    fn non_numeric_text_is_rejected_for_integers() {
        assert!(coerce(&RawValue::scalar("twelve"), &FieldType::integer()).is_err());
        assert!(coerce(&RawValue::scalar("12.5"), &FieldType::integer()).is_err());
    }

    #[test]
    fn decimals_use_invariant_separator() {
        let value = coerce(&RawValue::scalar("19.95"), &FieldType::decimal()).expect("decimal");
        assert_eq!(value, TypedValue::Decimal(Decimal::new(1995, 2)));
        assert!(coerce(&RawValue::scalar("19,95"), &FieldType::decimal()).is_err());
    }

    #[test]
    fn floats_parse_invariantly_and_reject_non_finite_values() {
        assert_eq!(
            coerce(&RawValue::scalar(" 2.5 "), &FieldType::float()).expect("float"),
            TypedValue::Float(2.5)
        );
        assert!(coerce(&RawValue::scalar("2,5"), &FieldType::float()).is_err());
        assert!(coerce(&RawValue::scalar("NaN"), &FieldType::float()).is_err());
        assert!(coerce(&RawValue::scalar("inf"), &FieldType::float()).is_err());
    }

    #[test]
    fn rfc3339_date_times_keep_their_local_clock_time() {
        let expected = NaiveDate::from_ymd_opt(2026, 3, 14)
            .and_then(|date| date.and_hms_opt(9, 30, 0))
            .expect("valid date time");

        let value = coerce(&RawValue::scalar("2026-03-14T09:30:00+02:00"), &FieldType::date_time())
            .expect("rfc3339 date time");
        assert_eq!(value, TypedValue::DateTime(expected));
    }

    #[test]
    fn year_alone_is_not_a_date() {
        assert!(coerce(&RawValue::scalar("2017"), &FieldType::date()).is_err());
    }

    #[test]
    fn dates_accept_iso_date_and_date_time_forms() {
        let expected = NaiveDate::from_ymd_opt(2026, 3, 14).expect("valid date");
        let plain = coerce(&RawValue::scalar("2026-03-14"), &FieldType::date()).expect("date");
        let stamped =
            coerce(&RawValue::scalar("2026-03-14 09:30:00"), &FieldType::date()).expect("date");
        assert_eq!(plain, TypedValue::Date(expected));
        assert_eq!(stamped, TypedValue::Date(expected));
    }

    #[test]
    fn date_times_default_to_midnight_for_plain_dates() {
        let value =
            coerce(&RawValue::scalar("2026-03-14"), &FieldType::date_time()).expect("date time");
        assert_eq!(value.to_string(), "2026-03-14T00:00:00");
    }

    #[test]
    fn booleans_are_case_insensitive() {
        assert_eq!(
            coerce(&RawValue::scalar("TRUE"), &FieldType::boolean()).expect("bool"),
            TypedValue::Boolean(true)
        );
        assert!(coerce(&RawValue::scalar("yes"), &FieldType::boolean()).is_err());
    }
}
