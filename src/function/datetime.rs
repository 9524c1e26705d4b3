//! DATE helpers. Dates are stored as days since 1970-01-01.

use crate::error::{ExpressionError, ExpressionResult};
use chrono::{Datelike, Duration, NaiveDate};

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

pub fn date_from_days(days: i32) -> ExpressionResult<NaiveDate> {
    epoch()
        .checked_add_signed(Duration::days(days as i64))
        .ok_or_else(|| ExpressionError::NumericOverflow(format!("date out of range: {}", days)))
}

pub fn days_from_date(date: NaiveDate) -> ExpressionResult<i32> {
    let days = date.signed_duration_since(epoch()).num_days();
    i32::try_from(days)
        .map_err(|_| ExpressionError::NumericOverflow(format!("date out of range: {}", date)))
}

pub fn parse_date(text: &str) -> Option<i32> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|date| days_from_date(date).ok())
}

pub fn format_date(days: i32) -> ExpressionResult<String> {
    Ok(date_from_days(days)?.format("%Y-%m-%d").to_string())
}

/// `date_trunc(unit, date)`
pub fn truncate_date(unit: &str, days: i32) -> ExpressionResult<i32> {
    let date = date_from_days(days)?;
    let truncated = match unit.to_lowercase().as_str() {
        "day" => return Ok(days),
        "week" => {
            date - Duration::days(date.weekday().num_days_from_monday() as i64)
        }
        "month" => date.with_day(1).unwrap_or(date),
        "quarter" => {
            let month = (date.month0() / 3) * 3 + 1;
            NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
        }
        "year" => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
        _ => {
            return Err(ExpressionError::InvalidFunctionArgument(format!(
                "'{}' is not a valid DATE field",
                unit
            )))
        }
    };
    days_from_date(truncated)
}
