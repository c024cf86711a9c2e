// src/extract/dates.rs
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ExtractError;

static SIX_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{6}").expect("valid regex"));

/// Start and end dates encoded in a bulletin filename such as
/// `240107-240113.csv` (or `240107240113.csv`).
///
/// Returns `Ok(None)` when the name carries fewer than two `YYMMDD` runs.
pub fn window_from_filename(
    filename: &str,
) -> Result<Option<(NaiveDate, NaiveDate)>, ExtractError> {
    let codes: Vec<&str> = SIX_DIGITS
        .find_iter(filename)
        .map(|m| m.as_str())
        .take(2)
        .collect();
    let [start, end] = codes[..] else {
        return Ok(None);
    };

    let parse = |code: &str| {
        NaiveDate::parse_from_str(&format!("20{}", code), "%Y%m%d").map_err(|_| {
            ExtractError::InvalidFilenameDate {
                filename: filename.to_string(),
                code: code.to_string(),
            }
        })
    };
    let (start_date, end_date) = (parse(start)?, parse(end)?);
    if start_date > end_date {
        return Err(ExtractError::InvalidFilenameDate {
            filename: filename.to_string(),
            code: format!("{}-{}", start, end),
        });
    }
    Ok(Some((start_date, end_date)))
}
