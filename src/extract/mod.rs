// src/extract/mod.rs
pub mod dates;
pub mod decode;

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use tracing::{debug, instrument, warn};

use crate::config::TargetCurrency;
use crate::error::ExtractError;
use decode::read_table;

/// Name of the column holding the three-letter currency code.
pub const ISO_COLUMN: &str = "ISO";

/// Where a record's dates came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    /// Parsed from the `YYMMDD` codes in the bulletin filename.
    Filename,
    /// The filename carried no dates; both ends are the processing date.
    ProcessingDate,
}

/// One currency's rate for one weekly bulletin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeRateRecord {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub iso_code: String,
    pub currency_name: String,
    pub rate: Decimal,
    pub source_file: String,
    pub date_source: DateSource,
}

/// The portal's fixed rate positions: per-unit rate in column 4 and the
/// per-100-units rate in column 5 (zero-indexed). A change in the published
/// layout only needs an edit here.
fn rate_candidates(row: &[String]) -> (Option<&str>, Option<&str>) {
    (
        row.get(4).map(String::as_str),
        row.get(5).map(String::as_str),
    )
}

/// Parse a rate cell, tolerating thousands separators. Blank, non-numeric and
/// non-positive cells yield `None`.
fn parse_rate(cell: &str) -> Option<Decimal> {
    let cleaned: String = cell.trim().chars().filter(|c| *c != ',').collect();
    Decimal::from_str(&cleaned)
        .ok()
        .filter(|v| *v > Decimal::ZERO)
}

fn select_rate(row: &[String]) -> Option<Decimal> {
    let (per_unit, per_hundred) = rate_candidates(row);
    if let Some(rate) = per_unit.and_then(parse_rate) {
        return Some(rate);
    }
    per_hundred
        .and_then(parse_rate)
        .map(|v| v / Decimal::ONE_HUNDRED)
}

/// Extract `target`'s rate from raw bulletin bytes, falling back to today's
/// date if `source_filename` carries no window.
pub fn extract_rate(
    raw: &[u8],
    target: &TargetCurrency,
    source_filename: &str,
) -> Result<ExchangeRateRecord, ExtractError> {
    extract_rate_on(raw, target, source_filename, Local::now().date_naive())
}

/// As [`extract_rate`], with the processing date supplied by the caller.
#[instrument(level = "debug", skip(raw, target), fields(bytes = raw.len(), iso = %target.iso_code))]
pub fn extract_rate_on(
    raw: &[u8],
    target: &TargetCurrency,
    source_filename: &str,
    today: NaiveDate,
) -> Result<ExchangeRateRecord, ExtractError> {
    let table = read_table(raw)?;

    let iso_idx = table
        .column(ISO_COLUMN)
        .ok_or_else(|| ExtractError::MissingColumn {
            column: ISO_COLUMN.to_string(),
            found: table.headers.clone(),
        })?;

    let row = table
        .rows
        .iter()
        .find(|r| r.get(iso_idx).map(String::as_str) == Some(target.iso_code.as_str()))
        .ok_or_else(|| ExtractError::CurrencyNotFound(target.iso_code.clone()))?;

    let (start_date, end_date, date_source) = match dates::window_from_filename(source_filename)? {
        Some((start, end)) => (start, end, DateSource::Filename),
        None => {
            warn!(
                file = source_filename,
                %today,
                "no dates in filename, using processing date"
            );
            (today, today, DateSource::ProcessingDate)
        }
    };

    let rate = select_rate(row).ok_or_else(|| ExtractError::RateNotFound(target.iso_code.clone()))?;
    debug!(%rate, %start_date, %end_date, "extracted rate");

    Ok(ExchangeRateRecord {
        start_date,
        end_date,
        iso_code: target.iso_code.clone(),
        currency_name: target.display_name.clone(),
        rate,
        source_file: source_filename.to_string(),
        date_source,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use encoding_rs::SHIFT_JIS;

    const PREAMBLE: &str = "税関公示レート\n\
        適用期間,2024/01/07～2024/01/13\n\
        \n\
        単位：円\n\
        ,,,,,\n\
        注記\n";

    /// A Shift_JIS bulletin whose CNY row carries the given rate cells.
    pub(crate) fn bulletin(per_unit: &str, per_hundred: &str) -> Vec<u8> {
        let text = format!(
            "{PREAMBLE} 国名 , 通貨名 , ISO ,通貨単位,1単位あたり,100単位あたり\n\
             アメリカ,米ドル,USD,ドル,\"144.50\",\n\
             中国,人民元,CNY,元,\"{per_unit}\",\"{per_hundred}\"\n\
             大韓民国,ウォン,KRW,ウォン,,\"11.05\"\n"
        );
        SHIFT_JIS.encode(&text).0.into_owned()
    }

    fn cny() -> TargetCurrency {
        TargetCurrency::default()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn per_unit_rate() {
        crate::test_util::init_test_logging();
        let rec = extract_rate(&bulletin("19.50", ""), &cny(), "240107-240113.csv").unwrap();
        assert_eq!(rec.rate, dec("19.50"));
        assert_eq!(rec.start_date, d(2024, 1, 7));
        assert_eq!(rec.end_date, d(2024, 1, 13));
        assert_eq!(rec.iso_code, "CNY");
        assert_eq!(rec.currency_name, "人民元");
        assert_eq!(rec.source_file, "240107-240113.csv");
        assert_eq!(rec.date_source, DateSource::Filename);
    }

    #[test]
    fn per_hundred_rate_is_divided() {
        let rec = extract_rate(&bulletin("", "1950.00"), &cny(), "240107-240113.csv").unwrap();
        assert_eq!(rec.rate, dec("19.50"));
    }

    #[test]
    fn thousands_separators_are_tolerated() {
        let rec = extract_rate(&bulletin("", "1,950.00"), &cny(), "240107-240113.csv").unwrap();
        assert_eq!(rec.rate, dec("19.5"));
    }

    #[test]
    fn non_positive_per_unit_falls_through() {
        let rec = extract_rate(&bulletin("0", "2000"), &cny(), "240107-240113.csv").unwrap();
        assert_eq!(rec.rate, dec("20"));
        let rec = extract_rate(&bulletin("n/a", "2000"), &cny(), "240107-240113.csv").unwrap();
        assert_eq!(rec.rate, dec("20"));
    }

    #[test]
    fn no_usable_rate() {
        let err = extract_rate(&bulletin("", "-5"), &cny(), "240107-240113.csv").unwrap_err();
        assert!(matches!(err, ExtractError::RateNotFound(c) if c == "CNY"));
    }

    #[test]
    fn missing_iso_column() {
        let text = format!("{PREAMBLE}国名,通貨名,コード,通貨単位,1単位あたり,100単位あたり\n中国,人民元,CNY,元,19.5,\n");
        let raw = SHIFT_JIS.encode(&text).0.into_owned();
        let err = extract_rate(&raw, &cny(), "240107-240113.csv").unwrap_err();
        assert!(matches!(err, ExtractError::MissingColumn { .. }));
        assert!(err.is_format_change());
    }

    #[test]
    fn truncated_bulletin_has_no_iso_column() {
        let err = extract_rate(b"a\nb\n", &cny(), "240107-240113.csv").unwrap_err();
        assert!(matches!(
            err,
            ExtractError::MissingColumn { ref found, .. } if found.is_empty()
        ));
    }

    #[test]
    fn undecodable_bulletin() {
        let err = extract_rate(&[0x81, 0x0A, 0xFF], &cny(), "240107-240113.csv").unwrap_err();
        assert!(matches!(err, ExtractError::Decode(_)));
        assert!(err.is_format_change());
    }

    #[test]
    fn currency_not_present() {
        let target = TargetCurrency {
            iso_code: "EUR".into(),
            display_name: "ユーロ".into(),
        };
        let err = extract_rate(&bulletin("19.50", ""), &target, "240107-240113.csv").unwrap_err();
        assert!(matches!(err, ExtractError::CurrencyNotFound(c) if c == "EUR"));
    }

    #[test]
    fn iso_match_is_case_sensitive() {
        let target = TargetCurrency {
            iso_code: "cny".into(),
            display_name: "人民元".into(),
        };
        assert!(extract_rate(&bulletin("19.50", ""), &target, "x.csv").is_err());
    }

    #[test]
    fn first_matching_row_wins() {
        let text = format!(
            "{PREAMBLE}国名,通貨名,ISO,通貨単位,1単位あたり,100単位あたり\n\
             中国,人民元,CNY,元,19.50,\n\
             中国,人民元,CNY,元,21.00,\n"
        );
        let raw = SHIFT_JIS.encode(&text).0.into_owned();
        let rec = extract_rate(&raw, &cny(), "240107-240113.csv").unwrap();
        assert_eq!(rec.rate, dec("19.50"));
    }

    #[test]
    fn utf8_bulletin_is_accepted() {
        let text = format!(
            "{PREAMBLE}国名,通貨名,ISO,通貨単位,1単位あたり,100単位あたり\n中国,人民元,CNY,元,19.50,\n"
        );
        let rec = extract_rate(text.as_bytes(), &cny(), "240107-240113.csv").unwrap();
        assert_eq!(rec.rate, dec("19.50"));
    }

    #[test]
    fn processing_date_fallback_is_flagged() {
        let today = d(2026, 10, 18);
        let rec = extract_rate_on(&bulletin("19.50", ""), &cny(), "latest.csv", today).unwrap();
        assert_eq!(rec.start_date, today);
        assert_eq!(rec.end_date, today);
        assert_eq!(rec.date_source, DateSource::ProcessingDate);
    }

    #[test]
    fn rate_offsets() {
        let row: Vec<String> = ["a", "b", "CNY", "d", "1", "2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(rate_candidates(&row), (Some("1"), Some("2")));
        assert_eq!(rate_candidates(&row[..4]), (None, None));
    }
}
