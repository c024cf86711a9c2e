// src/extract/decode.rs
use csv::ReaderBuilder;
use encoding_rs::{Encoding, SHIFT_JIS, UTF_8};
use tracing::{debug, trace};

use crate::error::ExtractError;

/// Tried in order; the first encoding that decodes without errors wins.
/// encoding_rs' Shift_JIS is the Windows-31J (cp932) superset the portal
/// publishes in.
pub static ENCODINGS: &[&Encoding] = &[SHIFT_JIS, UTF_8];

/// Title and notes rows above the real header line.
pub const PREAMBLE_LINES: usize = 6;

/// A bulletin after decoding: trimmed header labels and raw data rows.
#[derive(Debug)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Decode `raw` with the first encoding that accepts it.
pub fn decode_text(raw: &[u8]) -> Result<(String, &'static Encoding), ExtractError> {
    for &enc in ENCODINGS {
        match enc.decode_without_bom_handling_and_without_replacement(raw) {
            Some(text) => {
                debug!(encoding = enc.name(), "decoded bulletin");
                return Ok((text.into_owned(), enc));
            }
            None => trace!(encoding = enc.name(), "decode attempt failed"),
        }
    }
    let tried: Vec<_> = ENCODINGS.iter().map(|e| e.name()).collect();
    Err(ExtractError::Decode(format!("tried {}", tried.join(", "))))
}

fn skip_lines(text: &str, n: usize) -> &str {
    let mut rest = text;
    for _ in 0..n {
        match rest.find('\n') {
            Some(i) => rest = &rest[i + 1..],
            None => return "",
        }
    }
    rest
}

/// Decode, drop the preamble, and parse the remainder as CSV with a header row.
pub fn read_table(raw: &[u8]) -> Result<Table, ExtractError> {
    let (text, _) = decode_text(raw)?;
    let body = skip_lines(&text, PREAMBLE_LINES);

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| ExtractError::Decode(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result
            .map_err(|e| ExtractError::Decode(format!("record {}: {}", idx, e)))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table { headers, rows })
}
