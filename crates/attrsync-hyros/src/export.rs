//! Parsing of the exported report payload.
//!
//! The export body is delimited text with a fixed quirk: the first line is
//! the column header, the second line is metadata noise, and everything after
//! that is data.

use std::collections::HashMap;

use crate::error::HyrosError;

/// One raw export row: header name to field text.
pub type ExportRow = HashMap<String, String>;

/// Column every export must carry; rows are bucketed by it downstream.
const REQUIRED_COLUMN: &str = "Source";

/// Parses an export payload into raw rows keyed by header name.
///
/// # Errors
///
/// Returns [`HyrosError::MalformedExport`] if the payload is shorter than
/// the header + metadata preamble, the header is missing the `Source`
/// column, or a data line is not valid CSV.
pub fn parse_export(payload: &str) -> Result<Vec<ExportRow>, HyrosError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(payload.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| HyrosError::MalformedExport(format!("unreadable header line: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(HyrosError::MalformedExport("empty header line".to_string()));
    }
    if !headers.iter().any(|h| h == REQUIRED_COLUMN) {
        return Err(HyrosError::MalformedExport(format!(
            "header is missing the '{REQUIRED_COLUMN}' column: {headers:?}"
        )));
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| HyrosError::MalformedExport(format!("line {}: {e}", index + 2)))?;
        // Line 2 of the payload is metadata noise, not data.
        if index == 0 {
            continue;
        }
        // Short records are padded so every header key is present.
        let row: ExportRow = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Source,Clicks,Cost,Sales
report metadata,,,
\"Mar 05\",120,33.50,2
\"Mar 06\",95,-,1
Total,215,33.50,3
";

    #[test]
    fn skips_header_and_metadata_lines() {
        let rows = parse_export(SAMPLE).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["Source"], "Mar 05");
        assert_eq!(rows[0]["Clicks"], "120");
        assert_eq!(rows[1]["Cost"], "-");
        assert_eq!(rows[2]["Source"], "Total");
    }

    #[test]
    fn rejects_payload_without_source_column() {
        let payload = "Clicks,Cost\nnoise,\n1,2\n";
        assert!(matches!(
            parse_export(payload),
            Err(HyrosError::MalformedExport(_))
        ));
    }

    #[test]
    fn rejects_empty_payload() {
        assert!(matches!(
            parse_export(""),
            Err(HyrosError::MalformedExport(_))
        ));
    }

    #[test]
    fn header_and_metadata_only_yields_no_rows() {
        let payload = "Source,Clicks\nnoise,noise\n";
        let rows = parse_export(payload).unwrap();
        assert!(rows.is_empty());
    }
}
