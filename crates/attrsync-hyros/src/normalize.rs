//! Normalization of raw upstream rows into canonical attribution records.
//!
//! Export rows arrive as text with a `"-"` placeholder for "no value" and a
//! date column that carries no year. Direct-API rows arrive as JSON numbers.
//! Both end up as records whose numeric fields are either a finite decimal
//! rounded to six fractional digits or null. Inputs are never mutated.

use attrsync_core::{ApiAttributionRecord, EntityId, ReportAttributionRecord};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::error::HyrosError;
use crate::export::ExportRow;
use crate::types::WindowedApiRow;

/// Upstream placeholder for "no value" in export fields.
const NULL_SENTINEL: &str = "-";

/// Label of the aggregate line appended to every export.
const TOTAL_LABEL: &str = "Total";

const METRIC_SCALE: u32 = 6;

/// Coerces the no-value sentinel (and empty text) to `None`.
#[must_use]
pub fn coerce_null(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == NULL_SENTINEL {
        None
    } else {
        Some(trimmed)
    }
}

/// Parses a metric field into a decimal rounded to six fractional digits.
///
/// # Errors
///
/// Returns [`HyrosError::MalformedExport`] if a present value is not a
/// number.
fn parse_metric(name: &str, raw: Option<&str>) -> Result<Option<Decimal>, HyrosError> {
    match raw {
        None => Ok(None),
        Some(text) => text
            .parse::<Decimal>()
            .map(|d| Some(d.round_dp(METRIC_SCALE)))
            .map_err(|e| {
                HyrosError::MalformedExport(format!("column '{name}': unparseable number '{text}': {e}"))
            }),
    }
}

/// Ratio fields (ROI/ROAS) arrive as percentages; normalize to fractions.
fn parse_ratio(name: &str, raw: Option<&str>) -> Result<Option<Decimal>, HyrosError> {
    Ok(parse_metric(name, raw)?.map(|d| (d / Decimal::from(100)).round_dp(METRIC_SCALE)))
}

/// Parses the export's year-less date column against `today`'s calendar.
///
/// The year is inferred as the current year, except in January when the
/// parsed month is not January — then the date belongs to the look-back tail
/// of the previous year.
///
/// # Errors
///
/// Returns [`HyrosError::MalformedExport`] if the text matches none of the
/// known month-day layouts.
pub fn parse_source_date(text: &str, today: NaiveDate) -> Result<NaiveDate, HyrosError> {
    const FORMATS: &[&str] = &["%b %d %Y", "%B %d %Y", "%d %b %Y", "%d %B %Y"];
    let trimmed = text.trim();
    let malformed = || HyrosError::MalformedExport(format!("unparseable source date '{text}'"));

    let parse_with_year = |year: i32| {
        FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(&format!("{trimmed} {year}"), fmt).ok())
    };

    let parsed = parse_with_year(today.year()).ok_or_else(malformed)?;
    if today.month() == 1 && parsed.month() != 1 {
        // Jan 29th of a leap year maps back fine; Feb never appears here
        // because the look-back window is shorter than eleven months.
        parsed.with_year(today.year() - 1).ok_or_else(malformed)
    } else {
        Ok(parsed)
    }
}

fn field<'a>(row: &'a ExportRow, name: &str) -> Result<Option<&'a str>, HyrosError> {
    row.get(name)
        .map(|raw| coerce_null(raw))
        .ok_or_else(|| HyrosError::MalformedExport(format!("missing expected column '{name}'")))
}

/// Normalizes raw export rows for one account into canonical records.
///
/// Aggregate `Total` lines are dropped; every record is stamped with the
/// run's single `batched_at`.
///
/// # Errors
///
/// Returns [`HyrosError::MalformedExport`] on missing columns, unparseable
/// numbers, or unparseable dates — the run aborts rather than loading
/// garbled rows.
pub fn normalize_report_rows(
    rows: &[ExportRow],
    account: &EntityId,
    client: &str,
    batched_at: DateTime<Utc>,
    today: NaiveDate,
) -> Result<Vec<ReportAttributionRecord>, HyrosError> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let source_raw = field(row, "Source")?;
        if source_raw == Some(TOTAL_LABEL) {
            continue;
        }
        let source = source_raw
            .ok_or_else(|| HyrosError::MalformedExport("row with empty Source".to_string()))?;

        let metric = |name: &str| -> Result<Option<Decimal>, HyrosError> {
            parse_metric(name, field(row, name)?)
        };
        let ratio = |name: &str| -> Result<Option<Decimal>, HyrosError> {
            parse_ratio(name, field(row, name)?)
        };

        records.push(ReportAttributionRecord {
            source: parse_source_date(source, today)?,
            clicks: metric("Clicks")?,
            cost: metric("Cost")?,
            total_revenue: metric("Total Revenue")?,
            revenue: metric("Revenue")?,
            recurring_revenue: metric("Recurring revenue")?,
            profit: metric("Profit")?,
            reported: metric("Reported")?,
            reported_vs_revenue: metric("Reported VS Revenue")?,
            sales: metric("Sales")?,
            roi: ratio("ROI")?,
            roas: ratio("ROAS")?,
            calls: metric("Calls")?,
            refund: metric("Refund")?,
            cost_per_sale: metric("Cost per sale")?,
            cost_per_call: metric("Cost per call")?,
            leads: metric("Leads")?,
            new_leads: metric("New Leads")?,
            cost_per_lead: metric("Cost per lead")?,
            cost_per_new_lead: metric("Cost per new lead")?,
            cost_per_unique_sale: metric("Cost per unique sale")?,
            unique_sales: metric("Unique Sales")?,
            average_order_value: metric("Average Order Value")?,
            account: account.as_str().to_string(),
            client: client.to_string(),
            batched_at,
        });
    }
    Ok(records)
}

/// Converts tagged direct-API rows into canonical records, stamping the
/// run's single `batched_at`.
#[must_use]
pub fn normalize_api_rows(
    rows: Vec<WindowedApiRow>,
    batched_at: DateTime<Utc>,
) -> Vec<ApiAttributionRecord> {
    rows.into_iter()
        .map(|tagged| ApiAttributionRecord {
            id: tagged.row.id_text(),
            sales: metric_from_f64(tagged.row.sales),
            calls: metric_from_f64(tagged.row.calls),
            unique_sales: metric_from_f64(tagged.row.unique_sales),
            refund: metric_from_f64(tagged.row.refund),
            revenue: metric_from_f64(tagged.row.revenue),
            recurring_revenue: metric_from_f64(tagged.row.recurring_revenue),
            total_revenue: metric_from_f64(tagged.row.total_revenue),
            start_time: tagged.start_time,
            end_time: tagged.end_time,
            batched_at,
        })
        .collect()
}

/// Non-finite values have no decimal representation and become null.
fn metric_from_f64(value: Option<f64>) -> Option<Decimal> {
    value
        .and_then(Decimal::from_f64)
        .map(|d| d.round_dp(METRIC_SCALE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn full_row(source: &str) -> ExportRow {
        let mut row = HashMap::new();
        for name in [
            "Clicks",
            "Cost",
            "Total Revenue",
            "Revenue",
            "Recurring revenue",
            "Profit",
            "Reported",
            "Reported VS Revenue",
            "Sales",
            "ROI",
            "ROAS",
            "Calls",
            "Refund",
            "Cost per sale",
            "Cost per call",
            "Leads",
            "New Leads",
            "Cost per lead",
            "Cost per new lead",
            "Cost per unique sale",
            "Unique Sales",
            "Average Order Value",
        ] {
            row.insert(name.to_string(), "-".to_string());
        }
        row.insert("Source".to_string(), source.to_string());
        row
    }

    #[test]
    fn coerce_null_maps_sentinel_and_empty() {
        assert_eq!(coerce_null("-"), None);
        assert_eq!(coerce_null(""), None);
        assert_eq!(coerce_null("  "), None);
        assert_eq!(coerce_null("12.5"), Some("12.5"));
    }

    #[test]
    fn parse_metric_rounds_to_six_digits() {
        let parsed = parse_metric("Cost", Some("12.12345678")).unwrap().unwrap();
        assert_eq!(parsed.to_string(), "12.123457");
    }

    #[test]
    fn parse_metric_rejects_garbage() {
        assert!(matches!(
            parse_metric("Cost", Some("N/A")),
            Err(HyrosError::MalformedExport(_))
        ));
    }

    #[test]
    fn parse_ratio_divides_percentage_by_hundred() {
        let parsed = parse_ratio("ROI", Some("250")).unwrap().unwrap();
        // Decimal division preserves scale ("2.50"), so compare values.
        assert_eq!(parsed, Decimal::new(25, 1));
        assert_eq!(parsed.normalize().to_string(), "2.5");
    }

    #[test]
    fn source_date_uses_current_year_outside_january() {
        let today = ymd(2024, 8, 15);
        assert_eq!(
            parse_source_date("Mar 05", today).unwrap(),
            ymd(2024, 3, 5)
        );
        assert_eq!(
            parse_source_date("Aug 14", today).unwrap(),
            ymd(2024, 8, 14)
        );
    }

    #[test]
    fn source_date_in_january_maps_december_to_prior_year() {
        let today = ymd(2024, 1, 10);
        assert_eq!(
            parse_source_date("Dec 28", today).unwrap(),
            ymd(2023, 12, 28)
        );
    }

    #[test]
    fn source_date_in_january_keeps_january_in_current_year() {
        let today = ymd(2024, 1, 10);
        assert_eq!(
            parse_source_date("Jan 03", today).unwrap(),
            ymd(2024, 1, 3)
        );
    }

    #[test]
    fn source_date_accepts_day_first_and_full_month_layouts() {
        let today = ymd(2024, 8, 15);
        assert_eq!(
            parse_source_date("05 Mar", today).unwrap(),
            ymd(2024, 3, 5)
        );
        assert_eq!(
            parse_source_date("March 05", today).unwrap(),
            ymd(2024, 3, 5)
        );
    }

    #[test]
    fn source_date_rejects_garbage() {
        assert!(matches!(
            parse_source_date("not a date", ymd(2024, 8, 15)),
            Err(HyrosError::MalformedExport(_))
        ));
    }

    #[test]
    fn total_rows_are_dropped() {
        let rows = vec![full_row("Mar 05"), full_row("Total")];
        let records = normalize_report_rows(
            &rows,
            &EntityId::from("42"),
            "SBLA",
            Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap(),
            ymd(2024, 3, 6),
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, ymd(2024, 3, 5));
        assert_eq!(records[0].account, "42");
        assert_eq!(records[0].client, "SBLA");
    }

    #[test]
    fn sentinel_metrics_normalize_to_null() {
        let mut row = full_row("Mar 05");
        row.insert("Clicks".to_string(), "120".to_string());
        let records = normalize_report_rows(
            &[row],
            &EntityId::from("42"),
            "SBLA",
            Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap(),
            ymd(2024, 3, 6),
        )
        .unwrap();
        assert_eq!(records[0].clicks, Some(Decimal::from(120)));
        assert_eq!(records[0].cost, None);
        assert_eq!(records[0].roi, None);
    }

    #[test]
    fn missing_column_is_a_normalization_failure() {
        let mut row = full_row("Mar 05");
        row.remove("Revenue");
        let result = normalize_report_rows(
            &[row],
            &EntityId::from("42"),
            "SBLA",
            Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap(),
            ymd(2024, 3, 6),
        );
        assert!(matches!(result, Err(HyrosError::MalformedExport(_))));
    }

    #[test]
    fn api_rows_are_tagged_and_stamped() {
        use crate::types::ApiResultRow;

        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let end = start + chrono::Duration::days(1);
        let batched_at = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let raw = WindowedApiRow {
            row: ApiResultRow {
                id: serde_json::json!(4_175_347_744_u64),
                sales: Some(3.0),
                calls: None,
                unique_sales: None,
                refund: None,
                revenue: Some(125.123_456_789),
                recurring_revenue: None,
                total_revenue: Some(f64::NAN),
            },
            start_time: start,
            end_time: end,
        };

        let records = normalize_api_rows(vec![raw], batched_at);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "4175347744");
        assert_eq!(records[0].sales, Some(Decimal::from(3)));
        assert_eq!(records[0].revenue.unwrap().to_string(), "125.123457");
        assert_eq!(records[0].total_revenue, None, "non-finite becomes null");
        assert_eq!(records[0].start_time, start);
        assert_eq!(records[0].end_time, end);
        assert_eq!(records[0].batched_at, batched_at);
    }
}
