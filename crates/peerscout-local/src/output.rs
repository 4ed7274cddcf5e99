//! Output sinks: the comparable table as CSV or JSON, and a JSONL
//! provenance log recording where each extracted field value came from.

use peerscout_core::{ComparableRecord, Error, ProvenanceRecord, Result};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Json,
}

impl TableFormat {
    /// Inferred from the output extension; anything unrecognized writes CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => TableFormat::Json,
            _ => TableFormat::Csv,
        }
    }
}

const CSV_HEADER: &str = "name,url,exchange,ticker,business_activity,customer_segment,\
sic_industry,validation_score,service_similarity,segment_similarity,is_plausible,\
evidence_urls";

fn csv_field(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn csv_row(r: &ComparableRecord) -> String {
    [
        csv_field(&r.name),
        csv_field(r.url.as_deref().unwrap_or("")),
        csv_field(r.exchange.as_deref().unwrap_or("")),
        csv_field(r.ticker.as_deref().unwrap_or("")),
        csv_field(&r.business_activity),
        csv_field(&r.customer_segment),
        csv_field(r.sic_industry.as_deref().unwrap_or("")),
        format!("{:.4}", r.validation_score),
        format!("{:.4}", r.service_similarity),
        format!("{:.4}", r.segment_similarity),
        r.is_plausible.to_string(),
        // semicolon-joined so the url list stays inside one csv column
        csv_field(&r.evidence_urls.join("; ")),
    ]
    .join(",")
}

/// Write the final table to `path` in the format its extension implies.
pub fn write_table(path: &Path, records: &[ComparableRecord]) -> Result<()> {
    let mut file =
        std::fs::File::create(path).map_err(|e| Error::Output(format!("{}: {e}", path.display())))?;
    match TableFormat::from_path(path) {
        TableFormat::Csv => {
            writeln!(file, "{CSV_HEADER}")
                .map_err(|e| Error::Output(e.to_string()))?;
            for r in records {
                writeln!(file, "{}", csv_row(r)).map_err(|e| Error::Output(e.to_string()))?;
            }
        }
        TableFormat::Json => {
            serde_json::to_writer_pretty(&mut file, records)
                .map_err(|e| Error::Output(e.to_string()))?;
            writeln!(file).map_err(|e| Error::Output(e.to_string()))?;
        }
    }
    Ok(())
}

/// One provenance line per populated field of each record.
pub fn provenance_records(records: &[ComparableRecord]) -> Vec<ProvenanceRecord> {
    let mut out = Vec::new();
    for r in records {
        let source_url = r
            .evidence_urls
            .first()
            .cloned()
            .unwrap_or_default();
        let mut push = |field: &str, value: Option<String>| {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                out.push(ProvenanceRecord {
                    candidate_name: r.name.clone(),
                    field: field.to_string(),
                    value,
                    source_url: source_url.clone(),
                });
            }
        };
        push("name", Some(r.name.clone()));
        push("url", r.url.clone());
        push("exchange", r.exchange.clone());
        push("ticker", r.ticker.clone());
        push("business_activity", Some(r.business_activity.clone()));
        push("customer_segment", Some(r.customer_segment.clone()));
        push("sic_industry", r.sic_industry.clone());
    }
    out
}

/// Human-readable stdout summary of the final table.
pub fn print_summary(records: &[ComparableRecord]) {
    for rec in records {
        let listing = match (rec.exchange.as_deref(), rec.ticker.as_deref()) {
            (Some(e), Some(t)) => format!("{e}: {t}"),
            _ => "unlisted/unknown".to_string(),
        };
        println!(
            "  {:<30} score {:.3}  [{listing}]",
            rec.name, rec.validation_score
        );
    }
}

/// Append-style JSONL, one record per line.
pub fn write_provenance(path: &Path, records: &[ComparableRecord]) -> Result<()> {
    let mut file =
        std::fs::File::create(path).map_err(|e| Error::Output(format!("{}: {e}", path.display())))?;
    for rec in provenance_records(records) {
        let line = serde_json::to_string(&rec).map_err(|e| Error::Output(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| Error::Output(e.to_string()))?;
    }
    Ok(())
}
