//! Ranked-lead export (CSV, JSON).

use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::{StoreError, StoreResult};
use crate::types::lead::Lead;

/// Export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(StoreError::Export(format!("unknown export format: {other}"))),
        }
    }
}

const CSV_HEADER: [&str; 13] = [
    "id",
    "company",
    "industry",
    "website",
    "location",
    "employees",
    "overall",
    "fit",
    "intent",
    "timing",
    "signals",
    "status",
    "updated_at",
];

/// Render `leads` in the given order.
pub fn render(leads: &[Lead], format: ExportFormat) -> StoreResult<Vec<u8>> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_vec_pretty(leads)?),
        ExportFormat::Csv => Ok(render_csv(leads).into_bytes()),
    }
}

fn render_csv(leads: &[Lead]) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push('\n');

    for lead in leads {
        let company = lead.company();
        let score = lead.score();
        let num = |v: Option<f64>| v.map(|v| format!("{v:.1}")).unwrap_or_default();
        let row = [
            lead.id().to_string(),
            company.name.clone(),
            lead.industry().to_string(),
            company.website.clone().unwrap_or_default(),
            company.location.clone().unwrap_or_default(),
            company.employee_count.map(|n| n.to_string()).unwrap_or_default(),
            num(score.map(|s| s.overall())),
            num(score.map(|s| s.fit())),
            num(score.map(|s| s.intent())),
            num(score.map(|s| s.timing())),
            lead.signals().len().to_string(),
            lead.status().as_str().to_string(),
            lead.updated_at().to_rfc3339(),
        ];
        let line: Vec<String> = row.iter().map(|field| escape(field)).collect();
        let _ = writeln!(out, "{}", line.join(","));
    }
    out
}

/// Quote a field when it contains a delimiter, quote or line break.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
