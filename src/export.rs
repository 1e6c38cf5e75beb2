use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use crate::dataset::CurrencyEvent;
use crate::logging::{self, obj, v_num, v_str, Domain};

pub const CSV_COLUMNS: [&str; 8] = [
    "Country", "Year", "Zeros", "ISO", "BaseCurr", "Risk", "Stability", "Faith",
];
pub const CSV_FILE_NAME: &str = "zeros_history.csv";
pub const CSV_CONTENT_TYPE: &str = "text/csv";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportManifest {
    pub path: String,
    pub rows: usize,
    pub bytes: usize,
    pub hash_sha256: String,
}

fn escape(field: &str) -> String {
    if field.contains(&[',', '"', '\n'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn to_csv(events: &[CurrencyEvent]) -> String {
    let mut out = String::new();
    out.push_str(&CSV_COLUMNS.join(","));
    out.push('\n');
    for e in events {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            escape(&e.country),
            e.year,
            e.zeros_removed,
            escape(&e.iso_code),
            escape(&e.base_currency),
            e.risk,
            e.stability,
            e.faith
        ));
    }
    out
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn write_csv(path: &Path, events: &[CurrencyEvent]) -> Result<ExportManifest> {
    let csv = to_csv(events);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, csv.as_bytes()).with_context(|| format!("writing {}", path.display()))?;

    let manifest = ExportManifest {
        path: path.display().to_string(),
        rows: events.len(),
        bytes: csv.len(),
        hash_sha256: sha256_hex(csv.as_bytes()),
    };
    logging::info(
        Domain::Export,
        "csv_written",
        obj(&[
            ("path", v_str(&manifest.path)),
            ("rows", v_num(manifest.rows as f64)),
            ("sha256", v_str(&manifest.hash_sha256)),
        ]),
    );
    Ok(manifest)
}
