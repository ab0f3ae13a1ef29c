//! Export formatting: flat member records -> CSV / XLSX / JSON artifacts.

use std::{fmt, str::FromStr};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{CanonicalId, EntryType, ExtractionEntry},
    errors::Error,
    Result,
};

mod csv;
mod writer;
mod xlsx;

pub use writer::ExportWriter;

/// Fixed CSV column order.
pub const CSV_COLUMNS: [&str; 6] = ["groupName", "groupId", "name", "number", "id", "type"];

pub const DEFAULT_SHEET_NAME: &str = "Members";

/// Flat, serialized shape of one extraction entry.
///
/// Missing text fields deserialize as empty strings so they render as empty cells.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub group_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
}

impl ExportRecord {
    fn check(&self) -> std::result::Result<(), String> {
        match (self.entry_type, self.number.as_deref()) {
            (EntryType::Number, Some(number)) => {
                let expected = CanonicalId::parse(&self.id);
                match expected.as_ref().and_then(|id| id.phone_number()) {
                    Some(stripped) if stripped == number => Ok(()),
                    _ => Err(format!(
                        "number {number:?} does not match id {:?}",
                        self.id
                    )),
                }
            }
            (EntryType::Hidden, None) => Ok(()),
            _ => Err("number must be present exactly for type \"number\"".to_string()),
        }
    }
}

impl From<&ExtractionEntry> for ExportRecord {
    fn from(e: &ExtractionEntry) -> Self {
        Self {
            group_id: e.group_id().to_string(),
            group_name: e.group_name().to_string(),
            name: e.name().to_string(),
            number: e.number().map(str::to_string),
            id: e.id().to_string(),
            entry_type: e.entry_type(),
        }
    }
}

/// A validated, non-empty list of export records.
///
/// Keeps the records' JSON objects as given, so JSON and XLSX output reflect the
/// payload's own keys while CSV reads the typed records.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportPayload {
    records: Vec<ExportRecord>,
    objects: Vec<Value>,
}

impl ExportPayload {
    pub fn new(records: Vec<ExportRecord>) -> Result<Self> {
        let objects = records
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::validated(records, objects)
    }

    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = &'a ExtractionEntry>,
    ) -> Result<Self> {
        Self::new(entries.into_iter().map(ExportRecord::from).collect())
    }

    /// Validate an untrusted payload (e.g. posted back by a download form).
    pub fn from_json(value: &Value) -> Result<Self> {
        let Some(items) = value.as_array() else {
            return Err(Error::InvalidPayload("expected an array of records".to_string()));
        };
        let records = items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                if !item.is_object() {
                    return Err(Error::InvalidPayload(format!(
                        "record {idx}: expected an object"
                    )));
                }
                ExportRecord::deserialize(item)
                    .map_err(|e| Error::InvalidPayload(format!("record {idx}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::validated(records, items.clone())
    }

    fn validated(records: Vec<ExportRecord>, objects: Vec<Value>) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::InvalidPayload("no records to export".to_string()));
        }
        for (idx, r) in records.iter().enumerate() {
            r.check()
                .map_err(|e| Error::InvalidPayload(format!("record {idx}: {e}")))?;
        }
        Ok(Self { records, objects })
    }

    pub fn records(&self) -> &[ExportRecord] {
        &self.records
    }

    /// The records as JSON objects, exactly as supplied.
    pub fn objects(&self) -> &[Value] {
        &self.objects
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Json => "application/json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" => Ok(ExportFormat::Xlsx),
            "json" => Ok(ExportFormat::Json),
            other => Err(Error::InvalidFormat(format!(
                "unsupported export format: {other:?} (expected csv, xlsx or json)"
            ))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A rendered export, ready to be written or streamed to a client.
#[derive(Clone, Debug)]
pub struct ExportArtifact {
    pub format: ExportFormat,
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Render `payload` in `format`.
pub fn format(
    payload: &ExportPayload,
    format: ExportFormat,
    sheet_name: &str,
) -> Result<ExportArtifact> {
    let bytes = match format {
        ExportFormat::Csv => csv::render(payload.records()).into_bytes(),
        ExportFormat::Xlsx => xlsx::render(payload.objects(), sheet_name)?,
        ExportFormat::Json => serde_json::to_vec_pretty(payload.objects())
            .map_err(|e| Error::ExportWrite(format!("json serialization failed: {e}")))?,
    };

    Ok(ExportArtifact {
        format,
        file_name: export_file_name(format),
        content_type: format.content_type(),
        bytes,
    })
}

/// Validate an untrusted payload and format name, then render.
///
/// Payload problems are reported before the format is looked at.
pub fn format_export(
    payload: &Value,
    kind: &str,
    sheet_name: &str,
) -> Result<ExportArtifact> {
    let payload = ExportPayload::from_json(payload)?;
    let kind: ExportFormat = kind.parse()?;
    format(&payload, kind, sheet_name)
}

fn export_file_name(format: ExportFormat) -> String {
    let ts = Utc::now().format("%Y%m%d-%H%M%S");
    format!("group-members-{ts}.{}", format.extension())
}
