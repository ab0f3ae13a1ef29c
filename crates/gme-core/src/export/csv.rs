use crate::formatting::escape_csv_field;

use super::{ExportRecord, CSV_COLUMNS};

/// Header row plus one line per record; absent numbers render as empty fields.
pub(super) fn render(records: &[ExportRecord]) -> String {
    let mut out = CSV_COLUMNS.join(",");
    out.push('\n');

    for r in records {
        let fields = [
            r.group_name.as_str(),
            r.group_id.as_str(),
            r.name.as_str(),
            r.number.as_deref().unwrap_or(""),
            r.id.as_str(),
            r.entry_type.as_str(),
        ];
        let line = fields
            .iter()
            .map(|f| escape_csv_field(f))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&line);
        out.push('\n');
    }
    out
}
