//! Minimal Office Open XML workbook: one worksheet of inline-string cells.

use std::io::{Cursor, Write};

use serde_json::{Map, Value};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use crate::{errors::Error, formatting::escape_xml, Result};

use super::DEFAULT_SHEET_NAME;

const MAX_SHEET_NAME_LEN: usize = 31;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

/// Render record objects as an `.xlsx` package.
///
/// Columns come from the objects' keys (union, first-seen order), not from the
/// fixed CSV order. Non-object items are skipped.
pub(super) fn render(objects: &[Value], sheet_name: &str) -> Result<Vec<u8>> {
    let rows: Vec<&Map<String, Value>> = objects.iter().filter_map(Value::as_object).collect();
    let columns = infer_columns(&rows);

    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", workbook_xml(&sanitize_sheet_name(sheet_name))),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/worksheets/sheet1.xml", sheet_xml(&columns, &rows)),
    ];

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (path, body) in parts {
        zip.start_file(path, options).map_err(zip_error)?;
        zip.write_all(body.as_bytes())
            .map_err(|e| Error::ExportWrite(format!("xlsx write failed: {e}")))?;
    }
    let cursor = zip.finish().map_err(zip_error)?;
    Ok(cursor.into_inner())
}

/// Excel sheet names: at most 31 chars, none of `[]:*?/\`.
pub(super) fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .collect();
    let trimmed: String = cleaned.trim().chars().take(MAX_SHEET_NAME_LEN).collect();
    if trimmed.is_empty() {
        DEFAULT_SHEET_NAME.to_string()
    } else {
        trimmed
    }
}

fn infer_columns(rows: &[&Map<String, Value>]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

fn workbook_xml(sheet_name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        escape_xml(sheet_name)
    )
}

fn sheet_xml(columns: &[String], rows: &[&Map<String, Value>]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );

    let header: Vec<Option<String>> = columns.iter().map(|c| Some(c.clone())).collect();
    push_row(&mut xml, 1, &header);

    for (idx, row) in rows.iter().enumerate() {
        let cells: Vec<Option<String>> = columns
            .iter()
            .map(|c| row.get(c).and_then(cell_text))
            .collect();
        push_row(&mut xml, idx + 2, &cells);
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

fn push_row(xml: &mut String, row_num: usize, cells: &[Option<String>]) {
    xml.push_str(&format!(r#"<row r="{row_num}">"#));
    for (col, cell) in cells.iter().enumerate() {
        let Some(text) = cell else {
            continue;
        };
        xml.push_str(&format!(
            r#"<c r="{}{row_num}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
            column_letter(col),
            escape_xml(text)
        ));
    }
    xml.push_str("</row>");
}

fn cell_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Zero-based column index -> spreadsheet letters (0 -> A, 25 -> Z, 26 -> AA).
fn column_letter(mut idx: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(char::from(b'A' + (idx % 26) as u8));
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    letters.iter().rev().collect()
}

fn zip_error(e: zip::result::ZipError) -> Error {
    Error::ExportWrite(format!("xlsx packaging failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Read;
    use zip::ZipArchive;

    fn objects() -> Vec<Value> {
        vec![
            json!({
                "groupId": "G1@g.us",
                "groupName": "Tom & Jerry",
                "name": "Alice",
                "number": "1234567890",
                "id": "1234567890@c.us",
                "type": "number"
            }),
            json!({
                "groupId": "G1@g.us",
                "groupName": "Tom & Jerry",
                "name": "<hidden>",
                "id": "ABC@lid",
                "type": "hidden"
            }),
        ]
    }

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut out = String::new();
        file.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(5), "F");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn sheet_names_follow_excel_rules() {
        assert_eq!(sanitize_sheet_name("Members"), "Members");
        assert_eq!(sanitize_sheet_name("a/b:c[1]"), "abc1");
        assert_eq!(sanitize_sheet_name("  "), DEFAULT_SHEET_NAME);
        assert_eq!(sanitize_sheet_name(&"x".repeat(40)).len(), MAX_SHEET_NAME_LEN);
    }

    #[test]
    fn writes_a_readable_workbook() {
        let bytes = render(&objects(), "Group / Members").unwrap();

        let workbook = read_part(&bytes, "xl/workbook.xml");
        assert!(workbook.contains(r#"<sheet name="Group  Members""#));

        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains("Tom &amp; Jerry"));
        assert!(sheet.contains("&lt;hidden&gt;"));
        assert!(sheet.contains("1234567890@c.us"));
        assert!(sheet.contains(r#"<row r="3">"#));

        // Header lists every key present in the records.
        for key in ["groupId", "groupName", "name", "number", "id", "type"] {
            assert!(sheet.contains(&format!(">{key}<")), "missing header {key}");
        }

        let types = read_part(&bytes, "[Content_Types].xml");
        assert!(types.contains("/xl/worksheets/sheet1.xml"));
    }

    #[test]
    fn hidden_rows_leave_number_cell_empty() {
        let bytes = render(&objects()[1..], DEFAULT_SHEET_NAME).unwrap();
        let sheet = read_part(&bytes, "xl/worksheets/sheet1.xml");
        // Only the first record shape is present, so there is no number column at all.
        assert!(!sheet.contains(">number<"));
    }

    #[test]
    fn null_values_render_as_empty_cells() {
        let rows = vec![json!({"id": "X@lid", "number": null, "type": "hidden"})];
        let sheet = read_part(&render(&rows, DEFAULT_SHEET_NAME).unwrap(), "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(">number<"));
        assert!(!sheet.contains(r#"<c r="B2""#));
        assert!(sheet.contains("X@lid"));
    }
}
