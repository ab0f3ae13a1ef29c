//! Formatting utilities (text preview, CSV/XML escaping).

use std::fmt::Write;

use crate::extraction::ExtractionReport;

/// Quote a CSV field when it contains a delimiter, quote or line break (RFC 4180).
pub fn escape_csv_field(field: &str) -> String {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Escape text for XML content/attributes, dropping characters XML 1.0 forbids.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 => {}
            c => out.push(c),
        }
    }
    out
}

/// Plain-text preview of an extraction: one block per group, then totals.
pub fn render_preview(report: &ExtractionReport) -> String {
    let mut out = String::new();

    for group in &report.groups {
        let _ = writeln!(out, "== {} ({})", group.group_name(), group.group_id());
        if let Some(err) = group.error() {
            let _ = writeln!(out, "   error: {err}");
            continue;
        }
        let _ = writeln!(
            out,
            "   {} numbers, {} hidden",
            group.numbers().len(),
            group.hidden_ids().len()
        );
        for m in group.numbers() {
            let _ = writeln!(out, "   + {}  {}", m.number, m.name);
        }
        for m in group.hidden_ids() {
            let _ = writeln!(out, "   ~ {}  {}", m.id, m.name);
        }
    }

    let _ = write!(
        out,
        "Total: {} entries ({} numbers, {} hidden)",
        report.combined.all().len(),
        report.combined.numbers().count(),
        report.combined.hidden().count()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GroupRef, GroupResult};

    #[test]
    fn csv_fields_are_quoted_only_when_needed() {
        assert_eq!(escape_csv_field("Alice"), "Alice");
        assert_eq!(escape_csv_field("Smith, J"), "\"Smith, J\"");
        assert_eq!(escape_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv_field("a\nb"), "\"a\nb\"");
    }

    #[test]
    fn escapes_xml_and_drops_control_chars() {
        assert_eq!(escape_xml("<a & 'b'>"), "&lt;a &amp; &apos;b&apos;&gt;");
        assert_eq!(escape_xml("x\u{1}y\tz"), "xy\tz");
    }

    #[test]
    fn preview_shows_errors_and_totals() {
        let failed = GroupResult::failed(
            &GroupRef {
                id: "G1".to_string(),
                name: "G1".to_string(),
            },
            "not found: chat G1",
        );
        let report = ExtractionReport {
            groups: vec![failed],
            combined: Default::default(),
        };
        let text = render_preview(&report);
        assert!(text.contains("== G1 (G1)"));
        assert!(text.contains("error: not found: chat G1"));
        assert!(text.ends_with("Total: 0 entries (0 numbers, 0 hidden)"));
    }
}
