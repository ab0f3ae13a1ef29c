use crate::domain::{EntryKind, ExtractionEntry, GroupRef, ResolvedParticipant};

/// Turn a resolved participant into an export entry for `group`.
///
/// Phone-backed ids become `number` entries named after the display name or the
/// stripped number; every other id is `hidden` and falls back to the raw id.
pub fn classify(resolved: &ResolvedParticipant, group: &GroupRef) -> ExtractionEntry {
    let id = resolved.id.clone();
    match resolved.id.phone_number() {
        Some(number) => {
            let name = resolved
                .display_name
                .clone()
                .unwrap_or_else(|| number.to_string());
            ExtractionEntry::new(
                group,
                id,
                name,
                EntryKind::Number {
                    number: number.to_string(),
                },
            )
        }
        None => {
            let name = resolved
                .display_name
                .clone()
                .unwrap_or_else(|| id.to_string());
            ExtractionEntry::new(group, id, name, EntryKind::Hidden)
        }
    }
}
