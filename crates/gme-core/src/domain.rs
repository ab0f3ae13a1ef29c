use std::fmt;

use serde::{Deserialize, Serialize};

/// Suffix carried by phone-number-backed identifiers.
pub const PHONE_SUFFIX: &str = "@c.us";

/// Normalized participant identifier (e.g. `1234567890@c.us`, `ABCXYZ@lid`).
///
/// Never blank: an identifier that could not be determined has no value of this type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CanonicalId(String);

/// The two identifier address spaces of the messaging network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressSpace {
    Phone,
    Hidden,
}

impl CanonicalId {
    /// Accept `raw` unchanged unless it is blank.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local part of a phone-backed id (`1234567890@c.us` -> `1234567890`).
    pub fn phone_number(&self) -> Option<&str> {
        self.0
            .strip_suffix(PHONE_SUFFIX)
            .filter(|local| !local.is_empty())
    }

    pub fn address_space(&self) -> AddressSpace {
        if self.phone_number().is_some() {
            AddressSpace::Phone
        } else {
            AddressSpace::Hidden
        }
    }
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chat as returned by the account backend.
///
/// `participants` and `group_metadata.participants` are kept as raw JSON: their
/// shape is not controlled by us and is inspected by `participants::inspect`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub participants: Option<serde_json::Value>,
    #[serde(default)]
    pub group_metadata: Option<GroupMetadata>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GroupMetadata {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub participants: Option<serde_json::Value>,
}

/// Cached group listing entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_count: Option<usize>,
}

/// Result of a single contact lookup. Every field is optional on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactCard {
    #[serde(default)]
    pub pushname: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
}

/// Output of the contact resolver for one id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedParticipant {
    pub id: CanonicalId,
    pub display_name: Option<String>,
    pub resolution_ok: bool,
}

impl ResolvedParticipant {
    pub fn resolved(id: CanonicalId, display_name: Option<String>) -> Self {
        Self {
            id,
            display_name,
            resolution_ok: true,
        }
    }

    pub fn failed(id: CanonicalId) -> Self {
        Self {
            id,
            display_name: None,
            resolution_ok: false,
        }
    }
}

/// Group context attached to every entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupRef {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Number,
    Hidden,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::Number => "number",
            EntryType::Hidden => "hidden",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Number { number: String },
    Hidden,
}

/// One classified participant of one group.
///
/// Built only by `classify::classify`, so `number()` is present iff the entry is a
/// `Number` entry and always equals the id with the phone suffix stripped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionEntry {
    group_id: String,
    group_name: String,
    name: String,
    id: CanonicalId,
    kind: EntryKind,
}

impl ExtractionEntry {
    pub(crate) fn new(group: &GroupRef, id: CanonicalId, name: String, kind: EntryKind) -> Self {
        Self {
            group_id: group.id.clone(),
            group_name: group.name.clone(),
            name,
            id,
            kind,
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &CanonicalId {
        &self.id
    }

    pub fn number(&self) -> Option<&str> {
        match &self.kind {
            EntryKind::Number { number } => Some(number),
            EntryKind::Hidden => None,
        }
    }

    pub fn entry_type(&self) -> EntryType {
        match self.kind {
            EntryKind::Number { .. } => EntryType::Number,
            EntryKind::Hidden => EntryType::Hidden,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NumberMember {
    pub number: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HiddenMember {
    pub id: String,
    pub name: String,
}

/// Per-group extraction outcome. A failed group carries `error` and no members.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResult {
    group_id: String,
    group_name: String,
    numbers: Vec<NumberMember>,
    hidden_ids: Vec<HiddenMember>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl GroupResult {
    pub fn failed(group: &GroupRef, error: impl Into<String>) -> Self {
        Self {
            group_id: group.id.clone(),
            group_name: group.name.clone(),
            numbers: Vec::new(),
            hidden_ids: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Partition classified entries by type, keeping their order.
    pub fn from_entries(group: &GroupRef, entries: &[ExtractionEntry]) -> Self {
        let mut numbers = Vec::new();
        let mut hidden_ids = Vec::new();
        for e in entries {
            match &e.kind {
                EntryKind::Number { number } => numbers.push(NumberMember {
                    number: number.clone(),
                    name: e.name.clone(),
                }),
                EntryKind::Hidden => hidden_ids.push(HiddenMember {
                    id: e.id.to_string(),
                    name: e.name.clone(),
                }),
            }
        }
        Self {
            group_id: group.id.clone(),
            group_name: group.name.clone(),
            numbers,
            hidden_ids,
            error: None,
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    pub fn numbers(&self) -> &[NumberMember] {
        &self.numbers
    }

    pub fn hidden_ids(&self) -> &[HiddenMember] {
        &self.hidden_ids
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
