//! Participant normalization and collection.
//!
//! Group participant containers come from the account backend in several shapes.
//! `inspect` maps a chat onto a closed set of variants and `collect` handles each
//! variant in one branch, so shape assumptions stay in this module.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::{CanonicalId, Chat};

const NESTED_ID_FIELD: &str = "id";
const SERIALIZED_ID_FIELD: &str = "_serialized";

/// Shape of a chat's participant container.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParticipantContainer<'a> {
    /// `participants` is an array of participant representations.
    Sequence(&'a [Value]),
    /// `participants` is a non-empty object whose keys are all participant ids.
    KeyedCollection(&'a Map<String, Value>),
    /// `participants` is any other object, including an empty one; its values
    /// are the participants.
    PlainMapping(&'a Map<String, Value>),
    /// No usable top-level container, but group metadata carries an array.
    NestedMetadata(&'a [Value]),
    Unrecognized,
}

/// Convert one participant representation into a canonical id.
///
/// Priority: falsy -> `None`; string -> itself; `id` (string, or object with
/// `_serialized`) -> that; top-level `_serialized` -> that; anything else -> `None`.
pub fn normalize(raw: &Value) -> Option<CanonicalId> {
    if is_falsy(raw) {
        return None;
    }

    match raw {
        Value::String(s) => CanonicalId::parse(s),
        Value::Object(obj) => {
            let found = nested_id(obj).or_else(|| obj.get(SERIALIZED_ID_FIELD)?.as_str());
            if found.is_none() {
                debug!(
                    keys = ?obj.keys().collect::<Vec<_>>(),
                    "participant object without identifier"
                );
            }
            found.and_then(CanonicalId::parse)
        }
        other => {
            debug!(shape = shape_name(other), "unrecognized participant representation");
            None
        }
    }
}

/// Classify a chat's participant container.
pub fn inspect(chat: &Chat) -> ParticipantContainer<'_> {
    match chat.participants.as_ref() {
        Some(Value::Array(items)) => return ParticipantContainer::Sequence(items),
        Some(Value::Object(map)) if is_keyed_by_ids(map) => {
            return ParticipantContainer::KeyedCollection(map)
        }
        Some(Value::Object(map)) => return ParticipantContainer::PlainMapping(map),
        _ => {}
    }

    match chat
        .group_metadata
        .as_ref()
        .and_then(|m| m.participants.as_ref())
    {
        Some(Value::Array(items)) => ParticipantContainer::NestedMetadata(items),
        _ => ParticipantContainer::Unrecognized,
    }
}

/// Deduplicated participant ids of a chat. Never fails; unknown shapes yield an empty set.
pub fn collect(chat: &Chat) -> BTreeSet<CanonicalId> {
    let container = inspect(chat);
    let ids: BTreeSet<CanonicalId> = match container {
        ParticipantContainer::Sequence(items) | ParticipantContainer::NestedMetadata(items) => {
            items.iter().filter_map(normalize).collect()
        }
        ParticipantContainer::KeyedCollection(map) => {
            map.keys().filter_map(|k| CanonicalId::parse(k)).collect()
        }
        ParticipantContainer::PlainMapping(map) => map.values().filter_map(normalize).collect(),
        ParticipantContainer::Unrecognized => {
            debug!(chat_id = %chat.id, "no participant container found");
            BTreeSet::new()
        }
    };

    debug!(
        chat_id = %chat.id,
        shape = container_name(&container),
        participants = ids.len(),
        "collected participants"
    );
    ids
}

fn nested_id(obj: &Map<String, Value>) -> Option<&str> {
    match obj.get(NESTED_ID_FIELD)? {
        Value::String(s) => Some(s.as_str()),
        Value::Object(inner) => inner.get(SERIALIZED_ID_FIELD)?.as_str(),
        _ => None,
    }
}

fn is_keyed_by_ids(map: &Map<String, Value>) -> bool {
    static ID_SHAPE: OnceLock<Regex> = OnceLock::new();
    let re = ID_SHAPE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+$").expect("valid regex"));
    !map.is_empty() && map.keys().all(|k| re.is_match(k))
}

fn is_falsy(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn shape_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn container_name(c: &ParticipantContainer<'_>) -> &'static str {
    match c {
        ParticipantContainer::Sequence(_) => "sequence",
        ParticipantContainer::KeyedCollection(_) => "keyed",
        ParticipantContainer::PlainMapping(_) => "mapping",
        ParticipantContainer::NestedMetadata(_) => "metadata",
        ParticipantContainer::Unrecognized => "unrecognized",
    }
}
