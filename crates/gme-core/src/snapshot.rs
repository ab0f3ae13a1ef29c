//! Offline backend reading chats and contacts from a JSON snapshot.
//!
//! Snapshot layout:
//! `{ "groups": [GroupSummary]?, "chats": [Chat], "contacts": { id: ContactCard } }`

use std::{collections::HashMap, path::Path};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{CanonicalId, Chat, ContactCard, GroupSummary},
    errors::Error,
    participants,
    ports::{ChatSource, ContactDirectory},
    Result,
};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub groups: Vec<GroupSummary>,
    #[serde(default)]
    pub chats: Vec<Chat>,
    #[serde(default)]
    pub contacts: HashMap<String, ContactCard>,
}

#[derive(Clone, Debug, Default)]
pub struct SnapshotBackend {
    snapshot: Snapshot,
}

impl SnapshotBackend {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        Ok(Self::new(snapshot))
    }
}

#[async_trait]
impl ChatSource for SnapshotBackend {
    async fn fetch_chat(&self, chat_id: &str) -> Result<Chat> {
        self.snapshot
            .chats
            .iter()
            .find(|c| c.id == chat_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("chat {chat_id}")))
    }

    /// Explicit `groups` win; otherwise the listing is derived from group chats.
    async fn list_groups(&self) -> Result<Vec<GroupSummary>> {
        if !self.snapshot.groups.is_empty() {
            return Ok(self.snapshot.groups.clone());
        }

        Ok(self
            .snapshot
            .chats
            .iter()
            .filter(|c| c.is_group)
            .map(|c| GroupSummary {
                id: c.id.clone(),
                name: c
                    .name
                    .clone()
                    .or_else(|| c.group_metadata.as_ref()?.subject.clone())
                    .unwrap_or_else(|| c.id.clone()),
                participant_count: Some(participants::collect(c).len()),
            })
            .collect())
    }
}

#[async_trait]
impl ContactDirectory for SnapshotBackend {
    async fn lookup(&self, id: &CanonicalId) -> Result<ContactCard> {
        self.snapshot
            .contacts
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("contact {id}")))
    }
}
