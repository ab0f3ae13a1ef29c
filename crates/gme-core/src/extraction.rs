//! Extraction orchestrator: chat fetch -> collect -> resolve -> classify, per group.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    classify::classify,
    domain::{Chat, EntryType, ExtractionEntry, GroupRef, GroupResult},
    participants,
    ports::ChatSource,
    resolver::ContactResolver,
    session::AccountSession,
    Result,
};

/// Entries across all processed groups, in processing order.
///
/// `numbers()` and `hidden()` are views over `all()`, never separate copies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Combined {
    all: Vec<ExtractionEntry>,
}

impl Combined {
    pub fn all(&self) -> &[ExtractionEntry] {
        &self.all
    }

    pub fn numbers(&self) -> impl Iterator<Item = &ExtractionEntry> + '_ {
        self.of_type(EntryType::Number)
    }

    pub fn hidden(&self) -> impl Iterator<Item = &ExtractionEntry> + '_ {
        self.of_type(EntryType::Hidden)
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    fn of_type(&self, ty: EntryType) -> impl Iterator<Item = &ExtractionEntry> + '_ {
        self.all.iter().filter(move |e| e.entry_type() == ty)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub groups: Vec<GroupResult>,
    pub combined: Combined,
}

/// Runs extraction requests against the account session.
pub struct Extractor {
    session: Arc<AccountSession>,
    chats: Arc<dyn ChatSource>,
    resolver: ContactResolver,
}

impl Extractor {
    pub fn new(
        session: Arc<AccountSession>,
        chats: Arc<dyn ChatSource>,
        resolver: ContactResolver,
    ) -> Self {
        Self {
            session,
            chats,
            resolver,
        }
    }

    /// Extract members of `group_ids`, one group at a time, in the given order.
    ///
    /// Only fails when the session is not ready. A group that cannot be fetched
    /// is reported through its `GroupResult::error` and the request continues.
    pub async fn extract<I>(&self, group_ids: I) -> Result<ExtractionReport>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.session.ensure_ready().await?;

        let mut report = ExtractionReport::default();
        for group_id in group_ids {
            let (result, entries) = self.extract_group(group_id.as_ref()).await;
            report.groups.push(result);
            report.combined.all.extend(entries);
        }

        info!(
            groups = report.groups.len(),
            failed = report.groups.iter().filter(|g| g.error().is_some()).count(),
            entries = report.combined.all.len(),
            "extraction complete"
        );
        Ok(report)
    }

    async fn extract_group(&self, group_id: &str) -> (GroupResult, Vec<ExtractionEntry>) {
        let chat = match self.chats.fetch_chat(group_id).await {
            Ok(chat) => chat,
            Err(e) => {
                warn!(group_id = group_id, error = %e, "failed to fetch group chat");
                let group = GroupRef {
                    id: group_id.to_string(),
                    name: self.cached_name_or_id(group_id).await,
                };
                return (GroupResult::failed(&group, e.to_string()), Vec::new());
            }
        };

        let group = GroupRef {
            id: group_id.to_string(),
            name: match chat_name(&chat) {
                Some(name) => name,
                None => self.cached_name_or_id(group_id).await,
            },
        };

        let ids = participants::collect(&chat);
        let resolved = self.resolver.resolve(&ids).await;
        let entries: Vec<ExtractionEntry> =
            resolved.iter().map(|r| classify(r, &group)).collect();

        let result = GroupResult::from_entries(&group, &entries);
        info!(
            group_id = group_id,
            participants = ids.len(),
            numbers = result.numbers().len(),
            hidden = result.hidden_ids().len(),
            "group extracted"
        );
        (result, entries)
    }

    async fn cached_name_or_id(&self, group_id: &str) -> String {
        self.session
            .group_name(group_id)
            .await
            .unwrap_or_else(|| group_id.to_string())
    }
}

fn chat_name(chat: &Chat) -> Option<String> {
    let subject = chat.group_metadata.as_ref().and_then(|m| m.subject.as_ref());
    [chat.name.as_ref(), subject]
        .into_iter()
        .flatten()
        .find(|n| !n.trim().is_empty())
        .cloned()
}
