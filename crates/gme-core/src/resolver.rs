use std::{collections::BTreeSet, sync::Arc, time::Duration};

use futures::future::join_all;
use tracing::{debug, info};

use crate::{
    domain::{CanonicalId, ContactCard, ResolvedParticipant},
    errors::Error,
    ports::ContactDirectory,
    Result,
};

/// Resolves participant ids to display names, one independent lookup per id.
#[derive(Clone)]
pub struct ContactResolver {
    directory: Arc<dyn ContactDirectory>,
    lookup_timeout: Option<Duration>,
}

impl ContactResolver {
    pub fn new(directory: Arc<dyn ContactDirectory>) -> Self {
        Self {
            directory,
            lookup_timeout: None,
        }
    }

    /// Bound each lookup; an expired lookup counts as failed for that id only.
    pub fn with_lookup_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Resolve every id concurrently and wait for all of them to settle.
    ///
    /// Returns exactly one entry per input id, in the set's iteration order. Failed
    /// lookups are kept with `resolution_ok == false` and no display name.
    pub async fn resolve(&self, ids: &BTreeSet<CanonicalId>) -> Vec<ResolvedParticipant> {
        let resolved = join_all(ids.iter().map(|id| self.resolve_one(id))).await;

        let failed = resolved.iter().filter(|r| !r.resolution_ok).count();
        info!(
            requested = ids.len(),
            failed = failed,
            "contact resolution complete"
        );
        resolved
    }

    async fn resolve_one(&self, id: &CanonicalId) -> ResolvedParticipant {
        match self.lookup(id).await {
            Ok(card) => ResolvedParticipant::resolved(id.clone(), display_name(&card)),
            Err(e) => {
                debug!(id = %id, error = %e, "contact lookup failed");
                ResolvedParticipant::failed(id.clone())
            }
        }
    }

    async fn lookup(&self, id: &CanonicalId) -> Result<ContactCard> {
        let Some(limit) = self.lookup_timeout else {
            return self.directory.lookup(id).await;
        };
        match tokio::time::timeout(limit, self.directory.lookup(id)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::External(format!(
                "contact lookup timed out after {}ms",
                limit.as_millis()
            ))),
        }
    }
}

/// Display name policy: push name, then contact name, then raw number.
pub fn display_name(card: &ContactCard) -> Option<String> {
    [&card.pushname, &card.name, &card.number]
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeContacts {
        cards: HashMap<String, ContactCard>,
        hang: Vec<String>,
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl FakeContacts {
        fn with(cards: &[(&str, ContactCard)]) -> Self {
            Self {
                cards: cards
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ContactDirectory for FakeContacts {
        async fn lookup(&self, id: &CanonicalId) -> Result<ContactCard> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if self.hang.iter().any(|h| h == id.as_str()) {
                std::future::pending::<()>().await;
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.cards
                .get(id.as_str())
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("contact {id}")))
        }
    }

    fn card(pushname: Option<&str>, name: Option<&str>, number: Option<&str>) -> ContactCard {
        ContactCard {
            pushname: pushname.map(str::to_string),
            name: name.map(str::to_string),
            number: number.map(str::to_string),
        }
    }

    fn id_set(ids: &[&str]) -> BTreeSet<CanonicalId> {
        ids.iter().filter_map(|s| CanonicalId::parse(s)).collect()
    }

    #[test]
    fn display_name_priority() {
        assert_eq!(
            display_name(&card(Some("Push"), Some("Saved"), Some("1"))),
            Some("Push".to_string())
        );
        assert_eq!(
            display_name(&card(None, Some("Saved"), Some("1"))),
            Some("Saved".to_string())
        );
        assert_eq!(
            display_name(&card(Some("  "), None, Some("1"))),
            Some("1".to_string())
        );
        assert_eq!(display_name(&card(None, None, None)), None);
    }

    #[tokio::test]
    async fn failed_lookups_are_kept() {
        let contacts = Arc::new(FakeContacts::with(&[(
            "1@c.us",
            card(Some("Alice"), None, None),
        )]));
        let resolver = ContactResolver::new(contacts.clone());

        let out = resolver.resolve(&id_set(&["1@c.us", "2@c.us", "X@lid"])).await;
        assert_eq!(out.len(), 3);
        assert_eq!(contacts.calls.load(Ordering::SeqCst), 3);

        assert_eq!(out[0].id.as_str(), "1@c.us");
        assert_eq!(out[0].display_name.as_deref(), Some("Alice"));
        assert!(out[0].resolution_ok);

        for r in &out[1..] {
            assert_eq!(r.display_name, None);
            assert!(!r.resolution_ok);
        }
    }

    #[tokio::test]
    async fn empty_card_is_a_successful_lookup() {
        let contacts = Arc::new(FakeContacts::with(&[("1@c.us", ContactCard::default())]));
        let out = ContactResolver::new(contacts)
            .resolve(&id_set(&["1@c.us"]))
            .await;
        assert_eq!(out, vec![ResolvedParticipant {
            id: CanonicalId::parse("1@c.us").unwrap(),
            display_name: None,
            resolution_ok: true,
        }]);
    }

    #[tokio::test]
    async fn lookups_run_concurrently() {
        let mut fake = FakeContacts::with(&[
            ("1@c.us", card(Some("a"), None, None)),
            ("2@c.us", card(Some("b"), None, None)),
            ("3@c.us", card(Some("c"), None, None)),
        ]);
        fake.delay = Duration::from_millis(20);
        let contacts = Arc::new(fake);

        let out = ContactResolver::new(contacts.clone())
            .resolve(&id_set(&["1@c.us", "2@c.us", "3@c.us"]))
            .await;
        assert_eq!(out.len(), 3);
        assert_eq!(contacts.max_in_flight.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn timeout_fails_only_the_hung_lookup() {
        let mut fake = FakeContacts::with(&[("1@c.us", card(None, Some("Bob"), None))]);
        fake.hang = vec!["H@lid".to_string()];
        let resolver = ContactResolver::new(Arc::new(fake))
            .with_lookup_timeout(Some(Duration::from_millis(50)));

        let out = resolver.resolve(&id_set(&["1@c.us", "H@lid"])).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].display_name.as_deref(), Some("Bob"));
        assert!(out[0].resolution_ok);
        assert_eq!(out[1].id.as_str(), "H@lid");
        assert!(!out[1].resolution_ok);
    }

    #[tokio::test]
    async fn empty_input_resolves_to_nothing() {
        let out = ContactResolver::new(Arc::new(FakeContacts::default()))
            .resolve(&BTreeSet::new())
            .await;
        assert!(out.is_empty());
    }
}
