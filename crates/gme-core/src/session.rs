use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use crate::{domain::GroupSummary, errors::Error, ports::ChatSource, Result};

/// Lifecycle of the authenticated messaging account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Authenticating,
    Ready,
    Disconnected,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Authenticating => "authenticating",
            SessionState::Ready => "ready",
            SessionState::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Default)]
struct SessionInner {
    state: SessionState,
    groups: Vec<GroupSummary>,
    groups_refreshed_at: Option<DateTime<Utc>>,
}

/// Account session shared between the lifecycle driver and the extraction pipeline.
///
/// Only the lifecycle driver mutates it (transitions, group cache refresh); the
/// pipeline reads the state and the cached group names.
#[derive(Debug, Default)]
pub struct AccountSession {
    inner: RwLock<SessionInner>,
}

impl AccountSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state
    }

    pub async fn ensure_ready(&self) -> Result<()> {
        match self.state().await {
            SessionState::Ready => Ok(()),
            other => Err(Error::SessionNotReady(other)),
        }
    }

    pub async fn begin_authentication(&self) -> Result<()> {
        self.transition(SessionState::Authenticating, |from| {
            matches!(
                from,
                SessionState::Uninitialized | SessionState::Disconnected
            )
        })
        .await
    }

    pub async fn mark_ready(&self) -> Result<()> {
        self.transition(SessionState::Ready, |from| {
            from == SessionState::Authenticating
        })
        .await
    }

    /// Move to `Disconnected` from any state and drop the group cache.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.write().await;
        inner.state = SessionState::Disconnected;
        inner.groups.clear();
        inner.groups_refreshed_at = None;
        info!("session disconnected");
    }

    /// Replace the group cache with a fresh listing, sorted by name.
    pub async fn refresh_groups(&self, source: &dyn ChatSource) -> Result<usize> {
        self.ensure_ready().await?;

        let mut groups = source.list_groups().await?;
        groups.sort_by_key(|g| g.name.to_lowercase());

        let mut inner = self.inner.write().await;
        // The session may have dropped while the listing was in flight.
        if inner.state != SessionState::Ready {
            return Err(Error::SessionNotReady(inner.state));
        }
        inner.groups = groups;
        inner.groups_refreshed_at = Some(Utc::now());
        info!(groups = inner.groups.len(), "group cache refreshed");
        Ok(inner.groups.len())
    }

    pub async fn groups(&self) -> Vec<GroupSummary> {
        self.inner.read().await.groups.clone()
    }

    pub async fn group_name(&self, group_id: &str) -> Option<String> {
        self.inner
            .read()
            .await
            .groups
            .iter()
            .find(|g| g.id == group_id)
            .map(|g| g.name.clone())
    }

    /// RFC3339 time of the last successful cache refresh.
    pub async fn groups_refreshed_at(&self) -> Option<String> {
        self.inner
            .read()
            .await
            .groups_refreshed_at
            .map(|t| t.to_rfc3339())
    }

    async fn transition(
        &self,
        to: SessionState,
        allowed_from: impl Fn(SessionState) -> bool,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let from = inner.state;
        if !allowed_from(from) {
            return Err(Error::InvalidTransition { from, to });
        }
        inner.state = to;
        info!(from = %from, to = %to, "session state changed");
        Ok(())
    }
}
