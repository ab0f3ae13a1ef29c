//! Account bridge adapter (HTTP).
//!
//! The bridge process owns the messaging account connection (QR pairing, reconnects).
//! This crate implements the `gme-core` ChatSource / ContactDirectory ports over
//! its JSON API:
//!
//! - `GET /session`        -> `{ "state": "ready" | "qr" | "authenticating" | "disconnected" }`
//! - `GET /groups`         -> `[GroupSummary]`
//! - `GET /chats/{id}`     -> `Chat`
//! - `GET /contacts/{id}`  -> `ContactCard`

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};
use tokio::time::sleep;
use tracing::{debug, info};

use gme_core::{
    domain::{CanonicalId, Chat, ContactCard, GroupSummary},
    errors::Error,
    ports::{ChatSource, ContactDirectory},
    session::AccountSession,
    Result,
};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Account state as reported by the bridge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BridgeState {
    Ready,
    Authenticating,
    Disconnected,
    Unknown(String),
}

impl BridgeState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "ready" | "connected" => BridgeState::Ready,
            "qr" | "authenticating" | "loading" | "pairing" => BridgeState::Authenticating,
            "disconnected" | "logged_out" => BridgeState::Disconnected,
            other => BridgeState::Unknown(other.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct SessionStatus {
    state: String,
}

#[derive(Clone, Debug)]
pub struct BridgeClient {
    base_url: Url,
    token: Option<String>,
    http: reqwest::Client,
}

impl BridgeClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid bridge url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "bridge url cannot be used as a base: {base_url}"
            )));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("bridge client build failed: {e}")))?;
        Ok(Self {
            base_url,
            token,
            http,
        })
    }

    pub async fn session_state(&self) -> Result<BridgeState> {
        let status: SessionStatus = self.get_json(&["session"], "session").await?;
        Ok(BridgeState::parse(&status.state))
    }

    /// Drive `session` to `Ready` once the bridge reports a paired account.
    ///
    /// Gives up after `timeout`, leaving the session `Disconnected`.
    pub async fn wait_until_ready(
        &self,
        session: &AccountSession,
        timeout: Duration,
    ) -> Result<()> {
        session.begin_authentication().await?;
        let started = Instant::now();

        loop {
            match self.session_state().await {
                Ok(BridgeState::Ready) => {
                    session.mark_ready().await?;
                    info!("bridge account ready");
                    return Ok(());
                }
                Ok(state) => debug!(state = ?state, "bridge account not ready yet"),
                Err(e) => debug!(error = %e, "bridge session poll failed"),
            }

            if started.elapsed() >= timeout {
                session.disconnect().await;
                return Err(Error::External(format!(
                    "bridge account not ready after {}s (pair the account in the bridge first)",
                    timeout.as_secs()
                )));
            }
            sleep(READY_POLL_INTERVAL.min(timeout)).await;
        }
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str], what: &str) -> Result<T> {
        const MAX_RETRIES: usize = 1;
        let url = self.url(segments);
        let mut attempts = 0usize;

        loop {
            let mut req = self.http.get(url.clone());
            if let Some(token) = &self.token {
                req = req.bearer_auth(token);
            }
            let resp = req
                .send()
                .await
                .map_err(|e| Error::External(format!("bridge request error ({what}): {e}")))?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS && attempts < MAX_RETRIES {
                attempts += 1;
                sleep(retry_after(&resp).unwrap_or(READY_POLL_INTERVAL)).await;
                continue;
            }
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(status_error(status, what, &body));
            }

            return resp
                .json::<T>()
                .await
                .map_err(|e| Error::External(format!("bridge json error ({what}): {e}")));
        }
    }
}

fn retry_after(resp: &reqwest::Response) -> Option<Duration> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn status_error(status: StatusCode, what: &str, body: &str) -> Error {
    if status == StatusCode::NOT_FOUND {
        return Error::NotFound(what.to_string());
    }
    Error::External(format!(
        "bridge request failed ({what}): {status} {}",
        body.chars().take(200).collect::<String>()
    ))
}

#[async_trait]
impl ChatSource for BridgeClient {
    async fn fetch_chat(&self, chat_id: &str) -> Result<Chat> {
        self.get_json(&["chats", chat_id], &format!("chat {chat_id}"))
            .await
    }

    async fn list_groups(&self) -> Result<Vec<GroupSummary>> {
        self.get_json(&["groups"], "groups").await
    }
}

#[async_trait]
impl ContactDirectory for BridgeClient {
    async fn lookup(&self, id: &CanonicalId) -> Result<ContactCard> {
        self.get_json(&["contacts", id.as_str()], &format!("contact {id}"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gme_core::session::SessionState;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    type Route = (&'static str, u16, &'static str);

    /// One-shot-per-connection HTTP stub answering fixed JSON bodies by path.
    async fn stub_bridge(routes: Vec<Route>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let routes = routes.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let n = sock.read(&mut buf).await.unwrap_or(0);
                    let req = String::from_utf8_lossy(&buf[..n]).to_string();
                    let path = req.split_whitespace().nth(1).unwrap_or("/").to_string();
                    let (status, body) = routes
                        .iter()
                        .find(|(p, _, _)| *p == path)
                        .map(|(_, s, b)| (*s, *b))
                        .unwrap_or((404, "{}"));
                    let resp = format!(
                        "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = sock.write_all(resp.as_bytes()).await;
                    let _ = sock.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn client(base: &str) -> BridgeClient {
        BridgeClient::new(base, Some("t0k".to_string()), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn parses_bridge_states() {
        assert_eq!(BridgeState::parse("READY"), BridgeState::Ready);
        assert_eq!(BridgeState::parse("qr"), BridgeState::Authenticating);
        assert_eq!(BridgeState::parse("logged_out"), BridgeState::Disconnected);
        assert_eq!(
            BridgeState::parse("weird"),
            BridgeState::Unknown("weird".to_string())
        );
    }

    #[test]
    fn builds_encoded_urls() {
        let c = client("http://localhost:3000/api/");
        assert_eq!(
            c.url(&["chats", "G1@g.us"]).as_str(),
            "http://localhost:3000/api/chats/G1@g.us"
        );
        assert_eq!(
            c.url(&["contacts", "a/b c"]).as_str(),
            "http://localhost:3000/api/contacts/a%2Fb%20c"
        );
    }

    #[test]
    fn rejects_bad_base_urls() {
        assert!(matches!(
            BridgeClient::new("not a url", None, Duration::from_secs(1)),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            BridgeClient::new("mailto:x@y.z", None, Duration::from_secs(1)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn maps_status_codes() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "chat G1", ""),
            Error::NotFound(_)
        ));
        let err = status_error(StatusCode::BAD_GATEWAY, "chat G1", &"x".repeat(500));
        let Error::External(msg) = err else {
            panic!("expected external error");
        };
        assert!(msg.contains("502"));
        assert!(msg.len() < 300);
    }

    #[tokio::test]
    async fn serves_ports_over_http() {
        let base = stub_bridge(vec![
            (
                "/chats/G1@g.us",
                200,
                r#"{"id":"G1@g.us","name":"Book club","isGroup":true,"participants":["1@c.us"]}"#,
            ),
            ("/contacts/1@c.us", 200, r#"{"pushname":"Alice"}"#),
            ("/groups", 200, r#"[{"id":"G1@g.us","name":"Book club"}]"#),
        ])
        .await;
        let c = client(&base);

        let chat = c.fetch_chat("G1@g.us").await.unwrap();
        assert_eq!(chat.name.as_deref(), Some("Book club"));
        assert!(chat.is_group);

        let card = c
            .lookup(&CanonicalId::parse("1@c.us").unwrap())
            .await
            .unwrap();
        assert_eq!(card.pushname.as_deref(), Some("Alice"));

        let groups = c.list_groups().await.unwrap();
        assert_eq!(groups.len(), 1);

        assert!(matches!(
            c.fetch_chat("missing@g.us").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn waits_for_ready_bridge() {
        let base = stub_bridge(vec![("/session", 200, r#"{"state":"ready"}"#)]).await;
        let session = AccountSession::new();
        client(&base)
            .wait_until_ready(&session, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(session.state().await, SessionState::Ready);
    }

    #[tokio::test]
    async fn gives_up_when_bridge_never_pairs() {
        let base = stub_bridge(vec![("/session", 200, r#"{"state":"qr"}"#)]).await;
        let session = AccountSession::new();
        let err = client(&base)
            .wait_until_ready(&session, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::External(_)));
        assert_eq!(session.state().await, SessionState::Disconnected);
    }
}
