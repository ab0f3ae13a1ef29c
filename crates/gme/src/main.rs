use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use gme_bridge::BridgeClient;
use gme_core::{
    config::{BackendConfig, Config},
    domain::GroupSummary,
    export::{self, ExportPayload, ExportWriter},
    extraction::Extractor,
    formatting::render_preview,
    ports::{ChatSource, ContactDirectory},
    resolver::ContactResolver,
    session::AccountSession,
    snapshot::SnapshotBackend,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gme_core::logging::init("gme")?;

    let cfg = Config::load()?;
    let session = Arc::new(AccountSession::new());

    let (chats, contacts) = match &cfg.backend {
        BackendConfig::Bridge { url, token } => {
            let bridge = Arc::new(BridgeClient::new(url, token.clone(), cfg.request_timeout)?);
            bridge
                .wait_until_ready(&session, cfg.ready_timeout)
                .await
                .context("account bridge is not ready")?;
            (
                bridge.clone() as Arc<dyn ChatSource>,
                bridge as Arc<dyn ContactDirectory>,
            )
        }
        BackendConfig::Snapshot { path } => {
            let snapshot = Arc::new(
                SnapshotBackend::load(path)
                    .with_context(|| format!("failed to load snapshot {}", path.display()))?,
            );
            // A snapshot is always "paired".
            session.begin_authentication().await?;
            session.mark_ready().await?;
            (
                snapshot.clone() as Arc<dyn ChatSource>,
                snapshot as Arc<dyn ContactDirectory>,
            )
        }
    };

    let cached = session.refresh_groups(chats.as_ref()).await?;
    info!(groups = cached, "group listing loaded");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let group_ids = select_groups(args, &cfg.default_groups, &session.groups().await);
    if group_ids.is_empty() {
        warn!("no groups selected and none available");
        return Ok(());
    }

    let resolver = ContactResolver::new(contacts).with_lookup_timeout(cfg.lookup_timeout);
    let extractor = Extractor::new(session.clone(), chats, resolver);
    let report = extractor.extract(&group_ids).await?;

    println!("{}", render_preview(&report));

    if report.combined.is_empty() {
        println!("Nothing to export.");
        return Ok(());
    }

    let payload = ExportPayload::from_entries(report.combined.all())?;
    let artifact = export::format(&payload, cfg.export_format, &cfg.sheet_name)?;
    let path = ExportWriter::new(&cfg.export_dir)
        .write(&artifact)
        .await
        .context("failed to write export")?;
    println!("Export written: {}", path.display());

    session.disconnect().await;
    Ok(())
}

/// Command-line ids win, then configured defaults, then every cached group.
fn select_groups(args: Vec<String>, defaults: &[String], cached: &[GroupSummary]) -> Vec<String> {
    let args: Vec<String> = args
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();
    if !args.is_empty() {
        return args;
    }
    if !defaults.is_empty() {
        return defaults.to_vec();
    }
    cached.iter().map(|g| g.id.clone()).collect()
}
