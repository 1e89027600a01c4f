//! Subcommand implementations.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use serde_json::{json, Value};
use state_config_and_utils::{Config, Paths};
use state_engine::{derive_state_name, DescriptorSource, StaticDescriptorSource};
use state_storage::{DurableStorage, StateStorage, StorageBackends, StorageResult};
use tracing::info;

use crate::Backend;

async fn open_durable(config: &Config, paths: &Paths) -> StorageResult<DurableStorage> {
    DurableStorage::open(
        &config.storage.database_path(paths),
        Duration::from_secs(config.storage.session_ttl_secs),
    )
    .await
}

/// Remove expired records from every backend, then optionally one session's rows.
pub async fn sweep(config: &Config, paths: &Paths, session: Option<&str>) -> anyhow::Result<()> {
    let backends = StorageBackends::from_settings(&config.storage, paths)
        .await
        .context("failed to open storage backends")?;

    let expired = backends.sweep().await.context("sweep failed")?;
    info!(removed = expired, "Expired state records removed");
    println!("expired records removed: {}", expired);

    if let Some(session_id) = session {
        let durable = open_durable(config, paths).await?;
        let removed = durable.delete_session(session_id).await?;
        info!(session_id = %session_id, removed, "Session records removed");
        println!("session {} records removed: {}", session_id, removed);
    }

    Ok(())
}

/// Print one stored state as JSON.
pub async fn inspect(
    config: &Config,
    paths: &Paths,
    session: &str,
    state: &str,
    backend: Backend,
) -> anyhow::Result<()> {
    let output = match backend {
        Backend::Database => {
            let durable = open_durable(config, paths).await?;
            match durable.record(session, state).await? {
                Some(record) => {
                    let data: Value = serde_json::from_slice(&record.data)
                        .context("stored record is not valid JSON")?;
                    json!({ "updated_at": record.updated_at, "data": data })
                }
                None => bail!("no record for state '{}' in session '{}'", state, session),
            }
        }
        Backend::Session => {
            if config.storage.redis_url.is_none() {
                bail!(
                    "no redis_url configured: the session tier is process-local and \
                     cannot be inspected from another process"
                );
            }
            let backends = StorageBackends::from_settings(&config.storage, paths).await?;
            match backends.session.get(session, state).await? {
                Some(data) => json!({ "data": data }),
                None => bail!("no cached state '{}' for session '{}'", state, session),
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// One summary line per declared state, keyed by state name.
pub fn summarize(source: &StaticDescriptorSource) -> anyhow::Result<BTreeMap<String, Value>> {
    let mut states: BTreeMap<String, Value> = BTreeMap::new();
    let mut owners: BTreeMap<String, String> = BTreeMap::new();

    for ident in source.type_idents() {
        let Some(declaration) = source.declaration(ident) else {
            continue;
        };
        let name = declaration
            .descriptor
            .name
            .clone()
            .unwrap_or_else(|| derive_state_name(ident));

        if let Some(other) = owners.insert(name.clone(), ident.to_string()) {
            bail!(
                "state name '{}' is declared by both {} and {}",
                name,
                other,
                ident
            );
        }

        let computed: Vec<&str> = declaration.computed.iter().map(|c| c.name.as_str()).collect();
        states.insert(
            name,
            json!({
                "type": ident,
                "persist": declaration.descriptor.persist,
                "sync": declaration.descriptor.sync,
                "scope": declaration.descriptor.scope,
                "observable": declaration.observable,
                "computed": computed,
                "actions": declaration.actions,
            }),
        );
    }

    Ok(states)
}

/// Load and validate a manifest, then print its states.
pub fn manifest(path: &Path) -> anyhow::Result<()> {
    let source = StaticDescriptorSource::load(path)
        .with_context(|| format!("failed to load manifest {}", path.display()))?;
    let states = summarize(&source)?;

    println!("{}", serde_json::to_string_pretty(&states)?);
    info!(states = states.len(), "Manifest is valid");
    Ok(())
}
