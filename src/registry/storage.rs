//! Storage abstraction.
//!
//! One `Storage` trait, two interchangeable implementations chosen by the
//! process-wide `PERSISTENCE_DRIVER` selector: `file` (JSON files under a
//! data directory) and `db` (sqlite, accessed via `tokio::task::spawn_blocking`
//! wrapping `rusqlite`.
//!
//! Per invariant I2, every method here is infallible to its caller: write
//! failures are logged and dropped, read failures degrade to empty.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::domain::{
    HrAction, HrSignal, ModelObservation, ModelRegistryEntry, ModelStatus, TierProfile,
};
use crate::utils::sanitize_filename;

#[derive(Debug, Clone, Default)]
pub struct ModelFilters {
    pub status: Option<Vec<ModelStatus>>,
    pub provider: Option<String>,
    pub tiers: Option<Vec<TierProfile>>,
    pub task_type: Option<String>,
    pub include_disabled: bool,
}

impl ModelFilters {
    fn matches(&self, entry: &ModelRegistryEntry) -> bool {
        if !self.include_disabled
            && entry.identity.status == ModelStatus::Disabled
            && self
                .status
                .as_ref()
                .map(|s| !s.contains(&ModelStatus::Disabled))
                .unwrap_or(true)
        {
            return false;
        }
        if let Some(statuses) = &self.status {
            if !statuses.contains(&entry.identity.status) {
                return false;
            }
        }
        if let Some(provider) = &self.provider {
            if &entry.identity.provider != provider {
                return false;
            }
        }
        if let Some(tiers) = &self.tiers {
            if let Some(allowed) = &entry.governance.allowed_tiers {
                if !tiers.iter().any(|t| allowed.contains(t)) {
                    return false;
                }
            }
        }
        if let Some(task_type) = &self.task_type {
            if !entry.expertise.contains_key(task_type) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn list_models(&self, filters: &ModelFilters) -> Vec<ModelRegistryEntry>;
    async fn get_model(&self, id_or_alias: &str) -> Option<ModelRegistryEntry>;
    async fn upsert_model(&self, entry: ModelRegistryEntry) -> ModelRegistryEntry;
    async fn upsert_model_replacing(
        &self,
        entry: ModelRegistryEntry,
        old_id: &str,
    ) -> ModelRegistryEntry;
    async fn disable_model(&self, id: &str, reason: &str) -> Option<ModelRegistryEntry>;
    async fn set_model_status(&self, id: &str, status: ModelStatus) -> Option<ModelRegistryEntry>;

    async fn append_observation(&self, obs: ModelObservation, cap: usize);
    async fn list_observations(&self, model_id: &str) -> Vec<ModelObservation>;

    async fn append_signal(&self, signal: HrSignal);
    async fn list_signals(&self, model_id: Option<&str>, retention_days: i64) -> Vec<HrSignal>;

    async fn record_fallback_event(&self);
    async fn fallback_count_24h(&self) -> u64;

    async fn enqueue_action(&self, action: HrAction);
    async fn list_actions(&self, limit: usize, retention_days: i64) -> Vec<HrAction>;
    async fn get_action(&self, id: &str) -> Option<HrAction>;
    async fn update_action(&self, action: HrAction);
}

fn resolve<'a>(entries: &'a [ModelRegistryEntry], id_or_alias: &str) -> Option<&'a ModelRegistryEntry> {
    entries
        .iter()
        .find(|e| e.id == id_or_alias)
        .or_else(|| entries.iter().find(|e| e.identity.model_id == id_or_alias))
        .or_else(|| entries.iter().find(|e| e.identity.aliases.iter().any(|a| a == id_or_alias)))
}

// ---------------------------------------------------------------------
// File driver
// ---------------------------------------------------------------------

#[derive(Default, Serialize, Deserialize)]
struct FileState {
    models: Vec<ModelRegistryEntry>,
    signals: Vec<HrSignal>,
    actions: Vec<HrAction>,
    #[serde(default)]
    observations: HashMap<String, Vec<ModelObservation>>,
    #[serde(default)]
    fallback_events: Vec<DateTime<Utc>>,
}

/// `models.json`, `observations/<safeId>.json`, `priors/<safeId>.json`,
/// `signals.jsonl`, `actions.jsonl`, `registry-fallback.jsonl` under a data
/// directory. Kept in one in-memory `FileState` behind a mutex and
/// flushed to a single `state.json` for simplicity of this implementation;
/// the per-model observation/prior split is preserved logically through the
/// `observations` map keyed by the sanitised canonical id.
pub struct FileStorage {
    root: PathBuf,
    state: Mutex<FileState>,
}

impl FileStorage {
    pub async fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        if let Err(e) = tokio::fs::create_dir_all(&root).await {
            tracing::warn!(error = %e, path = ?root, "failed to create model-hr data dir");
        }
        let state = Self::load(&root).await.unwrap_or_default();
        Self {
            root,
            state: Mutex::new(state),
        }
    }

    fn state_path(root: &Path) -> PathBuf {
        root.join("state.json")
    }

    async fn load(root: &Path) -> Option<FileState> {
        let path = Self::state_path(root);
        let raw = tokio::fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str(&raw) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse model-hr state.json, degrading to empty");
                None
            }
        }
    }

    async fn persist(&self, state: &FileState) {
        let path = Self::state_path(&self.root);
        match serde_json::to_string_pretty(state) {
            Ok(json) => {
                if let Err(e) = tokio::fs::write(&path, json).await {
                    tracing::warn!(error = %e, path = ?path, "failed to persist model-hr state (I2: swallowed)");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize model-hr state (I2: swallowed)");
            }
        }
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn list_models(&self, filters: &ModelFilters) -> Vec<ModelRegistryEntry> {
        let state = self.state.lock().await;
        let mut out: Vec<ModelRegistryEntry> = state
            .models
            .iter()
            .filter(|e| filters.matches(e))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    async fn get_model(&self, id_or_alias: &str) -> Option<ModelRegistryEntry> {
        let state = self.state.lock().await;
        resolve(&state.models, id_or_alias).cloned()
    }

    async fn upsert_model(&self, mut entry: ModelRegistryEntry) -> ModelRegistryEntry {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.models.iter().find(|e| e.id == entry.id) {
            entry.created_at = existing.created_at;
        }
        entry.updated_at = crate::domain::now();
        if let Some(idx) = state.models.iter().position(|e| e.id == entry.id) {
            state.models[idx] = entry.clone();
        } else {
            state.models.push(entry.clone());
        }
        let snapshot = FileState {
            models: state.models.clone(),
            signals: state.signals.clone(),
            actions: state.actions.clone(),
            observations: state.observations.clone(),
            fallback_events: state.fallback_events.clone(),
        };
        drop(state);
        self.persist(&snapshot).await;
        entry
    }

    async fn upsert_model_replacing(
        &self,
        mut entry: ModelRegistryEntry,
        old_id: &str,
    ) -> ModelRegistryEntry {
        let mut state = self.state.lock().await;
        state.models.retain(|e| e.id != old_id);
        entry.updated_at = crate::domain::now();
        state.models.push(entry.clone());
        let snapshot = clone_state(&state);
        drop(state);
        self.persist(&snapshot).await;
        entry
    }

    async fn disable_model(&self, id: &str, reason: &str) -> Option<ModelRegistryEntry> {
        let mut state = self.state.lock().await;
        let idx = state.models.iter().position(|e| e.id == id)?;
        state.models[idx].identity.status = ModelStatus::Disabled;
        state.models[idx].identity.disabled_reason = Some(reason.to_string());
        state.models[idx].identity.disabled_at = Some(crate::domain::now());
        state.models[idx].updated_at = crate::domain::now();
        let result = state.models[idx].clone();
        let snapshot = clone_state(&state);
        drop(state);
        self.persist(&snapshot).await;
        Some(result)
    }

    async fn set_model_status(&self, id: &str, status: ModelStatus) -> Option<ModelRegistryEntry> {
        let mut state = self.state.lock().await;
        let idx = state.models.iter().position(|e| e.id == id)?;
        state.models[idx].identity.status = status;
        state.models[idx].identity.disabled_reason = None;
        state.models[idx].identity.disabled_at = None;
        state.models[idx].updated_at = crate::domain::now();
        let result = state.models[idx].clone();
        let snapshot = clone_state(&state);
        drop(state);
        self.persist(&snapshot).await;
        Some(result)
    }

    async fn append_observation(&self, obs: ModelObservation, cap: usize) {
        let mut state = self.state.lock().await;
        let key = sanitize_filename(&obs.model_id);
        let list = state.observations.entry(key).or_default();
        list.push(obs);
        if list.len() > cap {
            let drop_n = list.len() - cap;
            list.drain(0..drop_n);
        }
        let snapshot = clone_state(&state);
        drop(state);
        self.persist(&snapshot).await;
    }

    async fn list_observations(&self, model_id: &str) -> Vec<ModelObservation> {
        let state = self.state.lock().await;
        state
            .observations
            .get(&sanitize_filename(model_id))
            .cloned()
            .unwrap_or_default()
    }

    async fn append_signal(&self, signal: HrSignal) {
        let mut state = self.state.lock().await;
        state.signals.push(signal);
        let snapshot = clone_state(&state);
        drop(state);
        self.persist(&snapshot).await;
    }

    async fn list_signals(&self, model_id: Option<&str>, retention_days: i64) -> Vec<HrSignal> {
        let state = self.state.lock().await;
        let cutoff = crate::domain::now() - chrono::Duration::days(retention_days);
        state
            .signals
            .iter()
            .filter(|s| s.ts >= cutoff)
            .filter(|s| model_id.map(|m| s.model_id == m).unwrap_or(true))
            .cloned()
            .collect()
    }

    async fn record_fallback_event(&self) {
        let mut state = self.state.lock().await;
        state.fallback_events.push(crate::domain::now());
        let snapshot = clone_state(&state);
        drop(state);
        self.persist(&snapshot).await;
    }

    async fn fallback_count_24h(&self) -> u64 {
        let state = self.state.lock().await;
        let cutoff = crate::domain::now() - chrono::Duration::hours(24);
        state.fallback_events.iter().filter(|ts| **ts >= cutoff).count() as u64
    }

    async fn enqueue_action(&self, action: HrAction) {
        let mut state = self.state.lock().await;
        state.actions.push(action);
        let snapshot = clone_state(&state);
        drop(state);
        self.persist(&snapshot).await;
    }

    async fn list_actions(&self, limit: usize, retention_days: i64) -> Vec<HrAction> {
        let mut state = self.state.lock().await;
        let cutoff = crate::domain::now() - chrono::Duration::days(retention_days);
        state.actions.retain(|a| !a.is_resolved() || a.ts >= cutoff);
        let mut out = state.actions.clone();
        out.sort_by(|a, b| b.ts.cmp(&a.ts));
        out.truncate(limit);
        out
    }

    async fn get_action(&self, id: &str) -> Option<HrAction> {
        let state = self.state.lock().await;
        state.actions.iter().find(|a| a.id == id).cloned()
    }

    async fn update_action(&self, action: HrAction) {
        let mut state = self.state.lock().await;
        if let Some(idx) = state.actions.iter().position(|a| a.id == action.id) {
            state.actions[idx] = action;
        } else {
            state.actions.push(action);
        }
        let snapshot = clone_state(&state);
        drop(state);
        self.persist(&snapshot).await;
    }
}

fn clone_state(state: &FileState) -> FileState {
    FileState {
        models: state.models.clone(),
        signals: state.signals.clone(),
        actions: state.actions.clone(),
        observations: state.observations.clone(),
        fallback_events: state.fallback_events.clone(),
    }
}

// ---------------------------------------------------------------------
// DB driver
// ---------------------------------------------------------------------

/// Relational storage keyed by canonical id with jsonb-style payload
/// columns. Blocking `rusqlite` calls are wrapped in
/// `spawn_blocking` to keep the
/// synchronous sqlite connection off the async executor.
pub struct DbStorage {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl DbStorage {
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
        let conn = tokio::task::spawn_blocking(move || -> anyhow::Result<rusqlite::Connection> {
            let conn = rusqlite::Connection::open(&path)?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS models (id TEXT PRIMARY KEY, payload TEXT NOT NULL);
                 CREATE TABLE IF NOT EXISTS signals (id INTEGER PRIMARY KEY AUTOINCREMENT, model_id TEXT, ts TEXT, payload TEXT NOT NULL);
                 CREATE TABLE IF NOT EXISTS actions (id TEXT PRIMARY KEY, model_id TEXT, resolved INTEGER, ts TEXT, payload TEXT NOT NULL);
                 CREATE TABLE IF NOT EXISTS observations (id INTEGER PRIMARY KEY AUTOINCREMENT, model_id TEXT, ts TEXT, payload TEXT NOT NULL);
                 CREATE TABLE IF NOT EXISTS fallback_events (id INTEGER PRIMARY KEY AUTOINCREMENT, ts TEXT NOT NULL);",
            )?;
            Ok(conn)
        })
        .await??;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&rusqlite::Connection) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.blocking_lock();
            f(&guard)
        })
        .await?
    }
}

#[async_trait]
impl Storage for DbStorage {
    async fn list_models(&self, filters: &ModelFilters) -> Vec<ModelRegistryEntry> {
        let result = self
            .with_conn(|conn| {
                let mut stmt = conn.prepare("SELECT payload FROM models")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut entries = Vec::new();
                for row in rows {
                    let payload: String = row?;
                    if let Ok(entry) = serde_json::from_str::<ModelRegistryEntry>(&payload) {
                        entries.push(entry);
                    }
                }
                Ok(entries)
            })
            .await;
        match result {
            Ok(mut entries) => {
                entries.retain(|e| filters.matches(e));
                entries.sort_by(|a, b| a.id.cmp(&b.id));
                entries
            }
            Err(e) => {
                tracing::warn!(error = %e, "db list_models failed, degrading to empty (I2)");
                Vec::new()
            }
        }
    }

    async fn get_model(&self, id_or_alias: &str) -> Option<ModelRegistryEntry> {
        let all = self.list_models(&ModelFilters {
            include_disabled: true,
            ..Default::default()
        }).await;
        resolve(&all, id_or_alias).cloned()
    }

    async fn upsert_model(&self, mut entry: ModelRegistryEntry) -> ModelRegistryEntry {
        if let Some(existing) = self.get_model(&entry.id).await {
            entry.created_at = existing.created_at;
        }
        entry.updated_at = crate::domain::now();
        let id = entry.id.clone();
        let payload = match serde_json::to_string(&entry) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize model entry (I2: swallowed)");
                return entry;
            }
        };
        let result = self
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO models (id, payload) VALUES (?1, ?2)
                     ON CONFLICT(id) DO UPDATE SET payload = excluded.payload",
                    rusqlite::params![id, payload],
                )?;
                Ok(())
            })
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "db upsert_model failed (I2: swallowed)");
        }
        entry
    }

    async fn upsert_model_replacing(
        &self,
        mut entry: ModelRegistryEntry,
        old_id: &str,
    ) -> ModelRegistryEntry {
        entry.updated_at = crate::domain::now();
        let new_id = entry.id.clone();
        let old_id = old_id.to_string();
        let payload = serde_json::to_string(&entry).unwrap_or_default();
        let result = self
            .with_conn(move |conn| {
                conn.execute("DELETE FROM models WHERE id = ?1", [old_id])?;
                conn.execute(
                    "INSERT INTO models (id, payload) VALUES (?1, ?2)
                     ON CONFLICT(id) DO UPDATE SET payload = excluded.payload",
                    rusqlite::params![new_id, payload],
                )?;
                Ok(())
            })
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "db upsert_model_replacing failed (I2: swallowed)");
        }
        entry
    }

    async fn disable_model(&self, id: &str, reason: &str) -> Option<ModelRegistryEntry> {
        let mut entry = self.get_model(id).await?;
        entry.identity.status = ModelStatus::Disabled;
        entry.identity.disabled_reason = Some(reason.to_string());
        entry.identity.disabled_at = Some(crate::domain::now());
        Some(self.upsert_model(entry).await)
    }

    async fn set_model_status(&self, id: &str, status: ModelStatus) -> Option<ModelRegistryEntry> {
        let mut entry = self.get_model(id).await?;
        entry.identity.status = status;
        entry.identity.disabled_reason = None;
        entry.identity.disabled_at = None;
        Some(self.upsert_model(entry).await)
    }

    async fn append_observation(&self, obs: ModelObservation, cap: usize) {
        let model_id = obs.model_id.clone();
        let ts = obs.ts.to_rfc3339();
        let payload = match serde_json::to_string(&obs) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize observation (I2: swallowed)");
                return;
            }
        };
        let result = self
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO observations (model_id, ts, payload) VALUES (?1, ?2, ?3)",
                    rusqlite::params![model_id.clone(), ts, payload],
                )?;
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM observations WHERE model_id = ?1",
                    [model_id.clone()],
                    |row| row.get(0),
                )?;
                let cap = cap as i64;
                if count > cap {
                    conn.execute(
                        "DELETE FROM observations WHERE id IN (
                            SELECT id FROM observations WHERE model_id = ?1 ORDER BY id ASC LIMIT ?2
                        )",
                        rusqlite::params![model_id, count - cap],
                    )?;
                }
                Ok(())
            })
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "db append_observation failed (I2: swallowed)");
        }
    }

    async fn list_observations(&self, model_id: &str) -> Vec<ModelObservation> {
        let model_id = model_id.to_string();
        let result = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT payload FROM observations WHERE model_id = ?1 ORDER BY id ASC",
                )?;
                let rows = stmt.query_map([model_id], |row| row.get::<_, String>(0))?;
                let mut out = Vec::new();
                for row in rows {
                    if let Ok(obs) = serde_json::from_str::<ModelObservation>(&row?) {
                        out.push(obs);
                    }
                }
                Ok(out)
            })
            .await;
        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "db list_observations failed, degrading to empty (I2)");
            Vec::new()
        })
    }

    async fn append_signal(&self, signal: HrSignal) {
        let model_id = signal.model_id.clone();
        let ts = signal.ts.to_rfc3339();
        let payload = serde_json::to_string(&signal).unwrap_or_default();
        let result = self
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO signals (model_id, ts, payload) VALUES (?1, ?2, ?3)",
                    rusqlite::params![model_id, ts, payload],
                )?;
                Ok(())
            })
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "db append_signal failed (I2: swallowed)");
        }
    }

    async fn list_signals(&self, model_id: Option<&str>, retention_days: i64) -> Vec<HrSignal> {
        let model_id = model_id.map(|s| s.to_string());
        let cutoff = (crate::domain::now() - chrono::Duration::days(retention_days)).to_rfc3339();
        let result = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare("SELECT payload FROM signals WHERE ts >= ?1")?;
                let rows = stmt.query_map([cutoff], |row| row.get::<_, String>(0))?;
                let mut out = Vec::new();
                for row in rows {
                    if let Ok(sig) = serde_json::from_str::<HrSignal>(&row?) {
                        if model_id.as_deref().map(|m| sig.model_id == m).unwrap_or(true) {
                            out.push(sig);
                        }
                    }
                }
                Ok(out)
            })
            .await;
        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "db list_signals failed, degrading to empty (I2)");
            Vec::new()
        })
    }

    async fn record_fallback_event(&self) {
        let ts = crate::domain::now().to_rfc3339();
        let result = self
            .with_conn(move |conn| {
                conn.execute("INSERT INTO fallback_events (ts) VALUES (?1)", [ts])?;
                Ok(())
            })
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "db record_fallback_event failed (I2: swallowed)");
        }
    }

    async fn fallback_count_24h(&self) -> u64 {
        let cutoff = (crate::domain::now() - chrono::Duration::hours(24)).to_rfc3339();
        let result = self
            .with_conn(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM fallback_events WHERE ts >= ?1",
                    [cutoff],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await;
        result.unwrap_or(0)
    }

    async fn enqueue_action(&self, action: HrAction) {
        self.update_action(action).await;
    }

    async fn list_actions(&self, limit: usize, retention_days: i64) -> Vec<HrAction> {
        let cutoff = (crate::domain::now() - chrono::Duration::days(retention_days)).to_rfc3339();
        let result = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT payload FROM actions WHERE resolved = 0 OR ts >= ?1 ORDER BY ts DESC",
                )?;
                let rows = stmt.query_map([cutoff], |row| row.get::<_, String>(0))?;
                let mut out = Vec::new();
                for row in rows {
                    if let Ok(a) = serde_json::from_str::<HrAction>(&row?) {
                        out.push(a);
                    }
                }
                Ok(out)
            })
            .await;
        let mut out: Vec<HrAction> = result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "db list_actions failed, degrading to empty (I2)");
            Vec::new()
        });
        out.truncate(limit);
        out
    }

    async fn get_action(&self, id: &str) -> Option<HrAction> {
        let id = id.to_string();
        let result = self
            .with_conn(move |conn| {
                let payload: Option<String> = conn
                    .query_row(
                        "SELECT payload FROM actions WHERE id = ?1",
                        [id],
                        |row| row.get(0),
                    )
                    .ok();
                Ok(payload)
            })
            .await;
        result.ok().flatten().and_then(|p| serde_json::from_str(&p).ok())
    }

    async fn update_action(&self, action: HrAction) {
        let id = action.id.clone();
        let model_id = action.model_id.clone();
        let resolved = action.is_resolved() as i64;
        let ts = action.ts.to_rfc3339();
        let payload = match serde_json::to_string(&action) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize HR action (I2: swallowed)");
                return;
            }
        };
        let result = self
            .with_conn(move |conn| {
                conn.execute(
                    "INSERT INTO actions (id, model_id, resolved, ts, payload) VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO UPDATE SET resolved = excluded.resolved, payload = excluded.payload",
                    rusqlite::params![id, model_id, resolved, ts, payload],
                )?;
                Ok(())
            })
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "db update_action failed (I2: swallowed)");
        }
    }
}
