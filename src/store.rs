//! Workbench store: datasets and saved pivots behind an explicit repository.
//!
//! Every mutation goes through a method here and is announced to subscribers
//! as a [`StoreEvent`], in registration order, before the method returns.
//! Persistence is a flat JSON snapshot of the whole state.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{data::Dataset, saved::SavedPivot};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("Pivot not found: {0}")]
    PivotNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot format error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    DatasetAdded(String),
    DatasetUpdated(String),
    /// Dataset id plus the ids of the pivots removed with it.
    DatasetDeleted(String, Vec<String>),
    PivotAdded(String),
    PivotUpdated(String),
    PivotDeleted(String),
    ActiveDatasetChanged(Option<String>),
    ActivePivotChanged(Option<String>),
    Cleared,
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn Fn(&StoreEvent) + Send>;

/// Changes applicable to a saved pivot; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct PivotUpdate {
    pub title: Option<String>,
    pub rows: Option<Vec<String>>,
    pub columns: Option<Vec<String>>,
    pub values: Option<Vec<crate::pivot::PivotValueField>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default)]
    pub datasets: Vec<Dataset>,
    #[serde(default)]
    pub pivots: Vec<SavedPivot>,
}

#[derive(Default)]
pub struct PivotStore {
    datasets: Vec<Dataset>,
    pivots: Vec<SavedPivot>,
    active_dataset: Option<String>,
    active_pivot: Option<String>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl std::fmt::Debug for PivotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PivotStore")
            .field("datasets", &self.datasets.len())
            .field("pivots", &self.pivots.len())
            .field("active_dataset", &self.active_dataset)
            .field("active_pivot", &self.active_pivot)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

impl PivotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl Fn(&StoreEvent) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    fn notify(&self, event: StoreEvent) {
        debug!("Store event: {event:?}");
        for (_, listener) in &self.listeners {
            listener(&event);
        }
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn dataset(&self, id: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.id == id)
    }

    pub fn add_dataset(&mut self, dataset: Dataset) -> String {
        let id = dataset.id.clone();
        self.datasets.push(dataset);
        self.notify(StoreEvent::DatasetAdded(id.clone()));
        id
    }

    /// Applies `change` to a dataset and refreshes its `updated_at`.
    pub fn update_dataset(
        &mut self,
        id: &str,
        change: impl FnOnce(&mut Dataset),
    ) -> StoreResult<()> {
        let dataset = self
            .datasets
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| StoreError::DatasetNotFound(id.to_string()))?;
        change(dataset);
        dataset.row_count = dataset.data.len();
        dataset.updated_at = timestamp();
        self.notify(StoreEvent::DatasetUpdated(id.to_string()));
        Ok(())
    }

    /// Removes a dataset together with every pivot built on it.
    pub fn delete_dataset(&mut self, id: &str) -> StoreResult<()> {
        let position = self
            .datasets
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| StoreError::DatasetNotFound(id.to_string()))?;
        self.datasets.remove(position);

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pivots)
            .into_iter()
            .partition(|p| p.dataset_id == id);
        self.pivots = kept;
        let removed_ids = removed.into_iter().map(|p| p.id).collect::<Vec<_>>();

        if self.active_dataset.as_deref() == Some(id) {
            self.active_dataset = None;
        }
        if let Some(active) = &self.active_pivot
            && removed_ids.contains(active)
        {
            self.active_pivot = None;
        }
        self.notify(StoreEvent::DatasetDeleted(id.to_string(), removed_ids));
        Ok(())
    }

    pub fn pivots(&self) -> &[SavedPivot] {
        &self.pivots
    }

    pub fn pivot(&self, id: &str) -> Option<&SavedPivot> {
        self.pivots.iter().find(|p| p.id == id)
    }

    pub fn pivots_for_dataset<'a>(&'a self, dataset_id: &'a str) -> impl Iterator<Item = &'a SavedPivot> {
        self.pivots.iter().filter(move |p| p.dataset_id == dataset_id)
    }

    /// Stores a pivot; its dataset must already be present.
    pub fn add_pivot(&mut self, pivot: SavedPivot) -> StoreResult<String> {
        if self.dataset(&pivot.dataset_id).is_none() {
            return Err(StoreError::DatasetNotFound(pivot.dataset_id));
        }
        let id = pivot.id.clone();
        self.pivots.push(pivot);
        self.notify(StoreEvent::PivotAdded(id.clone()));
        Ok(id)
    }

    pub fn update_pivot(&mut self, id: &str, update: PivotUpdate) -> StoreResult<()> {
        let pivot = self
            .pivots
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::PivotNotFound(id.to_string()))?;
        if let Some(title) = update.title {
            pivot.title = title;
        }
        if let Some(rows) = update.rows {
            pivot.rows = rows;
        }
        if let Some(columns) = update.columns {
            pivot.columns = columns;
        }
        if let Some(values) = update.values {
            pivot.values = values;
        }
        pivot.updated_at = timestamp();
        self.notify(StoreEvent::PivotUpdated(id.to_string()));
        Ok(())
    }

    pub fn delete_pivot(&mut self, id: &str) -> StoreResult<()> {
        let position = self
            .pivots
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| StoreError::PivotNotFound(id.to_string()))?;
        self.pivots.remove(position);
        if self.active_pivot.as_deref() == Some(id) {
            self.active_pivot = None;
        }
        self.notify(StoreEvent::PivotDeleted(id.to_string()));
        Ok(())
    }

    pub fn active_dataset(&self) -> Option<&Dataset> {
        self.active_dataset.as_deref().and_then(|id| self.dataset(id))
    }

    pub fn set_active_dataset(&mut self, id: Option<&str>) -> StoreResult<()> {
        if let Some(id) = id
            && self.dataset(id).is_none()
        {
            return Err(StoreError::DatasetNotFound(id.to_string()));
        }
        self.active_dataset = id.map(str::to_string);
        self.notify(StoreEvent::ActiveDatasetChanged(self.active_dataset.clone()));
        Ok(())
    }

    pub fn active_pivot(&self) -> Option<&SavedPivot> {
        self.active_pivot.as_deref().and_then(|id| self.pivot(id))
    }

    pub fn set_active_pivot(&mut self, id: Option<&str>) -> StoreResult<()> {
        if let Some(id) = id
            && self.pivot(id).is_none()
        {
            return Err(StoreError::PivotNotFound(id.to_string()));
        }
        self.active_pivot = id.map(str::to_string);
        self.notify(StoreEvent::ActivePivotChanged(self.active_pivot.clone()));
        Ok(())
    }

    pub fn clear(&mut self) {
        self.datasets.clear();
        self.pivots.clear();
        self.active_dataset = None;
        self.active_pivot = None;
        self.notify(StoreEvent::Cleared);
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            datasets: self.datasets.clone(),
            pivots: self.pivots.clone(),
        }
    }

    /// Replaces datasets and pivots; subscribers are kept.
    pub fn restore(&mut self, snapshot: StoreSnapshot) {
        self.datasets = snapshot.datasets;
        self.pivots = snapshot.pivots;
        self.active_dataset = None;
        self.active_pivot = None;
        self.notify(StoreEvent::Loaded);
    }

    pub fn save_snapshot(&self, path: &Path) -> StoreResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &self.snapshot())?;
        writer.flush()?;
        info!(
            "Saved {} dataset(s) and {} pivot(s) to {path:?}",
            self.datasets.len(),
            self.pivots.len()
        );
        Ok(())
    }

    /// Loads a snapshot file; a missing file yields an empty store.
    pub fn load_snapshot(path: &Path) -> StoreResult<Self> {
        let mut store = PivotStore::new();
        if !path.exists() {
            debug!("No store snapshot at {path:?}, starting empty");
            return Ok(store);
        }
        let file = File::open(path)?;
        let snapshot: StoreSnapshot = serde_json::from_reader(BufReader::new(file))?;
        store.restore(snapshot);
        Ok(store)
    }
}
