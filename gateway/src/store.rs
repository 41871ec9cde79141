//! Document store for market price records and AI recommendation rows.
//!
//! Each collection is an ordered map guarded by a read-write lock. With a
//! filesystem store every write rewrites the collection file while the lock
//! is held, so readers never observe a state that is not on disk.

use crate::config::StoreConfig;
use chrono::{SecondsFormat, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

const MARKET_RECORDS_FILE: &str = "agmarknet_records.json";
const RECOMMENDATIONS_FILE: &str = "ai_recommendations.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> &str;
}

pub struct Collection<T> {
    path: Option<PathBuf>,
    documents: RwLock<IndexMap<String, T>>,
}

impl<T: Document> Collection<T> {
    pub fn in_memory() -> Self {
        Collection {
            path: None,
            documents: RwLock::new(IndexMap::new()),
        }
    }

    /// Opens the collection stored at `path`, starting empty if the file
    /// does not exist yet.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let documents = match File::open(&path) {
            Ok(file) => {
                let stored: Vec<T> = serde_json::from_reader(BufReader::new(file))?;
                stored
                    .into_iter()
                    .map(|document| (document.id().to_string(), document))
                    .collect()
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => IndexMap::new(),
            Err(err) => return Err(err.into()),
        };

        info!(path = %path.display(), documents = documents.len(), "opened collection");
        Ok(Collection {
            path: Some(path),
            documents: RwLock::new(documents),
        })
    }

    fn persist(&self, documents: &IndexMap<String, T>) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let tmp = path.with_extension("json.tmp");
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut writer, &documents.values().collect::<Vec<_>>())?;
        writer.flush()?;
        drop(writer);
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All documents in insertion order.
    pub fn list(&self) -> Vec<T> {
        self.documents.read().values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.documents.read().get(id).cloned()
    }

    pub fn insert(&self, document: T) -> Result<T, StoreError> {
        let mut documents = self.documents.write();
        let id = document.id().to_string();
        let previous = documents.insert(id.clone(), document.clone());
        if let Err(err) = self.persist(&documents) {
            match previous {
                Some(previous) => documents.insert(id, previous),
                None => documents.shift_remove(&id),
            };
            return Err(err);
        }
        Ok(document)
    }

    /// Replaces the document with `id` by `update(current)`. `Ok(None)`
    /// when there is no such document.
    pub fn update<F>(&self, id: &str, update: F) -> Result<Option<T>, StoreError>
    where
        F: FnOnce(&T) -> T,
    {
        let mut documents = self.documents.write();
        let Some(slot) = documents.get_mut(id) else {
            return Ok(None);
        };
        let updated = update(slot);
        let previous = std::mem::replace(slot, updated.clone());
        if let Err(err) = self.persist(&documents) {
            if let Some(slot) = documents.get_mut(id) {
                *slot = previous;
            }
            return Err(err);
        }
        Ok(Some(updated))
    }

    pub fn remove(&self, id: &str) -> Result<Option<T>, StoreError> {
        let mut documents = self.documents.write();
        let Some((index, _, removed)) = documents.shift_remove_full(id) else {
            return Ok(None);
        };
        if let Err(err) = self.persist(&documents) {
            documents.shift_insert(index, id.to_string(), removed);
            return Err(err);
        }
        Ok(Some(removed))
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// A market price row saved by a user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub commodity: String,
    pub market: String,
    pub state: String,
    pub district: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variety: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    pub arrival_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modal_price: Option<f64>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

impl Document for MarketRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Client supplied fields of a [`MarketRecord`]. Strings are trimmed and
/// blank strings count as absent.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MarketRecordFields {
    pub commodity: Option<String>,
    pub market: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub variety: Option<String>,
    pub grade: Option<String>,
    pub arrival_date: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub modal_price: Option<f64>,
}

impl MarketRecordFields {
    /// A new record, or `None` if a required field is missing.
    pub fn create(&self) -> Option<MarketRecord> {
        Some(MarketRecord {
            id: new_id(),
            commodity: trimmed(&self.commodity)?,
            market: trimmed(&self.market)?,
            state: trimmed(&self.state)?,
            district: trimmed(&self.district)?,
            variety: trimmed(&self.variety),
            grade: trimmed(&self.grade),
            arrival_date: trimmed(&self.arrival_date)?,
            min_price: self.min_price,
            max_price: self.max_price,
            modal_price: self.modal_price,
            created_at: now(),
        })
    }

    /// True when the update would blank out a required field.
    pub fn clears_required(&self) -> bool {
        [
            &self.commodity,
            &self.market,
            &self.state,
            &self.district,
            &self.arrival_date,
        ]
        .into_iter()
        .any(|value| value.is_some() && trimmed(value).is_none())
    }

    /// `record` with every provided field replaced.
    pub fn apply(&self, record: &MarketRecord) -> MarketRecord {
        MarketRecord {
            id: record.id.clone(),
            commodity: trimmed(&self.commodity).unwrap_or_else(|| record.commodity.clone()),
            market: trimmed(&self.market).unwrap_or_else(|| record.market.clone()),
            state: trimmed(&self.state).unwrap_or_else(|| record.state.clone()),
            district: trimmed(&self.district).unwrap_or_else(|| record.district.clone()),
            variety: trimmed(&self.variety).or_else(|| record.variety.clone()),
            grade: trimmed(&self.grade).or_else(|| record.grade.clone()),
            arrival_date: trimmed(&self.arrival_date)
                .unwrap_or_else(|| record.arrival_date.clone()),
            min_price: self.min_price.or(record.min_price),
            max_price: self.max_price.or(record.max_price),
            modal_price: self.modal_price.or(record.modal_price),
            created_at: record.created_at.clone(),
        }
    }
}

/// An AI crop recommendation the user chose to keep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiRecommendation {
    #[serde(rename = "_id")]
    pub id: String,
    pub crop_name: String,
    pub suitability_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_yield: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_need: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_demand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advantages: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub considerations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub recommended_at: String,
}

impl Document for AiRecommendation {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiRecommendationFields {
    pub crop_name: Option<String>,
    pub suitability_score: Option<f64>,
    pub expected_yield: Option<String>,
    pub season: Option<String>,
    pub water_need: Option<String>,
    pub market_demand: Option<String>,
    pub investment: Option<String>,
    pub advantages: Option<String>,
    pub considerations: Option<String>,
    pub region: Option<String>,
}

impl AiRecommendationFields {
    pub fn create(&self) -> Option<AiRecommendation> {
        Some(AiRecommendation {
            id: new_id(),
            crop_name: trimmed(&self.crop_name)?,
            suitability_score: self.suitability_score?,
            expected_yield: self.expected_yield.clone(),
            season: self.season.clone(),
            water_need: self.water_need.clone(),
            market_demand: self.market_demand.clone(),
            investment: self.investment.clone(),
            advantages: self.advantages.clone(),
            considerations: self.considerations.clone(),
            region: self.region.clone(),
            recommended_at: now(),
        })
    }
}

pub struct Store {
    pub market_records: Collection<MarketRecord>,
    pub recommendations: Collection<AiRecommendation>,
}

impl Store {
    pub fn in_memory() -> Self {
        Store {
            market_records: Collection::in_memory(),
            recommendations: Collection::in_memory(),
        }
    }

    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        match config {
            StoreConfig::Memory => Ok(Self::in_memory()),
            StoreConfig::Filesystem { base_dir } => Self::open_dir(Path::new(base_dir)),
        }
    }

    fn open_dir(base_dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(base_dir)?;
        Ok(Store {
            market_records: Collection::open(base_dir.join(MARKET_RECORDS_FILE))?,
            recommendations: Collection::open(base_dir.join(RECOMMENDATIONS_FILE))?,
        })
    }

    /// Storage backend name reported by the health endpoints.
    pub fn backend(&self) -> &'static str {
        if self.market_records.path.is_some() {
            "filesystem"
        } else {
            "memory"
        }
    }
}
