use tracing::{debug, info, warn};

use super::backend::HistoryBackend;
use super::types::{AnalysisRecord, HistoryLog, HISTORY_CAPACITY};
use crate::captions::{CaptionSet, ImageData};
use crate::error::PersistenceError;

/// Bounded, most-recent-first log of completed analyses.
///
/// Every mutation writes the whole capped log back to the backend before
/// returning. Persistence failures are logged and absorbed: reads degrade to
/// an empty log, writes leave the in-memory log authoritative.
pub struct HistoryStore {
    backend: Box<dyn HistoryBackend>,
    records: HistoryLog,
}

impl HistoryStore {
    /// Load the persisted log. Missing or corrupt data yields an empty log.
    pub fn load(backend: Box<dyn HistoryBackend>) -> Self {
        let records = match backend.read() {
            Ok(Some(payload)) => match decode(&payload) {
                Ok(mut records) => {
                    records.truncate(HISTORY_CAPACITY);
                    info!("Loaded {} history records", records.len());
                    records
                }
                Err(e) => {
                    warn!("{}; starting with empty history", e);
                    Vec::new()
                }
            },
            Ok(None) => {
                debug!("No persisted history found");
                Vec::new()
            }
            Err(e) => {
                warn!("{}; starting with empty history", e);
                Vec::new()
            }
        };

        Self { backend, records }
    }

    /// Records, newest first.
    pub fn records(&self) -> &[AnalysisRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&AnalysisRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Timestamp of the newest record, if any.
    pub fn latest_timestamp(&self) -> Option<i64> {
        self.records.first().map(|r| r.timestamp)
    }

    /// Insert at the head, evicting from the tail beyond capacity.
    pub fn append(&mut self, record: AnalysisRecord) {
        info!("Appending history record {}", record.id);
        self.records.insert(0, record);
        if self.records.len() > HISTORY_CAPACITY {
            let evicted = self.records.split_off(HISTORY_CAPACITY);
            for old in &evicted {
                debug!("Evicted history record {}", old.id);
            }
        }
        self.persist();
    }

    /// Overwrite captions on every record whose image bytes match exactly.
    /// Returns how many records were updated.
    pub fn update_captions_by_image(&mut self, image: &ImageData, captions: &CaptionSet) -> usize {
        let mut updated = 0;
        for record in self.records.iter_mut().filter(|r| r.image_data == *image) {
            record.captions = captions.clone();
            updated += 1;
        }

        if updated > 0 {
            info!("Updated captions on {} history record(s)", updated);
            self.persist();
        }
        updated
    }

    /// Delete the record with this id. Returns false if it was not present.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        if self.records.len() == before {
            debug!("No history record with id {}", id);
            return false;
        }

        info!("Removed history record {}", id);
        self.persist();
        true
    }

    /// Empty the log and delete the persisted record.
    pub fn clear(&mut self) {
        self.records.clear();
        if let Err(e) = self.backend.remove() {
            warn!("{}", e);
        }
        info!("Cleared history");
    }

    fn persist(&self) {
        let result = serde_json::to_string(&self.records)
            .map_err(|e| PersistenceError::Write(e.to_string()))
            .and_then(|payload| self.backend.write(&payload));
        if let Err(e) = result {
            warn!("{}", e);
        }
    }
}

fn decode(payload: &str) -> Result<HistoryLog, PersistenceError> {
    serde_json::from_str(payload).map_err(|e| PersistenceError::Decode(e.to_string()))
}
