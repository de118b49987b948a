use serde::{Deserialize, Serialize};

use crate::captions::{CaptionSet, ImageData};

/// Maximum number of analyses kept in history.
pub const HISTORY_CAPACITY: usize = 15;

/// One completed analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: String,
    pub image_data: ImageData,
    pub captions: CaptionSet,
    /// Creation time in epoch milliseconds.
    pub timestamp: i64,
}

/// Most-recent-first sequence of records.
pub type HistoryLog = Vec<AnalysisRecord>;
