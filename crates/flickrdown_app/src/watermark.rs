use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flickrdown_engine::write_atomic;
use flickrdown_logging::{flickrdown_error, flickrdown_info, flickrdown_warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedWatermark {
    last_processed: DateTime<Utc>,
}

/// End of the last window that was archived without failures.
#[derive(Debug, Clone)]
pub struct WatermarkStore {
    path: PathBuf,
}

impl WatermarkStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when nothing has been saved yet or the file cannot be used.
    pub fn load(&self) -> Option<DateTime<Utc>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return None;
            }
            Err(err) => {
                flickrdown_warn!("Failed to read watermark from {:?}: {}", self.path, err);
                return None;
            }
        };

        let state: PersistedWatermark = match ron::from_str(&content) {
            Ok(state) => state,
            Err(err) => {
                flickrdown_warn!("Failed to parse watermark from {:?}: {}", self.path, err);
                return None;
            }
        };

        flickrdown_info!(
            "Loaded watermark {} from {:?}",
            state.last_processed.to_rfc3339(),
            self.path
        );
        Some(state.last_processed)
    }

    /// Failures are logged; the previous watermark stays in place.
    pub fn save(&self, last_processed: DateTime<Utc>) {
        let state = PersistedWatermark { last_processed };

        let pretty = ron::ser::PrettyConfig::new();
        let content = match ron::ser::to_string_pretty(&state, pretty) {
            Ok(text) => text,
            Err(err) => {
                flickrdown_error!("Failed to serialize watermark: {}", err);
                return;
            }
        };

        if let Err(err) = write_atomic(&self.path, content.as_bytes()) {
            flickrdown_error!("Failed to write watermark to {:?}: {}", self.path, err);
        }
    }
}
