use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::game::note::{NoteDescriptor, NoteId};

/// On-disk shape of the normalized note list an importer writes.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ChartFile {
    #[serde(default)]
    notes: Vec<NoteDescriptor>,
}

/// Immutable, time-ordered note list for one song.
///
/// Lane and time validity are deliberately not checked here; the scheduler
/// rejects bad descriptors when it reaches them so one broken note does not
/// keep the whole song from loading.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Chart {
    notes: Vec<NoteDescriptor>,
}

impl Chart {
    pub fn new(mut notes: Vec<NoteDescriptor>) -> Self {
        // Stable, so simultaneous notes keep the importer's order. NaN times
        // sort last and are rejected at spawn.
        notes.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { notes }
    }

    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let file: ChartFile = serde_json::from_str(json)?;
        Ok(Self::new(file.notes))
    }

    pub fn from_json_file(path: &Path) -> EngineResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            EngineError::Chart(format!("failed to read '{}': {e}", path.display()))
        })?;
        let chart = Self::from_json_str(&text)?;
        info!(
            "Loaded chart '{}' with {} notes.",
            path.display(),
            chart.len()
        );
        Ok(chart)
    }

    pub fn to_json_string(&self) -> EngineResult<String> {
        let file = ChartFile {
            notes: self.notes.clone(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> {
        fs::write(path, self.to_json_string()?)?;
        debug!("Wrote chart with {} notes to '{}'.", self.len(), path.display());
        Ok(())
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    #[inline(always)]
    pub fn get(&self, id: NoteId) -> Option<&NoteDescriptor> {
        self.notes.get(id.0)
    }

    pub fn notes(&self) -> &[NoteDescriptor] {
        &self.notes
    }

    /// Time of the last note end (hold tails included), or 0 for an empty chart.
    pub fn last_end_time(&self) -> f32 {
        self.notes
            .iter()
            .map(NoteDescriptor::end_time)
            .filter(|t| t.is_finite())
            .fold(0.0, f32::max)
    }
}
