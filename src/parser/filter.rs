//! Driver selection for telemetry output

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// Shared set of car numbers whose telemetry is emitted.
///
/// The session handle and the parser task hold clones of the same filter, so
/// a selection change applies from the next decoded fragment onward. An
/// unset filter passes every driver.
#[derive(Debug, Clone, Default)]
pub struct TelemetryFilter {
    selected: Arc<Mutex<Option<HashSet<u32>>>>,
}

impl TelemetryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict telemetry to `numbers`. An empty slice suppresses all telemetry.
    pub fn select(&self, numbers: &[u32]) {
        let mut selected = self.selected.lock().unwrap_or_else(PoisonError::into_inner);
        *selected = Some(numbers.iter().copied().collect());
    }

    /// Pass every driver again.
    pub fn clear(&self) {
        *self.selected.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn allows(&self, number: u32) -> bool {
        match &*self.selected.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(selected) => selected.contains(&number),
            None => true,
        }
    }

    /// Current selection, `None` when every driver passes.
    pub fn selection(&self) -> Option<Vec<u32>> {
        let selected = self.selected.lock().unwrap_or_else(PoisonError::into_inner);
        selected.as_ref().map(|set| {
            let mut numbers: Vec<u32> = set.iter().copied().collect();
            numbers.sort_unstable();
            numbers
        })
    }
}
