//! Release pacing mode for the replay scheduler

use serde::{Deserialize, Serialize};

/// How the scheduler releases parsed messages to the output queues
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowMode {
    /// Forward every message as soon as it is parsed (archival pre-fetch)
    StraightThrough,

    /// Reproduce the original spacing between message timestamps
    #[default]
    Realtime,
}

impl FlowMode {
    /// Whether releases wait on the virtual clock
    pub fn is_paced(self) -> bool {
        matches!(self, FlowMode::Realtime)
    }
}
