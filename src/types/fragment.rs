//! Raw fragment type for the ingestion pipeline

use std::sync::Arc;

use super::Category;

/// One named, timestamped, delta-encoded slice of the feed.
///
/// This is the fundamental unit produced by a raw source. Fragments are
/// immutable and consumed exactly once by the parser, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFragment {
    /// Feed category
    pub category: Category,

    /// Opaque payload, usually JSON (base64 raw-deflate for `.z` categories)
    pub payload: Arc<[u8]>,

    /// Fragment timestamp in the feed's wire format (RFC 3339 UTC)
    pub timestamp: String,
}

impl RawFragment {
    /// Create a new fragment
    pub fn new(
        category: Category,
        payload: impl Into<Arc<[u8]>>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self { category, payload: payload.into(), timestamp: timestamp.into() }
    }

    /// Create a fragment from a feed category name.
    pub fn from_wire(
        name: &str,
        payload: impl Into<Arc<[u8]>>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self::new(Category::from_wire(name), payload, timestamp)
    }
}
