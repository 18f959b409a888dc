//! Shared node state for the HTTP handlers.

use std::time::Instant;

use crate::facilitator::Facilitator;

/// Shared state for the running node, accessible from HTTP handlers.
pub struct NodeState {
    pub facilitator: Facilitator,
    /// When the node started.
    pub start_time: Instant,
}

impl NodeState {
    pub fn new(facilitator: Facilitator) -> Self {
        Self {
            facilitator,
            start_time: Instant::now(),
        }
    }
}
