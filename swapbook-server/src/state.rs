//! Application state shared across all request handlers.

use swapbook_core::NodeHandle;

/// Cheap to clone; the node handle is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub node: NodeHandle,
}

impl AppState {
    pub fn new(node: NodeHandle) -> Self {
        Self { node }
    }
}
