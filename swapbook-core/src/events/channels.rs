//! Event channel factory and handles.

use super::types::NodeEvent;
use tokio::sync::mpsc;

/// Default buffer size for the node event queue.
///
/// Producers wait when it is full.
pub const DEFAULT_CHANNEL_BUFFER: usize = 256;

/// Sender handle for node events.
pub type NodeEventSender = mpsc::Sender<NodeEvent>;
/// Receiver handle for node events.
pub type NodeEventReceiver = mpsc::Receiver<NodeEvent>;

/// Create a node event channel with the given capacity.
///
/// A capacity of zero is bumped to one.
pub fn node_event_channel(buffer: usize) -> (NodeEventSender, NodeEventReceiver) {
    mpsc::channel(buffer.max(1))
}
