//! JSON-RPC request id generation for backend transports

use crate::core::protocol::RequestId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Sequential request id generator
pub struct RequestIdGenerator {
    counter: AtomicU64,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(1),
        }
    }

    /// Generate the next request id
    pub fn next_id(&self) -> RequestId {
        RequestId::Number(self.counter.fetch_add(1, Ordering::SeqCst) as i64)
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle to one generator
#[derive(Clone, Default)]
pub struct SharedRequestIdGenerator {
    inner: Arc<RequestIdGenerator>,
}

impl SharedRequestIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> RequestId {
        self.inner.next_id()
    }
}
