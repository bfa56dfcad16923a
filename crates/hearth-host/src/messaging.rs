//! Messaging contracts and the factory fallback rule.
//!
//! Downstream code resolves `Arc<dyn MessageFactory>` without caring
//! whether the embedder configured a full [`MessageService`] or a bare
//! factory: when a service exists and no factory was registered
//! separately, initialization registers the service's own factory.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use hearth_core::HostResult;

/// Publishes messages to named queues.
pub trait MessageProducer: Send + Sync {
    /// Publish one message.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying transport rejects the message.
    fn publish(&self, queue: &str, body: Value) -> HostResult<()>;
}

/// Creates producers for a messaging backend.
pub trait MessageFactory: Send + Sync {
    /// Create a producer.
    fn create_producer(&self) -> Arc<dyn MessageProducer>;
}

/// A full message-queue service: a factory plus lifecycle control.
pub trait MessageService: Send + Sync {
    /// The factory backing this service. The fallback rule registers
    /// exactly this instance when no factory was configured separately.
    fn message_factory(&self) -> Arc<dyn MessageFactory>;

    /// Start background processing.
    ///
    /// # Errors
    ///
    /// Returns an error when the service cannot start.
    fn start(&self) -> HostResult<()>;

    /// Stop background processing.
    fn stop(&self);
}

/// In-process queue storage shared by [`InMemoryMessageFactory`] producers.
#[derive(Default)]
pub struct InMemoryQueues {
    queues: DashMap<String, Vec<Value>>,
}

impl std::fmt::Debug for InMemoryQueues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryQueues")
            .field("queues", &self.queues.len())
            .finish()
    }
}

impl InMemoryQueues {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages published to `queue`, oldest first.
    pub fn drain(&self, queue: &str) -> Vec<Value> {
        self.queues.remove(queue).map(|(_, v)| v).unwrap_or_default()
    }

    /// Number of messages waiting on `queue`.
    pub fn len(&self, queue: &str) -> usize {
        self.queues.get(queue).map_or(0, |q| q.len())
    }
}

/// In-process [`MessageFactory`] for tests and single-node deployments.
#[derive(Debug, Default)]
pub struct InMemoryMessageFactory {
    queues: Arc<InMemoryQueues>,
}

impl InMemoryMessageFactory {
    /// A factory over fresh queue storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// The storage its producers publish into.
    pub fn queues(&self) -> Arc<InMemoryQueues> {
        self.queues.clone()
    }
}

impl MessageFactory for InMemoryMessageFactory {
    fn create_producer(&self) -> Arc<dyn MessageProducer> {
        Arc::new(InMemoryProducer {
            queues: self.queues.clone(),
        })
    }
}

struct InMemoryProducer {
    queues: Arc<InMemoryQueues>,
}

impl MessageProducer for InMemoryProducer {
    fn publish(&self, queue: &str, body: Value) -> HostResult<()> {
        self.queues
            .queues
            .entry(queue.to_string())
            .or_default()
            .push(body);
        Ok(())
    }
}
