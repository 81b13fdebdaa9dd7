//! Publishing handle for graph generations.
//!
//! A single writer swaps whole generations in; readers clone the current
//! `Arc` and keep it for as long as their query runs. An old generation is
//! dropped once the last reader holding it finishes.

use std::sync::Arc;

use tokio::sync::watch;

use wot_pathfind::Generation;

/// Write side. Owned by the sync engine.
pub struct GenerationPublisher {
    tx: watch::Sender<Arc<Generation>>,
}

impl GenerationPublisher {
    /// Start with the empty generation published.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Generation::empty()));
        Self { tx }
    }

    /// Replace the published generation. Returns the previous one.
    pub fn publish(&self, generation: Generation) -> Arc<Generation> {
        self.tx.send_replace(Arc::new(generation))
    }

    pub fn current(&self) -> Arc<Generation> {
        self.tx.borrow().clone()
    }

    pub fn reader(&self) -> GenerationReader {
        GenerationReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for GenerationPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side. Cheap to clone; never blocks on a rebuild.
#[derive(Clone)]
pub struct GenerationReader {
    rx: watch::Receiver<Arc<Generation>>,
}

impl GenerationReader {
    pub fn current(&self) -> Arc<Generation> {
        self.rx.borrow().clone()
    }

    /// Wait until a generation with id >= `id` is published.
    ///
    /// Returns `None` if the publisher was dropped first.
    pub async fn wait_for(&mut self, id: u64) -> Option<Arc<Generation>> {
        self.rx
            .wait_for(|generation| generation.id >= id)
            .await
            .ok()
            .map(|generation| generation.clone())
    }
}
