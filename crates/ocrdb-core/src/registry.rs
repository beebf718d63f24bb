//! Explicit per-engine partitioning of the backing store.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::traits::CollectionStore;
use crate::types::{Scope, SourceEngine};

pub type CollectionHandle = Arc<dyn CollectionStore>;

/// Maps each `SourceEngine` to the one collection that owns its documents.
#[derive(Clone)]
pub struct CollectionRegistry {
    paddle: CollectionHandle,
    mineru: CollectionHandle,
}

impl CollectionRegistry {
    pub fn new(paddle: CollectionHandle, mineru: CollectionHandle) -> Result<Self> {
        for (expected, handle) in [(SourceEngine::Paddle, &paddle), (SourceEngine::MinerU, &mineru)] {
            if handle.engine() != expected {
                return Err(Error::EngineMismatch { expected, found: handle.engine() });
            }
        }
        if paddle.name() == mineru.name() {
            return Err(Error::InvalidConfig(format!(
                "both engines map to the same collection '{}'",
                paddle.name()
            )));
        }
        Ok(Self { paddle, mineru })
    }

    pub fn get(&self, engine: SourceEngine) -> &CollectionHandle {
        match engine {
            SourceEngine::Paddle => &self.paddle,
            SourceEngine::MinerU => &self.mineru,
        }
    }

    /// Collections covered by `scope`, in `SourceEngine` order.
    pub fn in_scope(&self, scope: Scope) -> Vec<(SourceEngine, &CollectionHandle)> {
        scope.engines().into_iter().map(|e| (e, self.get(e))).collect()
    }
}
