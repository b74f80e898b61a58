//! In-memory operation registry
//!
//! One registry instance is constructed by the application root and shared
//! by reference; operation state lives only in process memory and is lost
//! on restart.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::ops::operation::Operation;

/// Map from operation id to its live record
#[derive(Default)]
pub struct OperationRegistry {
    ops: Mutex<HashMap<Uuid, Arc<Operation>>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, op: Arc<Operation>) {
        let mut ops = self.ops.lock().await;
        ops.insert(op.id(), op);
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Operation>> {
        let ops = self.ops.lock().await;
        ops.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.ops.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::{DeployConfig, Target};

    fn test_config() -> DeployConfig {
        serde_json::from_value(serde_json::json!({
            "projectName": "demo",
            "composeContent": "services: {}",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let registry = OperationRegistry::new();
        assert!(registry.is_empty().await);

        let op = Operation::new(Target::Local, test_config(), 9);
        let id = op.id();
        registry.insert(op).await;

        assert_eq!(registry.len().await, 1);
        assert!(registry.get(id).await.is_some());
        assert!(registry.get(Uuid::new_v4()).await.is_none());
    }
}
