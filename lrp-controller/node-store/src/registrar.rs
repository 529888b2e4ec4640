use crate::{
    node::{Identity, Node, Source},
    store::{Configuration, Key, Observer, SharedStore, StoreBackend},
};
use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// The prefix of the store holding the records of every node in the cluster.
pub const NODE_STORE_PREFIX: &str = "cilium/state/nodes/v1";

/// The prefix of the store to which nodes write their registrations.
pub const NODE_REGISTER_STORE_PREFIX: &str = "cilium/state/noderegister/v1";

/// Maintains the set of known nodes.
pub trait NodeManager: Send + Sync {
    fn node_updated(&self, node: Node);

    fn node_deleted(&self, node: Node);

    fn exists(&self, id: &Identity) -> bool;
}

/// Forwards node records observed in the shared store to a `NodeManager`.
pub struct NodeObserver {
    manager: Arc<dyn NodeManager>,
}

/// Registers the local node in the shared store.
pub struct NodeRegistrar {
    backend: Option<Arc<dyn StoreBackend<Node>>>,
    node_store: Option<Arc<dyn SharedStore<Node>>>,
    register_store: Option<Arc<dyn SharedStore<Node>>>,
}

// === impl NodeObserver ===

impl NodeObserver {
    pub fn new(manager: Arc<dyn NodeManager>) -> Self {
        Self { manager }
    }

    fn from_store(node: &Node) -> Node {
        Node {
            source: Source::KvStore,
            ..node.clone()
        }
    }
}

impl Observer<Node> for NodeObserver {
    fn on_update(&self, node: &Node) {
        self.manager.node_updated(Self::from_store(node));
    }

    fn on_delete(&self, node: &Node) {
        self.manager.node_deleted(Self::from_store(node));
    }
}

// === impl NodeRegistrar ===

impl NodeRegistrar {
    /// Creates a registrar. Without a backend, registration is a no-op.
    pub fn new(backend: Option<Arc<dyn StoreBackend<Node>>>) -> Self {
        Self {
            backend,
            node_store: None,
            register_store: None,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.node_store.is_some()
    }

    /// Joins the node stores and writes the local node's registration.
    ///
    /// Returns once the store has acknowledged the registration. On failure,
    /// every store joined so far is released.
    #[instrument(skip_all, fields(node = %node.key_name()))]
    pub async fn register_node(&mut self, node: &Node, manager: Arc<dyn NodeManager>) -> Result<()> {
        let backend = match self.backend {
            Some(ref backend) => backend.clone(),
            None => {
                debug!("No key-value store configured");
                return Ok(());
            }
        };

        let register_store = backend
            .join_shared_store(Configuration::new(NODE_REGISTER_STORE_PREFIX))
            .await?;
        debug!(prefix = NODE_REGISTER_STORE_PREFIX, "Joined store");

        let observer = Arc::new(NodeObserver::new(manager));
        let node_store = match backend
            .join_shared_store(Configuration::new(NODE_STORE_PREFIX).with_observer(observer))
            .await
        {
            Ok(store) => store,
            Err(error) => {
                register_store.release().await;
                return Err(error);
            }
        };
        debug!(prefix = NODE_STORE_PREFIX, "Joined store");

        if let Err(error) = register_store.update_local_key_sync(node).await {
            register_store.release().await;
            node_store.release().await;
            return Err(error);
        }

        self.register_store = Some(register_store);
        self.node_store = Some(node_store);
        info!("Registered node");
        Ok(())
    }

    /// Writes the local node's record, returning once it is acknowledged.
    pub async fn update_local_key_sync(&self, node: &Node) -> Result<()> {
        match (&self.register_store, &self.node_store) {
            (Some(store), _) | (None, Some(store)) => store.update_local_key_sync(node).await,
            (None, None) => bail!("node {} is not registered", node.key_name()),
        }
    }

    /// Leaves both stores.
    pub async fn release(&mut self) {
        if let Some(store) = self.register_store.take() {
            store.release().await;
        }
        if let Some(store) = self.node_store.take() {
            store.release().await;
        }
    }
}
