use crate::edge::{EdgeClassifier, EdgeKind};
use crate::events::{Event, EventBus, Notification};
use crate::remote::RemoteSource;
use crate::collection::FetchOptions;
use crate::{Collection, NodeKind, Path, Resource, Result};
use restfs_schema::Schema;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Shared handle to the remote API, the schema table and the event bus.
///
/// Cloning is cheap; every [`Resource`] and [`Collection`] carries one.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    remote: Arc<dyn RemoteSource>,
    schema: Arc<dyn Schema>,
    events: Arc<EventBus>,
    edges: EdgeClassifier,
}

impl Client {
    pub fn new(
        remote: Arc<dyn RemoteSource>,
        schema: Arc<dyn Schema>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                remote,
                schema,
                events,
                edges: EdgeClassifier::new(),
            }),
        }
    }

    /// Like [`Client::new`], but a permissive schema first learns the type
    /// names from the root index. Without them every edge reads as plain data.
    pub fn connect(
        remote: Arc<dyn RemoteSource>,
        schema: Arc<dyn Schema>,
        events: Arc<EventBus>,
    ) -> Result<Self> {
        let client = Self::new(remote, schema, events);
        if !client.schema().is_precise() {
            let mut root = client.root();
            root.fetch(&FetchOptions::depth(1))?;
            tracing::debug!(types = root.members().len(), "seeded schema from the root index");
        }
        Ok(client)
    }

    pub fn remote(&self) -> &dyn RemoteSource {
        self.inner.remote.as_ref()
    }

    pub fn schema(&self) -> &dyn Schema {
        self.inner.schema.as_ref()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn classify(&self, type_name: &str, attr: &str) -> EdgeKind {
        self.inner
            .edges
            .classify(self.schema(), type_name, attr)
    }

    /// Feed types seen in the root index to the schema.
    pub fn observe_types(&self, types: &[String]) {
        if self.inner.schema.observe_types(types) {
            tracing::debug!(count = types.len(), "schema learned new types");
            self.inner.edges.clear();
        }
    }

    pub(crate) fn notify(&self, event: Event, kind: NodeKind, path: Path) {
        self.events().publish(&Notification { event, kind, path });
    }

    /// Unverified handle on `/type/uuid`.
    pub fn resource(&self, type_name: &str, uuid: Uuid) -> Resource {
        Resource::with_uuid(self.clone(), type_name, uuid)
    }

    pub fn collection(&self, type_name: &str) -> Collection {
        Collection::new(self.clone(), type_name)
    }

    pub fn root(&self) -> Collection {
        Collection::root(self.clone())
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("schema_version", &self.schema().version())
            .field("events", self.events())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryRemote;
    use restfs_schema::{DummySchema, SchemaBuilder};
    use serde_json::json;

    #[test]
    fn connect_teaches_dummy_schema_the_index() {
        let remote = Arc::new(MemoryRemote::new());
        let net = remote.insert("net", "default:net", json!({}));
        let port = remote.insert("port", "default:port", json!({}));
        remote.add_ref(port, net);

        let bare = Client::new(
            remote.clone(),
            Arc::new(DummySchema::new()),
            Arc::new(EventBus::new()),
        );
        assert_eq!(bare.classify("net", "port_back_refs"), EdgeKind::Plain);

        let client = Client::connect(
            remote.clone(),
            Arc::new(DummySchema::new()),
            Arc::new(EventBus::new()),
        )
        .unwrap();
        assert_eq!(client.schema().type_names(), vec!["net", "port"]);
        assert_eq!(
            client.classify("net", "port_back_refs"),
            EdgeKind::BackReference("port".into())
        );

        let mut resource = client.resource("net", net);
        resource.fetch(1).unwrap();
        let back: Vec<_> = resource.back_refs().filter_map(Resource::uuid).collect();
        assert_eq!(back, vec![port]);
    }

    #[test]
    fn connect_leaves_precise_schema_alone() {
        let remote = Arc::new(MemoryRemote::new());
        let schema = SchemaBuilder::new("1.0").unwrap().declare("foo").build();
        Client::connect(remote.clone(), Arc::new(schema), Arc::new(EventBus::new())).unwrap();
        assert!(remote.requests().is_empty());
    }
}
