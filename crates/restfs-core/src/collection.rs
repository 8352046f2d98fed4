//! Typed, filterable member listings.
//!
//! Filters and parent scoping accumulate across fetches; the member list is
//! replaced on every fetch. A collection with an empty type name is the root:
//! its members are one sub-collection per type in the API index.

use crate::events::Event;
use crate::remote::RemoteError;
use crate::{Client, Error, Node, NodeKind, Path, Resource, Result};
use serde_json::Value;
use uuid::Uuid;

/// Per-fetch options. `filters` and `parent_uuid` are merged into the
/// collection's stored scoping; `fields` apply to this fetch only.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub depth: u32,
    pub fields: Vec<String>,
    pub filters: Vec<(String, Value)>,
    pub parent_uuid: Vec<Uuid>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            depth: 1,
            fields: Vec::new(),
            filters: Vec::new(),
            parent_uuid: Vec::new(),
        }
    }
}

impl FetchOptions {
    pub fn depth(depth: u32) -> Self {
        Self {
            depth,
            ..Self::default()
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: Value) -> Self {
        self.filters.push((field.into(), value));
        self
    }
}

#[derive(Debug, Clone)]
pub struct Collection {
    client: Client,
    type_name: String,
    filters: Vec<(String, Value)>,
    parent_uuid: Vec<Uuid>,
    members: Vec<Node>,
    fetched: bool,
}

impl Collection {
    pub fn new(client: Client, type_name: &str) -> Self {
        let collection = Self {
            client,
            type_name: type_name.to_string(),
            filters: Vec::new(),
            parent_uuid: Vec::new(),
            members: Vec::new(),
            fetched: false,
        };
        collection
            .client
            .notify(Event::Created, NodeKind::Collection, collection.path());
        collection
    }

    pub fn root(client: Client) -> Self {
        Self::new(client, "")
    }

    /// Collection pre-scoped with filters and parent uuids.
    pub fn scoped(
        client: Client,
        type_name: &str,
        filters: &[(String, Value)],
        parent_uuid: &[Uuid],
    ) -> Self {
        let mut collection = Self::new(client, type_name);
        collection.merge_scope(filters, parent_uuid);
        collection
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_root(&self) -> bool {
        self.type_name.is_empty()
    }

    pub fn path(&self) -> Path {
        if self.is_root() {
            Path::root()
        } else {
            Path::collection(&self.type_name)
        }
    }

    pub fn href(&self) -> String {
        if self.is_root() {
            "/".to_string()
        } else {
            format!("/{}s", self.type_name)
        }
    }

    pub fn filters(&self) -> &[(String, Value)] {
        &self.filters
    }

    pub fn parent_uuids(&self) -> &[Uuid] {
        &self.parent_uuid
    }

    pub fn is_fetched(&self) -> bool {
        self.fetched
    }

    pub fn members(&self) -> &[Node] {
        &self.members
    }

    pub fn into_members(self) -> Vec<Node> {
        self.members
    }

    /// Member resources (empty for the root collection).
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.members.iter().filter_map(Node::as_resource)
    }

    /// Sub-collections (only the root collection has any).
    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.members.iter().filter_map(Node::as_collection)
    }

    /// Add a permanent predicate. Drops materialized members.
    pub fn filter(&mut self, field: impl Into<String>, value: Value) -> &mut Self {
        self.merge_scope(&[(field.into(), value)], &[]);
        self
    }

    /// Restrict to children of `parent`. Drops materialized members.
    pub fn scope_parent(&mut self, parent: Uuid) -> &mut Self {
        self.merge_scope(&[], &[parent]);
        self
    }

    fn merge_scope(&mut self, filters: &[(String, Value)], parent_uuid: &[Uuid]) {
        let mut changed = false;
        for filter in filters {
            if !self.filters.contains(filter) {
                self.filters.push(filter.clone());
                changed = true;
            }
        }
        for uuid in parent_uuid {
            if !self.parent_uuid.contains(uuid) {
                self.parent_uuid.push(*uuid);
                changed = true;
            }
        }
        if changed {
            self.members.clear();
            self.fetched = false;
        }
    }

    /// Query parameters for the current scoping.
    fn params(&self, fields: &[String]) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if !self.filters.is_empty() {
            let predicates: Vec<String> = self
                .filters
                .iter()
                .map(|(field, value)| format!("{field}=={value}"))
                .collect();
            params.push(("filters".to_string(), predicates.join(",")));
        }
        if !fields.is_empty() {
            params.push(("fields".to_string(), fields.join(",")));
        }
        if !self.parent_uuid.is_empty() {
            let uuids: Vec<String> = self.parent_uuid.iter().map(Uuid::to_string).collect();
            params.push(("parent_id".to_string(), uuids.join(",")));
        }
        params
    }

    pub fn fetch(&mut self, options: &FetchOptions) -> Result<()> {
        self.merge_scope(&options.filters, &options.parent_uuid);
        self.members = if self.is_root() {
            self.fetch_index(options)?
        } else {
            self.fetch_members(options)?
        };
        self.fetched = true;
        tracing::debug!(
            collection = %self.path(),
            members = self.members.len(),
            depth = options.depth,
            "fetched collection"
        );
        Ok(())
    }

    fn list(&self, params: &[(String, String)]) -> Result<Value> {
        match self.client.remote().get(&self.href(), params) {
            Ok(body) => Ok(body),
            Err(e) if e.is_not_found() => Err(Error::CollectionNotFound(self.type_name.clone())),
            Err(e) => Err(e.into()),
        }
    }

    fn fetch_members(&self, options: &FetchOptions) -> Result<Vec<Node>> {
        let href = self.href();
        let body = self.list(&self.params(&options.fields))?;
        let key = format!("{}s", self.type_name);
        let entries = body
            .get(&key)
            .and_then(Value::as_array)
            .ok_or_else(|| RemoteError::decode(&href, format!("missing `{key}` list")))?;

        let mut members = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(mut resource) =
                Resource::from_entry(self.client.clone(), &self.type_name, entry)
            else {
                tracing::warn!(collection = %href, "skipping member without uuid");
                continue;
            };
            if options.depth > 1 {
                resource.fetch(options.depth - 1)?;
            }
            members.push(Node::Resource(resource));
        }
        Ok(members)
    }

    fn fetch_index(&self, options: &FetchOptions) -> Result<Vec<Node>> {
        let body = self.list(&[])?;
        let types = index_types(&body);
        self.client.observe_types(&types);

        let mut members = Vec::with_capacity(types.len());
        for type_name in types {
            let mut sub = Collection::scoped(
                self.client.clone(),
                &type_name,
                &self.filters,
                &self.parent_uuid,
            );
            if options.depth > 1 {
                sub.fetch(&FetchOptions {
                    depth: options.depth - 1,
                    fields: options.fields.clone(),
                    filters: Vec::new(),
                    parent_uuid: Vec::new(),
                })?;
            }
            members.push(Node::Collection(sub));
        }
        Ok(members)
    }

    /// Number of members.
    ///
    /// Materialized members are trusted; otherwise a count query is sent with
    /// the current scoping. Changing filters drops the members, so both paths
    /// always describe the same scope.
    pub fn count(&self) -> Result<usize> {
        if self.fetched {
            return Ok(self.members.len());
        }
        if self.is_root() {
            let body = self.list(&[])?;
            return Ok(index_types(&body).len());
        }
        let mut params = self.params(&[]);
        params.push(("count".to_string(), "true".to_string()));
        let body = self.list(&params)?;
        let key = format!("{}s", self.type_name);
        body.get(&key)
            .and_then(|v| v.get("count"))
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .ok_or_else(|| RemoteError::decode(&self.href(), "missing count").into())
    }
}

/// Type names advertised by the API index, in index order.
fn index_types(body: &Value) -> Vec<String> {
    body.get("links")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.get("link"))
        .filter(|link| link.get("rel").and_then(Value::as_str) == Some("resource-base"))
        .filter_map(|link| link.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventBus, MemoryRemote};
    use restfs_schema::DummySchema;
    use serde_json::json;
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryRemote>, Client) {
        let remote = Arc::new(MemoryRemote::new());
        let client = Client::new(
            remote.clone(),
            Arc::new(DummySchema::new()),
            Arc::new(EventBus::new()),
        );
        (remote, client)
    }

    #[test]
    fn filters_accumulate_across_fetches() {
        let (remote, client) = setup();
        remote.insert("foo", "default:one", json!({ "a": "b", "x": "y" }));
        remote.insert("foo", "default:two", json!({ "a": "b" }));

        let mut c = client.collection("foo");
        c.filter("a", json!("b"));
        c.fetch(&FetchOptions::default()).unwrap();
        assert_eq!(c.members().len(), 2);
        c.fetch(&FetchOptions::default().with_filter("x", json!("y")))
            .unwrap();
        assert_eq!(c.members().len(), 1);

        let last = remote.requests().pop().unwrap();
        let filters = last.param("filters").unwrap();
        assert!(filters.contains(r#"a=="b""#));
        assert!(filters.contains(r#"x=="y""#));
    }

    #[test]
    fn root_lists_types_in_index_order() {
        let (remote, client) = setup();
        remote.declare_type("foo");
        remote.declare_type("bar");
        let mut root = client.root();
        root.fetch(&FetchOptions::depth(1)).unwrap();
        let names: Vec<_> = root.collections().map(Collection::type_name).collect();
        assert_eq!(names, vec!["foo", "bar"]);
        assert!(root.collections().all(|c| !c.is_fetched()));
        assert_eq!(client.schema().type_names(), vec!["bar", "foo"]);
    }

    #[test]
    fn count_queries_until_materialized() {
        let (remote, client) = setup();
        remote.insert("foo", "default:one", json!({}));
        remote.insert("foo", "default:two", json!({}));

        let mut c = client.collection("foo");
        assert_eq!(c.count().unwrap(), 2);
        assert_eq!(remote.requests()[0].param("count"), Some("true"));

        c.fetch(&FetchOptions::default()).unwrap();
        remote.clear_requests();
        assert_eq!(c.count().unwrap(), 2);
        assert!(remote.requests().is_empty());

        c.filter("name", json!("one"));
        assert_eq!(c.count().unwrap(), 1);
    }

    #[test]
    fn unknown_collection_is_not_found() {
        let (_remote, client) = setup();
        let err = client
            .collection("nope")
            .fetch(&FetchOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::CollectionNotFound(t) if t == "nope"));
    }

    #[test]
    fn parent_scoping_is_sent() {
        let (remote, client) = setup();
        let parent = remote.insert("project", "default:p", json!({}));
        let child = remote.insert("foo", "default:p:c", json!({}));
        remote.insert("foo", "default:other", json!({}));
        remote.set_parent(child, parent);

        let mut c = client.collection("foo");
        c.scope_parent(parent);
        c.fetch(&FetchOptions::default()).unwrap();
        let uuids: Vec<_> = c.resources().filter_map(Resource::uuid).collect();
        assert_eq!(uuids, vec![child]);
        let sent = parent.to_string();
        assert_eq!(remote.requests()[0].param("parent_id"), Some(sent.as_str()));
    }
}
