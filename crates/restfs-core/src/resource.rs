//! A single addressable graph node.
//!
//! A [`Resource`] is *constructed* once its identity is known and *fetched*
//! once its data has been loaded. Fetching with `depth >= 1` turns every
//! schema-declared edge attribute into [`Link`]s to further resources, each of
//! which is fetched with `depth - 1` while that stays positive. At depth 0 the
//! edge attributes are left as the raw JSON the API returned.

use crate::edge::{refs_attr, EdgeKind, PARENT_ATTR};
use crate::events::Event;
use crate::path::parse_uuid4;
use crate::remote::RemoteError;
use crate::{Client, Error, FqName, NodeKind, Path, Result};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Constructed,
    Fetched,
    Deleted,
}

/// One hydrated edge.
#[derive(Debug, Clone)]
pub struct Link {
    pub kind: EdgeKind,
    pub resource: Resource,
    /// Link attribute payload (`attr` on reference entries).
    pub attr: Option<Value>,
}

#[derive(Clone)]
pub struct Resource {
    client: Client,
    type_name: String,
    uuid: Option<Uuid>,
    fq_name: Option<FqName>,
    data: Map<String, Value>,
    links: BTreeMap<String, Vec<Link>>,
    parent: Option<Box<Resource>>,
    state: ResourceState,
}

impl Resource {
    /// A resource that does not exist remotely yet; [`save`](Self::save) creates it.
    pub fn new(client: Client, type_name: &str) -> Self {
        Self {
            client,
            type_name: type_name.to_string(),
            uuid: None,
            fq_name: None,
            data: Map::new(),
            links: BTreeMap::new(),
            parent: None,
            state: ResourceState::Constructed,
        }
    }

    /// Optimistic handle: no remote round-trip.
    pub fn with_uuid(client: Client, type_name: &str, uuid: Uuid) -> Self {
        let mut r = Self::new(client, type_name);
        r.uuid = Some(uuid);
        r.announce();
        r
    }

    /// Handle on `uuid`, verified to exist remotely.
    pub fn with_uuid_checked(client: Client, type_name: &str, uuid: Uuid) -> Result<Self> {
        let mut r = Self::new(client, type_name);
        r.uuid = Some(uuid);
        r.check()?;
        r.announce();
        Ok(r)
    }

    /// Look up the uuid of `fq_name`.
    pub fn with_fq_name(client: Client, type_name: &str, fq_name: FqName) -> Result<Self> {
        let uuid = client
            .remote()
            .uuid_for(type_name, &fq_name)?
            .ok_or_else(|| Error::ResourceNotFound {
                type_name: type_name.to_string(),
                id: fq_name.to_string(),
            })?;
        let mut r = Self::new(client, type_name);
        r.uuid = Some(uuid);
        r.fq_name = Some(fq_name);
        r.announce();
        Ok(r)
    }

    /// General constructor. When both identifiers are given the uuid is trusted.
    pub fn open(
        client: Client,
        type_name: &str,
        uuid: Option<Uuid>,
        fq_name: Option<FqName>,
        verify: bool,
    ) -> Result<Self> {
        match (uuid, fq_name) {
            (Some(uuid), fq_name) => {
                let mut r = Self::new(client, type_name);
                r.uuid = Some(uuid);
                r.fq_name = fq_name;
                if verify {
                    r.check()?;
                }
                r.announce();
                Ok(r)
            }
            (None, Some(fq_name)) => Self::with_fq_name(client, type_name, fq_name),
            (None, None) => Ok(Self::new(client, type_name)),
        }
    }

    /// Build from a listing or link entry (`{"uuid": .., "to"|"fq_name": [..], ..}`).
    ///
    /// The entry's remaining keys become the (unfetched) data.
    pub(crate) fn from_entry(client: Client, type_name: &str, entry: &Value) -> Option<Self> {
        let obj = entry.as_object()?;
        let uuid = obj.get("uuid").and_then(Value::as_str).and_then(parse_uuid4)?;
        let fq_name = obj
            .get("fq_name")
            .or_else(|| obj.get("to"))
            .and_then(FqName::from_value);
        let mut r = Self::new(client, type_name);
        r.uuid = Some(uuid);
        r.fq_name = fq_name;
        r.data = obj.clone();
        r.announce();
        Some(r)
    }

    fn announce(&self) {
        if let Some(path) = self.path() {
            self.client.notify(Event::Created, NodeKind::Resource, path);
        }
    }

    // ------------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------------

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    pub fn fq_name(&self) -> Option<&FqName> {
        self.fq_name.as_ref()
    }

    pub fn state(&self) -> ResourceState {
        self.state
    }

    pub fn is_fetched(&self) -> bool {
        self.state == ResourceState::Fetched
    }

    /// `/type/uuid`, carrying the fq_name as metadata when known.
    pub fn path(&self) -> Option<Path> {
        let uuid = self.uuid?;
        let path = Path::resource(&self.type_name, &uuid);
        Some(match &self.fq_name {
            Some(fq) => path.with_meta("fq_name", fq.to_string()),
            None => path,
        })
    }

    /// API path of this resource.
    pub fn href(&self) -> Result<String> {
        let uuid = self.require_uuid()?;
        Ok(format!("/{}/{}", self.type_name, uuid))
    }

    fn require_uuid(&self) -> Result<Uuid> {
        self.uuid
            .ok_or_else(|| Error::Unidentified(format!("{} resource", self.type_name)))
    }

    /// Verify the uuid remotely, filling in the fq_name.
    pub fn check(&mut self) -> Result<()> {
        let uuid = self.require_uuid()?;
        match self.client.remote().fq_name_for(&self.type_name, &uuid)? {
            Some(fq) => {
                self.fq_name = Some(fq);
                Ok(())
            }
            None => Err(Error::ResourceNotFound {
                type_name: self.type_name.clone(),
                id: uuid.to_string(),
            }),
        }
    }

    /// fq_name, looked up remotely on first use.
    pub fn resolve_fq_name(&mut self) -> Result<&FqName> {
        if self.fq_name.is_none() {
            self.check()?;
        }
        self.fq_name
            .as_ref()
            .ok_or_else(|| Error::Unidentified(format!("{} resource", self.type_name)))
    }

    // ------------------------------------------------------------------------
    // Data
    // ------------------------------------------------------------------------

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.data.get(key).cloned().unwrap_or(default)
    }

    /// Value of `key`, or the schema-declared default for that property.
    pub fn field(&self, key: &str) -> Value {
        if let Some(v) = self.data.get(key) {
            return v.clone();
        }
        self.client
            .schema()
            .resource(&self.type_name)
            .ok()
            .and_then(|entry| entry.property(key).map(|p| p.shape.default_value()))
            .unwrap_or(Value::Null)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.data.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    // ------------------------------------------------------------------------
    // Remote operations
    // ------------------------------------------------------------------------

    /// Load data, hydrating edges down to `depth`.
    pub fn fetch(&mut self, depth: u32) -> Result<()> {
        let href = self.href()?;
        let body = match self.client.remote().get(&href, &[]) {
            Ok(body) => body,
            Err(e) if e.is_not_found() => {
                return Err(Error::ResourceNotFound {
                    type_name: self.type_name.clone(),
                    id: self.uuid.map(|u| u.to_string()).unwrap_or_default(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let data = body
            .get(&self.type_name)
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| {
                RemoteError::decode(&href, format!("missing `{}` object", self.type_name))
            })?;
        self.load(data, depth)
    }

    fn load(&mut self, data: Map<String, Value>, depth: u32) -> Result<()> {
        if let Some(fq) = data.get("fq_name").and_then(FqName::from_value) {
            self.fq_name = Some(fq);
        }
        self.data = data;
        self.links.clear();
        self.parent = None;
        if depth > 0 {
            self.hydrate(depth)?;
        }
        self.state = ResourceState::Fetched;
        tracing::debug!(type_name = %self.type_name, uuid = ?self.uuid, depth, "fetched resource");
        Ok(())
    }

    fn hydrate(&mut self, depth: u32) -> Result<()> {
        let mut links = BTreeMap::new();
        let mut parent = None;
        for (attr, value) in &self.data {
            match self.client.classify(&self.type_name, attr) {
                EdgeKind::Plain => {}
                EdgeKind::Parent => {
                    parent = self.parent_handle(value);
                    if let (Some(p), true) = (parent.as_mut(), depth > 1) {
                        Resource::fetch(p, depth - 1)?;
                    }
                }
                kind => {
                    let Some(target) = kind.target().map(str::to_string) else {
                        continue;
                    };
                    let mut out = Vec::new();
                    for entry in value.as_array().into_iter().flatten() {
                        let Some(mut resource) =
                            Resource::from_entry(self.client.clone(), &target, entry)
                        else {
                            tracing::warn!(attr = %attr, "skipping link entry without uuid");
                            continue;
                        };
                        if depth > 1 {
                            resource.fetch(depth - 1)?;
                        }
                        out.push(Link {
                            kind: kind.clone(),
                            resource,
                            attr: entry.get("attr").cloned(),
                        });
                    }
                    links.insert(attr.clone(), out);
                }
            }
        }
        self.links = links;
        self.parent = parent.map(Box::new);
        Ok(())
    }

    fn parent_handle(&self, parent_uuid: &Value) -> Option<Resource> {
        let uuid = parent_uuid.as_str().and_then(parse_uuid4)?;
        let parent_type = self.data.get("parent_type").and_then(Value::as_str)?;
        let mut parent = Resource::with_uuid(self.client.clone(), parent_type, uuid);
        parent.fq_name = self.fq_name.as_ref().and_then(FqName::parent);
        Some(parent)
    }

    /// POST when not yet identified, otherwise PUT the current data.
    pub fn save(&mut self) -> Result<()> {
        let body = json!({ self.type_name.clone(): Value::Object(self.writable_data()) });
        match self.uuid {
            None => {
                let href = format!("/{}s", self.type_name);
                let resp = self.client.remote().post(&href, &body)?;
                let created = resp
                    .get(&self.type_name)
                    .ok_or_else(|| RemoteError::decode(&href, "missing created object"))?;
                let uuid = created
                    .get("uuid")
                    .and_then(Value::as_str)
                    .and_then(|s| Uuid::parse_str(s).ok())
                    .ok_or_else(|| RemoteError::decode(&href, "created object has no uuid"))?;
                self.uuid = Some(uuid);
                if let Some(fq) = created.get("fq_name").and_then(FqName::from_value) {
                    self.fq_name = Some(fq);
                }
                tracing::info!(type_name = %self.type_name, %uuid, "created resource");
                self.announce();
            }
            Some(uuid) => {
                let href = self.href()?;
                self.client.remote().put(&href, &body)?;
                tracing::info!(type_name = %self.type_name, %uuid, "updated resource");
            }
        }
        Ok(())
    }

    /// Data sent on save: computed listings (back-refs, children, hrefs) dropped.
    fn writable_data(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for (key, value) in &self.data {
            if matches!(key.as_str(), "href" | "parent_href") {
                continue;
            }
            match self.client.classify(&self.type_name, key) {
                EdgeKind::BackReference(_) | EdgeKind::Child(_) => continue,
                _ => {
                    out.insert(key.clone(), value.clone());
                }
            }
        }
        if let (Some(fq), false) = (&self.fq_name, out.contains_key("fq_name")) {
            out.insert("fq_name".into(), fq.to_value());
        }
        out
    }

    /// Delete remotely. Publishes `deleted` only when something was deleted.
    pub fn delete(&mut self) -> Result<bool> {
        let href = self.href()?;
        let deleted = self.client.remote().delete(&href)?;
        if deleted {
            tracing::info!(%href, "deleted resource");
            self.state = ResourceState::Deleted;
            if let Some(path) = self.path() {
                self.client.notify(Event::Deleted, NodeKind::Resource, path);
            }
        }
        Ok(deleted)
    }

    // ------------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------------

    /// Hydrated links under `attr` (empty unless fetched with depth >= 1).
    pub fn links(&self, attr: &str) -> &[Link] {
        self.links.get(attr).map_or(&[], Vec::as_slice)
    }

    /// Every hydrated edge attribute with its links.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &[Link])> {
        self.links
            .iter()
            .map(|(attr, links)| (attr.as_str(), links.as_slice()))
    }

    fn links_where<'a>(
        &'a self,
        pred: impl Fn(&EdgeKind) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Link> + 'a {
        self.links
            .values()
            .flatten()
            .filter(move |link| pred(&link.kind))
    }

    pub fn refs(&self) -> impl Iterator<Item = &Link> {
        self.links_where(|k| matches!(k, EdgeKind::Reference(_)))
    }

    /// Every back-referencing resource, whatever its type.
    pub fn back_refs(&self) -> impl Iterator<Item = &Resource> {
        self.links_where(|k| matches!(k, EdgeKind::BackReference(_)))
            .map(|link| &link.resource)
    }

    pub fn children(&self) -> impl Iterator<Item = &Resource> {
        self.links_where(|k| matches!(k, EdgeKind::Child(_)))
            .map(|link| &link.resource)
    }

    pub fn parent(&self) -> Option<&Resource> {
        self.parent.as_deref()
    }

    /// Add (or update the attr of) a reference to `target` in the data.
    ///
    /// Takes effect remotely on [`save`](Self::save).
    pub fn add_ref(&mut self, target: &Resource, attr: Option<Value>) -> Result<()> {
        let target_uuid = target.require_uuid()?.to_string();
        let mut entry = Map::new();
        entry.insert("uuid".into(), json!(target_uuid));
        if let Some(fq) = target.fq_name() {
            entry.insert("to".into(), fq.to_value());
        }
        if let Some(attr) = attr {
            entry.insert("attr".into(), attr);
        }
        let slot = self
            .data
            .entry(refs_attr(target.type_name()))
            .or_insert_with(|| json!([]));
        if !slot.is_array() {
            *slot = json!([]);
        }
        if let Value::Array(items) = slot {
            items.retain(|e| e.get("uuid").and_then(Value::as_str) != Some(target_uuid.as_str()));
            items.push(Value::Object(entry));
        }
        Ok(())
    }

    /// Drop the reference to `target` from the data. Returns whether one existed.
    pub fn remove_ref(&mut self, target: &Resource) -> Result<bool> {
        let target_uuid = target.require_uuid()?.to_string();
        let Some(Value::Array(items)) = self.data.get_mut(&refs_attr(target.type_name())) else {
            return Ok(false);
        };
        let before = items.len();
        items.retain(|e| e.get("uuid").and_then(Value::as_str) != Some(target_uuid.as_str()));
        Ok(items.len() != before)
    }

    /// Set the owner in the data (only meaningful before creation).
    pub fn set_parent(&mut self, parent: &Resource) -> Result<()> {
        let uuid = parent.require_uuid()?;
        self.data
            .insert("parent_type".into(), json!(parent.type_name()));
        self.data.insert(PARENT_ATTR.into(), json!(uuid.to_string()));
        if let (Some(fq), Some(name)) = (
            parent.fq_name(),
            self.data.get("name").and_then(Value::as_str),
        ) {
            self.fq_name = Some(fq.child(name));
        }
        Ok(())
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("type_name", &self.type_name)
            .field("uuid", &self.uuid)
            .field("fq_name", &self.fq_name)
            .field("state", &self.state)
            .field("links", &self.links.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventBus, MemoryRemote};
    use restfs_schema::SchemaBuilder;
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryRemote>, Client) {
        let remote = Arc::new(MemoryRemote::new());
        let schema = SchemaBuilder::new("3.0")
            .unwrap()
            .child("project", "virtual-network")
            .reference("virtual-network", "network-ipam")
            .build();
        let client = Client::new(remote.clone(), Arc::new(schema), Arc::new(EventBus::new()));
        (remote, client)
    }

    #[test]
    fn fetch_depth_controls_hydration() {
        let (remote, client) = setup();
        let project = remote.insert("project", "default:admin", json!({}));
        let net = remote.insert("virtual-network", "default:admin:net", json!({}));
        let ipam = remote.insert("network-ipam", "default:admin:ipam", json!({ "mtu": 9000 }));
        remote.set_parent(net, project);
        remote.add_ref(net, ipam);

        let mut r = client.resource("virtual-network", net);
        r.fetch(0).unwrap();
        assert!(r.is_fetched());
        assert!(r.links("network_ipam_refs").is_empty());
        assert!(r.get("network_ipam_refs").is_some());

        r.fetch(1).unwrap();
        let refs: Vec<_> = r.refs().collect();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].resource.uuid(), Some(ipam));
        assert!(!refs[0].resource.is_fetched());
        assert_eq!(r.parent().and_then(Resource::uuid), Some(project));
        assert_eq!(r.fq_name().map(ToString::to_string).as_deref(), Some("default:admin:net"));

        r.fetch(2).unwrap();
        let ipam_res = &r.links("network_ipam_refs")[0].resource;
        assert!(ipam_res.is_fetched());
        assert_eq!(ipam_res.get("mtu"), Some(&json!(9000)));
    }

    #[test]
    fn unknown_fq_name_is_not_found() {
        let (_remote, client) = setup();
        let err = Resource::with_fq_name(client, "project", "default:nope".parse().unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { .. }));
    }

    #[test]
    fn save_creates_then_updates() {
        let (remote, client) = setup();
        remote.declare_type("network-ipam");
        let mut r = Resource::new(client, "network-ipam");
        r.set("name", json!("ipam"));
        r.set("fq_name", json!(["default", "ipam"]));
        assert!(r.path().is_none());
        r.save().unwrap();
        let uuid = r.uuid().unwrap();
        assert!(remote.contains(&uuid));

        r.set("mtu", json!(1500));
        r.save().unwrap();
        let stored = remote.object(&uuid).unwrap();
        assert_eq!(stored["network-ipam"]["mtu"], json!(1500));
        let methods: Vec<_> = remote.requests().into_iter().map(|r| r.method).collect();
        assert_eq!(methods, vec!["POST", "PUT"]);
    }

    #[test]
    fn add_and_remove_ref_edit_data() {
        let (remote, client) = setup();
        let net = remote.insert("virtual-network", "default:net", json!({}));
        let ipam = remote.insert("network-ipam", "default:ipam", json!({}));
        let mut r = client.resource("virtual-network", net);
        let target = client.resource("network-ipam", ipam);

        r.add_ref(&target, Some(json!({ "subnet": "10.0.0.0/24" }))).unwrap();
        r.add_ref(&target, None).unwrap();
        assert_eq!(r.get("network_ipam_refs").unwrap().as_array().unwrap().len(), 1);
        assert!(r.remove_ref(&target).unwrap());
        assert!(!r.remove_ref(&target).unwrap());
    }

    #[test]
    fn field_falls_back_to_schema_default() {
        let schema = SchemaBuilder::new("3.0")
            .unwrap()
            .property("project", "quota", restfs_schema::PropertyShape::Map)
            .build();
        let client = Client::new(
            Arc::new(MemoryRemote::new()),
            Arc::new(schema),
            Arc::new(EventBus::new()),
        );
        let r = Resource::new(client, "project");
        assert_eq!(r.field("quota"), json!({}));
        assert_eq!(r.field("other"), Value::Null);
        assert_eq!(r.get_or("other", json!(3)), json!(3));
    }
}
