//! In-memory implementation of [`RemoteSource`].
//!
//! Behaves like the real API for everything the engine uses:
//! - `GET /` lists every declared type as a `resource-base` link,
//! - `GET /{type}s` lists members, honouring `filters`, `fields`, `parent_id`
//!   and `count`,
//! - `GET /{type}/{uuid}` returns the object with computed `*_back_refs` and
//!   child listings,
//! - `DELETE` refuses objects that are still referenced or own children.
//!
//! Every request is recorded so tests can assert on the exact queries sent.

use super::{Params, RemoteError, RemoteSource};
use crate::edge::{back_refs_attr, children_attr, refs_attr};
use crate::FqName;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
struct StoredObject {
    type_name: String,
    fq_name: FqName,
    data: Map<String, Value>,
}

#[derive(Debug, Default)]
struct MemoryState {
    types: Vec<String>,
    objects: IndexMap<Uuid, StoredObject>,
    requests: Vec<RecordedRequest>,
}

impl MemoryState {
    fn declare(&mut self, type_name: &str) {
        if !self.types.iter().any(|t| t == type_name) {
            self.types.push(type_name.to_string());
        }
    }

    fn record(&mut self, method: &str, path: &str, params: &Params) {
        self.requests.push(RecordedRequest {
            method: method.to_string(),
            path: path.to_string(),
            params: params.to_vec(),
        });
    }

    fn find_fq(&self, type_name: &str, fq_name: &FqName) -> Option<Uuid> {
        self.objects
            .iter()
            .find(|(_, o)| o.type_name == type_name && &o.fq_name == fq_name)
            .map(|(uuid, _)| *uuid)
    }

    fn link_entry(&self, uuid: &Uuid) -> Value {
        match self.objects.get(uuid) {
            Some(o) => json!({
                "to": o.fq_name.to_value(),
                "uuid": uuid.to_string(),
                "href": format!("/{}/{}", o.type_name, uuid),
            }),
            None => json!({ "uuid": uuid.to_string() }),
        }
    }

    /// Objects holding a `*_refs` entry pointing at `target`, with the entry's `attr`.
    fn referrers(&self, target: &Uuid) -> Vec<(Uuid, Option<Value>)> {
        let target = target.to_string();
        let mut out = Vec::new();
        for (uuid, obj) in &self.objects {
            for (key, value) in &obj.data {
                if !key.ends_with("_refs") || key.ends_with("_back_refs") {
                    continue;
                }
                for entry in value.as_array().into_iter().flatten() {
                    if entry.get("uuid").and_then(Value::as_str) == Some(target.as_str()) {
                        out.push((*uuid, entry.get("attr").cloned()));
                    }
                }
            }
        }
        out
    }

    fn children_of(&self, parent: &Uuid) -> Vec<Uuid> {
        let parent = parent.to_string();
        self.objects
            .iter()
            .filter(|(_, o)| {
                o.data.get("parent_uuid").and_then(Value::as_str) == Some(parent.as_str())
            })
            .map(|(uuid, _)| *uuid)
            .collect()
    }

    fn render(&self, uuid: &Uuid) -> Option<Value> {
        let obj = self.objects.get(uuid)?;
        let mut data = obj.data.clone();
        data.insert("uuid".into(), json!(uuid.to_string()));
        data.insert("fq_name".into(), obj.fq_name.to_value());
        data.insert("href".into(), json!(format!("/{}/{}", obj.type_name, uuid)));

        for (referrer, attr) in self.referrers(uuid) {
            let Some(from) = self.objects.get(&referrer) else {
                continue;
            };
            let mut entry = self.link_entry(&referrer);
            if let (Some(attr), Some(map)) = (attr, entry.as_object_mut()) {
                map.insert("attr".into(), attr);
            }
            push_entry(&mut data, back_refs_attr(&from.type_name), entry);
        }
        for child in self.children_of(uuid) {
            let Some(obj) = self.objects.get(&child) else {
                continue;
            };
            let entry = self.link_entry(&child);
            push_entry(&mut data, children_attr(&obj.type_name), entry);
        }
        Some(json!({ obj.type_name.clone(): data }))
    }

    fn list(&self, type_name: &str, params: &Params) -> Value {
        let param = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        let filters: Vec<(String, Value)> = param("filters")
            .map(parse_filters)
            .unwrap_or_default();
        let parents: Vec<String> = param("parent_id")
            .map(|s| s.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        let fields: Vec<&str> = param("fields")
            .map(|s| s.split(',').collect())
            .unwrap_or_default();

        let matches: Vec<(&Uuid, &StoredObject)> = self
            .objects
            .iter()
            .filter(|(_, o)| o.type_name == type_name)
            .filter(|(_, o)| {
                parents.is_empty()
                    || o.data
                        .get("parent_uuid")
                        .and_then(Value::as_str)
                        .is_some_and(|p| parents.iter().any(|x| x == p))
            })
            .filter(|(_, o)| {
                filters
                    .iter()
                    .all(|(field, value)| o.data.get(field) == Some(value))
            })
            .collect();

        let key = format!("{type_name}s");
        if param("count") == Some("true") {
            return json!({ key: { "count": matches.len() } });
        }
        let entries: Vec<Value> = matches
            .into_iter()
            .map(|(uuid, o)| {
                let mut entry = Map::new();
                entry.insert("uuid".into(), json!(uuid.to_string()));
                entry.insert("fq_name".into(), o.fq_name.to_value());
                entry.insert("href".into(), json!(format!("/{type_name}/{uuid}")));
                for field in &fields {
                    if let Some(v) = o.data.get(*field) {
                        entry.insert((*field).to_string(), v.clone());
                    }
                }
                Value::Object(entry)
            })
            .collect();
        json!({ key: entries })
    }

    /// Split an API path into a collection type or a `(type, uuid)` pair.
    fn route(&self, path: &str) -> Route {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Route::Index,
            [plural] => match plural.strip_suffix('s') {
                Some(t) if self.types.iter().any(|x| x == t) => Route::List(t.to_string()),
                _ => Route::Unknown,
            },
            [type_name, id] => match Uuid::parse_str(id) {
                Ok(uuid) => match self.objects.get(&uuid) {
                    Some(o) if o.type_name == *type_name => Route::Object(uuid),
                    _ => Route::Unknown,
                },
                Err(_) => Route::Unknown,
            },
            _ => Route::Unknown,
        }
    }
}

enum Route {
    Index,
    List(String),
    Object(Uuid),
    Unknown,
}

fn push_entry(data: &mut Map<String, Value>, key: String, entry: Value) {
    match data.entry(key).or_insert_with(|| json!([])) {
        Value::Array(items) => items.push(entry),
        other => *other = json!([entry]),
    }
}

fn parse_filters(raw: &str) -> Vec<(String, Value)> {
    raw.split(',')
        .filter_map(|pred| pred.split_once("=="))
        .map(|(field, value)| {
            let value = serde_json::from_str(value).unwrap_or_else(|_| json!(value));
            (field.to_string(), value)
        })
        .collect()
}

fn status(path: &str, status: u16, body: &str) -> RemoteError {
    RemoteError::Status {
        path: path.to_string(),
        status,
        body: body.to_string(),
    }
}

/// Fake API backed by a map of objects.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    state: Mutex<MemoryState>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type to the root index (in declaration order).
    pub fn declare_type(&self, type_name: &str) {
        self.state.lock().declare(type_name);
    }

    /// Store an object under a fresh v4 uuid.
    pub fn insert(&self, type_name: &str, fq_name: &str, data: Value) -> Uuid {
        let uuid = Uuid::new_v4();
        self.insert_with_uuid(type_name, uuid, fq_name, data);
        uuid
    }

    pub fn insert_with_uuid(&self, type_name: &str, uuid: Uuid, fq_name: &str, data: Value) {
        let fq_name: FqName = fq_name.parse().unwrap_or_default();
        let mut data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Some(name) = fq_name.name() {
            data.entry("name").or_insert_with(|| json!(name));
        }
        let mut state = self.state.lock();
        state.declare(type_name);
        state.objects.insert(
            uuid,
            StoredObject {
                type_name: type_name.to_string(),
                fq_name,
                data,
            },
        );
    }

    /// Make `from` reference `to` (stored as a `{to_type}_refs` entry).
    pub fn add_ref(&self, from: Uuid, to: Uuid) {
        let mut state = self.state.lock();
        let Some(target_type) = state.objects.get(&to).map(|o| o.type_name.clone()) else {
            return;
        };
        let entry = state.link_entry(&to);
        if let Some(obj) = state.objects.get_mut(&from) {
            push_entry(&mut obj.data, refs_attr(&target_type), entry);
        }
    }

    /// Make `parent` own `child`.
    pub fn set_parent(&self, child: Uuid, parent: Uuid) {
        let mut state = self.state.lock();
        let Some(parent_type) = state.objects.get(&parent).map(|o| o.type_name.clone()) else {
            return;
        };
        if let Some(obj) = state.objects.get_mut(&child) {
            obj.data.insert("parent_type".into(), json!(parent_type));
            obj.data.insert("parent_uuid".into(), json!(parent.to_string()));
        }
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.state.lock().objects.contains_key(uuid)
    }

    /// Stored data of an object as the API would render it.
    pub fn object(&self, uuid: &Uuid) -> Option<Value> {
        self.state.lock().render(uuid)
    }

    pub fn len(&self) -> usize {
        self.state.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }
}

impl RemoteSource for MemoryRemote {
    fn get(&self, path: &str, params: &Params) -> Result<Value, RemoteError> {
        let mut state = self.state.lock();
        state.record("GET", path, params);
        match state.route(path) {
            Route::Index => {
                let links: Vec<Value> = state
                    .types
                    .iter()
                    .flat_map(|t| {
                        [
                            json!({ "link": {
                                "name": format!("{t}s"),
                                "rel": "collection",
                                "href": format!("/{t}s"),
                            } }),
                            json!({ "link": {
                                "name": t,
                                "rel": "resource-base",
                                "href": format!("/{t}"),
                            } }),
                        ]
                    })
                    .collect();
                Ok(json!({ "href": "/", "links": links }))
            }
            Route::List(type_name) => Ok(state.list(&type_name, params)),
            Route::Object(uuid) => state
                .render(&uuid)
                .ok_or_else(|| status(path, 404, "not found")),
            Route::Unknown => Err(status(path, 404, "not found")),
        }
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        let mut state = self.state.lock();
        state.record("POST", path, &[]);
        let Route::List(type_name) = state.route(path) else {
            return Err(status(path, 404, "not found"));
        };
        let mut data = body
            .get(&type_name)
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| status(path, 400, "missing resource body"))?;
        let fq_name = match data.get("fq_name").and_then(FqName::from_value) {
            Some(fq) => fq,
            None => match data.get("name").and_then(Value::as_str) {
                Some(name) => FqName::new([name]),
                None => return Err(status(path, 400, "missing fq_name")),
            },
        };
        if state.find_fq(&type_name, &fq_name).is_some() {
            return Err(status(path, 409, "fq_name already exists"));
        }
        let uuid = data
            .get("uuid")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);
        for key in ["uuid", "fq_name", "href"] {
            data.remove(key);
        }
        if let Some(name) = fq_name.name() {
            data.entry("name").or_insert_with(|| json!(name));
        }
        state.objects.insert(
            uuid,
            StoredObject {
                type_name: type_name.clone(),
                fq_name: fq_name.clone(),
                data,
            },
        );
        Ok(json!({ type_name.clone(): {
            "uuid": uuid.to_string(),
            "fq_name": fq_name.to_value(),
            "href": format!("/{type_name}/{uuid}"),
        }}))
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        let mut state = self.state.lock();
        state.record("PUT", path, &[]);
        let Route::Object(uuid) = state.route(path) else {
            return Err(status(path, 404, "not found"));
        };
        let Some(obj) = state.objects.get_mut(&uuid) else {
            return Err(status(path, 404, "not found"));
        };
        let mut data = body
            .get(&obj.type_name)
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| status(path, 400, "missing resource body"))?;
        for key in ["uuid", "fq_name", "href"] {
            data.remove(key);
        }
        // Computed listings are never stored.
        data.retain(|k, _| !k.ends_with("_back_refs"));
        obj.data = data;
        let type_name = obj.type_name.clone();
        Ok(json!({ type_name: { "uuid": uuid.to_string(), "href": path } }))
    }

    fn delete(&self, path: &str) -> Result<bool, RemoteError> {
        let mut state = self.state.lock();
        state.record("DELETE", path, &[]);
        let Route::Object(uuid) = state.route(path) else {
            return Ok(false);
        };
        if !state.referrers(&uuid).is_empty() {
            return Err(status(path, 409, "resource has back references"));
        }
        if !state.children_of(&uuid).is_empty() {
            return Err(status(path, 409, "resource has children"));
        }
        Ok(state.objects.shift_remove(&uuid).is_some())
    }

    fn uuid_for(&self, type_name: &str, fq_name: &FqName) -> Result<Option<Uuid>, RemoteError> {
        let mut state = self.state.lock();
        state.record("POST", "/fqname-to-id", &[]);
        Ok(state.find_fq(type_name, fq_name))
    }

    fn fq_name_for(&self, type_name: &str, uuid: &Uuid) -> Result<Option<FqName>, RemoteError> {
        let mut state = self.state.lock();
        state.record("POST", "/id-to-fqname", &[]);
        Ok(state
            .objects
            .get(uuid)
            .filter(|o| o.type_name == type_name)
            .map(|o| o.fq_name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_back_refs_and_children() {
        let remote = MemoryRemote::new();
        let project = remote.insert("project", "default:admin", json!({}));
        let net = remote.insert("virtual-network", "default:admin:net", json!({}));
        let port = remote.insert("virtual-machine-interface", "default:admin:port", json!({}));
        remote.set_parent(net, project);
        remote.add_ref(port, net);

        let rendered = remote.object(&net).unwrap();
        let vn = &rendered["virtual-network"];
        assert_eq!(vn["parent_uuid"], json!(project.to_string()));
        assert_eq!(
            vn["virtual_machine_interface_back_refs"][0]["uuid"],
            json!(port.to_string())
        );
        let proj = remote.object(&project).unwrap();
        assert_eq!(proj["project"]["virtual_networks"][0]["uuid"], json!(net.to_string()));
    }

    #[test]
    fn delete_refuses_referenced_objects() {
        let remote = MemoryRemote::new();
        let net = remote.insert("virtual-network", "default:net", json!({}));
        let port = remote.insert("virtual-machine-interface", "default:port", json!({}));
        remote.add_ref(port, net);

        let err = remote.delete(&format!("/virtual-network/{net}")).unwrap_err();
        assert!(matches!(err, RemoteError::Status { status: 409, .. }));
        assert!(remote.delete(&format!("/virtual-machine-interface/{port}")).unwrap());
        assert!(remote.delete(&format!("/virtual-network/{net}")).unwrap());
        assert!(!remote.delete(&format!("/virtual-network/{net}")).unwrap());
    }

    #[test]
    fn list_honours_filters_and_count() {
        let remote = MemoryRemote::new();
        remote.insert("foo", "default:a", json!({ "color": "red" }));
        remote.insert("foo", "default:b", json!({ "color": "blue" }));

        let params = vec![("filters".to_string(), "color==\"red\"".to_string())];
        let listed = remote.get("/foos", &params).unwrap();
        assert_eq!(listed["foos"].as_array().unwrap().len(), 1);

        let mut params = params;
        params.push(("count".to_string(), "true".to_string()));
        assert_eq!(remote.get("/foos", &params).unwrap()["foos"]["count"], json!(1));
        assert!(remote.get("/bars", &[]).unwrap_err().is_not_found());
    }
}
