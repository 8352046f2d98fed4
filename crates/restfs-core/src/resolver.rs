//! Path expressions to concrete graph nodes.
//!
//! Each expression is anchored at the caller's current path and then handled
//! by the first rule that applies:
//!
//! 1. wildcard (`*`, `?`): list the type's collection (or every type when the
//!    wildcard is in the type segment) and keep members whose `/type/uuid`
//!    or `/type/fq:name` form matches the glob;
//! 2. fq_name (`:` in the last segment of `type/name`): remote lookup;
//! 3. `type/uuid`: verified resource;
//! 4. `type` or `/`: unfetched collection.
//!
//! Results are deduplicated by path, keeping first-seen order.

use crate::collection::FetchOptions;
use crate::path::has_wildcard;
use crate::{Client, Collection, Error, FqName, Node, NodeKind, Path, Resource, Result};
use globset::{GlobBuilder, GlobMatcher};
use indexmap::IndexMap;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct ExpandOptions {
    /// Accept only nodes of this kind.
    pub kind: Option<NodeKind>,
    /// Forwarded to every collection built along the way.
    pub filters: Vec<(String, Value)>,
    pub parent_uuid: Vec<Uuid>,
}

impl ExpandOptions {
    pub fn resources() -> Self {
        Self {
            kind: Some(NodeKind::Resource),
            ..Self::default()
        }
    }

    pub fn collections() -> Self {
        Self {
            kind: Some(NodeKind::Collection),
            ..Self::default()
        }
    }

    fn accepts(&self, kind: NodeKind) -> bool {
        self.kind.map_or(true, |k| k == kind)
    }
}

/// Resolver bound to a client and a current path.
#[derive(Debug, Clone)]
pub struct Resolver {
    client: Client,
    cwd: Path,
}

impl Resolver {
    pub fn new(client: Client, cwd: Path) -> Self {
        Self { client, cwd }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn set_cwd(&mut self, cwd: Path) {
        self.cwd = cwd;
    }

    /// Resolve `exprs` (or the current path when empty).
    pub fn expand<I, S>(&self, exprs: I, options: &ExpandOptions) -> Result<Vec<Node>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exprs: Vec<String> = exprs
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        if exprs.is_empty() {
            exprs.push(self.cwd.to_string());
        }

        let mut found: IndexMap<Path, Node> = IndexMap::new();
        for expr in &exprs {
            for node in self.expand_one(expr, options)? {
                let Some(path) = node.path() else {
                    continue;
                };
                found.entry(path).or_insert(node);
            }
        }
        if found.is_empty() {
            return Err(Error::NoResourceFound);
        }
        tracing::debug!(expressions = exprs.len(), nodes = found.len(), "expanded paths");
        Ok(found.into_values().collect())
    }

    fn expand_one(&self, expr: &str, options: &ExpandOptions) -> Result<Vec<Node>> {
        let path = self.cwd.join(expr);
        let shown = path.to_string();

        if has_wildcard(&shown) {
            return self.expand_glob(&path, options);
        }

        let node = if let Some(fq_name) = fq_name_of(&path) {
            let type_name = path.type_name().unwrap_or_default();
            Resource::with_fq_name(self.client.clone(), type_name, fq_name)
                .map(Node::Resource)
                .map_err(|e| not_found_to_bad_path(e, &shown))?
        } else if let (true, Some(uuid)) = (path.is_resource(), path.uuid()) {
            let type_name = path.type_name().unwrap_or_default();
            Resource::with_uuid_checked(self.client.clone(), type_name, uuid)
                .map(Node::Resource)
                .map_err(|e| not_found_to_bad_path(e, &shown))?
        } else if path.is_root() || path.is_collection() {
            Node::Collection(Collection::scoped(
                self.client.clone(),
                path.type_name().unwrap_or_default(),
                &options.filters,
                &options.parent_uuid,
            ))
        } else {
            return Err(Error::bad_path(expr, "not a resource or collection path"));
        };

        if !options.accepts(node.kind()) {
            let expected = match node.kind() {
                NodeKind::Resource => "a collection",
                NodeKind::Collection => "a resource",
            };
            return Err(Error::bad_path(expr, format!("expected {expected}")));
        }
        Ok(vec![node])
    }

    fn expand_glob(&self, path: &Path, options: &ExpandOptions) -> Result<Vec<Node>> {
        let pattern = path.to_string();
        let matcher = compile_glob(&pattern)?;
        let type_segment = path.type_name().unwrap_or_default();

        let candidates: Vec<Node> = if has_wildcard(type_segment) {
            let mut root = Collection::scoped(
                self.client.clone(),
                "",
                &options.filters,
                &options.parent_uuid,
            );
            if options.kind == Some(NodeKind::Collection) {
                root.fetch(&FetchOptions::depth(1))?;
                root.into_members()
            } else {
                root.fetch(&FetchOptions::depth(2).with_fields(["fq_name"]))?;
                root.into_members()
                    .into_iter()
                    .filter_map(Node::into_collection)
                    .flat_map(Collection::into_members)
                    .collect()
            }
        } else {
            let mut collection = Collection::scoped(
                self.client.clone(),
                type_segment,
                &options.filters,
                &options.parent_uuid,
            );
            collection.fetch(&FetchOptions::depth(1).with_fields(["fq_name"]))?;
            collection.into_members()
        };

        let matched: Vec<Node> = candidates
            .into_iter()
            .filter(|node| options.accepts(node.kind()))
            .filter(|node| glob_matches(&matcher, node))
            .collect();
        tracing::debug!(%pattern, matched = matched.len(), "glob expansion");
        Ok(matched)
    }
}

/// Resolve `exprs` relative to `cwd`. See [`Resolver`].
pub fn expand_paths<I, S>(
    client: &Client,
    cwd: &Path,
    exprs: I,
    options: &ExpandOptions,
) -> Result<Vec<Node>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Resolver::new(client.clone(), cwd.clone()).expand(exprs, options)
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(false)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| Error::bad_path(pattern, e))
}

/// Match on the path form, then on the `/type/fq_name` form.
fn glob_matches(matcher: &GlobMatcher, node: &Node) -> bool {
    let Some(path) = node.path() else {
        return false;
    };
    if matcher.is_match(path.to_string()) {
        return true;
    }
    match node.as_resource().and_then(Resource::fq_name) {
        Some(fq) => matcher.is_match(format!("/{}/{}", node.type_name(), fq)),
        None => false,
    }
}

fn fq_name_of(path: &Path) -> Option<FqName> {
    match path.segments() {
        [_, name] if name.contains(FqName::SEPARATOR) => name.parse().ok(),
        _ => None,
    }
}

fn not_found_to_bad_path(err: Error, expr: &str) -> Error {
    match err {
        Error::ResourceNotFound { type_name, id } => {
            Error::bad_path(expr, format!("{type_name} `{id}` not found"))
        }
        other => other,
    }
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

    fn paths(nodes: &[Node]) -> Vec<String> {
        nodes
            .iter()
            .filter_map(Node::path)
            .map(|p| p.to_string())
            .collect()
    }

    #[test]
    fn empty_expressions_resolve_cwd() {
        let (_remote, client) = setup();
        let nodes = expand_paths(
            &client,
            &Path::new("/foo"),
            Vec::<&str>::new(),
            &ExpandOptions::default(),
        )
        .unwrap();
        assert_eq!(paths(&nodes), vec!["/foo"]);
        assert!(!nodes[0].as_collection().unwrap().is_fetched());
    }

    #[test]
    fn dot_expressions_stay_at_cwd() {
        let (_remote, client) = setup();
        let cwd = Path::new("/foo");
        for expr in [".", "bar/..", "./"] {
            let nodes = expand_paths(&client, &cwd, [expr], &ExpandOptions::default()).unwrap();
            assert_eq!(paths(&nodes), vec!["/foo"], "{expr}");
        }
    }

    #[test]
    fn relative_expressions_anchor_at_cwd() {
        let (remote, client) = setup();
        let uuid = remote.insert("foo", "default:a", json!({}));
        let nodes = expand_paths(
            &client,
            &Path::new("/foo"),
            [uuid.to_string(), format!("../foo/{uuid}")],
            &ExpandOptions::default(),
        )
        .unwrap();
        assert_eq!(paths(&nodes), vec![format!("/foo/{uuid}")]);
    }

    #[test]
    fn kind_mismatch_on_plain_path_is_bad_path() {
        let (_remote, client) = setup();
        let err = expand_paths(&client, &Path::root(), ["foo"], &ExpandOptions::resources())
            .unwrap_err();
        assert!(matches!(err, Error::BadPath { .. }));
    }

    #[test]
    fn filters_reach_collections() {
        let (_remote, client) = setup();
        let options = ExpandOptions {
            filters: vec![("color".into(), json!("red"))],
            ..ExpandOptions::default()
        };
        let nodes = expand_paths(&client, &Path::root(), ["/foo"], &options).unwrap();
        let c = nodes[0].as_collection().unwrap();
        assert_eq!(c.filters(), &[("color".to_string(), json!("red"))]);
    }

    #[test]
    fn invalid_glob_is_bad_path() {
        let (remote, client) = setup();
        remote.declare_type("foo");
        let err = expand_paths(&client, &Path::root(), ["/foo/[a*"], &ExpandOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::BadPath { .. }));
    }

    #[test]
    fn type_glob_with_collection_kind_matches_types() {
        let (remote, client) = setup();
        remote.declare_type("foo");
        remote.declare_type("fab");
        remote.declare_type("bar");
        let nodes = expand_paths(&client, &Path::root(), ["f*"], &ExpandOptions::collections())
            .unwrap();
        assert_eq!(paths(&nodes), vec!["/foo", "/fab"]);
    }
}
