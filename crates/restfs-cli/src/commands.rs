//! Command implementations.
//!
//! Every command takes the client, the current path and an output sink so it
//! can run against an in-memory API in tests.

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use restfs_core::collection::FetchOptions;
use restfs_core::{
    build_tree, delete_cascade, expand_paths, link_resources, unlink_resources, Client,
    EdgeSelector, ExpandOptions, Node, NodeKind, Path, Resource, TreeNode, TreeOptions,
};
use serde_json::Value;
use std::io::Write;
use uuid::Uuid;

/// Collection scoping shared by the listing commands.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub filters: Vec<(String, Value)>,
    pub parent_uuid: Vec<Uuid>,
}

impl Scope {
    fn options(&self, kind: Option<NodeKind>) -> ExpandOptions {
        ExpandOptions {
            kind,
            filters: self.filters.clone(),
            parent_uuid: self.parent_uuid.clone(),
        }
    }
}

/// Parse `field=value`; the value is JSON when it parses as JSON, a string otherwise.
pub fn parse_filter(raw: &str) -> Result<(String, Value)> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid filter {raw:?} (expected field=value)"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(anyhow!("invalid filter {raw:?} (empty field name)"));
    }
    Ok((field.to_string(), parse_value(value)))
}

pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn shown(path: &Path, cwd: &Path) -> String {
    path.relative_to(cwd).to_string()
}

fn resources(
    client: &Client,
    cwd: &Path,
    exprs: &[String],
    scope: &Scope,
) -> Result<Vec<Resource>> {
    Ok(expand_paths(client, cwd, exprs, &scope.options(Some(NodeKind::Resource)))?
        .into_iter()
        .filter_map(Node::into_resource)
        .collect())
}

// ============================================================================
// Listing
// ============================================================================

pub fn cmd_ls(
    client: &Client,
    cwd: &Path,
    exprs: &[String],
    scope: &Scope,
    long: bool,
    out: &mut dyn Write,
) -> Result<()> {
    for node in expand_paths(client, cwd, exprs, &scope.options(None))? {
        match node {
            Node::Collection(mut collection) => {
                let fields: Vec<&str> = if long { vec!["fq_name"] } else { Vec::new() };
                collection.fetch(&FetchOptions::depth(1).with_fields(fields))?;
                for member in collection.members() {
                    write_entry(member, cwd, long, out)?;
                }
            }
            resource @ Node::Resource(_) => write_entry(&resource, cwd, long, out)?,
        }
    }
    Ok(())
}

fn write_entry(node: &Node, cwd: &Path, long: bool, out: &mut dyn Write) -> Result<()> {
    match node {
        Node::Collection(c) => writeln!(out, "{}/", shown(&c.path(), cwd).blue().bold())?,
        Node::Resource(r) => {
            let Some(path) = r.path() else {
                return Ok(());
            };
            match (long, r.fq_name()) {
                (true, Some(fq)) => {
                    writeln!(out, "{}  {}", shown(&path, cwd), fq.to_string().dimmed())?
                }
                _ => writeln!(out, "{}", shown(&path, cwd))?,
            }
        }
    }
    Ok(())
}

pub fn cmd_cat(client: &Client, cwd: &Path, exprs: &[String], out: &mut dyn Write) -> Result<()> {
    for mut resource in resources(client, cwd, exprs, &Scope::default())? {
        resource.fetch(0)?;
        let mut body = serde_json::Map::new();
        body.insert(
            resource.type_name().to_string(),
            Value::Object(resource.data().clone()),
        );
        writeln!(out, "{}", serde_json::to_string_pretty(&body)?)?;
    }
    Ok(())
}

pub fn cmd_count(
    client: &Client,
    cwd: &Path,
    exprs: &[String],
    scope: &Scope,
    out: &mut dyn Write,
) -> Result<()> {
    let nodes = expand_paths(client, cwd, exprs, &scope.options(Some(NodeKind::Collection)))?;
    let single = nodes.len() == 1;
    for collection in nodes.into_iter().filter_map(Node::into_collection) {
        let n = collection.count()?;
        if single {
            writeln!(out, "{n}")?;
        } else {
            writeln!(out, "{}: {n}", shown(&collection.path(), cwd))?;
        }
    }
    Ok(())
}

// ============================================================================
// Mutations
// ============================================================================

pub fn cmd_rm(
    client: &Client,
    cwd: &Path,
    exprs: &[String],
    recursive: bool,
    dry_run: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let targets = resources(client, cwd, exprs, &Scope::default())?;
    let verb = if dry_run { "would delete" } else { "deleted" };
    if recursive {
        for path in delete_cascade(targets, dry_run)? {
            writeln!(out, "{} {}", verb.red(), shown(&path, cwd))?;
        }
        return Ok(());
    }
    for mut resource in targets {
        let Some(path) = resource.path() else {
            continue;
        };
        if dry_run || resource.delete()? {
            writeln!(out, "{} {}", verb.red(), shown(&path, cwd))?;
        }
    }
    Ok(())
}

pub fn cmd_ln(
    client: &Client,
    cwd: &Path,
    from: &str,
    to: &str,
    remove: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let mut a = single_resource(client, cwd, from)?;
    let mut b = single_resource(client, cwd, to)?;
    let outcome = if remove {
        unlink_resources(&mut a, &mut b)?
    } else {
        link_resources(&mut a, &mut b)?
    };
    let arrow = if remove { "-/->" } else { "->" };
    writeln!(
        out,
        "{} {arrow} {}",
        shown(&outcome.owner, cwd),
        shown(&outcome.target, cwd)
    )?;
    Ok(())
}

fn single_resource(client: &Client, cwd: &Path, expr: &str) -> Result<Resource> {
    let mut found = resources(client, cwd, &[expr.to_string()], &Scope::default())?;
    if found.len() != 1 {
        return Err(anyhow!("{expr:?} matches {} resources, expected one", found.len()));
    }
    Ok(found.remove(0))
}

/// Set (or with `value == None`, remove) one field and save.
pub fn cmd_set(
    client: &Client,
    cwd: &Path,
    expr: &str,
    key: &str,
    value: Option<&str>,
    out: &mut dyn Write,
) -> Result<()> {
    let mut resource = single_resource(client, cwd, expr)?;
    resource.fetch(0)?;
    match value {
        Some(raw) => {
            resource.set(key, parse_value(raw));
        }
        None => {
            if resource.remove(key).is_none() {
                return Err(anyhow!("{expr:?} has no field {key:?}"));
            }
        }
    }
    resource
        .save()
        .with_context(|| format!("saving {expr:?}"))?;
    let path = resource.path().map(|p| shown(&p, cwd)).unwrap_or_default();
    writeln!(out, "{} {path}", "updated".green())?;
    Ok(())
}

// ============================================================================
// Tree / schema
// ============================================================================

pub fn cmd_tree(
    client: &Client,
    cwd: &Path,
    expr: &str,
    options: &TreeOptions,
    json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let root = single_resource(client, cwd, expr)?;
    let tree = build_tree(&root, options)?;
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&tree)?)?;
    } else {
        write_tree(&tree, cwd, 0, out)?;
    }
    Ok(())
}

fn write_tree(node: &TreeNode, cwd: &Path, level: usize, out: &mut dyn Write) -> Result<()> {
    let indent = "  ".repeat(level);
    let via = node
        .via
        .as_deref()
        .map(|v| format!("{} ", v.dimmed()))
        .unwrap_or_default();
    let fq = node
        .fq_name
        .as_deref()
        .map(|fq| format!(" ({fq})"))
        .unwrap_or_default();
    writeln!(out, "{indent}{via}{}{fq}", shown(&node.path, cwd))?;
    for child in &node.children {
        write_tree(child, cwd, level + 1, out)?;
    }
    Ok(())
}

pub fn parse_edges(raw: &[String]) -> Result<Vec<EdgeSelector>> {
    if raw.is_empty() {
        return Ok(vec![EdgeSelector::Refs]);
    }
    let mut kinds = Vec::new();
    for item in raw.iter().flat_map(|s| s.split(',')) {
        let item = item.trim();
        if item == "all" {
            return Ok(EdgeSelector::ALL.to_vec());
        }
        let kind: EdgeSelector = item.parse().map_err(|e: String| anyhow!(e))?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

/// Type names, or one type's declaration.
pub fn cmd_schema(client: &Client, type_name: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let schema = client.schema();
    let Some(type_name) = type_name else {
        if let Some(version) = schema.version() {
            writeln!(out, "{} {version}", "schema".bold())?;
        }
        for name in schema.type_names() {
            writeln!(out, "{name}")?;
        }
        return Ok(());
    };
    let entry = schema.resource(type_name)?;
    writeln!(out, "{}", entry.name.bold())?;
    if let Some(parent) = &entry.parent {
        writeln!(out, "  parent     {parent}")?;
    }
    for (label, list) in [
        ("children", &entry.children),
        ("refs", &entry.refs),
        ("back_refs", &entry.back_refs),
    ] {
        if !list.is_empty() {
            writeln!(out, "  {label:<10} {}", list.join(", "))?;
        }
    }
    for prop in &entry.properties {
        writeln!(out, "  property   {} ({:?})", prop.name, prop.shape)?;
    }
    Ok(())
}
