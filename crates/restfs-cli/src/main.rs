//! restfs CLI
//!
//! Browse and edit a resource-oriented REST API as a filesystem:
//! - `/type` is a collection, `/type/<uuid>` a resource, `/type/a:b:c` the
//!   resource with that fq_name
//! - globs (`net*`, `/*/default:*`) match uuids and fq_names alike
//! - refs, back-refs, children and parent are followed like directory links

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use restfs_core::{Client, Event, EventBus, HttpRemote, Notification, TreeOptions};
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::prelude::*;

mod commands;
mod config;

use commands::Scope;
use config::{ConnectionArgs, Settings};

#[derive(Parser)]
#[command(name = "restfs")]
#[command(author, version, about = "restfs: a filesystem view over a REST resource API")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// More logging (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List collections and resources
    Ls {
        paths: Vec<String>,
        /// Show fq_names
        #[arg(short, long)]
        long: bool,
        /// `field=value` predicate (repeatable); values are JSON or plain strings
        #[arg(long = "filter")]
        filters: Vec<String>,
        /// Only children of this parent uuid (repeatable)
        #[arg(long = "parent-uuid")]
        parent_uuid: Vec<uuid::Uuid>,
    },

    /// Print resource data as JSON
    Cat {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Count collection members
    Count {
        paths: Vec<String>,
        #[arg(long = "filter")]
        filters: Vec<String>,
        #[arg(long = "parent-uuid")]
        parent_uuid: Vec<uuid::Uuid>,
    },

    /// Delete resources
    Rm {
        #[arg(required = true)]
        paths: Vec<String>,
        /// Delete everything referring to the targets first
        #[arg(short, long)]
        recursive: bool,
        /// Print what would be deleted
        #[arg(long)]
        dry_run: bool,
    },

    /// Show a resource's edges as a tree
    Tree {
        path: String,
        #[arg(long, default_value_t = 1)]
        depth: u32,
        /// refs, back-refs, children, parent or all (comma separated, repeatable)
        #[arg(long = "edges")]
        edges: Vec<String>,
        /// Emit JSON instead of an indented listing
        #[arg(long)]
        json: bool,
    },

    /// Add (or remove) a reference between two resources
    Ln {
        from: String,
        to: String,
        #[arg(short = 'r', long)]
        remove: bool,
    },

    /// Set one field of a resource (JSON or plain string value)
    Set {
        path: String,
        key: String,
        value: String,
    },

    /// Remove one field of a resource
    Unset { path: String, key: String },

    /// Show bound schema types, or one type's declaration
    Schema { type_name: Option<String> },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "restfs=warn",
        1 => "restfs=info",
        _ => "restfs=debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn connect(settings: &Settings) -> Result<Client> {
    let remote = HttpRemote::new(&settings.remote)?;
    tracing::debug!(api = %remote.base_url(), "connecting");
    let schema = settings.load_schema()?;

    let events = Arc::new(EventBus::new());
    for event in [Event::Created, Event::Deleted] {
        events.register(event, |n: &Notification| {
            tracing::trace!(event = %n.event, kind = ?n.kind, path = %n.path, "node event");
        });
    }
    Client::connect(Arc::new(remote), schema, events)
        .with_context(|| format!("reading the type index from {}", settings.remote.host))
}

fn scope(filters: &[String], parent_uuid: Vec<uuid::Uuid>) -> Result<Scope> {
    Ok(Scope {
        filters: filters
            .iter()
            .map(|f| commands::parse_filter(f))
            .collect::<Result<_>>()?,
        parent_uuid,
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::resolve(&cli.connection)?;
    let client = connect(&settings)?;
    let cwd = &settings.cwd;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Ls {
            paths,
            long,
            filters,
            parent_uuid,
        } => commands::cmd_ls(
            &client,
            cwd,
            &paths,
            &scope(&filters, parent_uuid)?,
            long,
            &mut out,
        )?,
        Commands::Cat { paths } => commands::cmd_cat(&client, cwd, &paths, &mut out)?,
        Commands::Count {
            paths,
            filters,
            parent_uuid,
        } => commands::cmd_count(&client, cwd, &paths, &scope(&filters, parent_uuid)?, &mut out)?,
        Commands::Rm {
            paths,
            recursive,
            dry_run,
        } => commands::cmd_rm(&client, cwd, &paths, recursive, dry_run, &mut out)?,
        Commands::Tree {
            path,
            depth,
            edges,
            json,
        } => {
            let options = TreeOptions {
                depth,
                kinds: commands::parse_edges(&edges)?,
                workers: settings.workers,
            };
            commands::cmd_tree(&client, cwd, &path, &options, json, &mut out)?
        }
        Commands::Ln { from, to, remove } => {
            commands::cmd_ln(&client, cwd, &from, &to, remove, &mut out)?
        }
        Commands::Set { path, key, value } => {
            commands::cmd_set(&client, cwd, &path, &key, Some(&value), &mut out)?
        }
        Commands::Unset { path, key } => {
            commands::cmd_set(&client, cwd, &path, &key, None, &mut out)?
        }
        Commands::Schema { type_name } => {
            commands::cmd_schema(&client, type_name.as_deref(), &mut out)?
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use restfs_core::EdgeSelector;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "restfs", "tree", "/foo/x", "--depth", "2", "--edges", "refs,parent", "--port", "9100",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.connection.port, Some(9100));
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Tree { depth, edges, .. } => {
                assert_eq!(depth, 2);
                assert_eq!(
                    commands::parse_edges(&edges).unwrap(),
                    vec![EdgeSelector::Refs, EdgeSelector::Parent]
                );
            }
            _ => panic!("expected tree"),
        }
    }
}
