//! Connection and session settings.
//!
//! Precedence for every setting:
//! 1) command-line flag
//! 2) env var (`RESTFS_*`)
//! 3) built-in default

use anyhow::{anyhow, Context, Result};
use clap::Args;
use restfs_core::schema::{DummySchema, SchemaStore};
use restfs_core::{HttpRemoteConfig, Path, Schema};
use std::path::PathBuf;
use std::sync::Arc;

pub const RESTFS_HOST_ENV: &str = "RESTFS_HOST";
pub const RESTFS_PORT_ENV: &str = "RESTFS_PORT";
pub const RESTFS_PROTOCOL_ENV: &str = "RESTFS_PROTOCOL";
pub const RESTFS_USER_ENV: &str = "RESTFS_USER";
pub const RESTFS_PASSWORD_ENV: &str = "RESTFS_PASSWORD";
pub const RESTFS_SCHEMA_DIR_ENV: &str = "RESTFS_SCHEMA_DIR";
pub const RESTFS_SCHEMA_VERSION_ENV: &str = "RESTFS_SCHEMA_VERSION";
pub const RESTFS_CWD_ENV: &str = "RESTFS_CWD";

const DEFAULT_SCHEMA_DIR: &str = "schemas";
const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone, Default, Args)]
pub struct ConnectionArgs {
    /// API host [env: RESTFS_HOST] (default: localhost)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// API port [env: RESTFS_PORT] (default: 8082)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// `http` or `https` [env: RESTFS_PROTOCOL]
    #[arg(long, global = true)]
    pub protocol: Option<String>,

    /// Basic-auth user [env: RESTFS_USER]
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Basic-auth password [env: RESTFS_PASSWORD]
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Directory holding `<version>.json` schema files [env: RESTFS_SCHEMA_DIR]
    #[arg(long, global = true)]
    pub schema_dir: Option<PathBuf>,

    /// Schema version to bind; without one edge typing is approximate
    /// [env: RESTFS_SCHEMA_VERSION]
    #[arg(long, global = true)]
    pub schema_version: Option<String>,

    /// Path relative expressions are anchored at [env: RESTFS_CWD] (default: /)
    #[arg(long, global = true)]
    pub cwd: Option<String>,

    /// Worker threads for tree walks
    #[arg(long, global = true)]
    pub workers: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub remote: HttpRemoteConfig,
    pub schema_dir: PathBuf,
    pub schema_version: Option<String>,
    pub cwd: Path,
    pub workers: usize,
}

impl Settings {
    pub fn resolve(args: &ConnectionArgs) -> Result<Self> {
        Self::resolve_with(args, env_value)
    }

    pub fn resolve_with<F>(args: &ConnectionArgs, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<Option<String>>,
    {
        let pick = |flag: &Option<String>, name: &str| -> Result<Option<String>> {
            match flag {
                Some(v) => Ok(Some(v.clone())),
                None => env(name),
            }
        };

        let mut remote = HttpRemoteConfig::default();
        if let Some(host) = pick(&args.host, RESTFS_HOST_ENV)? {
            remote.host = host;
        }
        remote.port = match args.port {
            Some(port) => port,
            None => match env(RESTFS_PORT_ENV)? {
                Some(v) => v.parse::<u16>().map_err(|_| {
                    anyhow!("invalid {RESTFS_PORT_ENV}={v:?} (expected a port number)")
                })?,
                None => remote.port,
            },
        };
        if let Some(protocol) = pick(&args.protocol, RESTFS_PROTOCOL_ENV)? {
            let protocol = protocol.to_ascii_lowercase();
            if protocol != "http" && protocol != "https" {
                return Err(anyhow!("invalid protocol {protocol:?} (expected http|https)"));
            }
            remote.protocol = protocol;
        }
        remote.user = pick(&args.user, RESTFS_USER_ENV)?;
        remote.password = pick(&args.password, RESTFS_PASSWORD_ENV)?;

        let schema_dir = match &args.schema_dir {
            Some(dir) => dir.clone(),
            None => env(RESTFS_SCHEMA_DIR_ENV)?
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCHEMA_DIR)),
        };
        let schema_version = pick(&args.schema_version, RESTFS_SCHEMA_VERSION_ENV)?;

        let cwd = pick(&args.cwd, RESTFS_CWD_ENV)?.unwrap_or_else(|| "/".to_string());
        let cwd = Path::root().join(cwd.as_str());

        Ok(Self {
            remote,
            schema_dir,
            schema_version,
            cwd,
            workers: args.workers.unwrap_or(DEFAULT_WORKERS).max(1),
        })
    }

    /// Concrete schema when a version is bound, the permissive one otherwise.
    pub fn load_schema(&self) -> Result<Arc<dyn Schema>> {
        match &self.schema_version {
            Some(version) => {
                let store = SchemaStore::new(&self.schema_dir);
                let table = store.open(version).with_context(|| {
                    let available = store.versions().unwrap_or_default().join(", ");
                    format!(
                        "loading schema {version} from {} (available: {available})",
                        self.schema_dir.display()
                    )
                })?;
                tracing::debug!(%version, types = table.len(), "schema loaded");
                Ok(Arc::new(table))
            }
            None => Ok(Arc::new(DummySchema::new())),
        }
    }
}

/// Read an env var; empty values count as unset.
fn env_value(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(v) => {
            let v = v.trim();
            Ok((!v.is_empty()).then(|| v.to_string()))
        }
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(anyhow!("failed to read {name}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Result<Option<String>> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| Ok(map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_without_flags_or_env() {
        let settings = Settings::resolve_with(&ConnectionArgs::default(), env_from(&[])).unwrap();
        assert_eq!(settings.remote.host, "localhost");
        assert_eq!(settings.remote.port, 8082);
        assert_eq!(settings.remote.protocol, "http");
        assert_eq!(settings.cwd, Path::root());
        assert_eq!(settings.workers, 4);
        assert!(settings.schema_version.is_none());
    }

    #[test]
    fn flags_beat_env() {
        let env = env_from(&[
            (RESTFS_HOST_ENV, "api.example"),
            (RESTFS_PORT_ENV, "9000"),
            (RESTFS_CWD_ENV, "virtual-network"),
        ]);
        let args = ConnectionArgs {
            host: Some("flag.example".into()),
            ..ConnectionArgs::default()
        };
        let settings = Settings::resolve_with(&args, env).unwrap();
        assert_eq!(settings.remote.host, "flag.example");
        assert_eq!(settings.remote.port, 9000);
        assert_eq!(settings.cwd, Path::new("/virtual-network"));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = Settings::resolve_with(
            &ConnectionArgs::default(),
            env_from(&[(RESTFS_PORT_ENV, "eighty")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains(RESTFS_PORT_ENV));

        let args = ConnectionArgs {
            protocol: Some("gopher".into()),
            ..ConnectionArgs::default()
        };
        assert!(Settings::resolve_with(&args, env_from(&[])).is_err());
    }

    #[test]
    fn schema_version_selects_store_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("3.2.json"),
            r#"{ "version": "3.2", "links": [ { "kind": "ref", "from": "a", "to": "b" } ] }"#,
        )
        .unwrap();
        let args = ConnectionArgs {
            schema_dir: Some(dir.path().to_path_buf()),
            schema_version: Some("3.2".into()),
            ..ConnectionArgs::default()
        };
        let settings = Settings::resolve_with(&args, env_from(&[])).unwrap();
        let schema = settings.load_schema().unwrap();
        assert!(schema.is_precise());
        assert!(schema.resource("a").unwrap().has_ref("b"));

        let missing = Settings {
            schema_version: Some("9.9".into()),
            ..settings
        };
        assert!(missing.load_schema().is_err());

        let dummy = Settings::resolve_with(&ConnectionArgs::default(), env_from(&[]))
            .unwrap()
            .load_schema()
            .unwrap();
        assert!(!dummy.is_precise());
    }
}
