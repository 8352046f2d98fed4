//! Blocking HTTP implementation of [`RemoteSource`].

use super::{Params, RemoteError, RemoteSource};
use crate::FqName;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct HttpRemoteConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    /// Prefix under which the API is mounted (e.g. `/api`), may be empty.
    pub base_path: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub timeout: Option<Duration>,
}

impl Default for HttpRemoteConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 8082,
            base_path: String::new(),
            user: None,
            password: None,
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl HttpRemoteConfig {
    pub fn base_url(&self) -> Result<Url, RemoteError> {
        let base_path = self.base_path.trim_matches('/');
        let raw = if base_path.is_empty() {
            format!("{}://{}:{}/", self.protocol, self.host, self.port)
        } else {
            format!("{}://{}:{}/{}/", self.protocol, self.host, self.port, base_path)
        };
        Url::parse(&raw).map_err(|e| RemoteError::Transport(format!("bad API url {raw}: {e}")))
    }
}

pub struct HttpRemote {
    client: Client,
    base: Url,
    user: Option<String>,
    password: Option<String>,
}

impl HttpRemote {
    pub fn new(config: &HttpRemoteConfig) -> Result<Self, RemoteError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| RemoteError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base: config.base_url()?,
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url, RemoteError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| RemoteError::Transport(format!("bad API path {path}: {e}")))
    }

    fn send(&self, path: &str, request: RequestBuilder) -> Result<Value, RemoteError> {
        let request = match &self.user {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        };
        let resp = request
            .send()
            .map_err(|e| RemoteError::Transport(format!("failed to reach {}: {e}", self.base)))?;
        let status = resp.status();
        let text = resp.text().unwrap_or_default();
        if !status.is_success() {
            return Err(RemoteError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| RemoteError::decode(path, e.to_string()))
    }
}

impl RemoteSource for HttpRemote {
    fn get(&self, path: &str, params: &Params) -> Result<Value, RemoteError> {
        tracing::debug!(path, ?params, "GET");
        let url = self.url(path)?;
        self.send(path, self.client.get(url).query(params))
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        tracing::debug!(path, "POST");
        let url = self.url(path)?;
        self.send(path, self.client.post(url).json(body))
    }

    fn put(&self, path: &str, body: &Value) -> Result<Value, RemoteError> {
        tracing::debug!(path, "PUT");
        let url = self.url(path)?;
        self.send(path, self.client.put(url).json(body))
    }

    fn delete(&self, path: &str) -> Result<bool, RemoteError> {
        tracing::debug!(path, "DELETE");
        let url = self.url(path)?;
        let mut request = self.client.delete(url);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_deref());
        }
        let resp = request
            .send()
            .map_err(|e| RemoteError::Transport(format!("failed to reach {}: {e}", self.base)))?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(RemoteError::Status {
                path: path.to_string(),
                status: s.as_u16(),
                body: resp.text().unwrap_or_default(),
            }),
        }
    }

    fn uuid_for(&self, type_name: &str, fq_name: &FqName) -> Result<Option<Uuid>, RemoteError> {
        let body = json!({ "type": type_name, "fq_name": fq_name.to_value() });
        let resp = match self.post("/fqname-to-id", &body) {
            Ok(v) => v,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        resp.get("uuid")
            .and_then(Value::as_str)
            .map(|s| {
                Uuid::parse_str(s).map_err(|e| RemoteError::decode("/fqname-to-id", e.to_string()))
            })
            .transpose()
    }

    fn fq_name_for(&self, type_name: &str, uuid: &Uuid) -> Result<Option<FqName>, RemoteError> {
        let body = json!({ "uuid": uuid.to_string() });
        let resp = match self.post("/id-to-fqname", &body) {
            Ok(v) => v,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        // The uuid exists but belongs to another type.
        if resp.get("type").and_then(Value::as_str) != Some(type_name) {
            return Ok(None);
        }
        Ok(resp.get("fq_name").and_then(FqName::from_value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_includes_mount_point() {
        let mut config = HttpRemoteConfig::default();
        assert_eq!(config.base_url().unwrap().as_str(), "http://localhost:8082/");
        config.base_path = "/api/".to_string();
        config.host = "10.0.0.1".to_string();
        let remote = HttpRemote::new(&config).unwrap();
        assert_eq!(
            remote.url("/virtual-networks").unwrap().as_str(),
            "http://10.0.0.1:8082/api/virtual-networks"
        );
    }
}
