// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! YAML node inventory.
//!
//! ```yaml
//! defaults:
//!   user: ubuntu
//!   ssh_key: ~/.ssh/id_ed25519
//!   parallel: 10
//! clusters:
//!   web:
//!     password_env: WEB_PASSWORD
//!     nodes:
//!       - web1.example.com
//!       - admin@web2.example.com:2222
//!       - id: web3
//!         addresses: [10.0.0.3, 203.0.113.3]
//!         user: root
//! ```
//!
//! Node values override cluster values, which override `defaults`. The first
//! of those levels that names a credential source decides it: `ssh_key` is
//! read as a private key, otherwise `password_env` names the environment
//! variable holding the password.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::node::{Credentials, HostSpec, Node, DEFAULT_SSH_PORT};

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub clusters: HashMap<String, Cluster>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Defaults {
    pub user: Option<String>,
    pub port: Option<u16>,
    pub ssh_key: Option<String>,
    pub password_env: Option<String>,
    pub parallel: Option<usize>,
    /// Connection timeout in seconds
    pub connect_timeout: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Cluster {
    pub nodes: Vec<NodeConfig>,

    #[serde(flatten)]
    pub defaults: ClusterDefaults,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ClusterDefaults {
    pub user: Option<String>,
    pub port: Option<u16>,
    pub ssh_key: Option<String>,
    pub password_env: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeConfig {
    /// `[user@]host[:port]`, identified by `host` or `host:port`
    Simple(String),
    Detailed {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        addresses: Vec<String>,
        #[serde(default)]
        host: Option<String>,
        #[serde(default)]
        port: Option<u16>,
        #[serde(default)]
        user: Option<String>,
        #[serde(default)]
        ssh_key: Option<String>,
        #[serde(default)]
        password_env: Option<String>,
    },
}

/// Where a node's secret comes from, before it is read.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CredentialSource {
    KeyFile(String),
    PasswordEnv(String),
}

fn credential_source(
    ssh_key: Option<&String>,
    password_env: Option<&String>,
) -> Option<CredentialSource> {
    match (ssh_key, password_env) {
        (Some(key), _) => Some(CredentialSource::KeyFile(key.clone())),
        (None, Some(var)) => Some(CredentialSource::PasswordEnv(var.clone())),
        (None, None) => None,
    }
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        let expanded_path = expand_tilde(path);

        if !expanded_path.exists() {
            tracing::debug!(
                "Config file not found at {:?}, using defaults",
                expanded_path
            );
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&expanded_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to read configuration file at {expanded_path:?}. \
                     Please check file permissions and ensure the file is accessible."
                )
            })?;

        Self::from_yaml(&content).with_context(|| {
            format!(
                "Failed to parse YAML configuration file at {expanded_path:?}. \
                 Please check the YAML syntax is valid."
            )
        })
    }

    /// Load a file the user named explicitly. Unlike [`Config::load`], a
    /// missing file is an error.
    pub async fn load_required(path: &Path) -> Result<Self> {
        let expanded_path = expand_tilde(path);
        if !expanded_path.exists() {
            anyhow::bail!("Configuration file {expanded_path:?} does not exist");
        }
        Self::load(&expanded_path).await
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load configuration with priority order:
    /// 1. `fleetboot.yaml` in the current directory
    /// 2. The given default path (usually `~/.config/fleetboot/config.yaml`)
    pub async fn load_with_priority(default_path: &Path) -> Result<Self> {
        let current_dir_config = PathBuf::from("fleetboot.yaml");
        if current_dir_config.exists() {
            match Self::load(&current_dir_config).await {
                Ok(config) => return Ok(config),
                Err(e) => tracing::warn!("Ignoring {:?}: {:#}", current_dir_config, e),
            }
        }

        Self::load(default_path).await
    }

    pub fn get_cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.get(name)
    }

    /// Build the nodes of `cluster_name`, reading key files and password
    /// variables as needed.
    pub async fn resolve_nodes(&self, cluster_name: &str) -> Result<Vec<Node>> {
        let cluster = self.get_cluster(cluster_name).ok_or_else(|| {
            let mut available: Vec<_> = self.clusters.keys().cloned().collect();
            available.sort();
            anyhow::anyhow!(
                "Cluster '{}' not found in configuration.\nAvailable clusters: {}",
                cluster_name,
                available.join(", ")
            )
        })?;

        let mut nodes = Vec::with_capacity(cluster.nodes.len());
        for (index, node_config) in cluster.nodes.iter().enumerate() {
            let node = self
                .resolve_node(cluster, node_config)
                .await
                .with_context(|| {
                    format!("Invalid node #{} in cluster '{}'", index + 1, cluster_name)
                })?;
            nodes.push(node);
        }

        Ok(nodes)
    }

    async fn resolve_node(&self, cluster: &Cluster, node_config: &NodeConfig) -> Result<Node> {
        let cluster_source = credential_source(
            cluster.defaults.ssh_key.as_ref(),
            cluster.defaults.password_env.as_ref(),
        );
        let default_source = credential_source(
            self.defaults.ssh_key.as_ref(),
            self.defaults.password_env.as_ref(),
        );

        let (id, addresses, user, port, node_source) = match node_config {
            NodeConfig::Simple(spec) => {
                let parsed = HostSpec::parse(&expand_env_vars(spec))?;
                (
                    node_id(&parsed.host, parsed.port),
                    vec![parsed.host],
                    parsed.user,
                    parsed.port,
                    None,
                )
            }
            NodeConfig::Detailed {
                id,
                addresses,
                host,
                port,
                user,
                ssh_key,
                password_env,
            } => {
                let mut seen = HashSet::new();
                let all: Vec<String> = host
                    .iter()
                    .chain(addresses.iter())
                    .map(|a| expand_env_vars(a))
                    .filter(|a| seen.insert(a.clone()))
                    .collect();
                let id = match id {
                    Some(id) => expand_env_vars(id),
                    None => all
                        .first()
                        .map(|first| node_id(first, *port))
                        .context("Node needs an 'id' or at least one address")?,
                };
                (
                    id,
                    all,
                    user.as_ref().map(|u| expand_env_vars(u)),
                    *port,
                    credential_source(ssh_key.as_ref(), password_env.as_ref()),
                )
            }
        };

        if addresses.is_empty() {
            anyhow::bail!("Node '{id}' has no addresses");
        }

        let user = user
            .or_else(|| cluster.defaults.user.as_ref().map(|u| expand_env_vars(u)))
            .or_else(|| self.defaults.user.as_ref().map(|u| expand_env_vars(u)))
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "root".to_string());

        let port = port
            .or(cluster.defaults.port)
            .or(self.defaults.port)
            .unwrap_or(DEFAULT_SSH_PORT);

        let source = node_source
            .or(cluster_source)
            .or(default_source)
            .with_context(|| format!("Node '{id}' has neither ssh_key nor password_env"))?;

        let credentials = load_credentials(&user, &source).await?;

        Ok(Node::new(id, addresses, credentials).with_port(port))
    }
}

/// Nodes named after their address carry an explicit port in the id, so two
/// sshd instances on one host stay distinct.
fn node_id(host: &str, port: Option<u16>) -> String {
    match port {
        Some(port) if host.contains(':') => format!("[{host}]:{port}"),
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

async fn load_credentials(user: &str, source: &CredentialSource) -> Result<Credentials> {
    match source {
        CredentialSource::KeyFile(path) => {
            let path = expand_tilde(Path::new(&expand_env_vars(path)));
            let key_data = fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read SSH key file {path:?}"))?;
            Ok(Credentials::with_private_key(user, key_data))
        }
        CredentialSource::PasswordEnv(var) => {
            let password = std::env::var(var).with_context(|| {
                format!("Environment variable '{var}' for the password is not set")
            })?;
            Ok(Credentials::with_password(user, password))
        }
    }
}

/// Default inventory location, `~/.config/fleetboot/config.yaml`.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".config").join("fleetboot").join("config.yaml"))
        .unwrap_or_else(|| PathBuf::from("fleetboot.yaml"))
}

pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(rest) = path.to_str().and_then(|p| p.strip_prefix("~/")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

/// Expand environment variables in a string.
/// Supports `${VAR}` and `$VAR` syntax; unknown variables are left as written.
pub fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) if is_var_name(&braced[..end]) => {
                    let name = &braced[..end];
                    push_var(&mut result, name, &rest[pos..pos + end + 3]);
                    rest = &braced[end + 1..];
                }
                _ => {
                    result.push('$');
                    rest = after;
                }
            }
        } else {
            let len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            if len == 0 {
                result.push('$');
            } else {
                push_var(&mut result, &after[..len], &rest[pos..pos + len + 1]);
            }
            rest = &after[len..];
        }
    }

    result.push_str(rest);
    result
}

fn is_var_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn push_var(out: &mut String, name: &str, original: &str) {
    match std::env::var(name) {
        Ok(value) => out.push_str(&value),
        Err(_) => {
            tracing::debug!("Environment variable {} not found", name);
            out.push_str(original);
        }
    }
}
