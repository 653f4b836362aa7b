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

//! Normalized node and credential values.
//!
//! Every provisioning backend produces these same types. The engine holds
//! them read-only for the duration of a run.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Identity that needs no privilege escalation.
pub const ROOT_IDENTITY: &str = "root";

pub const DEFAULT_SSH_PORT: u16 = 22;

/// How a session authenticates with the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Private key; sudo is expected to work without a password
    Key,
    /// Password; sudo must be fed the secret on stdin
    Password,
}

/// Identity and secret used to authenticate a shell session.
///
/// The secret is kept in a `SecretString` so it is cleared on drop and never
/// shows up in `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    pub identity: String,
    secret: SecretString,
    pub auth: AuthMode,
}

impl Credentials {
    /// Create credentials, inferring the auth mode from the secret.
    ///
    /// A PEM encoded private key selects [`AuthMode::Key`], anything else
    /// is treated as a password.
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        let auth = if looks_like_private_key(&secret) {
            AuthMode::Key
        } else {
            AuthMode::Password
        };
        Self {
            identity: identity.into(),
            secret: SecretString::new(secret.into_boxed_str()),
            auth,
        }
    }

    pub fn with_password(identity: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: SecretString::new(password.into().into_boxed_str()),
            auth: AuthMode::Password,
        }
    }

    /// Create key credentials from the full text of a private key.
    pub fn with_private_key(identity: impl Into<String>, key_data: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: SecretString::new(key_data.into().into_boxed_str()),
            auth: AuthMode::Key,
        }
    }

    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    pub fn is_root(&self) -> bool {
        self.identity == ROOT_IDENTITY
    }

    pub fn is_key_auth(&self) -> bool {
        self.auth == AuthMode::Key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"[REDACTED]")
            .field("auth", &self.auth)
            .finish()
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
            && self.auth == other.auth
            && self.secret.expose_secret() == other.secret.expose_secret()
    }
}

fn looks_like_private_key(secret: &str) -> bool {
    let trimmed = secret.trim_start();
    trimmed.starts_with("-----BEGIN ")
        && trimmed
            .lines()
            .next()
            .is_some_and(|header| header.trim_end().ends_with("PRIVATE KEY-----"))
}

/// A remote compute target reachable via a shell session.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub public_addresses: Vec<String>,
    pub port: u16,
    pub credentials: Credentials,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        public_addresses: Vec<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            id: id.into(),
            public_addresses,
            port: DEFAULT_SSH_PORT,
            credentials,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// The first public address, used for connecting and for diagnostics.
    pub fn primary_address(&self) -> Option<&str> {
        self.public_addresses.first().map(String::as_str)
    }

    pub fn address(&self) -> Option<String> {
        self.primary_address()
            .map(|host| format!("{}:{}", host, self.port))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.primary_address() {
            Some(host) => write!(f, "{}@{}:{}", self.credentials.identity, host, self.port),
            None => write!(f, "{}@[{}]", self.credentials.identity, self.id),
        }
    }
}

/// Host shorthand used by the inventory: `[user@]host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    pub user: Option<String>,
    pub host: String,
    pub port: Option<u16>,
}

impl HostSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        // Parse formats:
        // - host
        // - host:port
        // - user@host
        // - user@host:port
        // - [v6addr]:port

        let (user, host_part) = match spec.split_once('@') {
            Some((user, rest)) => (Some(user.to_string()), rest),
            None => (None, spec),
        };

        let (host, port) = if let Some(stripped) = host_part.strip_prefix('[') {
            let (host, rest) = stripped
                .split_once(']')
                .context("Unclosed bracket in IPv6 address")?;
            let port = match rest.strip_prefix(':') {
                Some(port_str) => Some(port_str.parse::<u16>().context("Invalid port number")?),
                None => None,
            };
            (host, port)
        } else if host_part.matches(':').count() == 1 {
            let (host, port_str) = host_part
                .split_once(':')
                .context("Invalid host:port format")?;
            (host, Some(port_str.parse::<u16>().context("Invalid port number")?))
        } else {
            (host_part, None)
        };

        if host.is_empty() {
            anyhow::bail!("Host cannot be empty in '{spec}'");
        }

        Ok(Self {
            user: user.filter(|u| !u.is_empty()),
            host: host.to_string(),
            port,
        })
    }
}
