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

//! russh client handler performing host key verification.

use russh::client::Handler;
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use std::path::PathBuf;

use super::known_hosts::{get_default_known_hosts_path, StrictHostKeyChecking};
use crate::error::TransportError;

/// SSH client handler for managing server key verification.
#[derive(Debug, Clone)]
pub struct ClientHandler {
    hostname: String,
    port: u16,
    strict_mode: StrictHostKeyChecking,
    known_hosts_path: Option<PathBuf>,
}

impl ClientHandler {
    pub fn new(
        hostname: String,
        port: u16,
        strict_mode: StrictHostKeyChecking,
        known_hosts_path: Option<PathBuf>,
    ) -> Self {
        Self {
            hostname,
            port,
            strict_mode,
            known_hosts_path: known_hosts_path.or_else(get_default_known_hosts_path),
        }
    }

    fn check_known(&self, key: &russh::keys::PublicKey) -> Result<bool, russh::keys::Error> {
        match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.hostname, self.port, key, path),
            None => check_known_hosts(&self.hostname, self.port, key),
        }
    }

    fn learn(&self, key: &russh::keys::PublicKey) -> Result<(), russh::keys::Error> {
        match &self.known_hosts_path {
            Some(path) => learn_known_hosts_path(&self.hostname, self.port, key, path),
            None => learn_known_hosts(&self.hostname, self.port, key),
        }
    }
}

impl Handler for ClientHandler {
    type Error = TransportError;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        match self.strict_mode {
            StrictHostKeyChecking::No => {
                tracing::trace!("Host key checking disabled for {}", self.hostname);
                Ok(true)
            }
            StrictHostKeyChecking::Yes => match self.check_known(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    tracing::warn!(
                        "Host key for {}:{} is not in known_hosts (strict mode)",
                        self.hostname,
                        self.port
                    );
                    Ok(false)
                }
                Err(e) => {
                    tracing::warn!(
                        "Host key verification failed for {}:{}: {}",
                        self.hostname,
                        self.port,
                        e
                    );
                    Ok(false)
                }
            },
            StrictHostKeyChecking::AcceptNew => match self.check_known(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    if let Err(e) = self.learn(server_public_key) {
                        tracing::warn!(
                            "Could not record host key for {}:{}: {}",
                            self.hostname,
                            self.port,
                            e
                        );
                    } else {
                        tracing::info!(
                            "Added host key for {}:{} to known_hosts",
                            self.hostname,
                            self.port
                        );
                    }
                    Ok(true)
                }
                // A key mismatch for a known host is never accepted
                Err(e) => {
                    tracing::warn!(
                        "Host key for {}:{} changed or unreadable: {}",
                        self.hostname,
                        self.port,
                        e
                    );
                    Ok(false)
                }
            },
        }
    }
}
