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

//! Input validation for values that end up in remote command lines.
//!
//! # Security
//!
//! The script name is interpolated into `chmod 755 <name>` and `./<name> init`,
//! so it must be a single, inert path segment:
//! - no path separators or traversal (`.`, `..`)
//! - no shell metacharacters or whitespace
//! - no control characters

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::node::Node;

/// Maximum length of a single path segment on common filesystems
const MAX_SCRIPT_NAME_LENGTH: usize = 255;

/// Characters that would be interpreted by the remote shell
const SHELL_METACHARACTERS: &[char] = &[
    '$', '`', ';', '&', '|', '>', '<', '(', ')', '{', '}', '[', ']', '*', '?', '!', '~', '#',
    '\'', '"', '\\', '/',
];

/// Validate a script name as a traversal-safe remote filename.
///
/// # Examples
///
/// ```
/// use fleetboot::security::validate_script_name;
///
/// assert!(validate_script_name("bootstrap.sh").is_ok());
/// assert!(validate_script_name("../etc/passwd").is_err());
/// assert!(validate_script_name("run;reboot").is_err());
/// ```
pub fn validate_script_name(name: &str) -> Result<(), ValidationError> {
    const FIELD: &str = "script name";

    if name.is_empty() {
        return Err(ValidationError::empty(FIELD));
    }

    if name.len() > MAX_SCRIPT_NAME_LENGTH {
        return Err(ValidationError::too_long(FIELD, MAX_SCRIPT_NAME_LENGTH));
    }

    if name == "." || name == ".." {
        return Err(ValidationError::new(
            FIELD,
            "must not be a directory reference",
        ));
    }

    if name.starts_with('-') {
        return Err(ValidationError::new(FIELD, "must not start with '-'"));
    }

    if name
        .chars()
        .any(|c| c.is_control() || c.is_whitespace() || SHELL_METACHARACTERS.contains(&c))
    {
        return Err(ValidationError::invalid_characters(FIELD));
    }

    Ok(())
}

/// Validate a single node before any session is opened for it.
pub fn validate_node(node: &Node) -> Result<(), ValidationError> {
    if node.id.trim().is_empty() {
        return Err(ValidationError::empty("node id"));
    }

    if node.public_addresses.is_empty() {
        return Err(ValidationError::new(
            format!("node '{}'", node.id),
            "has no public address",
        ));
    }

    if node.public_addresses.iter().any(|a| a.trim().is_empty()) {
        return Err(ValidationError::new(
            format!("node '{}'", node.id),
            "has an empty public address",
        ));
    }

    if node.credentials.identity.trim().is_empty() {
        return Err(ValidationError::new(
            format!("node '{}'", node.id),
            "credential identity cannot be empty",
        ));
    }

    Ok(())
}

/// Validate a node set for one fleet run.
///
/// The set must be non-empty, every node must be well formed, and ids must be
/// unique because results are keyed by node id.
pub fn validate_node_set(nodes: &[Node]) -> Result<(), ValidationError> {
    if nodes.is_empty() {
        return Err(ValidationError::new("nodes", "node set is empty"));
    }

    let mut seen = HashSet::with_capacity(nodes.len());
    for node in nodes {
        validate_node(node)?;
        if !seen.insert(node.id.as_str()) {
            return Err(ValidationError::new(
                "nodes",
                format!("duplicate node id '{}'", node.id),
            ));
        }
    }

    Ok(())
}
