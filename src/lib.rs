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

//! Remote node bootstrap engine.
//!
//! Uploads a rendered script to each node of a fleet, runs its `init` and
//! `start` entry points, and collects one outcome per node.
//!
//! ```ignore
//! use std::sync::Arc;
//! use fleetboot::{executor::FleetExecutor, script::ScriptSpec, ssh::SshConnector};
//!
//! let executor = FleetExecutor::new(Arc::new(SshConnector::default())).with_max_parallel(10);
//! let body = "#!/bin/sh\ncase \"$1\" in init) ;; start) ;; esac\n";
//! let script = ScriptSpec::new("bootstrap.sh", body)?;
//! let run = executor.run(nodes, script, true).await?;
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod node;
pub mod script;
pub mod security;
pub mod ssh;
pub mod utils;

pub use error::{TransportError, ValidationError};
pub use executor::{ExecutionResult, FleetExecutor, FleetRun, NodeFailure, ScriptExecutionUnit};
pub use node::{AuthMode, Credentials, Node};
pub use script::{RenderScript, ScriptSpec};
