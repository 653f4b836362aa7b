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

use std::fmt;

/// Lifecycle state of a script execution unit.
///
/// A unit moves strictly forward:
/// `Uploading -> Initializing -> StartingAsRoot | StartingAsUser -> Completed`.
/// A transport failure in any active phase ends in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionPhase {
    Uploading,
    Initializing,
    StartingAsRoot,
    StartingAsUser,
    Completed,
    Failed,
}

impl ExecutionPhase {
    /// The start phase for the given privilege request.
    pub fn start(run_as_root: bool) -> Self {
        if run_as_root {
            Self::StartingAsRoot
        } else {
            Self::StartingAsUser
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uploading => "uploading",
            Self::Initializing => "initializing",
            Self::StartingAsRoot => "starting as root",
            Self::StartingAsUser => "starting as user",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}
