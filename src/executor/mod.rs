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

//! Script execution engine: per-node units and fleet fan-out.

mod fleet;
mod phase;
mod privilege;
mod result_types;
mod unit;

pub mod exit_strategy;

pub use exit_strategy::ExitCodeStrategy;
pub use fleet::FleetExecutor;
pub use phase::ExecutionPhase;
pub use privilege::{resolve_start_command, StartCommand};
pub use result_types::{
    ExecutionResult, FleetRun, NodeFailure, NodeOutcome, CANCELLED_EXIT_CODE,
    TRANSPORT_FAILURE_EXIT_CODE,
};
pub use unit::{PhaseError, ScriptExecutionUnit};
