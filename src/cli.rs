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

use clap::Parser;
use std::path::PathBuf;

use crate::executor::ExitCodeStrategy;
use crate::ssh::known_hosts::StrictHostKeyChecking;

#[derive(Parser, Debug)]
#[command(
    name = "fleetboot",
    version,
    about = "Upload and run a bootstrap script on every node of a cluster",
    long_about = "fleetboot uploads a bootstrap script to each node of a cluster over SSH/SFTP,\nmarks it executable, runs `./<script> init` and then `./<script> start`,\noptionally escalating to root with sudo. Nodes run concurrently and a\nfailure on one node never affects the others.",
    after_help = "EXAMPLES:\n  Bootstrap a cluster:          fleetboot -c production -s bootstrap.sh\n  Start as root, 5 at a time:   fleetboot -c staging -s setup.sh --as-root -p 5\n  Custom remote file name:      fleetboot -c web -s ./scripts/v2.sh --name bootstrap.sh"
)]
pub struct Cli {
    #[arg(
        long,
        help = "Inventory file path [default: ./fleetboot.yaml, then ~/.config/fleetboot/config.yaml]"
    )]
    pub config: Option<PathBuf>,

    #[arg(short = 'c', long, help = "Cluster name from the inventory")]
    pub cluster: String,

    #[arg(short = 's', long, help = "Local script file to upload and run")]
    pub script: PathBuf,

    #[arg(
        long,
        help = "Remote file name for the script [default: the local file name]"
    )]
    pub name: Option<String>,

    #[arg(
        long,
        help = "Run the start phase as root (sudo for non-root identities)"
    )]
    pub as_root: bool,

    #[arg(
        short = 'p',
        long,
        help = "Maximum nodes in flight at once [default: inventory value, else unbounded]"
    )]
    pub parallel: Option<usize>,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "SSH connection timeout per address [default: inventory value, else 30]"
    )]
    pub connect_timeout: Option<u64>,

    #[arg(
        long = "strict-host-key-checking",
        value_name = "MODE",
        default_value = "accept-new",
        help = "Host key checking mode (yes/no/accept-new)"
    )]
    pub strict_host_key_checking: StrictHostKeyChecking,

    #[arg(long, help = "known_hosts file to use instead of ~/.ssh/known_hosts")]
    pub known_hosts: Option<PathBuf>,

    #[arg(
        long,
        help = "Exit 0 only if every node started cleanly, 1 otherwise\nBy default the exit code of the first failing node is returned"
    )]
    pub require_all_success: bool,

    #[arg(
        short = 'v',
        long,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v shows per-node phases, -vv adds SSH debug logs)"
    )]
    pub verbose: u8,
}

impl Cli {
    pub fn exit_strategy(&self) -> ExitCodeStrategy {
        if self.require_all_success {
            ExitCodeStrategy::RequireAllSuccess
        } else {
            ExitCodeStrategy::FirstFailure
        }
    }

    /// Remote file name: `--name` or the local file name.
    pub fn script_name(&self) -> Option<String> {
        self.name.clone().or_else(|| {
            self.script
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string)
        })
    }
}
