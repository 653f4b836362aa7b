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

use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fleetboot::{
    cli::Cli,
    config::{default_config_path, Config},
    executor::FleetExecutor,
    script::ScriptSpec,
    ssh::{ConnectionConfig, SshConnector},
    utils::{ctrl_c_stream, init_logging, watch_interrupts, FORCED_EXIT_CODE},
};

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Format a Duration into a human-readable string
fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs_f64();

    if total_seconds < 1.0 {
        format!("{:.1} ms", total_seconds * 1000.0)
    } else if total_seconds < 60.0 {
        format!("{total_seconds:.2} s")
    } else {
        let minutes = duration.as_secs() / 60;
        let seconds = duration.as_secs() % 60;
        format!("{minutes}m {seconds}s")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = run(cli).await?;
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => Config::load_required(path).await?,
        None => Config::load_with_priority(&default_config_path()).await?,
    };

    let nodes = config.resolve_nodes(&cli.cluster).await?;

    let script_name = cli
        .script_name()
        .context("Cannot derive a remote file name from the script path; use --name")?;
    let body = tokio::fs::read_to_string(&cli.script)
        .await
        .with_context(|| format!("Failed to read script file {:?}", cli.script))?;
    let script = ScriptSpec::new(script_name, body)?;

    let connect_timeout = cli
        .connect_timeout
        .or(config.defaults.connect_timeout)
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
    let connector = SshConnector::new(ConnectionConfig {
        strict_mode: cli.strict_host_key_checking,
        known_hosts_path: cli.known_hosts.clone(),
        connect_timeout: Some(Duration::from_secs(connect_timeout)),
        ..Default::default()
    });

    let mut executor = FleetExecutor::new(Arc::new(connector));
    if let Some(parallel) = cli.parallel.or(config.defaults.parallel) {
        executor = executor.with_max_parallel(parallel);
    }

    let cancel = executor.cancellation_token();
    tokio::spawn(async move {
        if watch_interrupts(ctrl_c_stream(), cancel).await {
            eprintln!("{}", "Interrupted again, aborting".red());
            std::process::exit(FORCED_EXIT_CODE);
        }
    });

    println!(
        "{} {} on {} node(s) of cluster {}",
        "▶".cyan(),
        script.name().bold(),
        nodes.len(),
        cli.cluster.bold()
    );

    let started = Instant::now();
    let run = executor.run(nodes, script, cli.as_root).await?;

    run.print_summary(cli.verbose > 0);
    println!(
        "{}",
        format!("Finished in {}", format_duration(started.elapsed())).dimmed()
    );

    Ok(run.exit_code(cli.exit_strategy()))
}
