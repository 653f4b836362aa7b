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

//! Tests for the per-node script execution unit.

mod common;

use std::io;
use std::sync::{Arc, Mutex};

use common::{key_node, password_node, Behaviour, Call, MockShell};
use fleetboot::error::TransportError;
use fleetboot::executor::{ExecutionPhase, ScriptExecutionUnit};
use fleetboot::node::{Credentials, Node};
use fleetboot::script::ScriptSpec;

const BODY: &str = "#!/bin/sh\ncase \"$1\" in init) echo init ;; start) echo start ;; esac\n";

fn script(name: &str) -> Arc<ScriptSpec> {
    Arc::new(ScriptSpec::new(name, BODY).unwrap())
}

fn execs(calls: &[Call]) -> Vec<String> {
    calls
        .iter()
        .filter_map(|call| match call {
            Call::Exec(command) => Some(command.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_key_auth_as_root_runs_phases_in_order() {
    let node = Arc::new(key_node("web1", "ubuntu"));
    let (shell, calls) = MockShell::new(Behaviour::default());

    let unit = ScriptExecutionUnit::new(node, script("bootstrap.sh"), true, Box::new(shell));
    assert_eq!(unit.phase(), ExecutionPhase::Uploading);

    let result = unit.execute().await.unwrap();
    assert_eq!(result.exit_status, 0);
    assert_eq!(result.node.id, "web1");

    let calls = calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            Call::Put {
                path: "bootstrap.sh".to_string(),
                payload: BODY.as_bytes().to_vec(),
            },
            Call::Exec("chmod 755 bootstrap.sh".to_string()),
            Call::Exec("./bootstrap.sh init".to_string()),
            Call::Exec("sudo ./bootstrap.sh start".to_string()),
            Call::Close,
        ]
    );
}

#[tokio::test]
async fn test_not_as_root_runs_plain_start() {
    let node = Arc::new(password_node("db1", "admin", "pw"));
    let (shell, calls) = MockShell::new(Behaviour::default());

    ScriptExecutionUnit::new(node, script("setup.sh"), false, Box::new(shell))
        .execute()
        .await
        .unwrap();

    let commands = execs(&calls.lock().unwrap());
    assert_eq!(commands.last().map(String::as_str), Some("./setup.sh start"));
}

#[tokio::test]
async fn test_root_identity_needs_no_sudo() {
    let node = Arc::new(Node::new(
        "n1",
        vec!["10.0.0.9".to_string()],
        Credentials::with_password("root", "pw"),
    ));
    let (shell, calls) = MockShell::new(Behaviour::default());

    ScriptExecutionUnit::new(node, script("setup.sh"), true, Box::new(shell))
        .execute()
        .await
        .unwrap();

    let commands = execs(&calls.lock().unwrap());
    assert_eq!(commands[2], "./setup.sh start");
}

#[tokio::test]
async fn test_password_auth_pipes_secret_to_sudo() {
    let node = Arc::new(password_node("n1", "ubuntu", "hunter2"));
    let (shell, calls) = MockShell::new(Behaviour::default());

    ScriptExecutionUnit::new(node, script("s.sh"), true, Box::new(shell))
        .execute()
        .await
        .unwrap();

    let commands = execs(&calls.lock().unwrap());
    assert_eq!(commands[2], "echo 'hunter2'|sudo -S ./s.sh start");
}

#[tokio::test]
async fn test_init_failure_is_tolerated() {
    let node = Arc::new(key_node("web1", "ubuntu"));
    // chmod, init, start
    let (shell, calls) = MockShell::new(Behaviour::exits(&[0, 1, 0]));

    let result = ScriptExecutionUnit::new(node, script("s.sh"), false, Box::new(shell))
        .execute()
        .await
        .unwrap();

    assert_eq!(result.exit_status, 0);
    assert!(result.is_success());
    assert_eq!(execs(&calls.lock().unwrap()).len(), 3);
}

#[tokio::test]
async fn test_start_exit_status_is_reported_not_raised() {
    let node = Arc::new(key_node("web1", "ubuntu"));
    let (shell, _calls) = MockShell::new(Behaviour::exits(&[0, 0, 42]));

    let result = ScriptExecutionUnit::new(node, script("s.sh"), false, Box::new(shell))
        .execute()
        .await
        .unwrap();

    assert_eq!(result.exit_status, 42);
    assert!(!result.is_success());
    assert_eq!(result.stdout, "exec #2\n");
}

#[tokio::test]
async fn test_upload_failure_stops_before_any_exec() {
    let node = Arc::new(key_node("web1", "ubuntu"));
    let (shell, calls) = MockShell::new(Behaviour {
        fail_put: true,
        ..Default::default()
    });

    let err = ScriptExecutionUnit::new(node, script("s.sh"), true, Box::new(shell))
        .execute()
        .await
        .unwrap_err();

    assert_eq!(err.phase, ExecutionPhase::Uploading);
    assert!(matches!(err.source, TransportError::Upload { .. }));

    let calls = calls.lock().unwrap().clone();
    assert!(execs(&calls).is_empty());
    assert_eq!(calls.last(), Some(&Call::Close));
}

#[tokio::test]
async fn test_transport_failure_reports_active_phase() {
    let cases = [
        (0, false, ExecutionPhase::Initializing),
        (1, false, ExecutionPhase::Initializing),
        (2, false, ExecutionPhase::StartingAsUser),
        (2, true, ExecutionPhase::StartingAsRoot),
    ];

    for (fail_at, as_root, expected) in cases {
        let node = Arc::new(key_node("web1", "ubuntu"));
        let (shell, calls) = MockShell::new(Behaviour {
            fail_exec_at: Some(fail_at),
            ..Default::default()
        });

        let err = ScriptExecutionUnit::new(node, script("s.sh"), as_root, Box::new(shell))
            .execute()
            .await
            .unwrap_err();

        assert_eq!(err.phase, expected, "failing exec #{fail_at}");
        assert!(matches!(err.source, TransportError::ChannelClosed));
        // No further commands after the failure
        assert_eq!(execs(&calls.lock().unwrap()).len(), fail_at + 1);
    }
}

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_logs_mask_the_secret() {
    let buffer = SharedBuf::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let node = Arc::new(Node::new(
        "n1",
        vec!["203.0.113.7".to_string(), "10.0.0.7".to_string()],
        Credentials::with_password("ubuntu", "s3cr3t'pw"),
    ));
    let (shell, _calls) = MockShell::new(Behaviour::exits(&[0, 3, 0]));

    ScriptExecutionUnit::new(node, script("s.sh"), true, Box::new(shell))
        .execute()
        .await
        .unwrap();

    let logs = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
    assert!(logs.contains("<< initialized(3)"));
    assert!(logs.contains(">> running [echo 'XXXXX'|sudo -S ./s.sh start] as ubuntu@203.0.113.7"));
    assert!(logs.contains("<< start(0)"));
    assert!(!logs.contains("s3cr3t"));
}
