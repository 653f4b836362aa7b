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

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

/// Exit code used when a second interrupt forces the process down.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Stream of Ctrl-C presses. Ends if the handler cannot be installed.
pub fn ctrl_c_stream() -> impl Stream<Item = ()> + Send + Unpin {
    Box::pin(futures::stream::unfold((), |()| async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Some(((), ())),
            Err(e) => {
                tracing::warn!("Could not listen for Ctrl-C: {}", e);
                None
            }
        }
    }))
}

/// Cancel `cancel` on the first interrupt, then wait for another one.
///
/// Returns `true` when a second interrupt arrived, in which case the caller
/// should stop waiting for running nodes. Returns `false` if the stream ends.
pub async fn watch_interrupts<S>(mut interrupts: S, cancel: CancellationToken) -> bool
where
    S: Stream<Item = ()> + Unpin,
{
    if interrupts.next().await.is_none() {
        return false;
    }
    tracing::warn!("Interrupted, waiting for running nodes (press Ctrl-C again to abort)");
    cancel.cancel();

    interrupts.next().await.is_some()
}
