/*
 * Licensed to the Apache Software Foundation (ASF) under one or more
 * contributor license agreements.  See the NOTICE file distributed with
 * this work for additional information regarding copyright ownership.
 * The ASF licenses this file to You under the Apache License, Version 2.0
 * (the "License"); you may not use this file except in compliance with
 * the License.  You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! In-flight operation table for one channel.
//!
//! The registry is the single point of mutation for "is this id still
//! outstanding": removal happens atomically with delivering the terminal
//! outcome, which is what makes completion at-most-once under races between
//! cancel, failure and a concurrently arriving success response.

use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use dashmap::DashMap;
use mgmt_error::NetworkError;
use tokio::sync::oneshot;
use tokio::sync::Notify;
use tracing::debug;

use crate::base::execution_context::OperationExecutionContext;
use crate::base::operation_result::OperationHandle;
use crate::base::operation_result::OperationOutcome;
use crate::base::operation_result::CANCEL_STATE_PENDING;
use crate::base::operation_result::CANCEL_STATE_REQUESTED;
use crate::protocol::management_message::next_operation_id;

/// Completion hook fired exactly once per operation, after the terminal
/// outcome is known, with access to the operation's attachment so per-
/// operation resources can be released.
pub type CompletedCallback =
    Box<dyn FnOnce(CompletedOutcome, &Arc<OperationExecutionContext>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletedOutcome {
    Done,
    Failed,
    Cancelled,
}

struct ActiveOperation {
    sender: oneshot::Sender<OperationOutcome>,
    attachment: Arc<OperationExecutionContext>,
    completed: CompletedCallback,
    cancel_state: Arc<AtomicU8>,
}

#[derive(Default)]
pub struct ActiveOperationRegistry {
    operations: DashMap<i32, ActiveOperation>,
    drained: Notify,
}

impl ActiveOperationRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a new operation under a freshly allocated id. Ids still
    /// active on this channel are skipped, so no id is reused while any
    /// handler referencing it is unresolved.
    pub fn register(
        &self,
        attachment: Arc<OperationExecutionContext>,
        completed: CompletedCallback,
    ) -> OperationHandle {
        let (tx, rx) = oneshot::channel();
        let cancel_state = Arc::new(AtomicU8::new(CANCEL_STATE_PENDING));
        let operation = ActiveOperation {
            sender: tx,
            attachment,
            completed,
            cancel_state: cancel_state.clone(),
        };
        let mut operation = Some(operation);
        loop {
            let id = next_operation_id();
            match self.operations.entry(id) {
                dashmap::mapref::entry::Entry::Occupied(_) => continue,
                dashmap::mapref::entry::Entry::Vacant(vacant) => {
                    vacant.insert(operation.take().expect("operation inserted twice"));
                    return OperationHandle::new(id, rx, cancel_state);
                }
            }
        }
    }

    /// The attachment of a still-active operation, used by inbound handlers
    /// to reach the currently executing operation's context.
    pub fn attachment(&self, operation_id: i32) -> Option<Arc<OperationExecutionContext>> {
        self.operations
            .get(&operation_id)
            .map(|op| op.attachment.clone())
    }

    /// Marks the operation as cancel-requested. Returns false when the id is
    /// no longer active (the race was lost to a terminal outcome).
    pub fn request_cancel(&self, operation_id: i32) -> bool {
        match self.operations.get(&operation_id) {
            Some(op) => {
                op.cancel_state
                    .store(CANCEL_STATE_REQUESTED, Ordering::Release);
                true
            }
            None => false,
        }
    }

    pub fn is_cancel_requested(&self, operation_id: i32) -> bool {
        self.operations
            .get(&operation_id)
            .map(|op| op.cancel_state.load(Ordering::Acquire) == CANCEL_STATE_REQUESTED)
            .unwrap_or(false)
    }

    /// Delivers the terminal outcome for an operation. The registry entry is
    /// removed atomically with delivery; a second terminal delivery for the
    /// same id is ignored and logged, never passed to listeners. The
    /// operation's input-stream entries are closed here no matter which
    /// terminal outcome won, success included.
    pub fn complete(&self, operation_id: i32, outcome: OperationOutcome) -> bool {
        let Some((_, operation)) = self.operations.remove(&operation_id) else {
            debug!("ignoring late completion for operation {operation_id}");
            return false;
        };
        let kind = match &outcome {
            OperationOutcome::Done(_) => CompletedOutcome::Done,
            OperationOutcome::Failed(_) => CompletedOutcome::Failed,
            OperationOutcome::Cancelled => CompletedOutcome::Cancelled,
        };
        (operation.completed)(kind, &operation.attachment);
        operation.attachment.close_resources();
        // the caller may have dropped its handle; resource release above must
        // not depend on the send succeeding
        let _ = operation.sender.send(outcome);
        if self.operations.is_empty() {
            self.drained.notify_waiters();
        }
        true
    }

    /// Fails every still-registered operation, e.g. on channel close. Nothing
    /// is left to hang indefinitely.
    pub fn fail_all(&self, reason: &str) {
        let ids: Vec<i32> = self.operations.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.complete(
                id,
                OperationOutcome::Failed(NetworkError::connection_closed(reason).into()),
            );
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Waits for all registered operations to drain, up to `timeout`.
    /// Returns whether the registry is empty.
    pub async fn await_completion(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.operations.is_empty() {
                return true;
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()).filter(|d| !d.is_zero())
            else {
                return self.operations.is_empty();
            };
            let _ = tokio::time::timeout(remaining, self.drained.notified()).await;
            if Instant::now() >= deadline {
                return self.operations.is_empty();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::protocol::ModelNode;
    use crate::base::operation_result::ResponsePayload;

    fn noop_callback() -> CompletedCallback {
        Box::new(|_, _| {})
    }

    fn empty_context() -> Arc<OperationExecutionContext> {
        Arc::new(OperationExecutionContext::empty())
    }

    fn done_outcome() -> OperationOutcome {
        OperationOutcome::Done(ResponsePayload {
            node: ModelNode::success("ok"),
            attachment_count: 0,
        })
    }

    #[tokio::test]
    async fn exactly_one_completion_is_delivered() {
        let registry = ActiveOperationRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        let handle = registry.register(
            empty_context(),
            Box::new(move |_, _| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let id = handle.operation_id();

        assert!(registry.complete(id, done_outcome()));
        // the losing side of the race is rejected, not double-delivered
        assert!(!registry.complete(id, OperationOutcome::Cancelled));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        match handle.outcome().await.unwrap() {
            OperationOutcome::Done(payload) => assert!(payload.node.is_success()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancel_race_with_success_is_at_most_once() {
        let registry = ActiveOperationRegistry::new();
        for _ in 0..64 {
            let counter = Arc::new(AtomicUsize::new(0));
            let counter_clone = counter.clone();
            let handle = registry.register(
                empty_context(),
                Box::new(move |_, _| {
                    counter_clone.fetch_add(1, Ordering::SeqCst);
                }),
            );
            let id = handle.operation_id();

            let r1 = registry.clone();
            let r2 = registry.clone();
            let success = tokio::spawn(async move { r1.complete(id, done_outcome()) });
            let cancel = tokio::spawn(async move { r2.complete(id, OperationOutcome::Cancelled) });
            let (a, b) = (success.await.unwrap(), cancel.await.unwrap());
            assert!(a ^ b, "exactly one completion must win");
            assert_eq!(counter.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn completed_callback_fires_on_failure_and_cancel() {
        let registry = ActiveOperationRegistry::new();
        for outcome in [
            OperationOutcome::Failed(NetworkError::connection_closed("test").into()),
            OperationOutcome::Cancelled,
        ] {
            let seen = Arc::new(parking_lot::Mutex::new(None));
            let seen_clone = seen.clone();
            let handle = registry.register(
                empty_context(),
                Box::new(move |kind, _| {
                    *seen_clone.lock() = Some(kind);
                }),
            );
            registry.complete(handle.operation_id(), outcome);
            assert!(seen.lock().is_some());
        }
    }

    #[tokio::test]
    async fn entries_are_released_on_every_terminal_outcome() {
        use bytes::Bytes;

        use crate::base::DiscardMessageHandler;
        use crate::base::InputStreamEntry;

        let registry = ActiveOperationRegistry::new();
        for outcome in [
            done_outcome(),
            OperationOutcome::Failed(NetworkError::connection_closed("test").into()),
            OperationOutcome::Cancelled,
        ] {
            let entry = Arc::new(InputStreamEntry::in_memory(Bytes::from_static(b"payload")));
            let ctx = Arc::new(OperationExecutionContext::new(
                Box::new(DiscardMessageHandler),
                vec![entry.clone()],
            ));
            let handle = registry.register(ctx, noop_callback());
            assert!(!entry.is_closed());

            registry.complete(handle.operation_id(), outcome);
            assert!(entry.is_closed(), "entry must be released on completion");
        }
    }

    #[tokio::test]
    async fn fail_all_resolves_every_pending_operation() {
        let registry = ActiveOperationRegistry::new();
        let h1 = registry.register(empty_context(), noop_callback());
        let h2 = registry.register(empty_context(), noop_callback());
        assert_eq!(registry.len(), 2);

        registry.fail_all("channel closed");
        assert!(registry.is_empty());

        for handle in [h1, h2] {
            match handle.outcome().await.unwrap() {
                OperationOutcome::Failed(err) => assert!(err.is_transport()),
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn cancel_request_is_not_terminal() {
        let registry = ActiveOperationRegistry::new();
        let handle = registry.register(empty_context(), noop_callback());
        let id = handle.operation_id();

        assert!(registry.request_cancel(id));
        assert!(handle.is_cancel_requested());
        assert_eq!(registry.len(), 1, "cancel request must not resolve the operation");

        // peer acknowledgment delivers the terminal state
        registry.complete(id, OperationOutcome::Cancelled);
        match handle.outcome().await.unwrap() {
            OperationOutcome::Cancelled => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn await_completion_times_out_while_busy() {
        let registry = ActiveOperationRegistry::new();
        let _handle = registry.register(empty_context(), noop_callback());
        assert!(!registry.await_completion(Duration::from_millis(20)).await);
    }
}
