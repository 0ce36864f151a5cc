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

use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use mgmt_error::MgmtError;
use mgmt_error::MgmtResult;
use mgmt_error::NetworkError;
use tokio::sync::oneshot;

use crate::protocol::ModelNode;

/// Decoded terminal response of an operation: the response document plus the
/// number of attachment streams the peer holds for on-demand fetch.
#[derive(Debug)]
pub struct ResponsePayload {
    pub node: ModelNode,
    pub attachment_count: u32,
}

/// Terminal outcome of an active operation. Exactly one of these is delivered
/// per operation id.
#[derive(Debug)]
pub enum OperationOutcome {
    Done(ResponsePayload),
    Failed(MgmtError),
    Cancelled,
}

/// Observable state of an in-flight operation.
///
/// Cancellation is cooperative: `cancel()` only moves `Pending` to
/// `CancelRequested`; the `Cancelled` terminal state requires the peer's
/// acknowledgment arriving through the normal completion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    CancelRequested,
    Done,
    Failed,
    Cancelled,
}

pub(crate) const CANCEL_STATE_PENDING: u8 = 0;
pub(crate) const CANCEL_STATE_REQUESTED: u8 = 1;

/// Future-like handle for one registered operation, correlated by id.
pub struct OperationHandle {
    operation_id: i32,
    rx: oneshot::Receiver<OperationOutcome>,
    cancel_state: Arc<AtomicU8>,
    terminal: Option<OperationState>,
}

impl OperationHandle {
    pub(crate) fn new(
        operation_id: i32,
        rx: oneshot::Receiver<OperationOutcome>,
        cancel_state: Arc<AtomicU8>,
    ) -> Self {
        Self {
            operation_id,
            rx,
            cancel_state,
            terminal: None,
        }
    }

    pub fn operation_id(&self) -> i32 {
        self.operation_id
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_state.load(Ordering::Acquire) == CANCEL_STATE_REQUESTED
    }

    /// Last observed state. Terminal states are seen once the outcome has
    /// been received through `try_outcome`.
    pub fn state(&self) -> OperationState {
        if let Some(terminal) = self.terminal {
            terminal
        } else if self.is_cancel_requested() {
            OperationState::CancelRequested
        } else {
            OperationState::Pending
        }
    }

    /// Waits for the terminal outcome. If the registry was torn down without
    /// resolving this operation the channel counts as closed.
    pub async fn outcome(self) -> MgmtResult<OperationOutcome> {
        self.rx
            .await
            .map_err(|_| NetworkError::connection_closed("operation dropped without completion").into())
    }

    pub async fn outcome_timeout(self, timeout: Duration) -> MgmtResult<OperationOutcome> {
        let millis = timeout.as_millis() as u64;
        match tokio::time::timeout(timeout, self.outcome()).await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::RequestTimeout { timeout_ms: millis }.into()),
        }
    }

    /// Non-blocking poll of the outcome. Once the outcome has been taken,
    /// `state` reports the matching terminal state.
    pub fn try_outcome(&mut self) -> Option<OperationOutcome> {
        let outcome = self.rx.try_recv().ok()?;
        self.terminal = Some(match &outcome {
            OperationOutcome::Done(_) => OperationState::Done,
            OperationOutcome::Failed(_) => OperationState::Failed,
            OperationOutcome::Cancelled => OperationState::Cancelled,
        });
        Some(outcome)
    }
}
