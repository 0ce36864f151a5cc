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

//! High-level operation execution over one management channel.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use mgmt_error::ClientError;
use mgmt_error::MgmtResult;

use crate::base::DiscardMessageHandler;
use crate::base::InputStreamEntry;
use crate::base::MessageHandler;
use crate::base::OperationExecutionContext;
use crate::base::OperationHandle;
use crate::base::OperationOutcome;
use crate::base::OperationState;
use crate::channel_association::ChannelAssociation;
use crate::clients::inbound::GetInputStreamHandler;
use crate::clients::inbound::HandleReportHandler;
use crate::clients::operation_response::OperationResponse;
use crate::codec::FieldWriter;
use crate::protocol::field_tag;
use crate::protocol::operation_code;
use crate::protocol::Attachment;
use crate::protocol::ModelNode;
use crate::protocol::Operation;

/// Client for executing management operations against the peer's model
/// controller. All calls multiplex over the one underlying channel.
pub struct ModelControllerClient {
    association: Arc<ChannelAssociation>,
    closed: AtomicBool,
}

impl ModelControllerClient {
    /// Wraps an established channel and wires up the inbound handlers the
    /// executing side calls back into (progress reports, attachment fetches).
    pub fn new(association: Arc<ChannelAssociation>) -> Arc<Self> {
        association.register_handler(
            operation_code::HANDLE_REPORT,
            Arc::new(HandleReportHandler),
        );
        association.register_handler(
            operation_code::GET_INPUTSTREAM,
            Arc::new(GetInputStreamHandler),
        );
        Arc::new(Self {
            association,
            closed: AtomicBool::new(false),
        })
    }

    pub fn association(&self) -> &Arc<ChannelAssociation> {
        &self.association
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || !self.association.is_open()
    }

    /// Executes an operation document and waits for its result document.
    /// A failed outcome is data, not an error; only transport and protocol
    /// trouble surfaces as `Err`.
    pub async fn execute(&self, node: ModelNode) -> MgmtResult<ModelNode> {
        self.execute_with_messages(node, Box::new(DiscardMessageHandler))
            .await
    }

    /// Like `execute`, but mid-operation progress reports are forwarded to
    /// the given handler instead of being dropped.
    pub async fn execute_with_messages(
        &self,
        node: ModelNode,
        messages: Box<dyn MessageHandler>,
    ) -> MgmtResult<ModelNode> {
        let response = self
            .execute_operation_internal(operation_code::EXECUTE, Operation::new(node), messages)
            .await?;
        let node = response.node().clone();
        response.close().await?;
        Ok(node)
    }

    /// Executes an operation with attachments; the returned response proxies
    /// any streams the peer associated with the result and must be closed.
    pub async fn execute_operation(&self, operation: Operation) -> MgmtResult<OperationResponse> {
        self.execute_operation_with_messages(operation, Box::new(DiscardMessageHandler))
            .await
    }

    /// `execute_operation` with progress reports forwarded to `messages`.
    pub async fn execute_operation_with_messages(
        &self,
        operation: Operation,
        messages: Box<dyn MessageHandler>,
    ) -> MgmtResult<OperationResponse> {
        self.execute_operation_internal(operation_code::EXECUTE_TX, operation, messages)
            .await
    }

    /// Starts an operation without waiting for it; the returned handle can
    /// be awaited or cancelled.
    pub async fn execute_async(
        &self,
        operation: Operation,
        messages: Box<dyn MessageHandler>,
    ) -> MgmtResult<AsyncOperationHandle> {
        let handle = self
            .submit(operation_code::EXECUTE_ASYNC, operation, messages)
            .await?;
        Ok(AsyncOperationHandle {
            inner: handle,
            association: self.association.clone(),
        })
    }

    /// Closes the client: new operations are rejected, active ones get up to
    /// `timeout` to drain before the channel is torn down.
    pub async fn close(&self, timeout: Duration) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.association.shutdown(timeout).await;
    }

    async fn execute_operation_internal(
        &self,
        code: u8,
        operation: Operation,
        messages: Box<dyn MessageHandler>,
    ) -> MgmtResult<OperationResponse> {
        let handle = self.submit(code, operation, messages).await?;
        let operation_id = handle.operation_id();
        match handle.outcome().await? {
            OperationOutcome::Done(payload) => Ok(OperationResponse::new(
                payload.node,
                operation_id,
                payload.attachment_count,
                self.association.clone(),
            )),
            OperationOutcome::Failed(err) => Err(err),
            OperationOutcome::Cancelled => Err(ClientError::Cancelled { operation_id }.into()),
        }
    }

    async fn submit(
        &self,
        code: u8,
        operation: Operation,
        messages: Box<dyn MessageHandler>,
    ) -> MgmtResult<OperationHandle> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Closed.into());
        }
        let (node, attachments) = operation.into_parts();
        let mut entries = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            entries.push(Arc::new(match attachment {
                Attachment::Bytes(data) => InputStreamEntry::in_memory(data),
                Attachment::File(path) => InputStreamEntry::file(path),
            }));
        }
        let ctx = Arc::new(OperationExecutionContext::new(messages, entries));

        let mut writer = FieldWriter::new();
        writer.write_node(field_tag::OPERATION, &node)?;
        writer.write_u32(field_tag::INPUTSTREAM_COUNT, ctx.entry_count());
        let body = writer.finish();

        // the registry releases the entries on whichever terminal outcome
        // wins, so no completion hook is needed here
        self.association
            .execute_request(code, body, ctx, Box::new(|_, _| {}))
            .await
    }
}

/// Handle on an operation started with `execute_async`.
pub struct AsyncOperationHandle {
    inner: OperationHandle,
    association: Arc<ChannelAssociation>,
}

impl AsyncOperationHandle {
    pub fn operation_id(&self) -> i32 {
        self.inner.operation_id()
    }

    /// Asks the executing side to cancel. Cooperative: the operation only
    /// reaches the cancelled state once the peer acknowledges.
    pub async fn cancel(&self) -> MgmtResult<()> {
        self.association
            .request_cancel(self.inner.operation_id())
            .await
    }

    /// Waits for the terminal outcome and maps it to a response. Failure and
    /// cancellation become errors here since no response document exists.
    pub async fn await_response(self) -> MgmtResult<OperationResponse> {
        let operation_id = self.inner.operation_id();
        match self.inner.outcome().await? {
            OperationOutcome::Done(payload) => Ok(OperationResponse::new(
                payload.node,
                operation_id,
                payload.attachment_count,
                self.association,
            )),
            OperationOutcome::Failed(err) => Err(err),
            OperationOutcome::Cancelled => Err(ClientError::Cancelled { operation_id }.into()),
        }
    }

    /// Waits for the raw outcome without mapping cancellation to an error.
    pub async fn await_outcome(self) -> MgmtResult<OperationOutcome> {
        self.inner.outcome().await
    }

    pub async fn await_outcome_timeout(self, timeout: Duration) -> MgmtResult<OperationOutcome> {
        self.inner.outcome_timeout(timeout).await
    }

    /// Non-blocking poll of the outcome.
    pub fn try_outcome(&mut self) -> Option<OperationOutcome> {
        self.inner.try_outcome()
    }

    pub fn state(&self) -> OperationState {
        self.inner.state()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.inner.is_cancel_requested()
    }
}
