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

use std::sync::Arc;

use bytes::Bytes;
use mgmt_error::ClientError;
use mgmt_error::MgmtResult;

use crate::channel_association::ChannelAssociation;
use crate::protocol::operation_code;
use crate::protocol::ModelNode;

/// Result of an executed operation: the response document plus a proxy to
/// any attachment streams the peer retained for this operation.
///
/// While attachments are outstanding the peer keeps the operation's resources
/// alive; `close` tells it to release them. A response with no attachments
/// needs no close, but closing twice is harmless.
pub struct OperationResponse {
    node: ModelNode,
    operation_id: i32,
    attachment_count: u32,
    association: Option<Arc<ChannelAssociation>>,
}

impl OperationResponse {
    pub(crate) fn new(
        node: ModelNode,
        operation_id: i32,
        attachment_count: u32,
        association: Arc<ChannelAssociation>,
    ) -> Self {
        Self {
            node,
            operation_id,
            attachment_count,
            // only proxied responses need to reach back to the channel
            association: (attachment_count > 0).then_some(association),
        }
    }

    /// Response built locally with no peer-held resources, e.g. synthesized
    /// failures.
    pub fn detached(node: ModelNode) -> Self {
        Self {
            node,
            operation_id: 0,
            attachment_count: 0,
            association: None,
        }
    }

    pub fn node(&self) -> &ModelNode {
        &self.node
    }

    pub fn into_node(self) -> ModelNode {
        self.node
    }

    pub fn operation_id(&self) -> i32 {
        self.operation_id
    }

    pub fn attachment_count(&self) -> u32 {
        self.attachment_count
    }

    /// Pulls the contents of one peer-held attachment stream over the
    /// channel. Indexes are zero-based and bounded by `attachment_count`.
    pub async fn read_attachment(&self, index: u32) -> MgmtResult<Bytes> {
        if index >= self.attachment_count {
            return Err(ClientError::NoSuchAttachment {
                index,
                count: self.attachment_count,
            }
            .into());
        }
        let Some(association) = &self.association else {
            return Err(
                ClientError::attachment_transfer_failed("response is detached from its channel")
                    .into(),
            );
        };
        association.fetch_attachment(self.operation_id, index).await
    }

    /// Tells the peer to release the resources held for this response. No-op
    /// for responses without attachments.
    pub async fn close(mut self) -> MgmtResult<()> {
        if let Some(association) = self.association.take() {
            association
                .send_oneway_for(self.operation_id, operation_code::COMPLETE_TX, Bytes::new())
                .await?;
        }
        Ok(())
    }
}
