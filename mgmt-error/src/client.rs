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

//! Client lifecycle and usage errors

use thiserror::Error;

/// Model controller client errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The operation was cancelled after a cooperative cancel handshake.
    #[error("Operation {operation_id} was cancelled")]
    Cancelled { operation_id: i32 },

    /// The client was used after `close()`.
    #[error("Client is closed")]
    Closed,

    /// Requested response attachment index does not exist.
    #[error("No response attachment at index {index} (count: {count})")]
    NoSuchAttachment { index: u32, count: u32 },

    /// The peer reported a failure while transferring an attachment stream.
    #[error("Attachment transfer failed: {reason}")]
    AttachmentTransferFailed { reason: String },

    /// A side-channel request referenced an operation id that is no longer
    /// active on this channel.
    #[error("No active operation with id {operation_id}")]
    NoActiveOperation { operation_id: i32 },

    /// Host controller registration was rejected.
    #[error("Registration failed: {reason}")]
    RegistrationFailed { reason: String },
}

impl ClientError {
    #[inline]
    pub fn attachment_transfer_failed(reason: impl Into<String>) -> Self {
        Self::AttachmentTransferFailed {
            reason: reason.into(),
        }
    }

    #[inline]
    pub fn registration_failed(reason: impl Into<String>) -> Self {
        Self::RegistrationFailed {
            reason: reason.into(),
        }
    }
}
