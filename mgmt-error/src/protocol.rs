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

//! Wire protocol errors. Any of these indicates protocol desync and fails the
//! affected operation immediately rather than risking silent corruption.

use thiserror::Error;

/// Management wire protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A framed field carried a tag byte other than the one the reader
    /// asserted. This is the fail-fast signal for protocol corruption.
    #[error("Unexpected field tag: expected 0x{expected:02x}, got 0x{actual:02x}")]
    UnexpectedTag { expected: u8, actual: u8 },

    /// The frame ended before the announced field length was satisfied.
    #[error("Truncated frame: needed {needed} more bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// Frame shorter than the fixed message header.
    #[error("Frame too short: {length} bytes")]
    FrameTooShort { length: usize },

    /// Frame length prefix exceeds the configured maximum.
    #[error("Frame too large: {length} bytes (max {max})")]
    FrameTooLarge { length: usize, max: usize },

    /// Protocol version byte did not match this implementation.
    #[error("Unsupported protocol version {actual} (supported: {supported})")]
    VersionMismatch { actual: u8, supported: u8 },

    /// Message type byte was not request/response/oneway.
    #[error("Invalid message type byte 0x{value:02x}")]
    InvalidMessageType { value: u8 },

    /// Message severity byte outside the known range.
    #[error("Invalid message severity byte 0x{value:02x}")]
    InvalidSeverity { value: u8 },

    /// An inbound request carried an operation-type code with no registered
    /// handler.
    #[error("No handler registered for operation type 0x{code:02x}")]
    NoSuchHandler { code: u8 },

    /// A field payload failed to deserialize into a model node.
    #[error("Malformed model node payload: {reason}")]
    MalformedNode { reason: String },
}

impl ProtocolError {
    #[inline]
    pub fn unexpected_tag(expected: u8, actual: u8) -> Self {
        Self::UnexpectedTag { expected, actual }
    }

    #[inline]
    pub fn truncated(needed: usize, remaining: usize) -> Self {
        Self::Truncated { needed, remaining }
    }

    #[inline]
    pub fn malformed_node(reason: impl Into<String>) -> Self {
        Self::MalformedNode {
            reason: reason.into(),
        }
    }
}
