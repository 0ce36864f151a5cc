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

use std::fmt;
use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering;

use bytes::Bytes;
use mgmt_error::ProtocolError;

/// Protocol version carried in every frame header.
pub const PROTOCOL_VERSION: u8 = 0x01;

static OPERATION_ID: AtomicI32 = AtomicI32::new(0);

/// Allocates the next raw operation id. The registry is responsible for
/// skipping ids that are still active on the channel.
pub fn next_operation_id() -> i32 {
    OPERATION_ID.fetch_add(1, Ordering::AcqRel)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Request,
    Response,
    /// Fire-and-forget; the peer must not answer.
    Oneway,
}

impl MessageType {
    pub fn as_byte(self) -> u8 {
        match self {
            MessageType::Request => 0,
            MessageType::Response => 1,
            MessageType::Oneway => 2,
        }
    }

    pub fn from_byte(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(MessageType::Request),
            1 => Ok(MessageType::Response),
            2 => Ok(MessageType::Oneway),
            other => Err(ProtocolError::InvalidMessageType { value: other }),
        }
    }
}

/// One framed management message: a fixed header (version, type, operation id,
/// operation-type code) plus a body of tagged fields.
///
/// The operation id correlates a response with the logical operation it
/// belongs to; the operation-type code selects the handler on the receiving
/// side (execute, handle-report, get-inputstream, cancel, ...).
#[derive(Clone)]
pub struct ManagementMessage {
    version: u8,
    message_type: MessageType,
    operation_id: i32,
    operation_code: u8,
    body: Bytes,
}

impl fmt::Debug for ManagementMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ManagementMessage [type={:?}, operation_id={}, code=0x{:02x}, body={} bytes]",
            self.message_type,
            self.operation_id,
            self.operation_code,
            self.body.len()
        )
    }
}

impl ManagementMessage {
    pub fn request(operation_id: i32, operation_code: u8) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message_type: MessageType::Request,
            operation_id,
            operation_code,
            body: Bytes::new(),
        }
    }

    /// Builds a response correlated to the given request.
    pub fn response_to(request: &ManagementMessage) -> Self {
        Self::response(request.operation_id, request.operation_code)
    }

    /// Response under an explicit code, for replies that answer a request
    /// with a different operation type (ping is answered with pong).
    pub fn response(operation_id: i32, operation_code: u8) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message_type: MessageType::Response,
            operation_id,
            operation_code,
            body: Bytes::new(),
        }
    }

    pub fn oneway(operation_id: i32, operation_code: u8) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            message_type: MessageType::Oneway,
            operation_id,
            operation_code,
            body: Bytes::new(),
        }
    }

    pub(crate) fn from_parts(
        version: u8,
        message_type: MessageType,
        operation_id: i32,
        operation_code: u8,
        body: Bytes,
    ) -> Self {
        Self {
            version,
            message_type,
            operation_id,
            operation_code,
            body,
        }
    }

    pub fn set_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn is_request(&self) -> bool {
        matches!(self.message_type, MessageType::Request)
    }

    pub fn is_response(&self) -> bool {
        matches!(self.message_type, MessageType::Response)
    }

    pub fn operation_id(&self) -> i32 {
        self.operation_id
    }

    pub fn operation_code(&self) -> u8 {
        self.operation_code
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn take_body(&mut self) -> Bytes {
        std::mem::take(&mut self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::operation_code;

    #[test]
    fn response_correlates_to_request() {
        let request = ManagementMessage::request(42, operation_code::EXECUTE);
        let response = ManagementMessage::response_to(&request);
        assert_eq!(response.operation_id(), 42);
        assert_eq!(response.operation_code(), operation_code::EXECUTE);
        assert!(response.is_response());
    }

    #[test]
    fn operation_ids_are_distinct() {
        let a = next_operation_id();
        let b = next_operation_id();
        assert_ne!(a, b);
    }

    #[test]
    fn invalid_type_byte_rejected() {
        assert!(MessageType::from_byte(7).is_err());
    }
}
