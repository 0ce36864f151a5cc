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

pub mod codes;
pub mod management_message;
pub mod model_node;
pub mod operation;

pub use codes::field_tag;
pub use codes::operation_code;
pub use management_message::next_operation_id;
pub use management_message::ManagementMessage;
pub use management_message::MessageType;
pub use model_node::ModelNode;
pub use operation::Attachment;
pub use operation::Operation;

use mgmt_error::ProtocolError;

/// Severity of a mid-operation progress report pushed by the remote peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Error,
    Warn,
    Info,
}

impl MessageSeverity {
    pub fn as_byte(self) -> u8 {
        match self {
            MessageSeverity::Error => 0,
            MessageSeverity::Warn => 1,
            MessageSeverity::Info => 2,
        }
    }

    pub fn from_byte(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(MessageSeverity::Error),
            1 => Ok(MessageSeverity::Warn),
            2 => Ok(MessageSeverity::Info),
            other => Err(ProtocolError::InvalidSeverity { value: other }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_round_trip() {
        for severity in [
            MessageSeverity::Error,
            MessageSeverity::Warn,
            MessageSeverity::Info,
        ] {
            assert_eq!(
                MessageSeverity::from_byte(severity.as_byte()).unwrap(),
                severity
            );
        }
        assert!(MessageSeverity::from_byte(9).is_err());
    }
}
