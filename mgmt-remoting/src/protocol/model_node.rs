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

use bytes::Bytes;
use mgmt_error::MgmtResult;
use mgmt_error::ProtocolError;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;

/// Well-known keys in management documents.
pub const KEY_OPERATION: &str = "operation";
pub const KEY_ADDRESS: &str = "address";
pub const KEY_OUTCOME: &str = "outcome";
pub const KEY_RESULT: &str = "result";
pub const KEY_STEPS: &str = "steps";
pub const KEY_FAILURE_DESCRIPTION: &str = "failure-description";
pub const KEY_INPUT_STREAM_INDEX: &str = "input-stream-index";
pub const KEY_OPERATION_HEADERS: &str = "operation-headers";
pub const KEY_IN_SYNC: &str = "in-sync";

pub const OUTCOME_SUCCESS: &str = "success";
pub const OUTCOME_FAILED: &str = "failed";
pub const OUTCOME_CANCELLED: &str = "cancelled";

/// The structured document carried in operation requests and responses.
///
/// The payload is opaque to the protocol engine; this type only provides the
/// handful of accessors the engine itself needs (outcome, failure description,
/// composite steps) plus generic get/set for callers building requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelNode(Value);

impl Default for ModelNode {
    fn default() -> Self {
        ModelNode(json!({}))
    }
}

impl From<Value> for ModelNode {
    fn from(value: Value) -> Self {
        ModelNode(value)
    }
}

impl ModelNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an operation document: `{"operation": name, "address": []}`.
    pub fn operation(name: impl Into<String>) -> Self {
        ModelNode(json!({
            KEY_OPERATION: name.into(),
            KEY_ADDRESS: [],
        }))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        if let Value::Object(map) = &mut self.0 {
            map.insert(key.into(), value.into());
        }
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn outcome(&self) -> Option<&str> {
        self.get(KEY_OUTCOME).and_then(Value::as_str)
    }

    pub fn is_success(&self) -> bool {
        self.outcome() == Some(OUTCOME_SUCCESS)
    }

    pub fn is_failed(&self) -> bool {
        self.outcome() == Some(OUTCOME_FAILED)
    }

    pub fn is_cancelled(&self) -> bool {
        self.outcome() == Some(OUTCOME_CANCELLED)
    }

    pub fn failure_description(&self) -> Option<&str> {
        self.get(KEY_FAILURE_DESCRIPTION).and_then(Value::as_str)
    }

    pub fn result(&self) -> Option<&Value> {
        self.get(KEY_RESULT)
    }

    /// Builds a success response wrapping the given result.
    pub fn success(result: impl Into<Value>) -> Self {
        ModelNode(json!({
            KEY_OUTCOME: OUTCOME_SUCCESS,
            KEY_RESULT: result.into(),
        }))
    }

    /// Builds a failed response carrying a failure description.
    pub fn failed(description: impl Into<String>) -> Self {
        ModelNode(json!({
            KEY_OUTCOME: OUTCOME_FAILED,
            KEY_FAILURE_DESCRIPTION: description.into(),
        }))
    }

    /// Builds a cancelled response; delivered by the peer as the cancel
    /// acknowledgment through the normal completion path.
    pub fn cancelled() -> Self {
        ModelNode(json!({ KEY_OUTCOME: OUTCOME_CANCELLED }))
    }

    pub fn to_bytes(&self) -> MgmtResult<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(&self.0)?))
    }

    pub fn from_slice(slice: &[u8]) -> MgmtResult<Self> {
        let value: Value = serde_json::from_slice(slice)
            .map_err(|e| ProtocolError::malformed_node(e.to_string()))?;
        Ok(ModelNode(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_shape() {
        let node = ModelNode::operation("read-resource").with("recursive", true);
        assert_eq!(node.get(KEY_OPERATION).unwrap(), "read-resource");
        assert_eq!(node.get("recursive").unwrap(), &Value::Bool(true));
    }

    #[test]
    fn outcome_accessors() {
        assert!(ModelNode::success("ok").is_success());
        let failed = ModelNode::failed("boom");
        assert!(failed.is_failed());
        assert_eq!(failed.failure_description(), Some("boom"));
        assert!(ModelNode::cancelled().is_cancelled());
    }

    #[test]
    fn malformed_payload_is_protocol_error() {
        let err = ModelNode::from_slice(b"{not json").unwrap_err();
        assert!(matches!(
            err,
            mgmt_error::MgmtError::Protocol(ProtocolError::MalformedNode { .. })
        ));
    }
}
