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

use std::path::PathBuf;

use bytes::Bytes;
use serde_json::Value;

use crate::protocol::model_node::KEY_OPERATION_HEADERS;
use crate::protocol::ModelNode;

/// Source of one input-stream attachment on an operation.
///
/// `Bytes` sources are materialized into single-shot in-memory entries at
/// execution time; `File` sources stay path-backed and may be replayed.
#[derive(Debug, Clone)]
pub enum Attachment {
    Bytes(Bytes),
    File(PathBuf),
}

/// A request to execute: an operation document, zero or more ordered
/// input-stream attachments and optional operation-level headers.
///
/// Attachments pass in by value and are released with the rest of the
/// execution context once the operation reaches a terminal outcome.
#[derive(Debug, Clone)]
pub struct Operation {
    node: ModelNode,
    attachments: Vec<Attachment>,
}

impl Operation {
    pub fn new(node: ModelNode) -> Self {
        Self {
            node,
            attachments: Vec::new(),
        }
    }

    pub fn add_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Sets an operation-level header, e.g. a blocking timeout or roles.
    pub fn set_header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let headers = match self.node.get(KEY_OPERATION_HEADERS) {
            Some(Value::Object(map)) => {
                let mut map = map.clone();
                map.insert(key.into(), value.into());
                Value::Object(map)
            }
            _ => {
                let mut map = serde_json::Map::new();
                map.insert(key.into(), value.into());
                Value::Object(map)
            }
        };
        self.node.set(KEY_OPERATION_HEADERS, headers);
        self
    }

    pub fn node(&self) -> &ModelNode {
        &self.node
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn attachment_count(&self) -> u32 {
        self.attachments.len() as u32
    }

    pub fn into_parts(self) -> (ModelNode, Vec<Attachment>) {
        (self.node, self.attachments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_accumulate() {
        let op = Operation::new(ModelNode::operation("deploy"))
            .set_header("blocking-timeout", 300)
            .set_header("rollback-on-runtime-failure", false);
        let headers = op.node().get(KEY_OPERATION_HEADERS).unwrap();
        assert_eq!(headers.get("blocking-timeout").unwrap(), 300);
        assert_eq!(headers.get("rollback-on-runtime-failure").unwrap(), false);
    }

    #[test]
    fn attachments_keep_order() {
        let op = Operation::new(ModelNode::operation("deploy"))
            .add_attachment(Attachment::Bytes(Bytes::from_static(b"a")))
            .add_attachment(Attachment::File(PathBuf::from("/tmp/b.war")));
        assert_eq!(op.attachment_count(), 2);
        assert!(matches!(op.attachments()[0], Attachment::Bytes(_)));
        assert!(matches!(op.attachments()[1], Attachment::File(_)));
    }
}
