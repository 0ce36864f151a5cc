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

use mgmt_remoting::protocol::model_node::KEY_INPUT_STREAM_INDEX;
use mgmt_remoting::protocol::ModelNode;
use mgmt_remoting::protocol::Operation;
use serde_json::json;
use serde_json::Value;

use crate::batch::Batch;

/// Compiles a batch into one composite operation: the step list keeps the
/// batch order and the per-command attachments are merged into a single
/// table, with each step's stream indices shifted past the attachments of
/// the steps before it.
pub fn compile_composite(batch: &Batch) -> Operation {
    let mut steps = Vec::with_capacity(batch.size());
    let mut attachments = Vec::new();
    for command in batch.commands() {
        let mut step = command.request().clone().into_value();
        offset_stream_indices(&mut step, attachments.len() as u64);
        steps.push(step);
        attachments.extend_from_slice(command.attachments());
    }

    let node = ModelNode::from(json!({
        "operation": "composite",
        "address": [],
        "steps": steps,
    }));
    let mut operation = Operation::new(node);
    for attachment in attachments {
        operation = operation.add_attachment(attachment);
    }
    operation
}

/// Rewrites every `input-stream-index` reference in the step, at any depth,
/// by the given base so it points into the merged attachment table.
fn offset_stream_indices(value: &mut Value, base: u64) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if key == KEY_INPUT_STREAM_INDEX {
                    if let Some(index) = entry.as_u64() {
                        *entry = Value::from(index + base);
                        continue;
                    }
                }
                offset_stream_indices(entry, base);
            }
        }
        Value::Array(entries) => {
            for entry in entries {
                offset_stream_indices(entry, base);
            }
        }
        _ => {}
    }
}
