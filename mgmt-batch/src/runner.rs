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

//! Batch execution: compiles the active batch to a composite operation,
//! runs it and translates structured per-step failures back into the user's
//! original command text.

use std::path::Path;

use mgmt_error::BatchError;
use mgmt_error::MgmtResult;
use mgmt_remoting::clients::ModelControllerClient;
use mgmt_remoting::protocol::ModelNode;
use serde_json::Value;
use tracing::debug;

use crate::batch::Batch;
use crate::batch::BatchedCommand;
use crate::compile::compile_composite;
use crate::manager::BatchManager;

/// Parses one line of a batch file into a batched command.
pub type CommandCompiler = dyn Fn(&str) -> MgmtResult<BatchedCommand>;

/// Runs the active batch. An empty batch is an error and is discarded as a
/// side effect. On step failure the batch stays active so the failing line
/// can be edited and the run retried; on success it is discarded.
pub async fn run(
    manager: &mut BatchManager,
    client: &ModelControllerClient,
) -> MgmtResult<ModelNode> {
    let batch = manager.discard().ok_or(BatchError::NoActiveBatch)?;
    if batch.is_empty() {
        // taking the batch above already discarded it
        return Err(BatchError::EmptyBatch.into());
    }
    match execute_batch(client, &batch).await {
        Ok(node) => Ok(node),
        Err(err) => {
            // leave the failing batch active so it can be edited and rerun
            let _ = manager.activate(batch);
            Err(err)
        }
    }
}

/// Compiles and runs a batch file without touching the session's active
/// batch. The file's batch is always discarded, success or failure.
pub async fn run_file(
    client: &ModelControllerClient,
    path: impl AsRef<Path>,
    compiler: &CommandCompiler,
) -> MgmtResult<ModelNode> {
    let batch = load_file(path, compiler).await?;
    if batch.is_empty() {
        return Err(BatchError::EmptyBatch.into());
    }
    execute_batch(client, &batch).await
}

/// Parses a batch file into a batch, skipping blank lines and `#` comments.
pub async fn load_file(
    path: impl AsRef<Path>,
    compiler: &CommandCompiler,
) -> MgmtResult<Batch> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| BatchError::file_load_failed(path.display().to_string(), e.to_string()))?;
    let mut batch = Batch::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let command = compiler(line).map_err(|e| {
            BatchError::file_load_failed(path.display().to_string(), e.to_string())
        })?;
        batch.add(command);
    }
    Ok(batch)
}

async fn execute_batch(client: &ModelControllerClient, batch: &Batch) -> MgmtResult<ModelNode> {
    let operation = compile_composite(batch);
    let response = client.execute_operation(operation).await?;
    let node = response.node().clone();
    response.close().await?;

    if node.is_failed() {
        return Err(step_failure(&node, batch).into());
    }
    invoke_response_handlers(&node, batch);
    Ok(node)
}

/// Maps the first failing step in a composite result back to the original
/// command text: "step N: <command>: <failure>".
fn step_failure(node: &ModelNode, batch: &Batch) -> BatchError {
    let overall = node
        .failure_description()
        .unwrap_or("composite operation failed")
        .to_string();
    for step in 1..=batch.size() {
        let Some(result) = step_result(node, step) else {
            continue;
        };
        let failed = result
            .get("outcome")
            .and_then(Value::as_str)
            .is_some_and(|outcome| outcome == "failed");
        if !failed {
            continue;
        }
        let failure = result
            .get("failure-description")
            .and_then(Value::as_str)
            .unwrap_or(&overall)
            .to_string();
        return BatchError::StepFailed {
            step,
            command: batch.commands()[step - 1].command_line().to_string(),
            failure,
        };
    }
    BatchError::MalformedCompositeResponse { reason: overall }
}

fn invoke_response_handlers(node: &ModelNode, batch: &Batch) {
    for (idx, command) in batch.commands().iter().enumerate() {
        let Some(handler) = command.response_handler() else {
            continue;
        };
        match step_result(node, idx + 1) {
            Some(result) => handler(result),
            None => debug!(step = idx + 1, "composite result has no slice for step"),
        }
    }
}

fn step_result(node: &ModelNode, step: usize) -> Option<&Value> {
    node.result()?.get(format!("step-{step}"))
}
