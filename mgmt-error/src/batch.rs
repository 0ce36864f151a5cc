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

//! Batch engine usage errors. These are raised at the client layer before any
//! request is sent, except for `StepFailed` which translates a structured
//! per-step failure out of a composite response.

use thiserror::Error;

/// Batch engine errors
#[derive(Debug, Error)]
pub enum BatchError {
    /// A batch is already active; only one may be edited at a time.
    #[error("Can't start a new batch, another batch is currently active")]
    BatchAlreadyActive,

    /// No batch is active for the requested edit or run.
    #[error("No active batch")]
    NoActiveBatch,

    /// A held-back batch already exists under this name.
    #[error("Batch '{name}' is already held back")]
    NameAlreadyHeldBack { name: String },

    /// No held-back batch exists under this name.
    #[error("No held-back batch named '{name}'")]
    NoSuchHeldBackBatch { name: String },

    /// 1-based line number outside the batch. The message describes the valid
    /// range so the user can correct the command.
    #[error("Line number {line} is out of range: {}", valid_range_description(*.size))]
    LineOutOfRange { line: usize, size: usize },

    /// The active batch was empty when `run` was requested. The batch is
    /// discarded as a side effect of raising this error.
    #[error("The batch is empty")]
    EmptyBatch,

    /// A composite step failed on the remote controller.
    #[error("step {step}: {command}: {failure}")]
    StepFailed {
        step: usize,
        command: String,
        failure: String,
    },

    /// The composite response did not have the expected per-step shape.
    #[error("Malformed composite response: {reason}")]
    MalformedCompositeResponse { reason: String },

    /// Batch file could not be read or compiled.
    #[error("Failed to load batch file '{path}': {reason}")]
    FileLoadFailed { path: String, reason: String },
}

fn valid_range_description(size: usize) -> String {
    if size == 0 {
        "the batch is empty".to_string()
    } else {
        format!("valid range is [1, {size}]")
    }
}

impl BatchError {
    #[inline]
    pub fn line_out_of_range(line: usize, size: usize) -> Self {
        Self::LineOutOfRange { line, size }
    }

    #[inline]
    pub fn file_load_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FileLoadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_out_of_range_describes_bounds() {
        let err = BatchError::line_out_of_range(7, 3);
        assert_eq!(
            err.to_string(),
            "Line number 7 is out of range: valid range is [1, 3]"
        );

        let err = BatchError::line_out_of_range(1, 0);
        assert_eq!(
            err.to_string(),
            "Line number 1 is out of range: the batch is empty"
        );
    }

    #[test]
    fn step_failure_format() {
        let err = BatchError::StepFailed {
            step: 2,
            command: "add resource B".to_string(),
            failure: "duplicate resource".to_string(),
        };
        assert_eq!(err.to_string(), "step 2: add resource B: duplicate resource");
    }
}
