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

use cheetah_string::CheetahString;
use mgmt_error::BatchError;
use mgmt_remoting::protocol::Attachment;
use mgmt_remoting::protocol::ModelNode;
use serde_json::Value;

/// Invoked with one step's slice of a successful composite result.
pub type ResponseHandler = Box<dyn Fn(&Value) + Send + Sync>;

/// One command in a batch: the user's original text, its compiled request
/// and any attachments the request references by stream index.
pub struct BatchedCommand {
    command_line: CheetahString,
    request: ModelNode,
    attachments: Vec<Attachment>,
    response_handler: Option<ResponseHandler>,
}

impl BatchedCommand {
    pub fn new(command_line: impl Into<CheetahString>, request: ModelNode) -> Self {
        Self {
            command_line: command_line.into(),
            request,
            attachments: Vec::new(),
            response_handler: None,
        }
    }

    pub fn add_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn set_response_handler(mut self, handler: ResponseHandler) -> Self {
        self.response_handler = Some(handler);
        self
    }

    pub fn command_line(&self) -> &CheetahString {
        &self.command_line
    }

    pub fn request(&self) -> &ModelNode {
        &self.request
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn response_handler(&self) -> Option<&ResponseHandler> {
        self.response_handler.as_ref()
    }
}

impl std::fmt::Debug for BatchedCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchedCommand")
            .field("command_line", &self.command_line)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

/// Ordered, editable sequence of batched commands. Line numbers in the
/// editing API are 1-based, matching what the user sees in a listing.
#[derive(Default)]
pub struct Batch {
    commands: Vec<BatchedCommand>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, command: BatchedCommand) {
        self.commands.push(command);
    }

    pub fn size(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[BatchedCommand] {
        &self.commands
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Moves the command at `from` so it ends up at line `to`, shifting the
    /// lines in between.
    pub fn move_line(&mut self, from: usize, to: usize) -> Result<(), BatchError> {
        let from_idx = self.index(from)?;
        let to_idx = self.index(to)?;
        let command = self.commands.remove(from_idx);
        self.commands.insert(to_idx, command);
        Ok(())
    }

    pub fn remove_line(&mut self, line: usize) -> Result<BatchedCommand, BatchError> {
        let idx = self.index(line)?;
        Ok(self.commands.remove(idx))
    }

    /// Replaces the command at `line` with a re-parsed one.
    pub fn set_line(&mut self, line: usize, command: BatchedCommand) -> Result<(), BatchError> {
        let idx = self.index(line)?;
        self.commands[idx] = command;
        Ok(())
    }

    fn index(&self, line: usize) -> Result<usize, BatchError> {
        if line == 0 || line > self.commands.len() {
            return Err(BatchError::line_out_of_range(line, self.commands.len()));
        }
        Ok(line - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(text: &str) -> BatchedCommand {
        BatchedCommand::new(text.to_string(), ModelNode::operation(text.to_string()))
    }

    fn lines(batch: &Batch) -> Vec<String> {
        batch
            .commands()
            .iter()
            .map(|c| c.command_line().to_string())
            .collect()
    }

    #[test]
    fn move_line_round_trip_restores_order() {
        let mut batch = Batch::new();
        for text in ["a", "b", "c", "d"] {
            batch.add(command(text));
        }
        batch.move_line(1, 3).unwrap();
        assert_eq!(lines(&batch), ["b", "c", "a", "d"]);
        batch.move_line(3, 1).unwrap();
        assert_eq!(lines(&batch), ["a", "b", "c", "d"]);
    }

    #[test]
    fn out_of_range_lines_are_rejected_with_bounds() {
        let mut batch = Batch::new();
        batch.add(command("a"));
        batch.add(command("b"));

        let err = batch.move_line(0, 1).unwrap_err();
        assert!(err.to_string().contains("valid range is [1, 2]"));
        assert!(batch.move_line(1, 3).is_err());
        assert!(batch.remove_line(3).is_err());

        let mut empty = Batch::new();
        let err = empty.remove_line(1).unwrap_err();
        assert!(err.to_string().contains("the batch is empty"));
    }

    #[test]
    fn remove_and_set_line() {
        let mut batch = Batch::new();
        batch.add(command("a"));
        batch.add(command("b"));
        let removed = batch.remove_line(1).unwrap();
        assert_eq!(removed.command_line(), "a");
        batch.set_line(1, command("c")).unwrap();
        assert_eq!(lines(&batch), ["c"]);
    }
}
