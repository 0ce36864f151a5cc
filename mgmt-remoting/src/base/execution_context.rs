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

use std::sync::Arc;

use crate::base::stream_entry::InputStreamEntry;
use crate::protocol::MessageSeverity;

/// Sink for mid-operation progress reports pushed by the remote peer, out of
/// band from the final result.
pub trait MessageHandler: Send + Sync + 'static {
    fn handle_report(&self, severity: MessageSeverity, message: &str);
}

/// Default sink: progress reports are dropped.
pub struct DiscardMessageHandler;

impl MessageHandler for DiscardMessageHandler {
    fn handle_report(&self, _severity: MessageSeverity, _message: &str) {}
}

impl<F> MessageHandler for F
where
    F: Fn(MessageSeverity, &str) + Send + Sync + 'static,
{
    fn handle_report(&self, severity: MessageSeverity, message: &str) {
        self(severity, message)
    }
}

/// The attachment carried on an active operation: the message handler for
/// progress reports plus the table of input-stream entries the peer may fetch
/// while the operation executes.
pub struct OperationExecutionContext {
    message_handler: Box<dyn MessageHandler>,
    entries: Vec<Arc<InputStreamEntry>>,
}

impl OperationExecutionContext {
    pub fn new(
        message_handler: Box<dyn MessageHandler>,
        entries: Vec<Arc<InputStreamEntry>>,
    ) -> Self {
        Self {
            message_handler,
            entries,
        }
    }

    /// Context for operations with no attachments or reports (registration,
    /// side-channel requests).
    pub fn empty() -> Self {
        Self::new(Box::new(DiscardMessageHandler), Vec::new())
    }

    pub fn message_handler(&self) -> &dyn MessageHandler {
        self.message_handler.as_ref()
    }

    pub fn entry(&self, index: u32) -> Option<Arc<InputStreamEntry>> {
        self.entries.get(index as usize).cloned()
    }

    pub fn entry_count(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Releases every input-stream entry. Runs on every terminal outcome,
    /// including cancellation and failure.
    pub fn close_resources(&self) {
        for entry in &self.entries {
            entry.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn close_resources_closes_every_entry() {
        let entries = vec![
            Arc::new(InputStreamEntry::in_memory(Bytes::from_static(b"a"))),
            Arc::new(InputStreamEntry::in_memory(Bytes::from_static(b"b"))),
        ];
        let ctx = OperationExecutionContext::new(Box::new(DiscardMessageHandler), entries.clone());
        ctx.close_resources();
        assert!(entries.iter().all(|e| e.is_closed()));
    }

    #[test]
    fn entry_lookup_by_index() {
        let ctx = OperationExecutionContext::new(
            Box::new(DiscardMessageHandler),
            vec![Arc::new(InputStreamEntry::in_memory(Bytes::from_static(b"a")))],
        );
        assert!(ctx.entry(0).is_some());
        assert!(ctx.entry(1).is_none());
    }
}
