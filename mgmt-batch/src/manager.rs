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

use std::collections::HashMap;

use cheetah_string::CheetahString;
use mgmt_error::BatchError;

use crate::batch::Batch;

/// Per-session batch state: at most one active batch plus a set of named
/// held-back batches that can be reactivated later.
#[derive(Default)]
pub struct BatchManager {
    active: Option<Batch>,
    held_back: HashMap<CheetahString, Batch>,
}

impl BatchManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_batch_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&Batch> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Result<&mut Batch, BatchError> {
        self.active.as_mut().ok_or(BatchError::NoActiveBatch)
    }

    /// Starts a new empty batch; only one may be active at a time.
    pub fn activate_new(&mut self) -> Result<&mut Batch, BatchError> {
        self.activate(Batch::new())
    }

    /// Activates a pre-filled batch, e.g. one loaded from a file.
    pub fn activate(&mut self, batch: Batch) -> Result<&mut Batch, BatchError> {
        if self.active.is_some() {
            return Err(BatchError::BatchAlreadyActive);
        }
        Ok(self.active.insert(batch))
    }

    /// Drops the active batch, if any.
    pub fn discard(&mut self) -> Option<Batch> {
        self.active.take()
    }

    /// Stashes the active batch under a unique name for later reactivation.
    pub fn holdback(&mut self, name: impl Into<CheetahString>) -> Result<(), BatchError> {
        let name = name.into();
        if self.held_back.contains_key(&name) {
            return Err(BatchError::NameAlreadyHeldBack {
                name: name.to_string(),
            });
        }
        let batch = self.active.take().ok_or(BatchError::NoActiveBatch)?;
        self.held_back.insert(name, batch);
        Ok(())
    }

    /// Moves a held-back batch back to active.
    pub fn reactivate(&mut self, name: &str) -> Result<&mut Batch, BatchError> {
        if self.active.is_some() {
            return Err(BatchError::BatchAlreadyActive);
        }
        let batch = self
            .held_back
            .remove(name)
            .ok_or_else(|| BatchError::NoSuchHeldBackBatch {
                name: name.to_string(),
            })?;
        Ok(self.active.insert(batch))
    }

    pub fn held_back_names(&self) -> Vec<CheetahString> {
        let mut names: Vec<CheetahString> = self.held_back.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use mgmt_remoting::protocol::ModelNode;

    use super::*;
    use crate::batch::BatchedCommand;

    fn command(text: &str) -> BatchedCommand {
        BatchedCommand::new(text.to_string(), ModelNode::operation(text.to_string()))
    }

    #[test]
    fn only_one_active_batch() {
        let mut manager = BatchManager::new();
        manager.activate_new().unwrap();
        assert!(matches!(
            manager.activate_new(),
            Err(BatchError::BatchAlreadyActive)
        ));
        manager.discard();
        manager.activate_new().unwrap();
    }

    #[test]
    fn holdback_and_reactivate() {
        let mut manager = BatchManager::new();
        manager.activate_new().unwrap().add(command("a"));
        manager.holdback("stash").unwrap();
        assert!(!manager.is_batch_active());

        manager.activate_new().unwrap();
        assert!(matches!(
            manager.reactivate("stash"),
            Err(BatchError::BatchAlreadyActive)
        ));
        manager.discard();

        let batch = manager.reactivate("stash").unwrap();
        assert_eq!(batch.size(), 1);
        assert!(matches!(
            manager.reactivate("stash"),
            Err(BatchError::NoSuchHeldBackBatch { .. })
        ));
    }

    #[test]
    fn holdback_names_are_unique() {
        let mut manager = BatchManager::new();
        manager.activate_new().unwrap();
        manager.holdback("x").unwrap();
        manager.activate_new().unwrap();
        assert!(matches!(
            manager.holdback("x"),
            Err(BatchError::NameAlreadyHeldBack { .. })
        ));
        // the failed holdback must not consume the active batch
        assert!(manager.is_batch_active());
    }

    #[test]
    fn holdback_without_active_batch_fails() {
        let mut manager = BatchManager::new();
        assert!(matches!(
            manager.holdback("x"),
            Err(BatchError::NoActiveBatch)
        ));
    }
}
