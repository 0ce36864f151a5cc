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

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use bytes::Bytes;
use mgmt_error::MgmtResult;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

/// One input-stream attachment staged for transmission.
///
/// Three shapes: held fully in memory (single-shot: the buffer is dropped
/// after the first copy), cached to a temporary file (replayable, bounds
/// memory) or backed directly by a filesystem path (replayable).
///
/// The per-entry lock serializes concurrent size/copy work against this one
/// entry without blocking unrelated entries.
pub struct InputStreamEntry {
    kind: Mutex<EntryKind>,
    closed: AtomicBool,
}

enum EntryKind {
    InMemory { data: Option<Bytes> },
    Cached { file: NamedTempFile, size: u64 },
    File { path: PathBuf, size: Option<u64> },
}

impl InputStreamEntry {
    /// Fully-buffered entry. Single-use: the first `copy_contents` consumes
    /// the buffer, a second copy yields empty output, never stale data.
    pub fn in_memory(data: Bytes) -> Self {
        Self {
            kind: Mutex::new(EntryKind::InMemory { data: Some(data) }),
            closed: AtomicBool::new(false),
        }
    }

    /// Path-backed entry; contents are read from the file on every copy.
    pub fn file(path: PathBuf) -> Self {
        Self {
            kind: Mutex::new(EntryKind::File { path, size: None }),
            closed: AtomicBool::new(false),
        }
    }

    /// Spills the given contents to a temporary file so the entry can be
    /// replayed without holding the payload in memory.
    pub async fn cached(data: Bytes) -> MgmtResult<Self> {
        let size = data.len() as u64;
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            let mut file = NamedTempFile::new()?;
            file.write_all(&data)?;
            file.flush()?;
            Ok(file)
        })
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))??;
        Ok(Self {
            kind: Mutex::new(EntryKind::Cached { file, size }),
            closed: AtomicBool::new(false),
        })
    }

    /// Computes the transfer size. Idempotent: repeated calls return the same
    /// value without redoing work (the file size is cached after first use).
    pub async fn initialize(&self) -> MgmtResult<u64> {
        let mut kind = self.kind.lock().await;
        size_of(&mut kind).await
    }

    /// Produces the contents for one transmission. For the in-memory shape
    /// this consumes the buffer; file-backed and cached shapes may be copied
    /// repeatedly.
    pub async fn copy_contents(&self) -> MgmtResult<Bytes> {
        let mut kind = self.kind.lock().await;
        contents_of(&mut kind).await
    }

    /// One complete transfer (size + contents) under a single lock
    /// acquisition, so only one transfer of a given entry runs at a time.
    pub async fn transfer(&self) -> MgmtResult<(u64, Bytes)> {
        let mut kind = self.kind.lock().await;
        let size = size_of(&mut kind).await?;
        let data = contents_of(&mut kind).await?;
        Ok((size, data))
    }

    /// Releases the entry's resources. Safe to call repeatedly; called once
    /// per operation by the completion path regardless of outcome.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // if a transfer holds the lock it will consume the data itself
        if let Ok(mut kind) = self.kind.try_lock() {
            if let EntryKind::InMemory { data } = &mut *kind {
                data.take();
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

async fn size_of(kind: &mut EntryKind) -> MgmtResult<u64> {
    match kind {
        EntryKind::InMemory { data } => Ok(data.as_ref().map(|d| d.len() as u64).unwrap_or(0)),
        EntryKind::Cached { size, .. } => Ok(*size),
        EntryKind::File { path, size } => match size {
            Some(size) => Ok(*size),
            None => {
                let metadata = tokio::fs::metadata(&path).await?;
                *size = Some(metadata.len());
                Ok(metadata.len())
            }
        },
    }
}

async fn contents_of(kind: &mut EntryKind) -> MgmtResult<Bytes> {
    match kind {
        EntryKind::InMemory { data } => Ok(data.take().unwrap_or_default()),
        EntryKind::Cached { file, .. } => Ok(Bytes::from(tokio::fs::read(file.path()).await?)),
        EntryKind::File { path, .. } => Ok(Bytes::from(tokio::fs::read(&path).await?)),
    }
}
