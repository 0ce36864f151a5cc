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

//! Unified error system for the management client workspace.
//!
//! All errors are grouped into semantic categories so callers can distinguish
//! transport failures (which always propagate) from usage errors (raised before
//! any request is sent). Operation-level failures reported by the remote peer
//! are *not* errors at this layer; they travel as data inside the response
//! document and are translated by higher layers such as the batch engine.

mod batch;
mod client;
mod network;
mod protocol;

use std::io;

pub use batch::BatchError;
pub use client::ClientError;
pub use network::NetworkError;
pub use protocol::ProtocolError;
use thiserror::Error;

/// Main error type for all management client operations.
#[derive(Debug, Error)]
pub enum MgmtError {
    /// Network operation errors (connection, timeout, send/receive failures).
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Wire protocol errors (tag mismatches, truncated frames, bad versions).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Client usage and lifecycle errors.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Batch engine usage errors.
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// Raw I/O errors from the transport or attachment files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization of a model node payload failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type MgmtResult<T> = Result<T, MgmtError>;

impl MgmtError {
    /// Whether this error came from the transport or the wire protocol, as
    /// opposed to a local usage error.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            MgmtError::Network(_) | MgmtError::Protocol(_) | MgmtError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_classification() {
        let err = MgmtError::from(ProtocolError::UnexpectedTag {
            expected: 0x60,
            actual: 0x63,
        });
        assert!(err.is_transport());

        let err = MgmtError::from(BatchError::NoActiveBatch);
        assert!(!err.is_transport());
    }

    #[test]
    fn io_errors_convert() {
        let err: MgmtError = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(err.is_transport());
    }
}
