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

use std::backtrace::Backtrace;
use std::ops::Deref;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use mgmt_error::MgmtResult;
use mgmt_error::NetworkError;
use tokio::net::TcpStream;
use tracing::warn;

use crate::channel_association::ChannelAssociation;
use crate::clients::model_controller_client::ModelControllerClient;
use crate::config::ManagementClientConfig;
use crate::connection::Connection;
use crate::connection::Transport;

/// A management client bound to its own connection.
///
/// Must be closed when done. Dropping without closing tears the channel down
/// but logs the allocation site, since relying on that path leaks the
/// connection until the drop actually happens.
pub struct RemoteManagementClient {
    client: Arc<ModelControllerClient>,
    guard: LeakGuard,
}

impl RemoteManagementClient {
    /// Connects a TCP transport to the configured endpoint.
    pub async fn connect(config: &ManagementClientConfig) -> MgmtResult<Self> {
        let addr = config.address();
        let timeout_ms = config.connect_timeout.as_millis() as u64;
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| NetworkError::connection_timeout(&addr, timeout_ms))?
            .map_err(|e| NetworkError::connection_failed(&addr, e.to_string()))?;
        stream
            .set_nodelay(true)
            .map_err(|e| NetworkError::connection_failed(&addr, e.to_string()))?;
        Ok(Self::from_transport(stream))
    }

    /// Builds a client over an already-established transport, e.g. an
    /// in-process duplex pipe.
    pub fn from_transport<T: Transport>(transport: T) -> Self {
        let association = ChannelAssociation::start(Connection::from_transport(transport));
        let client = ModelControllerClient::new(association.clone());
        Self {
            client,
            guard: LeakGuard::new(association),
        }
    }

    pub fn client(&self) -> &Arc<ModelControllerClient> {
        &self.client
    }

    /// Closes the client and its channel, draining active operations for up
    /// to `timeout`.
    pub async fn close(&self, timeout: Duration) {
        self.guard.disarm();
        self.client.close(timeout).await;
    }
}

impl std::fmt::Debug for RemoteManagementClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteManagementClient").finish_non_exhaustive()
    }
}

impl Deref for RemoteManagementClient {
    type Target = ModelControllerClient;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

/// Records where the client was created; fires if it is dropped unclosed.
struct LeakGuard {
    association: Arc<ChannelAssociation>,
    closed: AtomicBool,
    created_at: Backtrace,
}

impl LeakGuard {
    fn new(association: Arc<ChannelAssociation>) -> Self {
        Self {
            association,
            closed: AtomicBool::new(false),
            created_at: Backtrace::capture(),
        }
    }

    fn disarm(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl Drop for LeakGuard {
    fn drop(&mut self) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        warn!(
            channel_id = %self.association.channel_id(),
            "management client dropped without close; created at:\n{}",
            self.created_at
        );
        self.association.shutdown_now("client dropped without close");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_times_out_against_unroutable_address() {
        let mut config = ManagementClientConfig::new("192.0.2.1", 9990);
        config.connect_timeout = Duration::from_millis(50);
        let err = RemoteManagementClient::connect(&config).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (transport, _peer) = tokio::io::duplex(1024);
        let client = RemoteManagementClient::from_transport(transport);
        client.close(Duration::from_millis(10)).await;
        client.close(Duration::from_millis(10)).await;
        assert!(client.is_closed());
    }
}
