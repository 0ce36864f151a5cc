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

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use cheetah_string::CheetahString;
use mgmt_error::ClientError;
use mgmt_error::MgmtResult;
use mgmt_error::NetworkError;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::info;
use tracing::warn;

use crate::base::OperationExecutionContext;
use crate::base::OperationOutcome;
use crate::channel_association::ChannelAssociation;
use crate::codec::FieldWriter;
use crate::connection::Connection;
use crate::protocol::field_tag;
use crate::protocol::model_node::KEY_IN_SYNC;
use crate::protocol::operation_code;
use crate::protocol::ModelNode;
use crate::server_link::LinkState;
use crate::server_link::ReconnectPolicy;
use crate::server_link::TransportConnector;

/// A queued reconnect: where to go and with which refreshed credentials.
/// Arriving while an attempt is in flight, it replaces the queued target
/// instead of spawning a second loop.
#[derive(Debug, Clone)]
pub struct ReconnectRequest {
    pub uri: String,
    pub auth_token: Option<CheetahString>,
}

/// Managed server's side of the link to its host controller.
///
/// Owns the physical connection lifecycle: registration on boot, liveness
/// pings and the reconnect loop with in-sync detection. Out-of-sync
/// reconnects never try to reconcile state; they flag a required reload
/// exactly once and leave the rest to the caller.
pub struct HostControllerConnection {
    connector: Box<dyn TransportConnector>,
    identity: ModelNode,
    policy: ReconnectPolicy,
    uri: Mutex<String>,
    state: Mutex<LinkState>,
    association: Mutex<Option<Arc<ChannelAssociation>>>,
    boot_operations: Mutex<Option<ModelNode>>,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,
    pending_reconnect: Mutex<Option<ReconnectRequest>>,
    on_require_reload: Box<dyn Fn() + Send + Sync>,
    reload_required: AtomicBool,
    closed: AtomicBool,
}

impl HostControllerConnection {
    pub fn new(
        connector: Box<dyn TransportConnector>,
        uri: impl Into<String>,
        identity: ModelNode,
        policy: ReconnectPolicy,
        on_require_reload: Box<dyn Fn() + Send + Sync>,
    ) -> Arc<Self> {
        Arc::new(Self {
            connector,
            identity,
            policy,
            uri: Mutex::new(uri.into()),
            state: Mutex::new(LinkState::Disconnected),
            association: Mutex::new(None),
            boot_operations: Mutex::new(None),
            reconnect_task: Mutex::new(None),
            pending_reconnect: Mutex::new(None),
            on_require_reload,
            reload_required: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    pub fn state(&self) -> LinkState {
        *self.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Reload has been flagged since the last clean registration.
    pub fn is_reload_required(&self) -> bool {
        self.reload_required.load(Ordering::Acquire)
    }

    /// The boot operations received from the last successful registration.
    pub fn boot_operations(&self) -> Option<ModelNode> {
        self.boot_operations.lock().clone()
    }

    pub fn association(&self) -> Option<Arc<ChannelAssociation>> {
        self.association.lock().clone()
    }

    /// Opens the link and performs the registration handshake. On success the
    /// returned document holds the boot operations the server must apply.
    pub async fn connect(self: &Arc<Self>) -> MgmtResult<ModelNode> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Closed.into());
        }
        self.set_state(LinkState::Connecting);
        let uri = self.uri.lock().clone();
        let association = match self.open_channel(&uri).await {
            Ok(association) => association,
            Err(err) => {
                self.set_state(LinkState::Disconnected);
                return Err(err);
            }
        };

        match self
            .handshake(&association, operation_code::REGISTER, self.identity.clone())
            .await
        {
            Ok(response) => {
                self.set_state(LinkState::Registered);
                let boot_ops = response.clone();
                *self.boot_operations.lock() = Some(boot_ops);
                self.install(association);
                Ok(response)
            }
            Err(err) => {
                association.shutdown_now("registration failed");
                self.set_state(LinkState::Disconnected);
                Err(err)
            }
        }
    }

    /// Liveness probe. On failure the stale channel is torn down and a
    /// reconnect is queued before the error is returned.
    pub async fn ping(self: &Arc<Self>, timeout: Duration) -> MgmtResult<()> {
        let Some(association) = self.association() else {
            return Err(NetworkError::connection_closed("not connected").into());
        };
        match association.ping(timeout).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(%err, "ping failed, reconnecting");
                association.shutdown_now("ping failed");
                association
                    .await_completion(Duration::from_millis(100))
                    .await;
                self.queue_reconnect(ReconnectRequest {
                    uri: self.uri.lock().clone(),
                    auth_token: None,
                });
                Err(err)
            }
        }
    }

    /// Queues a reconnect, possibly to a new URI with refreshed credentials.
    /// Single-flight: if the retry loop is already running, the queued target
    /// is updated and the running loop picks it up.
    pub fn reconnect(self: &Arc<Self>, request: ReconnectRequest) {
        self.queue_reconnect(request);
    }

    /// Tells the host controller this server finished starting.
    pub async fn notify_server_started(&self) -> MgmtResult<()> {
        self.send_notification(operation_code::SERVER_STARTED).await
    }

    /// Tells the host controller this server's process is unstable.
    pub async fn notify_instability(&self) -> MgmtResult<()> {
        self.send_notification(operation_code::INSTABILITY_NOTIFICATION)
            .await
    }

    /// Closes the link. The retry loop is cancelled before the transport is
    /// torn down so no attempt races the shutdown.
    pub async fn close(&self, timeout: Duration) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self.reconnect_task.lock().take() {
            task.abort();
        }
        self.pending_reconnect.lock().take();
        let association = self.association.lock().take();
        if let Some(association) = association {
            association.shutdown(timeout).await;
        }
        self.set_state(LinkState::Closed);
    }

    fn set_state(&self, state: LinkState) {
        *self.state.lock() = state;
    }

    fn install(&self, association: Arc<ChannelAssociation>) {
        let previous = self.association.lock().replace(association);
        if let Some(previous) = previous {
            previous.shutdown_now("replaced by new connection");
        }
        self.set_state(LinkState::Connected);
    }

    async fn open_channel(&self, uri: &str) -> MgmtResult<Arc<ChannelAssociation>> {
        let transport = self.connector.connect(uri).await?;
        Ok(ChannelAssociation::start(Connection::new(transport)))
    }

    /// One registration or reconnect exchange: sends the identity document
    /// and returns the peer's response document (boot operations or sync
    /// state). A failed outcome in the document is a registration failure.
    async fn handshake(
        &self,
        association: &Arc<ChannelAssociation>,
        code: u8,
        identity: ModelNode,
    ) -> MgmtResult<ModelNode> {
        let mut writer = FieldWriter::new();
        writer.write_node(field_tag::OPERATION, &identity)?;
        let handle = association
            .execute_request(
                code,
                writer.finish(),
                Arc::new(OperationExecutionContext::empty()),
                Box::new(|_, _| {}),
            )
            .await?;
        match handle.outcome().await? {
            OperationOutcome::Done(payload) => {
                if payload.node.is_failed() {
                    return Err(ClientError::registration_failed(
                        payload
                            .node
                            .failure_description()
                            .unwrap_or("registration rejected"),
                    )
                    .into());
                }
                Ok(payload.node)
            }
            OperationOutcome::Failed(err) => Err(err),
            OperationOutcome::Cancelled => {
                Err(ClientError::registration_failed("registration cancelled").into())
            }
        }
    }

    async fn send_notification(&self, code: u8) -> MgmtResult<()> {
        let Some(association) = self.association() else {
            return Err(NetworkError::connection_closed("not connected").into());
        };
        association.send_oneway(code, Bytes::new()).await
    }

    fn queue_reconnect(self: &Arc<Self>, request: ReconnectRequest) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        *self.pending_reconnect.lock() = Some(request);
        let mut task = self.reconnect_task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            // the running loop re-reads the queued target each attempt
            return;
        }
        let connection = self.clone();
        *task = Some(tokio::spawn(async move {
            connection.run_reconnect_loop().await;
        }));
    }

    /// Parks the retry loop when no target is queued. The task slot and the
    /// queue are inspected under the same locks `queue_reconnect` takes, so a
    /// request queued while the loop was about to exit is never stranded:
    /// either this sees it and keeps looping, or `queue_reconnect` finds the
    /// slot cleared and spawns a fresh loop.
    fn retire_reconnect_loop(&self) -> bool {
        let mut task = self.reconnect_task.lock();
        let pending = self.pending_reconnect.lock();
        if pending.is_some() {
            return false;
        }
        task.take();
        true
    }

    /// Bounded-retry give-up: drops whatever is queued and parks the loop.
    fn abandon_reconnect(&self) {
        let mut task = self.reconnect_task.lock();
        self.pending_reconnect.lock().take();
        task.take();
        drop(task);
        self.set_state(LinkState::Disconnected);
    }

    async fn run_reconnect_loop(self: Arc<Self>) {
        let mut attempts: u32 = 0;
        loop {
            if self.closed.load(Ordering::Acquire) {
                return;
            }
            let Some(request) = self.pending_reconnect.lock().take() else {
                if self.retire_reconnect_loop() {
                    return;
                }
                continue;
            };
            self.set_state(LinkState::Reconnecting);
            match self.try_reconnect(&request).await {
                Ok(in_sync) => {
                    *self.uri.lock() = request.uri.clone();
                    info!(uri = %request.uri, in_sync, "reconnected to host controller");
                    if !in_sync && !self.reload_required.swap(true, Ordering::AcqRel) {
                        (self.on_require_reload)();
                    }
                    attempts = 0;
                    if self.retire_reconnect_loop() {
                        return;
                    }
                    // a newer target was queued while this attempt ran
                }
                Err(err) => {
                    attempts += 1;
                    warn!(uri = %request.uri, attempts, %err, "reconnect attempt failed");
                    if self
                        .policy
                        .max_attempts
                        .is_some_and(|max| attempts >= max)
                    {
                        warn!(attempts, "giving up on reconnect");
                        self.abandon_reconnect();
                        return;
                    }
                    // keep the target unless a newer one was queued meanwhile
                    {
                        let mut pending = self.pending_reconnect.lock();
                        if pending.is_none() {
                            *pending = Some(request);
                        }
                    }
                    tokio::time::sleep(self.policy.interval).await;
                }
            }
        }
    }

    async fn try_reconnect(&self, request: &ReconnectRequest) -> MgmtResult<bool> {
        let association = self.open_channel(&request.uri).await?;
        let mut identity = self.identity.clone();
        if let Some(token) = &request.auth_token {
            identity.set("auth-token", token.as_str());
        }
        match self
            .handshake(&association, operation_code::RECONNECT, identity)
            .await
        {
            Ok(response) => {
                let in_sync = response
                    .get(KEY_IN_SYNC)
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false);
                self.install(association);
                Ok(in_sync)
            }
            Err(err) => {
                association.shutdown_now("reconnect handshake failed");
                Err(err)
            }
        }
    }
}
