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

//! Binding between one framed connection and the management machinery.
//!
//! The association owns the reader and writer tasks for the connection, the
//! active-operation registry and the table of inbound request handlers. All
//! outbound traffic funnels through one mpsc queue so the writer task is the
//! only side touching the sink.

use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use mgmt_error::ClientError;
use mgmt_error::MgmtResult;
use mgmt_error::NetworkError;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::warn;

use crate::base::ActiveOperationRegistry;
use crate::base::CompletedCallback;
use crate::base::OperationExecutionContext;
use crate::base::OperationHandle;
use crate::base::OperationOutcome;
use crate::base::ResponsePayload;
use crate::codec::FieldReader;
use crate::codec::FieldWriter;
use crate::connection::Connection;
use crate::connection::ConnectionId;
use crate::connection::ConnectionReadHalf;
use crate::connection::ConnectionWriteHalf;
use crate::protocol::field_tag;
use crate::protocol::next_operation_id;
use crate::protocol::operation_code;
use crate::protocol::ManagementMessage;
use crate::protocol::ModelNode;

const STATE_OPEN: u8 = 0;
const STATE_SHUTDOWN: u8 = 1;
const STATE_CLOSED: u8 = 2;

const OUTBOUND_QUEUE_DEPTH: usize = 256;

/// Handle on the shared outbound queue. Cheap to clone; every frame written
/// to the connection goes through here.
#[derive(Clone)]
pub struct OutboundSender {
    tx: mpsc::Sender<ManagementMessage>,
}

impl OutboundSender {
    pub async fn send(&self, message: ManagementMessage) -> MgmtResult<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| NetworkError::send_failed("outbound queue closed").into())
    }
}

/// What an inbound request handler gets to work with: the outbound queue for
/// replies and the registry to resolve the operation the request targets.
#[derive(Clone)]
pub struct InboundContext {
    pub outbound: OutboundSender,
    pub registry: Arc<ActiveOperationRegistry>,
}

/// Handler for one inbound operation-type code.
///
/// Called from the reader task; implementations must spawn for anything that
/// blocks or takes time, the reader cannot stall.
pub trait InboundRequestHandler: Send + Sync + 'static {
    fn on_request(&self, ctx: InboundContext, request: ManagementMessage);
}

type FetchSender = oneshot::Sender<MgmtResult<Bytes>>;

/// One live management channel: registry, handler table, outbound queue and
/// the two I/O tasks driving the connection.
pub struct ChannelAssociation {
    registry: Arc<ActiveOperationRegistry>,
    outbound: OutboundSender,
    handlers: DashMap<u8, Arc<dyn InboundRequestHandler>>,
    pending_fetches: DashMap<(i32, u32), FetchSender>,
    pending_pings: DashMap<i32, oneshot::Sender<()>>,
    notify_shutdown: broadcast::Sender<()>,
    state: AtomicU8,
    channel_id: ConnectionId,
}

impl ChannelAssociation {
    /// Takes ownership of the connection and spawns its reader and writer.
    pub fn start(connection: Connection) -> Arc<Self> {
        let channel_id = connection.connection_id().clone();
        let (read_half, write_half) = connection.into_split();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        let (notify_shutdown, _) = broadcast::channel(1);

        let association = Arc::new(Self {
            registry: ActiveOperationRegistry::new(),
            outbound: OutboundSender { tx: outbound_tx },
            handlers: DashMap::new(),
            pending_fetches: DashMap::new(),
            pending_pings: DashMap::new(),
            notify_shutdown,
            state: AtomicU8::new(STATE_OPEN),
            channel_id,
        });

        let recv_association = association.clone();
        tokio::spawn(async move {
            recv_association.run_recv(read_half).await;
        });
        let send_association = association.clone();
        tokio::spawn(async move {
            send_association.run_send(write_half, outbound_rx).await;
        });

        association
    }

    pub fn channel_id(&self) -> &ConnectionId {
        &self.channel_id
    }

    pub fn registry(&self) -> &Arc<ActiveOperationRegistry> {
        &self.registry
    }

    pub fn outbound(&self) -> OutboundSender {
        self.outbound.clone()
    }

    pub fn is_open(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_OPEN
    }

    pub fn register_handler(&self, code: u8, handler: Arc<dyn InboundRequestHandler>) {
        self.handlers.insert(code, handler);
    }

    /// Registers a new operation and sends its request. The returned handle
    /// resolves when the peer's terminal response arrives, the operation is
    /// cancelled or the channel dies.
    pub async fn execute_request(
        &self,
        code: u8,
        body: Bytes,
        attachment: Arc<OperationExecutionContext>,
        completed: CompletedCallback,
    ) -> MgmtResult<OperationHandle> {
        if !self.is_open() {
            return Err(NetworkError::ChannelShuttingDown.into());
        }
        let handle = self.registry.register(attachment, completed);
        let operation_id = handle.operation_id();
        let message = ManagementMessage::request(operation_id, code).set_body(body);
        if let Err(err) = self.outbound.send(message).await {
            // the writer never saw the frame; resolve the handle here
            self.registry.complete(
                operation_id,
                OperationOutcome::Failed(NetworkError::send_failed(err.to_string()).into()),
            );
        }
        Ok(handle)
    }

    /// Fire-and-forget notification under a fresh id.
    pub async fn send_oneway(&self, code: u8, body: Bytes) -> MgmtResult<()> {
        self.send_oneway_for(next_operation_id(), code, body).await
    }

    /// Fire-and-forget notification correlated to an existing operation id,
    /// e.g. releasing peer-held response streams after a proxied response.
    pub async fn send_oneway_for(&self, operation_id: i32, code: u8, body: Bytes) -> MgmtResult<()> {
        if self.state.load(Ordering::Acquire) == STATE_CLOSED {
            return Err(NetworkError::ChannelShuttingDown.into());
        }
        self.outbound
            .send(ManagementMessage::oneway(operation_id, code).set_body(body))
            .await
    }

    /// Asks the peer to cancel an active operation. The operation stays
    /// registered; the terminal state arrives through the response path once
    /// the peer acknowledges.
    pub async fn request_cancel(&self, operation_id: i32) -> MgmtResult<()> {
        if !self.registry.request_cancel(operation_id) {
            return Err(ClientError::NoActiveOperation { operation_id }.into());
        }
        self.outbound
            .send(ManagementMessage::request(
                operation_id,
                operation_code::CANCEL_ASYNC,
            ))
            .await
    }

    /// Fetches one attachment stream held by the peer for a completed
    /// operation, correlated by (operation id, stream index).
    pub async fn fetch_attachment(&self, operation_id: i32, index: u32) -> MgmtResult<Bytes> {
        if !self.is_open() {
            return Err(NetworkError::ChannelShuttingDown.into());
        }
        let (tx, rx) = oneshot::channel();
        self.pending_fetches.insert((operation_id, index), tx);

        let mut writer = FieldWriter::new();
        writer.write_u32(field_tag::INPUTSTREAM_INDEX, index);
        let message = ManagementMessage::request(operation_id, operation_code::GET_INPUTSTREAM)
            .set_body(writer.finish());
        if let Err(err) = self.outbound.send(message).await {
            self.pending_fetches.remove(&(operation_id, index));
            return Err(err);
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(NetworkError::connection_closed("channel closed during attachment fetch").into()),
        }
    }

    /// Round-trip liveness probe. An error means the channel is unusable.
    pub async fn ping(&self, timeout: Duration) -> MgmtResult<()> {
        if !self.is_open() {
            return Err(NetworkError::ChannelShuttingDown.into());
        }
        let operation_id = next_operation_id();
        let (tx, rx) = oneshot::channel();
        self.pending_pings.insert(operation_id, tx);

        let message = ManagementMessage::request(operation_id, operation_code::PING);
        if let Err(err) = self.outbound.send(message).await {
            self.pending_pings.remove(&operation_id);
            return Err(err);
        }

        let millis = timeout.as_millis() as u64;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(NetworkError::connection_closed("channel closed during ping").into()),
            Err(_) => {
                self.pending_pings.remove(&operation_id);
                Err(NetworkError::RequestTimeout { timeout_ms: millis }.into())
            }
        }
    }

    /// Graceful shutdown: stop accepting new operations, wait up to `timeout`
    /// for active ones to drain, then tear the channel down.
    pub async fn shutdown(&self, timeout: Duration) {
        let _ = self.state.compare_exchange(
            STATE_OPEN,
            STATE_SHUTDOWN,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if !self.registry.await_completion(timeout).await {
            debug!(
                channel_id = %self.channel_id,
                outstanding = self.registry.len(),
                "shutdown timeout expired with operations outstanding"
            );
        }
        self.shutdown_now("channel shut down");
    }

    /// Immediate teardown: every outstanding operation, attachment fetch and
    /// ping resolves with an error, nothing hangs.
    pub fn shutdown_now(&self, reason: &str) {
        if self.state.swap(STATE_CLOSED, Ordering::AcqRel) == STATE_CLOSED {
            return;
        }
        debug!(channel_id = %self.channel_id, reason, "closing management channel");
        let _ = self.notify_shutdown.send(());
        self.registry.fail_all(reason);

        let fetch_keys: Vec<(i32, u32)> =
            self.pending_fetches.iter().map(|e| *e.key()).collect();
        for key in fetch_keys {
            if let Some((_, tx)) = self.pending_fetches.remove(&key) {
                let _ = tx.send(Err(NetworkError::connection_closed(reason).into()));
            }
        }
        let ping_keys: Vec<i32> = self.pending_pings.iter().map(|e| *e.key()).collect();
        for key in ping_keys {
            self.pending_pings.remove(&key);
        }
    }

    /// Waits for all active operations to drain. Returns whether the registry
    /// emptied within the timeout.
    pub async fn await_completion(&self, timeout: Duration) -> bool {
        self.registry.await_completion(timeout).await
    }

    async fn run_recv(self: Arc<Self>, mut read_half: ConnectionReadHalf) {
        let mut shutdown_rx = self.notify_shutdown.subscribe();
        loop {
            let message = tokio::select! {
                message = read_half.receive_message() => message,
                _ = shutdown_rx.recv() => break,
            };
            match message {
                Some(Ok(message)) => self.dispatch(message).await,
                Some(Err(err)) => {
                    warn!(channel_id = %self.channel_id, %err, "closing channel after protocol error");
                    self.shutdown_now("protocol error on inbound frame");
                    break;
                }
                None => {
                    self.shutdown_now("connection closed by peer");
                    break;
                }
            }
        }
    }

    async fn run_send(
        self: Arc<Self>,
        mut write_half: ConnectionWriteHalf,
        mut outbound_rx: mpsc::Receiver<ManagementMessage>,
    ) {
        let mut shutdown_rx = self.notify_shutdown.subscribe();
        loop {
            let message = tokio::select! {
                message = outbound_rx.recv() => message,
                _ = shutdown_rx.recv() => break,
            };
            let Some(message) = message else { break };
            if let Err(err) = write_half.send_message(message).await {
                warn!(channel_id = %self.channel_id, %err, "write failed, closing channel");
                self.shutdown_now("write failed");
                break;
            }
        }
        let _ = write_half.shutdown().await;
    }

    async fn dispatch(&self, message: ManagementMessage) {
        if message.is_response() {
            self.dispatch_response(message);
            return;
        }
        // request or oneway
        match message.operation_code() {
            operation_code::PING => {
                let reply =
                    ManagementMessage::response(message.operation_id(), operation_code::PONG);
                let _ = self.outbound.send(reply).await;
            }
            code => match self.handlers.get(&code) {
                Some(handler) => {
                    let ctx = InboundContext {
                        outbound: self.outbound.clone(),
                        registry: self.registry.clone(),
                    };
                    handler.on_request(ctx, message);
                }
                None => {
                    warn!(
                        channel_id = %self.channel_id,
                        code = format_args!("0x{code:02x}"),
                        "no handler registered for inbound request"
                    );
                    if message.is_request() {
                        let node = ModelNode::failed(
                            mgmt_error::ProtocolError::NoSuchHandler { code }.to_string(),
                        );
                        let mut writer = FieldWriter::new();
                        if writer.write_node(field_tag::RESPONSE, &node).is_ok() {
                            writer.write_u32(field_tag::INPUTSTREAM_COUNT, 0);
                            let reply = ManagementMessage::response_to(&message)
                                .set_body(writer.finish());
                            let _ = self.outbound.send(reply).await;
                        }
                    }
                }
            },
        }
    }

    fn dispatch_response(&self, mut message: ManagementMessage) {
        let operation_id = message.operation_id();
        match message.operation_code() {
            operation_code::PONG | operation_code::PING => {
                if let Some((_, tx)) = self.pending_pings.remove(&operation_id) {
                    let _ = tx.send(());
                }
            }
            operation_code::GET_INPUTSTREAM => {
                self.resolve_fetch(operation_id, message.take_body());
            }
            operation_code::CANCEL_ASYNC => {
                // cancellation acknowledged by the peer; terminal only when a
                // cancel was actually requested on our side
                if self.registry.is_cancel_requested(operation_id) {
                    self.registry.complete(operation_id, OperationOutcome::Cancelled);
                }
            }
            // reports are fire-and-forget; a stray ack must not be mistaken
            // for the operation's terminal response
            operation_code::HANDLE_REPORT => {
                debug!(channel_id = %self.channel_id, operation_id, "ignoring report ack");
            }
            operation_code::REGISTER | operation_code::RECONNECT => {
                let outcome = match parse_registration_response(message.take_body()) {
                    Ok(outcome) => outcome,
                    Err(err) => OperationOutcome::Failed(err),
                };
                self.registry.complete(operation_id, outcome);
            }
            _ => {
                let outcome = match parse_operation_response(message.take_body()) {
                    Ok(outcome) => outcome,
                    Err(err) => OperationOutcome::Failed(err),
                };
                self.registry.complete(operation_id, outcome);
            }
        }
    }

    fn resolve_fetch(&self, operation_id: i32, body: Bytes) {
        let mut reader = FieldReader::new(body);
        let index = match reader.read_u32(field_tag::INPUTSTREAM_INDEX) {
            Ok(index) => index,
            Err(err) => {
                warn!(channel_id = %self.channel_id, %err, "malformed attachment response");
                return;
            }
        };
        let Some((_, tx)) = self.pending_fetches.remove(&(operation_id, index)) else {
            debug!(
                channel_id = %self.channel_id,
                operation_id, index, "attachment response without a pending fetch"
            );
            return;
        };
        let result = read_fetch_payload(&mut reader);
        let _ = tx.send(result);
    }
}

/// Body of a fetch response after the index: either length + contents, or a
/// failure message from the peer.
fn read_fetch_payload(reader: &mut FieldReader) -> MgmtResult<Bytes> {
    match reader.read_tag()? {
        field_tag::INPUTSTREAM_LENGTH => {
            let length = reader.read_u32_value()? as usize;
            let contents = reader.read_bytes(field_tag::INPUTSTREAM_CONTENTS)?;
            if contents.len() != length {
                return Err(ClientError::attachment_transfer_failed(format!(
                    "declared {length} bytes but received {}",
                    contents.len()
                ))
                .into());
            }
            Ok(contents)
        }
        field_tag::MESSAGE => {
            let raw = reader.read_bytes_value()?;
            Err(ClientError::attachment_transfer_failed(String::from_utf8_lossy(&raw)).into())
        }
        other => Err(mgmt_error::ProtocolError::unexpected_tag(field_tag::INPUTSTREAM_LENGTH, other).into()),
    }
}

/// Registration and reconnect responses carry the result document plus the
/// explicit in-sync flag. The flag is folded into the document under the
/// `in-sync` key so it rides the normal completion path.
fn parse_registration_response(body: Bytes) -> MgmtResult<OperationOutcome> {
    let mut reader = FieldReader::new(body);
    let node = reader.read_node(field_tag::RESPONSE)?;
    let in_sync = reader.read_bool(field_tag::IN_SYNC)?;
    reader.finish()?;
    Ok(OperationOutcome::Done(ResponsePayload {
        node: node.with(crate::protocol::model_node::KEY_IN_SYNC, in_sync),
        attachment_count: 0,
    }))
}

/// Terminal response body: the response document plus the count of attachment
/// streams the peer retains for on-demand fetch.
fn parse_operation_response(body: Bytes) -> MgmtResult<OperationOutcome> {
    let mut reader = FieldReader::new(body);
    let node = reader.read_node(field_tag::RESPONSE)?;
    let attachment_count = reader.read_u32(field_tag::INPUTSTREAM_COUNT)?;
    reader.finish()?;
    if node.is_cancelled() {
        return Ok(OperationOutcome::Cancelled);
    }
    Ok(OperationOutcome::Done(ResponsePayload {
        node,
        attachment_count,
    }))
}
