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
use futures_util::stream::SplitSink;
use futures_util::stream::SplitStream;
use futures_util::SinkExt;
use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::codec::ManagementCodec;
use crate::protocol::ManagementMessage;

pub type ConnectionId = CheetahString;

/// Byte transport a management channel can run over. Blanket-implemented, so
/// a `TcpStream`, a TLS stream or an in-process duplex pipe all qualify.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Type-erased transport, fixed at connection setup.
pub type TransportStream = Box<dyn Transport>;

/// Bidirectional framed connection carrying `ManagementMessage` frames.
///
/// Receives must be sequential (single reader); the split halves exist so the
/// channel association can run its reader and writer as separate tasks.
pub struct Connection {
    framed: Framed<TransportStream, ManagementCodec>,
    connection_id: ConnectionId,
}

/// Receiving half of a split connection.
pub struct ConnectionReadHalf {
    inbound_stream: SplitStream<Framed<TransportStream, ManagementCodec>>,
}

/// Sending half of a split connection.
pub struct ConnectionWriteHalf {
    outbound_sink: SplitSink<Framed<TransportStream, ManagementCodec>, ManagementMessage>,
}

impl Connection {
    pub fn new(transport: TransportStream) -> Connection {
        const CAPACITY: usize = 1024 * 1024; // 1 MB
        Self {
            framed: Framed::with_capacity(transport, ManagementCodec::new(), CAPACITY),
            connection_id: CheetahString::from_string(Uuid::new_v4().to_string()),
        }
    }

    /// Wraps any concrete transport without boxing at the call site.
    pub fn from_transport<T: Transport>(transport: T) -> Connection {
        Self::new(Box::new(transport))
    }

    #[inline]
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Receives the next message from the peer.
    ///
    /// - `Some(Ok(message))`: a complete frame was decoded
    /// - `Some(Err(e))`: the frame was malformed
    /// - `None`: the peer closed the stream
    pub async fn receive_message(&mut self) -> Option<mgmt_error::MgmtResult<ManagementMessage>> {
        self.framed.next().await
    }

    pub async fn send_message(&mut self, message: ManagementMessage) -> mgmt_error::MgmtResult<()> {
        self.framed.send(message).await
    }

    /// Splits into independently owned read and write halves.
    pub fn into_split(self) -> (ConnectionReadHalf, ConnectionWriteHalf) {
        let (outbound_sink, inbound_stream) = self.framed.split();
        (
            ConnectionReadHalf { inbound_stream },
            ConnectionWriteHalf { outbound_sink },
        )
    }
}

impl ConnectionReadHalf {
    pub async fn receive_message(&mut self) -> Option<mgmt_error::MgmtResult<ManagementMessage>> {
        self.inbound_stream.next().await
    }
}

impl ConnectionWriteHalf {
    pub async fn send_message(&mut self, message: ManagementMessage) -> mgmt_error::MgmtResult<()> {
        self.outbound_sink.send(message).await
    }

    /// Flushes buffered frames and sends the transport-level close.
    pub async fn shutdown(&mut self) -> mgmt_error::MgmtResult<()> {
        self.outbound_sink.close().await
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::protocol::operation_code;

    #[tokio::test]
    async fn messages_survive_a_duplex_round_trip() {
        let (client, server) = tokio::io::duplex(4096);
        let mut client = Connection::from_transport(client);
        let mut server = Connection::from_transport(server);

        let request = ManagementMessage::request(7, operation_code::EXECUTE)
            .set_body(Bytes::from_static(b"payload"));
        client.send_message(request).await.unwrap();

        let received = server.receive_message().await.unwrap().unwrap();
        assert_eq!(received.operation_id(), 7);
        assert_eq!(received.operation_code(), operation_code::EXECUTE);
        assert_eq!(received.body().as_ref(), b"payload");
    }

    #[tokio::test]
    async fn split_halves_cross_talk() {
        let (client, server) = tokio::io::duplex(4096);
        let (mut client_read, mut client_write) =
            Connection::from_transport(client).into_split();
        let (mut server_read, mut server_write) =
            Connection::from_transport(server).into_split();

        client_write
            .send_message(ManagementMessage::request(1, operation_code::PING))
            .await
            .unwrap();
        let ping = server_read.receive_message().await.unwrap().unwrap();
        assert_eq!(ping.operation_code(), operation_code::PING);

        server_write
            .send_message(ManagementMessage::response_to(&ping))
            .await
            .unwrap();
        let pong = client_read.receive_message().await.unwrap().unwrap();
        assert!(pong.is_response());
        assert_eq!(pong.operation_id(), 1);
    }

    #[tokio::test]
    async fn closed_peer_ends_the_stream() {
        let (client, server) = tokio::io::duplex(4096);
        let mut server = Connection::from_transport(server);
        drop(client);
        assert!(server.receive_message().await.is_none());
    }
}
