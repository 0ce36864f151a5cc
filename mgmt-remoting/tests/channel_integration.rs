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

//! End-to-end exercises of the management channel against a scripted peer
//! on the other end of an in-process duplex transport.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use mgmt_remoting::clients::RemoteManagementClient;
use mgmt_remoting::codec::FieldReader;
use mgmt_remoting::codec::FieldWriter;
use mgmt_remoting::connection::Connection;
use mgmt_remoting::protocol::field_tag;
use mgmt_remoting::protocol::operation_code;
use mgmt_remoting::protocol::Attachment;
use mgmt_remoting::protocol::ManagementMessage;
use mgmt_remoting::protocol::MessageSeverity;
use mgmt_remoting::protocol::ModelNode;
use mgmt_remoting::protocol::Operation;
use parking_lot::Mutex;
use tokio::sync::Notify;

fn pair() -> (RemoteManagementClient, Connection) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (client_side, peer_side) = tokio::io::duplex(64 * 1024);
    (
        RemoteManagementClient::from_transport(client_side),
        Connection::from_transport(peer_side),
    )
}

fn response_body(node: &ModelNode, attachment_count: u32) -> Bytes {
    let mut writer = FieldWriter::new();
    writer.write_node(field_tag::RESPONSE, node).unwrap();
    writer.write_u32(field_tag::INPUTSTREAM_COUNT, attachment_count);
    writer.finish()
}

fn report_body(severity: MessageSeverity, message: &str) -> Bytes {
    let mut writer = FieldWriter::new();
    writer.write_u8(field_tag::MESSAGE_SEVERITY, severity.as_byte());
    writer.write_str(field_tag::MESSAGE, message);
    writer.finish()
}

/// Reads the request body of an execute-style message and returns its
/// operation document and declared attachment count.
fn parse_execute(body: Bytes) -> (ModelNode, u32) {
    let mut reader = FieldReader::new(body);
    let node = reader.read_node(field_tag::OPERATION).unwrap();
    let count = reader.read_u32(field_tag::INPUTSTREAM_COUNT).unwrap();
    reader.finish().unwrap();
    (node, count)
}

#[tokio::test]
async fn execute_round_trip() {
    let (client, mut peer) = pair();

    let peer_task = tokio::spawn(async move {
        let mut request = peer.receive_message().await.unwrap().unwrap();
        assert_eq!(request.operation_code(), operation_code::EXECUTE);
        let (node, count) = parse_execute(request.take_body());
        assert_eq!(node.get("operation").unwrap(), "read-resource");
        assert_eq!(count, 0);

        let reply = ManagementMessage::response_to(&request)
            .set_body(response_body(&ModelNode::success("running"), 0));
        peer.send_message(reply).await.unwrap();
    });

    let result = client
        .execute(ModelNode::operation("read-resource"))
        .await
        .unwrap();
    assert!(result.is_success());
    assert_eq!(result.result().unwrap(), "running");
    peer_task.await.unwrap();

    client.close(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn remote_failure_is_data_not_transport_error() {
    let (client, mut peer) = pair();

    tokio::spawn(async move {
        let request = peer.receive_message().await.unwrap().unwrap();
        let reply = ManagementMessage::response_to(&request)
            .set_body(response_body(&ModelNode::failed("no such resource"), 0));
        peer.send_message(reply).await.unwrap();
    });

    let result = client
        .execute(ModelNode::operation("read-resource"))
        .await
        .unwrap();
    assert!(result.is_failed());
    assert_eq!(result.failure_description(), Some("no such resource"));

    client.close(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn progress_reports_reach_the_message_handler() {
    let (client, mut peer) = pair();
    let reports: Arc<Mutex<Vec<(MessageSeverity, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::new(Notify::new());

    let reports_clone = reports.clone();
    let seen_clone = seen.clone();
    let handler = Box::new(move |severity: MessageSeverity, message: &str| {
        reports_clone.lock().push((severity, message.to_string()));
        seen_clone.notify_one();
    });

    let peer_task = tokio::spawn(async move {
        let request = peer.receive_message().await.unwrap().unwrap();
        let report = ManagementMessage::oneway(request.operation_id(), operation_code::HANDLE_REPORT)
            .set_body(report_body(MessageSeverity::Warn, "halfway there"));
        peer.send_message(report).await.unwrap();
        // hold the final response until the report was observed
        seen.notified().await;
        let reply = ManagementMessage::response_to(&request)
            .set_body(response_body(&ModelNode::success("done"), 0));
        peer.send_message(reply).await.unwrap();
    });

    let result = client
        .execute_with_messages(ModelNode::operation("deploy"), handler)
        .await
        .unwrap();
    assert!(result.is_success());
    peer_task.await.unwrap();

    let reports = reports.lock();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0], (MessageSeverity::Warn, "halfway there".to_string()));

    client.close(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn peer_fetches_request_attachments_on_demand() {
    let (client, mut peer) = pair();

    let peer_task = tokio::spawn(async move {
        let mut request = peer.receive_message().await.unwrap().unwrap();
        assert_eq!(request.operation_code(), operation_code::EXECUTE_TX);
        let (_, count) = parse_execute(request.take_body());
        assert_eq!(count, 1);

        // pull stream 0 while the operation is still active
        let mut fetch_writer = FieldWriter::new();
        fetch_writer.write_u32(field_tag::INPUTSTREAM_INDEX, 0);
        let fetch = ManagementMessage::request(request.operation_id(), operation_code::GET_INPUTSTREAM)
            .set_body(fetch_writer.finish());
        peer.send_message(fetch).await.unwrap();

        let mut fetched = peer.receive_message().await.unwrap().unwrap();
        assert!(fetched.is_response());
        assert_eq!(fetched.operation_code(), operation_code::GET_INPUTSTREAM);
        let mut reader = FieldReader::new(fetched.take_body());
        assert_eq!(reader.read_u32(field_tag::INPUTSTREAM_INDEX).unwrap(), 0);
        assert_eq!(reader.read_u32(field_tag::INPUTSTREAM_LENGTH).unwrap(), 11);
        let contents = reader.read_bytes(field_tag::INPUTSTREAM_CONTENTS).unwrap();
        assert_eq!(contents.as_ref(), b"war-content");

        let reply = ManagementMessage::response_to(&request)
            .set_body(response_body(&ModelNode::success("deployed"), 0));
        peer.send_message(reply).await.unwrap();
    });

    let operation = Operation::new(ModelNode::operation("deploy"))
        .add_attachment(Attachment::Bytes(Bytes::from_static(b"war-content")));
    let response = client.execute_operation(operation).await.unwrap();
    assert!(response.node().is_success());
    response.close().await.unwrap();
    peer_task.await.unwrap();

    client.close(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn response_attachments_are_proxied_until_closed() {
    let (client, mut peer) = pair();

    let peer_task = tokio::spawn(async move {
        let request = peer.receive_message().await.unwrap().unwrap();
        let reply = ManagementMessage::response_to(&request)
            .set_body(response_body(&ModelNode::success("content follows"), 2));
        peer.send_message(reply).await.unwrap();

        // serve the client's fetch of stream 1
        let mut fetch = peer.receive_message().await.unwrap().unwrap();
        assert_eq!(fetch.operation_code(), operation_code::GET_INPUTSTREAM);
        let mut reader = FieldReader::new(fetch.take_body());
        assert_eq!(reader.read_u32(field_tag::INPUTSTREAM_INDEX).unwrap(), 1);

        let mut writer = FieldWriter::new();
        writer.write_u32(field_tag::INPUTSTREAM_INDEX, 1);
        writer.write_u32(field_tag::INPUTSTREAM_LENGTH, 5);
        writer.write_bytes(field_tag::INPUTSTREAM_CONTENTS, b"bytes");
        let served =
            ManagementMessage::response(fetch.operation_id(), operation_code::GET_INPUTSTREAM)
                .set_body(writer.finish());
        peer.send_message(served).await.unwrap();

        // closing the response releases the peer-held streams
        let complete = peer.receive_message().await.unwrap().unwrap();
        assert_eq!(complete.operation_code(), operation_code::COMPLETE_TX);
        assert_eq!(complete.operation_id(), fetch.operation_id());
    });

    let response = client
        .execute_operation(Operation::new(ModelNode::operation("read-content")))
        .await
        .unwrap();
    assert_eq!(response.attachment_count(), 2);

    let contents = response.read_attachment(1).await.unwrap();
    assert_eq!(contents.as_ref(), b"bytes");

    let err = response.read_attachment(2).await.unwrap_err();
    assert!(err.to_string().contains("2"));

    response.close().await.unwrap();
    peer_task.await.unwrap();

    client.close(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn cancel_completes_only_on_peer_acknowledgment() {
    let (client, mut peer) = pair();

    let peer_task = tokio::spawn(async move {
        let request = peer.receive_message().await.unwrap().unwrap();
        assert_eq!(request.operation_code(), operation_code::EXECUTE_ASYNC);

        let cancel = peer.receive_message().await.unwrap().unwrap();
        assert_eq!(cancel.operation_code(), operation_code::CANCEL_ASYNC);
        assert_eq!(cancel.operation_id(), request.operation_id());

        let ack =
            ManagementMessage::response(cancel.operation_id(), operation_code::CANCEL_ASYNC);
        peer.send_message(ack).await.unwrap();
    });

    let handle = client
        .execute_async(
            Operation::new(ModelNode::operation("long-running")),
            Box::new(mgmt_remoting::base::DiscardMessageHandler),
        )
        .await
        .unwrap();

    handle.cancel().await.unwrap();
    assert!(handle.is_cancel_requested());
    match handle.await_outcome().await.unwrap() {
        mgmt_remoting::base::OperationOutcome::Cancelled => {}
        other => panic!("unexpected outcome: {other:?}"),
    }
    peer_task.await.unwrap();

    client.close(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn ping_round_trips() {
    let (client, mut peer) = pair();

    tokio::spawn(async move {
        let ping = peer.receive_message().await.unwrap().unwrap();
        assert_eq!(ping.operation_code(), operation_code::PING);
        let pong = ManagementMessage::response(ping.operation_id(), operation_code::PONG);
        peer.send_message(pong).await.unwrap();
    });

    client
        .association()
        .ping(Duration::from_secs(1))
        .await
        .unwrap();

    client.close(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn peer_close_fails_outstanding_operations() {
    let (client, mut peer) = pair();

    tokio::spawn(async move {
        // swallow the request and hang up
        let _ = peer.receive_message().await;
        drop(peer);
    });

    let err = client
        .execute(ModelNode::operation("read-resource"))
        .await
        .unwrap_err();
    assert!(err.is_transport());
    assert!(client.is_closed());
}
