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

//! Inbound requests the executing side sends back while an operation runs:
//! progress reports and fetches of the attachment streams we registered.

use mgmt_error::MgmtResult;
use tracing::debug;
use tracing::warn;

use crate::channel_association::InboundContext;
use crate::channel_association::InboundRequestHandler;
use crate::codec::FieldReader;
use crate::codec::FieldWriter;
use crate::protocol::field_tag;
use crate::protocol::operation_code;
use crate::protocol::ManagementMessage;
use crate::protocol::MessageSeverity;

/// Routes a progress report to the message handler of the operation it
/// belongs to. Reports for operations that already completed are dropped.
pub struct HandleReportHandler;

impl InboundRequestHandler for HandleReportHandler {
    fn on_request(&self, ctx: InboundContext, mut request: ManagementMessage) {
        let operation_id = request.operation_id();
        let parsed = parse_report(request.take_body());
        // the user's handler may block, keep it off the reader task
        tokio::spawn(async move {
            match parsed {
                Ok((severity, message)) => match ctx.registry.attachment(operation_id) {
                    Some(attachment) => {
                        attachment.message_handler().handle_report(severity, &message);
                    }
                    None => debug!(operation_id, "dropping report for inactive operation"),
                },
                Err(err) => warn!(operation_id, %err, "malformed progress report"),
            }
        });
    }
}

fn parse_report(body: bytes::Bytes) -> MgmtResult<(MessageSeverity, String)> {
    let mut reader = FieldReader::new(body);
    let severity = MessageSeverity::from_byte(reader.read_u8(field_tag::MESSAGE_SEVERITY)?)?;
    let message = reader.read_str(field_tag::MESSAGE)?;
    reader.finish()?;
    Ok((severity, message))
}

/// Serves the executing side's fetch of one of our input-stream entries.
/// The transfer runs off the reader task; the reply carries either the
/// contents or a failure message, always echoing the requested index so the
/// peer can correlate.
pub struct GetInputStreamHandler;

impl InboundRequestHandler for GetInputStreamHandler {
    fn on_request(&self, ctx: InboundContext, mut request: ManagementMessage) {
        let operation_id = request.operation_id();
        let mut reader = FieldReader::new(request.take_body());
        let index = match reader.read_u32(field_tag::INPUTSTREAM_INDEX) {
            Ok(index) => index,
            Err(err) => {
                warn!(operation_id, %err, "malformed attachment fetch request");
                return;
            }
        };
        tokio::spawn(async move {
            let reply = match fetch_entry(&ctx, operation_id, index).await {
                Ok((size, contents)) => {
                    let mut writer = FieldWriter::new();
                    writer.write_u32(field_tag::INPUTSTREAM_INDEX, index);
                    writer.write_u32(field_tag::INPUTSTREAM_LENGTH, size as u32);
                    writer.write_bytes(field_tag::INPUTSTREAM_CONTENTS, &contents);
                    writer.finish()
                }
                Err(err) => {
                    let mut writer = FieldWriter::new();
                    writer.write_u32(field_tag::INPUTSTREAM_INDEX, index);
                    writer.write_str(field_tag::MESSAGE, &err.to_string());
                    writer.finish()
                }
            };
            let message = ManagementMessage::response(operation_id, operation_code::GET_INPUTSTREAM)
                .set_body(reply);
            let _ = ctx.outbound.send(message).await;
        });
    }
}

async fn fetch_entry(
    ctx: &InboundContext,
    operation_id: i32,
    index: u32,
) -> MgmtResult<(u64, bytes::Bytes)> {
    let attachment = ctx
        .registry
        .attachment(operation_id)
        .ok_or(mgmt_error::ClientError::NoActiveOperation { operation_id })?;
    let entry = attachment
        .entry(index)
        .ok_or(mgmt_error::ClientError::NoSuchAttachment {
            index,
            count: attachment.entry_count(),
        })?;
    entry.transfer().await
}
