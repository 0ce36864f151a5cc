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

use bytes::Buf;
use bytes::BufMut;
use bytes::BytesMut;
use mgmt_error::MgmtError;
use mgmt_error::ProtocolError;
use tokio_util::codec::Decoder;
use tokio_util::codec::Encoder;

use crate::protocol::management_message::PROTOCOL_VERSION;
use crate::protocol::ManagementMessage;
use crate::protocol::MessageType;

/// version(1) + type(1) + operation id(4) + operation code(1)
const HEADER_LENGTH: usize = 7;

/// Upper bound on a single frame. Attachment contents travel in their own
/// frames, so anything beyond this indicates a corrupt length prefix.
const MAX_FRAME_LENGTH: usize = 64 * 1024 * 1024;

/// Frames `ManagementMessage`s with a 4-byte big-endian length prefix.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManagementCodec(());

impl ManagementCodec {
    pub fn new() -> Self {
        ManagementCodec(())
    }
}

impl Decoder for ManagementCodec {
    type Error = MgmtError;
    type Item = ManagementMessage;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, MgmtError> {
        if src.len() < 4 {
            return Ok(None);
        }
        let total = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if total < HEADER_LENGTH {
            return Err(ProtocolError::FrameTooShort { length: total }.into());
        }
        if total > MAX_FRAME_LENGTH {
            return Err(ProtocolError::FrameTooLarge {
                length: total,
                max: MAX_FRAME_LENGTH,
            }
            .into());
        }
        if src.len() < 4 + total {
            src.reserve(4 + total - src.len());
            return Ok(None);
        }
        src.advance(4);
        let mut frame = src.split_to(total);

        let version = frame.get_u8();
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                actual: version,
                supported: PROTOCOL_VERSION,
            }
            .into());
        }
        let message_type = MessageType::from_byte(frame.get_u8())?;
        let operation_id = frame.get_i32();
        let operation_code = frame.get_u8();
        let body = frame.freeze();

        Ok(Some(ManagementMessage::from_parts(
            version,
            message_type,
            operation_id,
            operation_code,
            body,
        )))
    }
}

impl Encoder<ManagementMessage> for ManagementCodec {
    type Error = MgmtError;

    fn encode(&mut self, item: ManagementMessage, dst: &mut BytesMut) -> Result<(), MgmtError> {
        let mut item = item;
        let body = item.take_body();
        let total = HEADER_LENGTH + body.len();
        dst.reserve(4 + total);
        dst.put_u32(total as u32);
        dst.put_u8(item.version());
        dst.put_u8(item.message_type().as_byte());
        dst.put_i32(item.operation_id());
        dst.put_u8(item.operation_code());
        dst.put(body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::protocol::operation_code;

    #[test]
    fn decode_handles_insufficient_data() {
        let mut codec = ManagementCodec::new();
        let mut src = BytesMut::from(&[0, 0, 0, 9][..]);
        assert!(matches!(codec.decode(&mut src), Ok(None)));
    }

    #[test]
    fn decode_rejects_short_frame() {
        let mut codec = ManagementCodec::new();
        // total = 2, less than the fixed header
        let mut src = BytesMut::from(&[0, 0, 0, 2, 1, 0][..]);
        assert!(codec.decode(&mut src).is_err());
    }

    #[test]
    fn decode_rejects_unknown_version() {
        let mut codec = ManagementCodec::new();
        let message =
            ManagementMessage::request(1, operation_code::EXECUTE).set_body(Bytes::from_static(b"x"));
        let mut buf = BytesMut::new();
        codec.encode(message, &mut buf).unwrap();
        buf[4] = 0x7f; // stomp the version byte
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            MgmtError::Protocol(ProtocolError::VersionMismatch { actual: 0x7f, .. })
        ));
    }

    #[test]
    fn encode_decode_preserves_header_and_body() {
        let mut codec = ManagementCodec::new();
        let message = ManagementMessage::request(77, operation_code::HANDLE_REPORT)
            .set_body(Bytes::from_static(b"payload"));
        let mut buf = BytesMut::new();
        codec.encode(message, &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.operation_id(), 77);
        assert_eq!(decoded.operation_code(), operation_code::HANDLE_REPORT);
        assert!(decoded.is_request());
        assert_eq!(decoded.body().as_ref(), b"payload");
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_two_back_to_back_frames() {
        let mut codec = ManagementCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode(ManagementMessage::request(1, operation_code::EXECUTE), &mut buf)
            .unwrap();
        codec
            .encode(ManagementMessage::request(2, operation_code::PING), &mut buf)
            .unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().operation_id(), 1);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().operation_id(), 2);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }
}
