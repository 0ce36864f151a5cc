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

//! Tag-checked field framing inside a message body.
//!
//! Every field is preceded by a one-byte tag; the reader asserts the tag it
//! expects and fails fast on mismatch, so protocol desync surfaces as an
//! immediate, localized error instead of silent corruption.

use bytes::Buf;
use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;
use mgmt_error::MgmtResult;
use mgmt_error::ProtocolError;

use crate::protocol::field_tag;
use crate::protocol::ModelNode;

/// Writes tagged fields into a message body.
#[derive(Debug, Default)]
pub struct FieldWriter {
    buf: BytesMut,
}

impl FieldWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, tag: u8, value: u8) -> &mut Self {
        self.buf.put_u8(tag);
        self.buf.put_u8(value);
        self
    }

    pub fn write_u32(&mut self, tag: u8, value: u32) -> &mut Self {
        self.buf.put_u8(tag);
        self.buf.put_u32(value);
        self
    }

    pub fn write_bool(&mut self, tag: u8, value: bool) -> &mut Self {
        self.write_u8(tag, value as u8)
    }

    /// Writes a length-prefixed byte field.
    pub fn write_bytes(&mut self, tag: u8, value: &[u8]) -> &mut Self {
        self.buf.put_u8(tag);
        self.buf.put_u32(value.len() as u32);
        self.buf.put_slice(value);
        self
    }

    pub fn write_str(&mut self, tag: u8, value: &str) -> &mut Self {
        self.write_bytes(tag, value.as_bytes())
    }

    pub fn write_node(&mut self, tag: u8, node: &ModelNode) -> MgmtResult<&mut Self> {
        let bytes = node.to_bytes()?;
        Ok(self.write_bytes(tag, &bytes))
    }

    /// Terminates the body with the explicit end marker.
    pub fn finish(mut self) -> Bytes {
        self.buf.put_u8(field_tag::END);
        self.buf.freeze()
    }
}

/// Reads tagged fields out of a message body.
#[derive(Debug)]
pub struct FieldReader {
    buf: Bytes,
}

impl FieldReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    fn need(&self, n: usize) -> MgmtResult<()> {
        if self.buf.remaining() < n {
            return Err(ProtocolError::truncated(n - self.buf.remaining(), self.buf.remaining()).into());
        }
        Ok(())
    }

    /// Reads the next tag byte without asserting a value; used by
    /// handler-resolution steps that branch on the tag.
    pub fn read_tag(&mut self) -> MgmtResult<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    /// Asserts that the next tag byte matches `expected`.
    pub fn expect_tag(&mut self, expected: u8) -> MgmtResult<()> {
        let actual = self.read_tag()?;
        if actual != expected {
            return Err(ProtocolError::unexpected_tag(expected, actual).into());
        }
        Ok(())
    }

    pub fn read_u8(&mut self, tag: u8) -> MgmtResult<u8> {
        self.expect_tag(tag)?;
        self.read_u8_value()
    }

    /// Reads a value byte after the tag has already been consumed.
    pub fn read_u8_value(&mut self) -> MgmtResult<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u32(&mut self, tag: u8) -> MgmtResult<u32> {
        self.expect_tag(tag)?;
        self.read_u32_value()
    }

    pub fn read_u32_value(&mut self) -> MgmtResult<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn read_bool(&mut self, tag: u8) -> MgmtResult<bool> {
        Ok(self.read_u8(tag)? != 0)
    }

    pub fn read_bytes(&mut self, tag: u8) -> MgmtResult<Bytes> {
        self.expect_tag(tag)?;
        self.read_bytes_value()
    }

    pub fn read_bytes_value(&mut self) -> MgmtResult<Bytes> {
        let len = self.read_u32_value()? as usize;
        self.need(len)?;
        Ok(self.buf.split_to(len))
    }

    pub fn read_str(&mut self, tag: u8) -> MgmtResult<String> {
        let bytes = self.read_bytes(tag)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| ProtocolError::malformed_node(e.to_string()).into())
    }

    pub fn read_node(&mut self, tag: u8) -> MgmtResult<ModelNode> {
        let bytes = self.read_bytes(tag)?;
        ModelNode::from_slice(&bytes)
    }

    /// Asserts the explicit end marker.
    pub fn finish(mut self) -> MgmtResult<()> {
        self.expect_tag(field_tag::END)
    }
}

#[cfg(test)]
mod tests {
    use mgmt_error::MgmtError;

    use super::*;

    #[test]
    fn tagged_fields_round_trip() {
        let node = ModelNode::operation("add");
        let mut writer = FieldWriter::new();
        writer.write_node(field_tag::OPERATION, &node).unwrap();
        writer.write_u32(field_tag::INPUTSTREAM_COUNT, 2);
        let body = writer.finish();

        let mut reader = FieldReader::new(body);
        assert_eq!(reader.read_node(field_tag::OPERATION).unwrap(), node);
        assert_eq!(reader.read_u32(field_tag::INPUTSTREAM_COUNT).unwrap(), 2);
        reader.finish().unwrap();
    }

    #[test]
    fn tag_mismatch_fails_immediately() {
        let mut writer = FieldWriter::new();
        writer.write_u32(field_tag::INPUTSTREAM_INDEX, 0);
        let body = writer.finish();

        let mut reader = FieldReader::new(body);
        let err = reader.read_u32(field_tag::INPUTSTREAM_LENGTH).unwrap_err();
        assert!(matches!(
            err,
            MgmtError::Protocol(ProtocolError::UnexpectedTag {
                expected: field_tag::INPUTSTREAM_LENGTH,
                actual: field_tag::INPUTSTREAM_INDEX,
            })
        ));
    }

    #[test]
    fn mismatch_at_every_position_errors() {
        // A response body read with request expectations must error at the
        // first field, the second field and the end marker alike.
        let mut writer = FieldWriter::new();
        writer.write_node(field_tag::RESPONSE, &ModelNode::success("ok")).unwrap();
        writer.write_u32(field_tag::INPUTSTREAM_COUNT, 0);
        let body = writer.finish();

        let mut reader = FieldReader::new(body.clone());
        assert!(reader.read_node(field_tag::OPERATION).is_err());

        let mut reader = FieldReader::new(body.clone());
        reader.read_node(field_tag::RESPONSE).unwrap();
        assert!(reader.read_u32(field_tag::INPUTSTREAM_INDEX).is_err());

        let mut reader = FieldReader::new(body);
        reader.read_node(field_tag::RESPONSE).unwrap();
        reader.read_u32(field_tag::INPUTSTREAM_COUNT).unwrap();
        assert!(reader.expect_tag(field_tag::RESPONSE).is_err());
    }

    #[test]
    fn truncated_field_is_an_error_not_a_hang() {
        let mut writer = FieldWriter::new();
        writer.write_bytes(field_tag::INPUTSTREAM_CONTENTS, b"abcdef");
        let body = writer.finish();
        // Chop the contents mid-field.
        let truncated = body.slice(0..7);

        let mut reader = FieldReader::new(truncated);
        let err = reader.read_bytes(field_tag::INPUTSTREAM_CONTENTS).unwrap_err();
        assert!(matches!(
            err,
            MgmtError::Protocol(ProtocolError::Truncated { .. })
        ));
    }
}
