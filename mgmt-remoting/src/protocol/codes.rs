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

//! Wire protocol byte constants. Compatibility requires preserving the exact
//! byte values and frame ordering; changing any of these is a protocol break.

/// Operation-type codes carried in the message header. Side-channel requests
/// (cancel, ping, get-inputstream) are dispatched on these before the main
/// operation handler chain.
pub mod operation_code {
    // server <-> host-controller link
    pub const REGISTER: u8 = 0x01;
    pub const SERVER_STARTED: u8 = 0x02;
    pub const RECONNECT: u8 = 0x03;
    pub const INSTABILITY_NOTIFICATION: u8 = 0x04;

    // liveness probe
    pub const PING: u8 = 0x10;
    pub const PONG: u8 = 0x11;

    // generic management-client link
    pub const EXECUTE_ASYNC: u8 = 0x45;
    pub const EXECUTE: u8 = 0x46;
    pub const EXECUTE_TX: u8 = 0x47;
    pub const HANDLE_REPORT: u8 = 0x48;
    pub const GET_INPUTSTREAM: u8 = 0x49;
    pub const CANCEL_ASYNC: u8 = 0x4A;
    pub const COMPLETE_TX: u8 = 0x4B;
}

/// Field tags. Every framed field is preceded by its tag byte and the reader
/// asserts the tag it expects, so desync fails immediately and locally.
pub mod field_tag {
    pub const OPERATION: u8 = 0x60;
    pub const MESSAGE_SEVERITY: u8 = 0x61;
    pub const MESSAGE: u8 = 0x62;
    pub const RESPONSE: u8 = 0x63;
    pub const INPUTSTREAM_COUNT: u8 = 0x64;
    pub const INPUTSTREAM_INDEX: u8 = 0x65;
    pub const INPUTSTREAM_LENGTH: u8 = 0x66;
    pub const INPUTSTREAM_CONTENTS: u8 = 0x67;
    /// Explicit end-of-request / end-of-response marker.
    pub const END: u8 = 0x68;
    pub const IN_SYNC: u8 = 0x69;
}
