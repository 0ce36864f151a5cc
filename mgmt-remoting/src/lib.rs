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

//! Management-client request/response protocol engine.
//!
//! Multiplexes many concurrent logical operations over one physical channel,
//! correlates asynchronous responses, streams binary attachments on demand and
//! guarantees exactly one completion per operation under cancellation, failure
//! and success races.

pub mod base;
pub mod channel_association;
pub mod clients;
pub mod codec;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server_link;
