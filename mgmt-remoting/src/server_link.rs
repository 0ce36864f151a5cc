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

//! Long-lived link from a managed server to its host controller:
//! registration with boot operations, liveness pings and automatic
//! reconnection with sync detection.

use std::time::Duration;

pub mod connector;
pub mod host_controller;

pub use connector::TcpConnector;
pub use connector::TransportConnector;
pub use host_controller::HostControllerConnection;
pub use host_controller::ReconnectRequest;

pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Retry behavior after the link to the host controller drops.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Fixed delay between attempts.
    pub interval: Duration,
    /// Attempt limit; `None` retries until closed.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RECONNECT_INTERVAL,
            max_attempts: None,
        }
    }
}

/// Lifecycle of the host controller link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    /// Transport up, registration exchange acknowledged.
    Registered,
    Connected,
    Reconnecting,
    Closed,
}
