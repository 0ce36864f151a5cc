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

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use mgmt_error::MgmtResult;
use mgmt_error::NetworkError;
use tokio::net::TcpStream;

use crate::connection::TransportStream;

/// Produces a fresh transport for every connection attempt. Abstracted so
/// reconnection logic can be driven against an in-process transport in tests.
pub trait TransportConnector: Send + Sync + 'static {
    fn connect<'a>(
        &'a self,
        uri: &'a str,
    ) -> Pin<Box<dyn Future<Output = MgmtResult<TransportStream>> + Send + 'a>>;
}

/// Plain TCP connector with a per-attempt timeout.
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl TransportConnector for TcpConnector {
    fn connect<'a>(
        &'a self,
        uri: &'a str,
    ) -> Pin<Box<dyn Future<Output = MgmtResult<TransportStream>> + Send + 'a>> {
        Box::pin(async move {
            let timeout_ms = self.connect_timeout.as_millis() as u64;
            let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(uri))
                .await
                .map_err(|_| NetworkError::connection_timeout(uri, timeout_ms))?
                .map_err(|e| NetworkError::connection_failed(uri, e.to_string()))?;
            stream
                .set_nodelay(true)
                .map_err(|e| NetworkError::connection_failed(uri, e.to_string()))?;
            Ok(Box::new(stream) as TransportStream)
        })
    }
}
