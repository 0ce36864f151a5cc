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

use std::collections::HashMap;
use std::time::Duration;

use cheetah_string::CheetahString;
use serde::Deserialize;
use serde::Serialize;

pub const DEFAULT_MANAGEMENT_PORT: u16 = 9990;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Connection settings for a remote management endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManagementClientConfig {
    pub host: CheetahString,
    pub port: u16,
    /// Explicit protocol name; when unset it is derived from the port.
    pub protocol: Option<CheetahString>,
    #[serde(with = "duration_millis")]
    pub connect_timeout: Duration,
    /// Local address to bind the outbound socket to, if any.
    pub client_bind_address: Option<CheetahString>,
    /// Options forwarded to the authentication layer.
    pub sasl_options: HashMap<CheetahString, CheetahString>,
}

impl Default for ManagementClientConfig {
    fn default() -> Self {
        Self {
            host: CheetahString::from_static_str("localhost"),
            port: DEFAULT_MANAGEMENT_PORT,
            protocol: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            client_bind_address: None,
            sasl_options: HashMap::new(),
        }
    }
}

impl ManagementClientConfig {
    pub fn new(host: impl Into<CheetahString>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The effective protocol: the explicit setting when present, otherwise
    /// derived from the port by convention.
    pub fn protocol(&self) -> CheetahString {
        if let Some(protocol) = &self.protocol {
            return protocol.clone();
        }
        match self.port {
            9990 => CheetahString::from_static_str("remote+http"),
            9993 => CheetahString::from_static_str("remote+https"),
            _ => CheetahString::from_static_str("remote"),
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_follows_port_convention() {
        assert_eq!(ManagementClientConfig::new("a", 9990).protocol(), "remote+http");
        assert_eq!(ManagementClientConfig::new("a", 9993).protocol(), "remote+https");
        assert_eq!(ManagementClientConfig::new("a", 12345).protocol(), "remote");
    }

    #[test]
    fn explicit_protocol_wins() {
        let mut config = ManagementClientConfig::new("a", 9990);
        config.protocol = Some(CheetahString::from_static_str("remote"));
        assert_eq!(config.protocol(), "remote");
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = ManagementClientConfig::new("controller.example", 9993);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ManagementClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.address(), "controller.example:9993");
        assert_eq!(parsed.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }
}
