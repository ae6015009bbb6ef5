// Copyright (C) 2023-2025 Fleetgate Systems Inc.
// This file is part of the fleetgate library.

// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
// http://www.apache.org/licenses/LICENSE-2.0

// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{net::SocketAddr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{errors::NetworkError, protocol::HEADER_SIZE};

/// The acknowledgement policy requested from the broker.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcksPolicy {
    None,
    Leader,
    All,
}

/// The compression codec requested from the broker.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Gzip,
    Lz4,
    Zstd,
}

/// Options passed through to the publisher; the gateway itself only enforces
/// the per-call timeout.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// The deadline applied to each publish call, in seconds.
    pub timeout_secs: u64,
    /// The acknowledgement policy requested from the broker.
    pub acks: AcksPolicy,
    /// Whether the broker-side idempotent producer is requested.
    pub idempotence: bool,
    /// The compression codec requested from the broker.
    pub compression: Compression,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self { timeout_secs: 30, acks: AcksPolicy::All, idempotence: true, compression: Compression::None }
    }
}

impl PublisherConfig {
    /// The deadline applied to each publish call.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A core data structure containing the pre-configured parameters of a
/// gateway. Loaded once at startup and immutable for the run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The address the acceptor binds.
    pub listen_address: SocketAddr,
    /// The admission cap on concurrently served connections.
    pub max_connections: u16,
    /// The size of each socket read, in bytes.
    pub read_buffer_size: usize,
    /// The cap on per-connection pending (unframed) bytes before a forced close.
    pub max_pending_bytes: usize,
    /// The per-connection read idle deadline, in seconds.
    pub idle_timeout_secs: u64,
    /// The number of recent counters remembered per device.
    pub dedup_entries_per_device: usize,
    /// The destination topic for device messages.
    pub message_topic: String,
    /// The destination topic for device events.
    pub event_topic: String,
    /// Whether a failed publish closes the offending connection instead of
    /// dropping the single message.
    pub disconnect_on_publish_error: bool,
    /// Options passed through to the publisher.
    pub publisher: PublisherConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([0, 0, 0, 0], 5571)),
            max_connections: 100,
            read_buffer_size: 4096,
            max_pending_bytes: 1024 * 1024,
            idle_timeout_secs: 30,
            dedup_entries_per_device: 1000,
            message_topic: "device-messages".into(),
            event_topic: "device-events".into(),
            disconnect_on_publish_error: false,
            publisher: PublisherConfig::default(),
        }
    }
}

impl Config {
    /// The per-connection read idle deadline.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Checks the configuration for values the gateway cannot operate with.
    pub fn validate(&self) -> Result<(), NetworkError> {
        if self.max_connections == 0 {
            return Err(NetworkError::InvalidConfig("max_connections must be at least 1"));
        }
        if self.read_buffer_size == 0 {
            return Err(NetworkError::InvalidConfig("read_buffer_size must be at least 1"));
        }
        if self.max_pending_bytes < HEADER_SIZE {
            return Err(NetworkError::InvalidConfig("max_pending_bytes cannot hold a frame header"));
        }
        if self.idle_timeout_secs == 0 {
            return Err(NetworkError::InvalidConfig("idle_timeout_secs must be at least 1"));
        }
        if self.dedup_entries_per_device == 0 {
            return Err(NetworkError::InvalidConfig("dedup_entries_per_device must be at least 1"));
        }
        if self.message_topic.is_empty() || self.event_topic.is_empty() {
            return Err(NetworkError::InvalidConfig("topic names cannot be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_connections, 100);
        assert_eq!(config.read_buffer_size, 4096);
        assert_eq!(config.max_pending_bytes, 1024 * 1024);
        assert_eq!(config.idle_timeout(), Duration::from_secs(30));
        assert_eq!(config.dedup_entries_per_device, 1000);
        assert_eq!(config.publisher.timeout(), Duration::from_secs(30));
        assert!(config.publisher.idempotence);
        assert_eq!(config.publisher.acks, AcksPolicy::All);
        assert!(!config.disconnect_on_publish_error);
    }

    #[test]
    fn inoperable_values_are_rejected() {
        let config = Config { max_connections: 0, ..Default::default() };
        assert!(config.validate().is_err());

        let config = Config { max_pending_bytes: HEADER_SIZE - 1, ..Default::default() };
        assert!(config.validate().is_err());

        let config = Config { event_topic: String::new(), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "max_connections": 5, "publisher": { "acks": "leader" } }"#).unwrap();
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.publisher.acks, AcksPolicy::Leader);
        assert_eq!(config.message_topic, "device-messages");
    }
}
