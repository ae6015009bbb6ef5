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

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use fleetgate_network::{Config, Gateway, Publisher};

use crate::publishers::MemoryPublisher;

/// The configurable parameters of a test gateway; anything not listed here
/// keeps its production default.
#[derive(Clone, Debug)]
pub struct TestSetup {
    pub max_connections: u16,
    pub read_buffer_size: usize,
    pub max_pending_bytes: usize,
    pub idle_timeout_secs: u64,
    pub dedup_entries_per_device: usize,
    pub disconnect_on_publish_error: bool,
}

impl Default for TestSetup {
    fn default() -> Self {
        let config = Config::default();
        Self {
            max_connections: config.max_connections,
            read_buffer_size: config.read_buffer_size,
            max_pending_bytes: config.max_pending_bytes,
            idle_timeout_secs: config.idle_timeout_secs,
            dedup_entries_per_device: config.dedup_entries_per_device,
            disconnect_on_publish_error: config.disconnect_on_publish_error,
        }
    }
}

impl From<TestSetup> for Config {
    fn from(setup: TestSetup) -> Self {
        Self {
            // An ephemeral localhost port, so tests never collide.
            listen_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            max_connections: setup.max_connections,
            read_buffer_size: setup.read_buffer_size,
            max_pending_bytes: setup.max_pending_bytes,
            idle_timeout_secs: setup.idle_timeout_secs,
            dedup_entries_per_device: setup.dedup_entries_per_device,
            disconnect_on_publish_error: setup.disconnect_on_publish_error,
            ..Default::default()
        }
    }
}

/// Starts a gateway with the given setup, wired to the given publisher.
pub async fn test_gateway_with_publisher(setup: TestSetup, publisher: Arc<dyn Publisher>) -> (Gateway, SocketAddr) {
    let gateway = Gateway::new(setup.into(), publisher).unwrap();
    let address = gateway.start().await.unwrap();
    (gateway, address)
}

/// Starts a gateway recording its publishes into a fresh [`MemoryPublisher`].
pub async fn test_gateway(setup: TestSetup) -> (Gateway, SocketAddr, Arc<MemoryPublisher>) {
    let publisher = Arc::new(MemoryPublisher::default());
    let (gateway, address) = test_gateway_with_publisher(setup, publisher.clone()).await;
    (gateway, address, publisher)
}
