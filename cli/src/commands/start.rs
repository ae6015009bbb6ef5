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

use std::{fs, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::runtime::{self, Runtime};

use fleetgate_network::{Config, Gateway, LoggingPublisher};

use crate::helpers::initialize_logger;

/// Starts the fleetgate gateway.
#[derive(Clone, Debug, Parser)]
pub struct Start {
    /// Specify the IP address and port the acceptor binds.
    #[clap(long = "listen")]
    pub listen: Option<SocketAddr>,
    /// Specify the maximum number of concurrently served connections.
    #[clap(long = "max-connections")]
    pub max_connections: Option<u16>,
    /// Specify the size of each socket read, in bytes.
    #[clap(long = "read-buffer")]
    pub read_buffer: Option<usize>,
    /// Specify the cap on per-connection pending bytes before a forced close.
    #[clap(long = "max-pending")]
    pub max_pending: Option<usize>,
    /// Specify the per-connection idle deadline, in seconds.
    #[clap(long = "idle-timeout")]
    pub idle_timeout: Option<u64>,
    /// Specify the number of recent counters remembered per device.
    #[clap(long = "dedup-entries")]
    pub dedup_entries: Option<usize>,
    /// Specify the destination topic for device messages.
    #[clap(long = "message-topic")]
    pub message_topic: Option<String>,
    /// Specify the destination topic for device events.
    #[clap(long = "event-topic")]
    pub event_topic: Option<String>,
    /// Specify the deadline applied to each publish call, in seconds.
    #[clap(long = "publisher-timeout")]
    pub publisher_timeout: Option<u64>,
    /// If the flag is set, a failed publish closes the offending connection.
    #[clap(long)]
    pub disconnect_on_publish_error: bool,
    /// Specify the path of an optional JSON configuration file.
    #[clap(long = "config")]
    pub config: Option<PathBuf>,
    /// Specify the verbosity of the gateway [options: 0, 1, 2, 3]
    #[clap(default_value = "1", long = "verbosity")]
    pub verbosity: u8,
}

impl Start {
    /// Starts the gateway and runs it until interrupted.
    pub fn parse(self) -> Result<String> {
        // Initialize the logger.
        initialize_logger(self.verbosity);

        // Initialize the runtime.
        Self::runtime().block_on(async move {
            // Build the effective configuration.
            let config = self.parse_config()?;

            // Initialize the metrics; the exporter task lives for the run.
            let _metrics_exporter = fleetgate_metrics::initialize_metrics();

            // Start the gateway.
            let gateway = Gateway::new(config, Arc::new(LoggingPublisher))?;
            gateway.start().await?;

            // Run until interrupted, then shut down cooperatively.
            tokio::signal::ctrl_c().await.context("can't listen for the shutdown signal")?;
            gateway.shut_down().await;

            Ok::<(), anyhow::Error>(())
        })?;

        Ok(String::new())
    }

    /// Builds the effective configuration: the defaults, the optional
    /// configuration file over them, and explicit flags over both.
    fn parse_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                let file = fs::read_to_string(path).with_context(|| format!("can't read '{}'", path.display()))?;
                serde_json::from_str(&file).with_context(|| format!("can't parse '{}'", path.display()))?
            }
            None => Config::default(),
        };

        if let Some(listen) = self.listen {
            config.listen_address = listen;
        }
        if let Some(max_connections) = self.max_connections {
            config.max_connections = max_connections;
        }
        if let Some(read_buffer) = self.read_buffer {
            config.read_buffer_size = read_buffer;
        }
        if let Some(max_pending) = self.max_pending {
            config.max_pending_bytes = max_pending;
        }
        if let Some(idle_timeout) = self.idle_timeout {
            config.idle_timeout_secs = idle_timeout;
        }
        if let Some(dedup_entries) = self.dedup_entries {
            config.dedup_entries_per_device = dedup_entries;
        }
        if let Some(message_topic) = &self.message_topic {
            config.message_topic = message_topic.clone();
        }
        if let Some(event_topic) = &self.event_topic {
            config.event_topic = event_topic.clone();
        }
        if let Some(publisher_timeout) = self.publisher_timeout {
            config.publisher.timeout_secs = publisher_timeout;
        }
        if self.disconnect_on_publish_error {
            config.disconnect_on_publish_error = true;
        }

        config.validate()?;
        Ok(config)
    }

    /// Returns the runtime of the gateway.
    fn runtime() -> Runtime {
        runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("fleetgate")
            .build()
            .expect("can't initialize the runtime")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(args: &[&str]) -> Start {
        let mut full = vec!["start"];
        full.extend_from_slice(args);
        Start::try_parse_from(full).unwrap()
    }

    #[test]
    fn flags_override_the_defaults() {
        let start = command(&["--listen", "127.0.0.1:9999", "--max-connections", "7", "--event-topic", "events"]);
        let config = start.parse_config().unwrap();

        assert_eq!(config.listen_address, "127.0.0.1:9999".parse().unwrap());
        assert_eq!(config.max_connections, 7);
        assert_eq!(config.event_topic, "events");
        // Untouched fields keep their defaults.
        assert_eq!(config.message_topic, "device-messages");
        assert_eq!(config.max_pending_bytes, 1024 * 1024);
    }

    #[test]
    fn invalid_flag_values_fail_validation() {
        let start = command(&["--max-connections", "0"]);
        assert!(start.parse_config().is_err());
    }
}
