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

use std::{net::SocketAddr, time::Instant};

use bytes::Bytes;
use fleetgate_metrics::{connections, messages, publish};
use rand::{thread_rng, Rng};
use tokio::{io::AsyncReadExt, net::TcpStream, sync::OwnedSemaphorePermit, task, time::timeout};

use crate::{
    dedup::Observation,
    errors::{NetworkError, PublishError},
    gateway::Gateway,
    protocol::{DeviceMessage, FrameDecoder},
    publisher::Record,
    router::{self, MessageClass},
};

/// The per-connection ingestion handler.
///
/// A handler owns its socket and framing buffer exclusively and processes the
/// device's frames strictly in arrival order; all cross-connection state (the
/// dedup index, the publisher, the metrics) is reached through the gateway.
pub struct Connection {
    /// The address of the remote device, for logs.
    remote_address: SocketAddr,
    /// The accepted socket; the protocol is one-way, so only reads occur.
    stream: TcpStream,
    /// The framing buffer of this connection.
    decoder: FrameDecoder,
    /// The gateway this connection belongs to.
    gateway: Gateway,
}

impl Connection {
    /// Spawns the handler task for a freshly admitted connection.
    ///
    /// The admission permit travels with the task and is released when the
    /// task ends, on every path - including cancellation.
    pub(crate) fn receive(
        gateway: Gateway,
        stream: TcpStream,
        remote_address: SocketAddr,
        permit: OwnedSemaphorePermit,
    ) -> task::JoinHandle<()> {
        tokio::spawn(async move {
            let _permit = permit;
            let _active = ActiveGauge::new();

            let decoder = FrameDecoder::new(gateway.config().max_pending_bytes);
            let mut connection = Connection { remote_address, stream, decoder, gateway };
            match connection.run().await {
                Ok(()) => debug!("The device at {} disconnected", remote_address),
                Err(e) if e.is_trivial() => debug!("Closing the connection to {}: {}", remote_address, e),
                Err(e) => warn!("Closing the connection to {}: {}", remote_address, e),
            }
            if connection.decoder.discarded() > 0 {
                debug!("Discarded {} unsynchronized bytes from {}", connection.decoder.discarded(), remote_address);
            }
        })
    }

    /// Reads until remote close, a fatal connection error, or shutdown.
    async fn run(&mut self) -> Result<(), NetworkError> {
        let idle_timeout = self.gateway.config().idle_timeout();
        let mut buffer = vec![0u8; self.gateway.config().read_buffer_size];

        loop {
            if self.gateway.is_shutting_down() {
                return Err(NetworkError::ShuttingDown);
            }

            let read = match timeout(idle_timeout, self.stream.read(&mut buffer)).await {
                Ok(result) => result?,
                Err(_elapsed) => return Err(NetworkError::IdleTimeout(idle_timeout)),
            };
            // A zero-byte read means the device closed the stream.
            if read == 0 {
                return Ok(());
            }

            self.decoder.extend(&buffer[..read])?;
            while let Some(frame) = self.decoder.next_frame() {
                self.process_frame(frame).await?;
            }
        }
    }

    /// Processes one complete frame.
    ///
    /// Frame-level failures - parse errors, duplicates, unknown types, publish
    /// errors - are counted and never tear the connection down, with one
    /// exception: a publish error under `disconnect_on_publish_error`.
    async fn process_frame(&self, frame: Bytes) -> Result<(), NetworkError> {
        let started = Instant::now();

        let message = match DeviceMessage::parse(&frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping an unparseable frame from {}: {}", self.remote_address, e);
                metrics::increment_counter!(messages::INVALID_REJECTED, "reason" => e.reason());
                return Ok(());
            }
        };

        if self.gateway.dedup().observe(message.device_id, message.counter) == Observation::Duplicate {
            info!("Dropping duplicate counter {} from device {}", message.counter, message.device_id);
            metrics::increment_counter!(messages::DUPLICATES_REJECTED);
            return Ok(());
        }

        let class = match MessageClass::classify(message.message_type) {
            Some(class) => class,
            None => {
                warn!("Dropping a message of unknown type {} from device {}", message.message_type, message.device_id);
                metrics::increment_counter!(messages::INVALID_REJECTED, "reason" => "unknown_message_type");
                return Ok(());
            }
        };

        let config = self.gateway.config();
        let topic = class.topic(config).to_string();
        let record = router::project(&message, class, &topic, correlation_id());

        let outcome = self.publish(record, &topic).await;
        metrics::histogram!(
            messages::PROCESSING_DURATION,
            started.elapsed().as_secs_f64(),
            "message_type" => message.message_type.to_string()
        );

        match outcome {
            Ok(()) => {
                match class {
                    MessageClass::DeviceMessage => metrics::increment_counter!(messages::DEVICE_MESSAGES_PROCESSED),
                    MessageClass::DeviceEvent => metrics::increment_counter!(messages::DEVICE_EVENTS_PROCESSED),
                }
                Ok(())
            }
            Err(e) => {
                // The broker's own retries are expected to mask transient
                // publisher trouble, so the device isn't punished for it.
                warn!("Failed to publish counter {} from device {} to '{}': {}", message.counter, message.device_id, topic, e);
                metrics::increment_counter!(publish::ERRORS, "topic" => topic, "error" => e.label());
                match config.disconnect_on_publish_error {
                    true => Err(e.into()),
                    false => Ok(()),
                }
            }
        }
    }

    /// Publishes one record under the configured deadline.
    async fn publish(&self, record: Record, topic: &str) -> Result<(), PublishError> {
        let deadline = self.gateway.config().publisher.timeout();
        let started = Instant::now();

        let result = match timeout(deadline, self.gateway.publisher().publish(record)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(PublishError::TimedOut(deadline)),
        };
        metrics::histogram!(publish::DURATION, started.elapsed().as_secs_f64(), "topic" => topic.to_string());

        result
    }
}

/// Returns a fresh opaque correlation id.
fn correlation_id() -> String {
    hex::encode(thread_rng().gen::<[u8; 16]>())
}

/// Holds the `active_connections` gauge up for the lifetime of a handler; the
/// drop runs even when the handler task is cancelled mid-await.
struct ActiveGauge;

impl ActiveGauge {
    fn new() -> Self {
        metrics::increment_gauge!(connections::ACTIVE, 1.0);
        Self
    }
}

impl Drop for ActiveGauge {
    fn drop(&mut self) {
        metrics::decrement_gauge!(connections::ACTIVE, 1.0);
    }
}
