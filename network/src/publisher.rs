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

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::PublishError;

/// A single record handed to the publisher.
///
/// No timestamp is carried; the broker assigns its own on append.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    /// The destination topic.
    pub topic: String,
    /// The partitioning key; the hex-formatted device id.
    pub key: String,
    /// The record value.
    pub value: RecordValue,
    /// Header pairs propagated to the broker.
    pub headers: Vec<(String, String)>,
}

/// The value of a published record.
///
/// Byte-valued publishers take the bytes directly via [`RecordValue::as_bytes`];
/// text-valued publisher APIs use [`RecordValue::into_text`], which
/// base64-encodes raw payloads.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RecordValue {
    /// A JSON envelope, already serialized.
    Json(String),
    /// An opaque payload projected without an envelope.
    Raw(Vec<u8>),
}

impl RecordValue {
    /// Renders the value for a text-valued publisher API.
    pub fn into_text(self) -> String {
        match self {
            Self::Json(text) => text,
            Self::Raw(bytes) => base64::encode(bytes),
        }
    }

    /// Returns the value bytes for a byte-valued publisher API.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Json(text) => text.as_bytes(),
            Self::Raw(bytes) => bytes,
        }
    }
}

/// The capability through which classified messages leave the gateway.
///
/// Implementations are internally concurrent-safe and bring their own
/// idempotence and retries where the broker supports them; the gateway does
/// not retry at this layer.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes a single record.
    async fn publish(&self, record: Record) -> Result<(), PublishError>;

    /// Drains in-flight publishes; called during shutdown.
    async fn flush(&self, deadline: Duration) -> Result<(), PublishError>;

    /// Releases the underlying client.
    async fn close(&self);
}

/// A stand-in sink for local runs: records are logged at debug level and
/// dropped. Deployments plug a broker client in through [`Publisher`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingPublisher;

#[async_trait]
impl Publisher for LoggingPublisher {
    async fn publish(&self, record: Record) -> Result<(), PublishError> {
        debug!("Discarding {} value bytes for '{}' (key '{}')", record.value.as_bytes().len(), record.topic, record.key);
        Ok(())
    }

    async fn flush(&self, _deadline: Duration) -> Result<(), PublishError> {
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_render_as_base64_text() {
        let value = RecordValue::Raw(vec![0x0A, 0x0B]);
        assert_eq!(value.as_bytes(), &[0x0A, 0x0B]);
        assert_eq!(value.into_text(), "Cgs=");
    }

    #[test]
    fn json_values_render_verbatim() {
        let value = RecordValue::Json("{}".into());
        assert_eq!(value.as_bytes(), b"{}");
        assert_eq!(value.into_text(), "{}");
    }
}
