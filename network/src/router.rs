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

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    protocol::DeviceMessage,
    publisher::{Record, RecordValue},
};

/// The header pairs attached to every published record.
pub const RECORD_HEADERS: [(&str, &str); 2] = [("source", "message-sender-service"), ("version", "1.0")];

/// The routing class of a parsed message, determined by its type discriminator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageClass {
    /// Structured telemetry; published as a JSON envelope.
    DeviceMessage,
    /// Opaque event data; published as the bare payload.
    DeviceEvent,
}

impl MessageClass {
    /// Classifies a message by its type discriminator; `None` for unrecognized
    /// types, which are counted and dropped.
    pub fn classify(message_type: u8) -> Option<Self> {
        match message_type {
            2 | 11 | 13 => Some(Self::DeviceMessage),
            1 | 3 | 12 | 14 => Some(Self::DeviceEvent),
            _ => None,
        }
    }

    /// Returns the destination topic for this class.
    pub fn topic<'a>(&self, config: &'a Config) -> &'a str {
        match self {
            Self::DeviceMessage => &config.message_topic,
            Self::DeviceEvent => &config.event_topic,
        }
    }
}

/// The JSON envelope published for device messages.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    pub device_id: String,
    pub message_counter: u16,
    pub message_type: u8,
    pub timestamp: String,
    pub payload: String,
    pub payload_size: usize,
    pub correlation_id: String,
}

/// Projects a fresh message into the record published to the given topic.
///
/// The correlation id rides in the headers on both topics; the raw event
/// projection has no envelope to carry it.
pub fn project(message: &DeviceMessage, class: MessageClass, topic: &str, correlation_id: String) -> Record {
    let key = message.device_id.to_string();
    let mut headers: Vec<(String, String)> =
        RECORD_HEADERS.iter().map(|(name, value)| (name.to_string(), value.to_string())).collect();
    headers.push(("correlationId".to_string(), correlation_id.clone()));

    let value = match class {
        MessageClass::DeviceMessage => {
            let envelope = MessageEnvelope {
                device_id: key.clone(),
                message_counter: message.counter,
                message_type: message.message_type,
                timestamp: message.received_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                payload: base64::encode(&message.payload),
                payload_size: message.payload.len(),
                correlation_id,
            };
            RecordValue::Json(serde_json::to_string(&envelope).expect("the envelope always serializes"))
        }
        // The bare payload is the record value; no envelope, no metadata.
        MessageClass::DeviceEvent => RecordValue::Raw(message.payload.to_vec()),
    };

    Record { topic: topic.to_string(), key, value, headers }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_frame, DeviceMessage};

    use bytes::Bytes;

    fn parsed(device_id: [u8; 4], counter: u16, message_type: u8, payload: &[u8]) -> DeviceMessage {
        let frame = Bytes::from(encode_frame(device_id, counter, message_type, payload));
        DeviceMessage::parse(&frame).unwrap()
    }

    #[test]
    fn discriminator_table() {
        for message_type in [2, 11, 13] {
            assert_eq!(MessageClass::classify(message_type), Some(MessageClass::DeviceMessage));
        }
        for message_type in [1, 3, 12, 14] {
            assert_eq!(MessageClass::classify(message_type), Some(MessageClass::DeviceEvent));
        }
        for message_type in (0u8..=255).filter(|t| ![1, 2, 3, 11, 12, 13, 14].contains(t)) {
            assert_eq!(MessageClass::classify(message_type), None);
        }
    }

    #[test]
    fn classes_map_to_their_topics() {
        let config = Config::default();
        assert_eq!(MessageClass::DeviceMessage.topic(&config), "device-messages");
        assert_eq!(MessageClass::DeviceEvent.topic(&config), "device-events");
    }

    #[test]
    fn device_message_projection_builds_the_envelope() {
        let message = parsed([1, 2, 3, 4], 1, 2, &[1, 2, 3]);
        let record = project(&message, MessageClass::DeviceMessage, "device-messages", "abc123".into());

        assert_eq!(record.topic, "device-messages");
        assert_eq!(record.key, "01-02-03-04");
        assert_eq!(record.headers, vec![
            ("source".to_string(), "message-sender-service".to_string()),
            ("version".to_string(), "1.0".to_string()),
            ("correlationId".to_string(), "abc123".to_string()),
        ]);

        let json = match record.value {
            RecordValue::Json(json) => json,
            RecordValue::Raw(..) => panic!("expected a JSON envelope"),
        };
        let envelope: MessageEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(envelope.device_id, "01-02-03-04");
        assert_eq!(envelope.message_counter, 1);
        assert_eq!(envelope.message_type, 2);
        assert_eq!(envelope.payload, "AQID");
        assert_eq!(envelope.payload_size, 3);
        assert_eq!(envelope.correlation_id, "abc123");
        assert_eq!(envelope.timestamp, message.received_at.to_rfc3339_opts(SecondsFormat::Secs, true));
        assert!(envelope.timestamp.ends_with('Z'));
    }

    #[test]
    fn envelope_field_names_are_camel_case() {
        let message = parsed([1, 2, 3, 4], 5, 11, &[]);
        let record = project(&message, MessageClass::DeviceMessage, "device-messages", "abc123".into());

        let json = match record.value {
            RecordValue::Json(json) => json,
            RecordValue::Raw(..) => panic!("expected a JSON envelope"),
        };
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        for field in ["deviceId", "messageCounter", "messageType", "timestamp", "payload", "payloadSize", "correlationId"] {
            assert!(value.get(field).is_some(), "missing field '{field}'");
        }
        // An empty payload is projected as an empty string.
        assert_eq!(value["payload"], "");
        assert_eq!(value["payloadSize"], 0);
    }

    #[test]
    fn device_event_projection_is_the_bare_payload() {
        let message = parsed([1, 2, 3, 4], 1, 1, &[0x0A, 0x0B]);
        let record = project(&message, MessageClass::DeviceEvent, "device-events", "abc123".into());

        assert_eq!(record.topic, "device-events");
        assert_eq!(record.key, "01-02-03-04");
        // With no envelope, the correlation id survives only in the headers.
        assert!(record.headers.contains(&("correlationId".to_string(), "abc123".to_string())));
        assert_eq!(record.value, RecordValue::Raw(vec![0x0A, 0x0B]));
        // A text-valued publisher receives the payload base64-encoded.
        assert_eq!(record.value.into_text(), "Cgs=");
    }
}
