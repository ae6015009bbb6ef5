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

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::{
    errors::ParseError,
    protocol::frame::{COUNTER_OFFSET, DEVICE_ID_OFFSET, HEADER_SIZE, LENGTH_OFFSET, SYNC_WORD, TYPE_OFFSET},
};

/// The opaque 4-byte identity of a device.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct DeviceId([u8; 4]);

impl DeviceId {
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<[u8; 4]> for DeviceId {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for DeviceId {
    /// Formats the id as uppercase hex pairs separated by hyphens, e.g. `01-02-03-04`;
    /// the form used as the publisher key and in log fields.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}-{:02X}-{:02X}-{:02X}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

/// A message parsed from a complete frame.
#[derive(Clone, Debug)]
pub struct DeviceMessage {
    /// The identity of the sending device.
    pub device_id: DeviceId,
    /// The device-local sequence number, used for duplicate suppression.
    pub counter: u16,
    /// The numeric discriminator driving routing.
    pub message_type: u8,
    /// The payload; a zero-copy slice of the frame, not retained past the handler.
    pub payload: Bytes,
    /// The wall-clock time at which the frame parsed successfully.
    pub received_at: DateTime<Utc>,
}

impl DeviceMessage {
    /// Parses a complete frame into a message.
    ///
    /// The length checks are defensive; a correct decoder only emits frames
    /// that satisfy them.
    pub fn parse(frame: &Bytes) -> Result<Self, ParseError> {
        if frame.len() < HEADER_SIZE {
            return Err(ParseError::FrameTooShort(frame.len()));
        }
        if frame[..2] != SYNC_WORD {
            return Err(ParseError::BadSync([frame[0], frame[1]]));
        }
        let declared = u16::from_be_bytes([frame[LENGTH_OFFSET], frame[LENGTH_OFFSET + 1]]) as usize;
        if HEADER_SIZE + declared > frame.len() {
            return Err(ParseError::LengthMismatch { declared, available: frame.len() - HEADER_SIZE });
        }

        Ok(Self {
            device_id: DeviceId::new([
                frame[DEVICE_ID_OFFSET],
                frame[DEVICE_ID_OFFSET + 1],
                frame[DEVICE_ID_OFFSET + 2],
                frame[DEVICE_ID_OFFSET + 3],
            ]),
            counter: u16::from_be_bytes([frame[COUNTER_OFFSET], frame[COUNTER_OFFSET + 1]]),
            message_type: frame[TYPE_OFFSET],
            payload: frame.slice(HEADER_SIZE..HEADER_SIZE + declared),
            received_at: Utc::now(),
        })
    }
}
