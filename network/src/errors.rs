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

use std::{io::ErrorKind, time::Duration};

use thiserror::Error;

/// An error raised by the frame decoder when a connection's pending bytes can
/// no longer be buffered.
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("{0} pending bytes exceed the cap of {1}")]
    Overflow(usize, usize),
}

/// An error raised when a complete frame fails to parse into a device message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("a {0}-byte frame is shorter than the fixed header")]
    FrameTooShort(usize),
    #[error("the frame starts with {0:02X?} instead of the sync word")]
    BadSync([u8; 2]),
    #[error("the declared payload length {declared} exceeds the {available} bytes present")]
    LengthMismatch { declared: usize, available: usize },
}

impl ParseError {
    /// The label under which this failure is counted.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::FrameTooShort(..) => "frame_too_short",
            Self::BadSync(..) => "bad_sync",
            Self::LengthMismatch { .. } => "length_mismatch",
        }
    }
}

/// An error returned by a publisher for a single record.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("the publish didn't complete within {0:?}")]
    TimedOut(Duration),
    #[error("transient publisher failure: {0}")]
    Transient(String),
    #[error("fatal publisher failure: {0}")]
    Fatal(String),
}

impl PublishError {
    /// The label under which this failure is counted.
    pub fn label(&self) -> &'static str {
        match self {
            Self::TimedOut(..) => "timeout",
            Self::Transient(..) => "transient",
            Self::Fatal(..) => "fatal",
        }
    }
}

/// An error terminating a single connection, or failing gateway startup.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error("the connection was idle for longer than {0:?}")]
    IdleTimeout(Duration),
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("the gateway is shutting down")]
    ShuttingDown,
}

impl NetworkError {
    /// Trivial errors reflect ordinary peer churn and are logged at a lower severity.
    pub fn is_trivial(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                ErrorKind::BrokenPipe
                    | ErrorKind::ConnectionReset
                    | ErrorKind::UnexpectedEof
                    | ErrorKind::TimedOut
                    | ErrorKind::ConnectionRefused
            ),
            Self::IdleTimeout(..) | Self::ShuttingDown => true,
            Self::Framing(..) | Self::InvalidConfig(..) | Self::Publish(..) => false,
        }
    }
}
