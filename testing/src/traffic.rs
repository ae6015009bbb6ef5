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

use std::net::SocketAddr;

use tokio::{io::AsyncWriteExt, net::TcpStream};

use fleetgate_network::encode_frame;

/// A fake device: a plain TCP connection to the gateway.
pub async fn connect_device(address: SocketAddr) -> TcpStream {
    TcpStream::connect(address).await.unwrap()
}

/// Writes a single frame on the device's connection.
pub async fn send_frame(stream: &mut TcpStream, device_id: [u8; 4], counter: u16, message_type: u8, payload: &[u8]) {
    stream.write_all(&encode_frame(device_id, counter, message_type, payload)).await.unwrap();
}

/// The canonical happy-path frame: device `01-02-03-04`, counter 1, type 2,
/// payload `01 02 03`.
pub fn canonical_message_frame() -> Vec<u8> {
    encode_frame([1, 2, 3, 4], 1, 2, &[1, 2, 3])
}

/// The canonical event frame: device `01-02-03-04`, counter 2, type 1,
/// payload `0A 0B`.
pub fn canonical_event_frame() -> Vec<u8> {
    encode_frame([1, 2, 3, 4], 2, 1, &[0x0A, 0x0B])
}
