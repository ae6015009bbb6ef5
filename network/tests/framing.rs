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

use tokio::{io::AsyncWriteExt, time::sleep};

use fleetgate_network::encode_frame;
use fleetgate_testing::{canonical_message_frame, connect_device, test_gateway, wait_until, TestSetup};

#[tokio::test]
async fn garbage_before_a_frame_is_resynchronized_away() {
    let (gateway, address, publisher) = test_gateway(TestSetup::default()).await;

    let mut device = connect_device(address).await;
    device.write_all(&[0xFF, 0xFF, 0xFF]).await.unwrap();
    device.write_all(&canonical_message_frame()).await.unwrap();

    wait_until!(5, publisher.record_count() == 1);
    assert_eq!(publisher.records().remove(0).key, "01-02-03-04");

    gateway.shut_down().await;
}

#[tokio::test]
async fn a_frame_split_across_writes_is_reassembled() {
    let (gateway, address, publisher) = test_gateway(TestSetup::default()).await;

    let frame = canonical_message_frame();
    assert_eq!(frame.len(), 14);

    let mut device = connect_device(address).await;
    for chunk in [&frame[..4], &frame[4..8], &frame[8..]] {
        device.write_all(chunk).await.unwrap();
        device.flush().await.unwrap();
        sleep(Duration::from_millis(20)).await;
    }

    wait_until!(5, publisher.record_count() == 1);
    assert_eq!(publisher.records().remove(0).topic, "device-messages");

    gateway.shut_down().await;
}

#[tokio::test]
async fn a_frame_dribbled_byte_by_byte_is_reassembled() {
    let (gateway, address, publisher) = test_gateway(TestSetup::default()).await;

    let mut device = connect_device(address).await;
    for byte in encode_frame([1, 2, 3, 4], 9, 1, &[0x42]) {
        device.write_all(&[byte]).await.unwrap();
        device.flush().await.unwrap();
    }

    wait_until!(5, publisher.record_count() == 1);

    gateway.shut_down().await;
}

#[tokio::test]
async fn zeroes_before_a_frame_are_ignored() {
    let (gateway, address, publisher) = test_gateway(TestSetup::default()).await;

    let mut device = connect_device(address).await;
    device.write_all(&[0u8; 64]).await.unwrap();
    device.write_all(&canonical_message_frame()).await.unwrap();

    wait_until!(5, publisher.record_count() == 1);

    gateway.shut_down().await;
}

#[tokio::test]
async fn a_sync_word_split_across_writes_still_frames() {
    let (gateway, address, publisher) = test_gateway(TestSetup::default()).await;

    let frame = canonical_message_frame();

    let mut device = connect_device(address).await;
    // Junk ending on the first sync byte, then the remainder of the frame.
    device.write_all(&[0x00, 0x01, frame[0]]).await.unwrap();
    device.flush().await.unwrap();
    sleep(Duration::from_millis(20)).await;
    device.write_all(&frame[1..]).await.unwrap();

    wait_until!(5, publisher.record_count() == 1);

    gateway.shut_down().await;
}
