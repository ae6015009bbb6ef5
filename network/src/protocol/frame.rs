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

use bytes::{Buf, Bytes, BytesMut};

use crate::errors::FramingError;

/// The two-byte constant marking the start of every frame.
pub const SYNC_WORD: [u8; 2] = [0xAA, 0x55];
/// The size of the fixed frame header, sync word included.
pub const HEADER_SIZE: usize = 11;
/// The largest payload a frame can declare.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize;
/// The largest complete frame that can appear on the wire.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

// Fixed header offsets; all multi-byte fields are big-endian.
pub(crate) const DEVICE_ID_OFFSET: usize = 2;
pub(crate) const COUNTER_OFFSET: usize = 6;
pub(crate) const TYPE_OFFSET: usize = 8;
pub(crate) const LENGTH_OFFSET: usize = 9;

/// Encodes a single frame in wire form; used by device simulators and tests.
pub fn encode_frame(device_id: [u8; 4], counter: u16, message_type: u8, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= MAX_PAYLOAD_SIZE);

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&SYNC_WORD);
    frame.extend_from_slice(&device_id);
    frame.extend_from_slice(&counter.to_be_bytes());
    frame.push(message_type);
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// A stateful per-connection decoder turning a chunked byte stream into
/// complete frames.
///
/// The decoder is self-synchronizing: bytes preceding the next occurrence of
/// the sync word are discarded, so a misaligned start or mid-stream garbage
/// only costs the bytes up to the next frame boundary. Once a sync word is at
/// the front of the buffer the decoder commits to it and waits for the frame
/// to complete; the buffer interior is never re-scanned, so a sync word
/// appearing inside a payload is not mistaken for a frame start.
pub struct FrameDecoder {
    /// Bytes received but not yet consumed by a complete frame.
    buffer: BytesMut,
    /// The cap on `buffer` before the connection is torn down.
    max_pending_bytes: usize,
    /// The running total of bytes discarded during resynchronization.
    discarded: u64,
}

impl FrameDecoder {
    /// Creates a decoder enforcing the given cap on pending bytes.
    pub fn new(max_pending_bytes: usize) -> Self {
        Self { buffer: BytesMut::new(), max_pending_bytes, discarded: 0 }
    }

    /// Appends a chunk to the pending buffer.
    ///
    /// Fails when the pending bytes exceed the configured cap; no frame is
    /// ever emitted from an over-cap buffer, and the connection is expected
    /// to be torn down.
    pub fn extend(&mut self, chunk: &[u8]) -> Result<(), FramingError> {
        self.buffer.extend_from_slice(chunk);
        if self.buffer.len() > self.max_pending_bytes {
            return Err(FramingError::Overflow(self.buffer.len(), self.max_pending_bytes));
        }
        Ok(())
    }

    /// Emits the next complete frame, or `None` until more input arrives.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        self.resync();

        // Wait for the fixed header to complete.
        if self.buffer.len() < HEADER_SIZE {
            return None;
        }
        // Wait for the declared payload to complete.
        let declared = u16::from_be_bytes([self.buffer[LENGTH_OFFSET], self.buffer[LENGTH_OFFSET + 1]]) as usize;
        let frame_size = HEADER_SIZE + declared;
        if self.buffer.len() < frame_size {
            return None;
        }

        // Detach the frame; the payload is not copied.
        Some(self.buffer.split_to(frame_size).freeze())
    }

    /// The number of bytes currently pending.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// The running total of bytes discarded during resynchronization.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Discards bytes until the buffer begins with the sync word.
    ///
    /// A trailing first sync byte is preserved, as it may complete once the
    /// next chunk arrives.
    fn resync(&mut self) {
        if self.buffer.len() >= 2 && self.buffer[..2] == SYNC_WORD {
            return;
        }
        let skip = match self.buffer.windows(2).position(|window| window == SYNC_WORD) {
            Some(position) => position,
            None => match self.buffer.last() {
                Some(&byte) if byte == SYNC_WORD[0] => self.buffer.len() - 1,
                _ => self.buffer.len(),
            },
        };
        if skip > 0 {
            trace!("Discarded {} bytes while seeking the sync word", skip);
            self.discarded += skip as u64;
            self.buffer.advance(skip);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{thread_rng, Rng};

    fn drain(decoder: &mut FrameDecoder) -> Vec<Bytes> {
        let mut frames = Vec::new();
        while let Some(frame) = decoder.next_frame() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn whole_frame_roundtrips() {
        let encoded = encode_frame([1, 2, 3, 4], 1, 2, &[1, 2, 3]);

        let mut decoder = FrameDecoder::new(1024);
        decoder.extend(&encoded).unwrap();
        let frames = drain(&mut decoder);

        assert_eq!(frames, vec![Bytes::from(encoded)]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn empty_payload_roundtrips() {
        let encoded = encode_frame([9, 9, 9, 9], 42, 11, &[]);

        let mut decoder = FrameDecoder::new(1024);
        decoder.extend(&encoded).unwrap();

        assert_eq!(drain(&mut decoder), vec![Bytes::from(encoded)]);
    }

    #[test]
    fn garbage_prefix_is_discarded() {
        let encoded = encode_frame([1, 2, 3, 4], 1, 2, &[1, 2, 3]);
        let mut stream = vec![0xFF, 0xFF, 0xFF];
        stream.extend_from_slice(&encoded);

        let mut decoder = FrameDecoder::new(1024);
        decoder.extend(&stream).unwrap();

        assert_eq!(drain(&mut decoder), vec![Bytes::from(encoded)]);
        assert_eq!(decoder.discarded(), 3);
    }

    #[test]
    fn sync_word_split_across_chunks_survives() {
        let encoded = encode_frame([1, 2, 3, 4], 7, 13, b"ok");

        // Junk, then the first sync byte, ending the chunk.
        let mut decoder = FrameDecoder::new(1024);
        decoder.extend(&[0x00, 0x11, encoded[0]]).unwrap();
        assert!(decoder.next_frame().is_none());
        decoder.extend(&encoded[1..]).unwrap();

        assert_eq!(drain(&mut decoder), vec![Bytes::from(encoded)]);
    }

    #[test]
    fn sync_word_inside_payload_is_not_a_frame_start() {
        let payload = [0x01, 0xAA, 0x55, 0x02];
        let encoded = encode_frame([1, 2, 3, 4], 1, 2, &payload);

        // Deliver the header plus half the payload, poll, then the rest.
        let mut decoder = FrameDecoder::new(1024);
        decoder.extend(&encoded[..HEADER_SIZE + 3]).unwrap();
        assert!(decoder.next_frame().is_none());
        decoder.extend(&encoded[HEADER_SIZE + 3..]).unwrap();

        let frames = drain(&mut decoder);
        assert_eq!(frames, vec![Bytes::from(encoded)]);
        assert_eq!(decoder.discarded(), 0);
    }

    #[test]
    fn back_to_back_frames_in_one_chunk() {
        let first = encode_frame([1, 2, 3, 4], 1, 2, &[1]);
        let second = encode_frame([5, 6, 7, 8], 2, 1, &[2, 2]);
        let mut stream = first.clone();
        stream.extend_from_slice(&second);

        let mut decoder = FrameDecoder::new(1024);
        decoder.extend(&stream).unwrap();

        assert_eq!(drain(&mut decoder), vec![Bytes::from(first), Bytes::from(second)]);
    }

    #[test]
    fn chunking_does_not_change_the_emitted_frames() {
        let mut stream = vec![0xDE, 0xAD];
        stream.extend_from_slice(&encode_frame([1, 2, 3, 4], 1, 2, &[1, 2, 3]));
        stream.extend_from_slice(&[0xAA, 0x00]); // a false start
        stream.extend_from_slice(&encode_frame([1, 2, 3, 4], 2, 1, &[0xAA, 0x55]));
        stream.extend_from_slice(&encode_frame([4, 3, 2, 1], 1, 14, &[]));

        let mut whole = FrameDecoder::new(4096);
        whole.extend(&stream).unwrap();
        let expected = drain(&mut whole);
        assert_eq!(expected.len(), 3);

        // Any random split of the same stream yields the same frames.
        for _ in 0..100 {
            let mut decoder = FrameDecoder::new(4096);
            let mut frames = Vec::new();
            let mut rest: &[u8] = &stream;
            while !rest.is_empty() {
                let take = thread_rng().gen_range(1..=rest.len());
                decoder.extend(&rest[..take]).unwrap();
                frames.extend(drain(&mut decoder));
                rest = &rest[take..];
            }
            assert_eq!(frames, expected);
        }
    }

    #[test]
    fn overflow_is_detected_before_any_frame_is_emitted() {
        // A committed header declaring more payload than the cap allows.
        let encoded = encode_frame([1, 2, 3, 4], 1, 2, &vec![0u8; 600]);

        let mut decoder = FrameDecoder::new(256);
        let result = decoder.extend(&encoded);
        assert!(matches!(result, Err(FramingError::Overflow(..))));
    }

    #[test]
    fn pure_garbage_does_not_accumulate() {
        let mut decoder = FrameDecoder::new(64);
        for _ in 0..100 {
            decoder.extend(&[0x00; 16]).unwrap();
            assert!(decoder.next_frame().is_none());
        }
        assert_eq!(decoder.pending(), 0);
        assert_eq!(decoder.discarded(), 1600);
    }
}
