use super::tag::{FLV_HEADER_SIZE, TAG_PREFIX_SIZE};
use byteorder::{BigEndian, ByteOrder};
use bytes::{Buf, Bytes, BytesMut};
use std::collections::VecDeque;

/// Splits an FLV byte stream, received in arbitrary pieces, into whole tags.
///
/// The 9 byte file header is skipped.  Each queued unit starts with the previous tag size that
/// precedes the tag in the stream, so it can be handed straight to `FlvTag::parse`.
#[derive(Debug, Default)]
pub struct FlvTagQueue {
    pending: BytesMut,
    header_skipped: bool,
    tags: VecDeque<Bytes>,
}

impl FlvTagQueue {
    pub fn new() -> FlvTagQueue {
        FlvTagQueue::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);

        if !self.header_skipped {
            if self.pending.len() < FLV_HEADER_SIZE {
                return;
            }

            self.pending.advance(FLV_HEADER_SIZE);
            self.header_skipped = true;
        }

        while self.pending.len() >= 8 {
            let data_size = BigEndian::read_u24(&self.pending[5..8]) as usize;
            let total = TAG_PREFIX_SIZE + data_size;
            if self.pending.len() < total {
                break;
            }

            self.tags.push_back(self.pending.split_to(total).freeze());
        }
    }

    pub fn pop(&mut self) -> Option<Bytes> {
        self.tags.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn clear(&mut self) {
        *self = FlvTagQueue::default();
    }
}
