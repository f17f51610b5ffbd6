//! Helpers for assembling payloads out of buffer fragments.

use bytes::{Bytes, BytesMut};

/// Concatenates the fragments, in order, into one contiguous buffer.
///
/// A single fragment is returned as is, without copying.
pub fn concat(fragments: &[Bytes]) -> Bytes {
    match fragments {
        [] => Bytes::new(),
        [single] => single.clone(),
        _ => {
            let total = fragments.iter().map(|fragment| fragment.len()).sum();
            let mut output = BytesMut::with_capacity(total);
            for fragment in fragments {
                output.extend_from_slice(fragment);
            }

            output.freeze()
        }
    }
}
