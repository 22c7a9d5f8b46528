//! SSH transport for the session core

mod connector;
mod keys;

pub use connector::{RusshConnector, RusshTransport};
pub use keys::{default_identity_files, load_identity};

/// Append `data` to `buf` without letting it grow past `limit`
///
/// Returns `true` when some bytes had to be dropped.
pub(crate) fn append_capped(buf: &mut Vec<u8>, data: &[u8], limit: usize) -> bool {
    let room = limit.saturating_sub(buf.len());
    if data.len() <= room {
        buf.extend_from_slice(data);
        false
    } else {
        buf.extend_from_slice(&data[..room]);
        true
    }
}
