//! Two switch lines to one ASCII digit.

use modswitch_config::PullMode;

/// Every byte [`encode`] can produce.
pub const STATE_BYTES: [u8; 4] = [b'0', b'1', b'2', b'3'];

/// Encode a pair of raw line samples as `'0'..='3'`.
///
/// With [`PullMode::Up`] both samples are inverted first, since a closed switch
/// pulls its line low. Switch 1 is the high bit, switch 0 the low bit.
pub fn encode(sw0_raw: bool, sw1_raw: bool, pull_mode: PullMode) -> u8 {
    let active_low = pull_mode == PullMode::Up;
    let sw0 = u8::from(sw0_raw ^ active_low);
    let sw1 = u8::from(sw1_raw ^ active_low);
    b'0' + (((sw1 << 1) | sw0) & 0x03)
}

/// Inverse of [`encode`] for a published byte: `(sw0_closed, sw1_closed)`.
///
/// Returns `None` for bytes the daemon never writes.
pub fn decode(byte: u8) -> Option<(bool, bool)> {
    if !STATE_BYTES.contains(&byte) {
        return None;
    }
    let value = byte - b'0';
    Some((value & 0x01 != 0, value & 0x02 != 0))
}
