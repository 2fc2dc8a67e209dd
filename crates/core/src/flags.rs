//! Per-frame flags computed at encode time.

/// Flags carried alongside an encoded block.
///
/// Produced once by the encoder, read-only for the network and the decoder's
/// delivery queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags {
    /// The decoder may process this block before strictly earlier blocks.
    ///
    /// False exactly when the encode step evicted table entries: entries are
    /// reclaimed oldest first, so a later block decoded early could observe a
    /// table that no longer matches what the encoder saw.
    pub allow_ooo: bool,
}

impl FrameFlags {
    /// Derive the flags from the codec's eviction indicator.
    pub fn from_eviction(evicted: bool) -> Self {
        Self { allow_ooo: !evicted }
    }
}
