//! Configuration seams shared by the node constructors.
//!
//! Configuration trees are already-parsed [`serde_json::Value`] objects;
//! whatever textual syntax produced them is not this workspace's concern.
//! The traits here are the enumeration collaborators node constructors
//! depend on.

use pk_core::error::Result;
use serde_json::Value;

use crate::pcm::{Mode, SharedPcm, Stream};

/// Keys every node configuration recognizes without acting on.
pub fn is_generic_id(id: &str) -> bool {
    matches!(id, "comment" | "type")
}

/// Resolves a `slave` subtree to an opened downstream node.
pub trait SlaveResolver {
    fn open_slave(&mut self, conf: &Value, stream: Stream, mode: Mode) -> Result<SharedPcm>;
}

/// Resolves card names to card indices.
pub trait CardLookup {
    fn card_index(&self, name: &str) -> Result<i32>;
}

/// Opens a PCM on a card/device able to carry the given channel count.
pub trait DeviceOpener {
    fn open_pcm(
        &mut self,
        card: i32,
        device: u32,
        channels: u32,
        stream: Stream,
        mode: Mode,
    ) -> Result<SharedPcm>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_ids() {
        assert!(is_generic_id("comment"));
        assert!(is_generic_id("type"));
        assert!(!is_generic_id("slave"));
        assert!(!is_generic_id("ttable"));
    }
}
