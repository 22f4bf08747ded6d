//! Device identity records.

use crate::pcm::Stream;

/// Static identity of a PCM device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    /// Card index, -1 when the node is not backed by a card.
    pub card: i32,
    /// Device index on the card.
    pub device: u32,
    /// Subdevice index.
    pub subdevice: u32,
    /// Short identifier.
    pub id: String,
    /// Device name.
    pub name: String,
    /// Subdevice name.
    pub subname: String,
    /// Direction of the stream this info describes.
    pub stream: Stream,
    /// Number of subdevices behind this device.
    pub subdevices_count: u32,
}

/// Placement of one channel inside a device's transfer area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    /// The channel this record describes.
    pub channel: u32,
    /// Offset of the channel's first sample, in bits.
    pub first: u64,
    /// Distance between consecutive samples, in bits.
    pub step: u64,
}
