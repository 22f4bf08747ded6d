//! Surround instantiation from a configuration tree.

use pk_core::error::{PcmError, Result};
use pk_pcm::{
    config::{CardLookup, DeviceOpener},
    pcm::{Mode, SharedPcm, Stream},
};
use serde::Deserialize;
use serde_json::Value;

use crate::surround::{Surround, SurroundLayout};

/// A card referenced by index or by name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CardRef {
    Index(i32),
    Name(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SurroundConfig {
    #[serde(default, rename = "comment")]
    _comment: Option<Value>,
    card: CardRef,
    #[serde(default)]
    device: Option<u32>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl Surround {
    /// Build a surround stream from a configuration tree.
    ///
    /// Recognized keys: `card` (required; index, or name resolved via
    /// `cards`), `device` (default 0), `type` (`"40"`/`"4.0"` or
    /// `"51"`/`"5.1"`, default 4.0) and `comment`. Any other key is a
    /// configuration error.
    ///
    /// Slaves come from `opener`: first a natively multichannel device at
    /// the configured address, else a gang of stereo devices at
    /// consecutive device indices.
    pub fn from_config(
        name: &str,
        conf: &Value,
        stream: Stream,
        mode: Mode,
        cards: &dyn CardLookup,
        opener: &mut dyn DeviceOpener,
    ) -> Result<Surround> {
        if stream == Stream::Capture {
            return Err(PcmError::BadArgument);
        }
        let config: SurroundConfig = serde_json::from_value(conf.clone()).map_err(|err| {
            log::error!("surround {name}: {err}");
            PcmError::BadConfig(err.to_string())
        })?;

        let card = match &config.card {
            CardRef::Index(index) => *index,
            CardRef::Name(card_name) => cards.card_index(card_name).map_err(|err| {
                log::error!("surround {name}: invalid value for card");
                err
            })?,
        };
        let device = config.device.unwrap_or(0);
        let layout = match config.kind.as_deref() {
            None | Some("40") | Some("4.0") => SurroundLayout::Surround40,
            Some("51") | Some("5.1") => SurroundLayout::Surround51,
            Some(other) => {
                log::error!("surround {name}: invalid value {other} for type");
                return Err(PcmError::BadConfig(format!("invalid value {other} for type")));
            }
        };

        let slaves = open_slaves(name, card, device, layout, stream, mode, opener)?;
        Surround::new(name, card, device, layout, stream, slaves)
    }
}

fn open_slaves(
    name: &str,
    card: i32,
    device: u32,
    layout: SurroundLayout,
    stream: Stream,
    mode: Mode,
    opener: &mut dyn DeviceOpener,
) -> Result<Vec<SharedPcm>> {
    let channels = layout.channel_count();
    if let Ok(native) = opener.open_pcm(card, device, channels, stream, mode) {
        log::debug!("surround {name}: native {channels}-channel device");
        return Ok(vec![native]);
    }

    let pcms = (channels / 2) as usize;
    let mut slaves: Vec<SharedPcm> = Vec::with_capacity(pcms);
    for i in 0..pcms {
        match opener.open_pcm(card, device + i as u32, 2, stream, mode) {
            Ok(slave) => slaves.push(slave),
            Err(err) => {
                for slave in &slaves {
                    let _ = slave.borrow_mut().close();
                }
                log::error!("surround {name}: cannot open stereo stream {i}");
                return Err(err);
            }
        }
    }
    log::debug!("surround {name}: ganged {pcms} stereo devices");
    Ok(slaves)
}
