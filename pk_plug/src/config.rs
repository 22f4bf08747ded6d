//! Plug instantiation from a configuration tree.

use pk_core::error::{PcmError, Result};
use pk_pcm::{
    config::{SlaveResolver, is_generic_id},
    convert::ConverterSet,
    pcm::{Mode, Stream},
    route::RouteMatrix,
};
use serde_json::Value;

use crate::plug::Plug;

impl Plug {
    /// Build a plug from a configuration tree.
    ///
    /// Recognized keys: `slave` (required subtree, resolved through
    /// `resolver`) and `ttable` (optional compound route matrix). Any
    /// other key is a configuration error.
    pub fn from_config(
        name: &str,
        conf: &Value,
        stream: Stream,
        mode: Mode,
        resolver: &mut dyn SlaveResolver,
        converters: Box<dyn ConverterSet>,
    ) -> Result<Plug> {
        let fields = conf.as_object().ok_or_else(|| {
            log::error!("plug {name}: configuration is not a compound");
            PcmError::BadConfig("configuration is not a compound".into())
        })?;

        let mut slave = None;
        let mut ttable = None;
        for (id, node) in fields {
            if is_generic_id(id) {
                continue;
            }
            match id.as_str() {
                "slave" => slave = Some(node),
                "ttable" => {
                    if !node.is_object() {
                        log::error!("plug {name}: invalid type for {id}");
                        return Err(PcmError::BadConfig(format!("invalid type for {id}")));
                    }
                    ttable = Some(RouteMatrix::from_config(node)?);
                }
                _ => {
                    log::error!("plug {name}: unknown field {id}");
                    return Err(PcmError::BadConfig(format!("unknown field {id}")));
                }
            }
        }
        let Some(slave) = slave else {
            log::error!("plug {name}: slave is not defined");
            return Err(PcmError::BadConfig("slave is not defined".into()));
        };

        let spcm = resolver.open_slave(slave, stream, mode)?;
        Ok(Plug::open(name, ttable, spcm, true, converters))
    }
}
