//! Channel-route transfer matrices.
//!
//! A route matrix assigns a gain to every (client channel, slave channel)
//! pair. The route kernel that applies it is a collaborator behind
//! [`crate::convert::ConverterSet`]; this module owns the value type and
//! the configuration loader.

use pk_core::error::{PcmError, Result};
use serde_json::Value;

/// Gain of one matrix entry, in fixed point.
pub type RouteWeight = i32;

/// Unit gain for a route-matrix entry.
pub const FULL: RouteWeight = 0x10000;

/// Largest channel index a configuration matrix may address.
pub const MAX_CHANNELS: usize = 32;

/// A `cused x sused` gain rectangle inside a stride-addressed buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatrix {
    weights: Vec<RouteWeight>,
    stride: usize,
    cused: usize,
    sused: usize,
}

impl RouteMatrix {
    /// An all-zero matrix with the given used rectangle.
    ///
    /// # Panics
    /// Panics when either dimension is 0.
    pub fn zeroed(cused: usize, sused: usize) -> Self {
        assert!(cused > 0 && sused > 0);
        Self {
            weights: vec![0; cused * sused],
            stride: sused,
            cused,
            sused,
        }
    }

    /// Gain routed from client channel `client` to slave channel `slave`.
    ///
    /// # Panics
    /// Panics when an index is outside the used rectangle.
    pub fn get(&self, client: usize, slave: usize) -> RouteWeight {
        assert!(client < self.cused && slave < self.sused);
        self.weights[client * self.stride + slave]
    }

    /// Set the gain routed from `client` to `slave`.
    ///
    /// # Panics
    /// Panics when an index is outside the used rectangle.
    pub fn set(&mut self, client: usize, slave: usize, weight: RouteWeight) {
        assert!(client < self.cused && slave < self.sused);
        self.weights[client * self.stride + slave] = weight;
    }

    /// Client channels covered by the matrix.
    #[inline]
    pub fn cused(&self) -> usize {
        self.cused
    }

    /// Slave channels covered by the matrix.
    #[inline]
    pub fn sused(&self) -> usize {
        self.sused
    }

    /// Load a matrix from a `ttable` configuration compound.
    ///
    /// The tree maps client-channel indices to `{slave channel: gain}`
    /// rows; gains are real values scaled by [`FULL`]. The backing buffer
    /// is always [`MAX_CHANNELS`]`x`[`MAX_CHANNELS`], with the used
    /// rectangle derived from the largest indices present.
    pub fn from_config(tree: &Value) -> Result<Self> {
        let rows = tree.as_object().ok_or_else(|| {
            log::error!("ttable: invalid type, expected a compound");
            PcmError::BadConfig("invalid type for ttable".into())
        })?;
        let mut matrix = Self {
            weights: vec![0; MAX_CHANNELS * MAX_CHANNELS],
            stride: MAX_CHANNELS,
            cused: 0,
            sused: 0,
        };
        for (cid, row) in rows {
            let client = parse_channel_index(cid)?;
            let cols = row.as_object().ok_or_else(|| {
                log::error!("ttable: invalid row for client channel {client}");
                PcmError::BadConfig(format!("invalid ttable row {client}"))
            })?;
            for (sid, gain) in cols {
                let slave = parse_channel_index(sid)?;
                let gain = gain.as_f64().ok_or_else(|| {
                    log::error!("ttable: invalid gain for {client}.{slave}");
                    PcmError::BadConfig(format!("invalid ttable gain {client}.{slave}"))
                })?;
                if !(0.0..=1.0).contains(&gain) {
                    log::error!("ttable: gain {gain} out of range for {client}.{slave}");
                    return Err(PcmError::BadConfig(format!(
                        "ttable gain out of range {client}.{slave}"
                    )));
                }
                matrix.weights[client * MAX_CHANNELS + slave] = (gain * FULL as f64).round() as RouteWeight;
                matrix.cused = matrix.cused.max(client + 1);
                matrix.sused = matrix.sused.max(slave + 1);
            }
        }
        if matrix.cused == 0 || matrix.sused == 0 {
            log::error!("ttable: no entries");
            return Err(PcmError::BadConfig("empty ttable".into()));
        }
        Ok(matrix)
    }
}

fn parse_channel_index(id: &str) -> Result<usize> {
    let index: usize = id.parse().map_err(|_| {
        log::error!("ttable: invalid channel index {id}");
        PcmError::BadConfig(format!("invalid ttable channel {id}"))
    })?;
    if index >= MAX_CHANNELS {
        log::error!("ttable: channel index {index} out of range");
        return Err(PcmError::BadConfig(format!("ttable channel {index} out of range")));
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zeroed_dimensions() {
        let m = RouteMatrix::zeroed(4, 2);
        assert_eq!(m.cused(), 4);
        assert_eq!(m.sused(), 2);
        assert_eq!(m.get(3, 1), 0);
    }

    #[test]
    #[should_panic]
    fn test_zeroed_rejects_empty() {
        let _ = RouteMatrix::zeroed(0, 2);
    }

    #[test]
    fn test_set_get_round_trip() {
        let mut m = RouteMatrix::zeroed(2, 2);
        m.set(0, 1, FULL / 2);
        assert_eq!(m.get(0, 1), FULL / 2);
        assert_eq!(m.get(1, 0), 0);
    }

    #[test]
    fn test_from_config_scales_by_full() {
        let tree = json!({
            "0": { "0": 1 },
            "1": { "1": 0.5 },
        });
        let m = RouteMatrix::from_config(&tree).unwrap();
        assert_eq!(m.cused(), 2);
        assert_eq!(m.sused(), 2);
        assert_eq!(m.get(0, 0), FULL);
        assert_eq!(m.get(1, 1), FULL / 2);
        assert_eq!(m.get(0, 1), 0);
    }

    #[test]
    fn test_from_config_rejects_bad_trees() {
        assert!(RouteMatrix::from_config(&json!(42)).is_err());
        assert!(RouteMatrix::from_config(&json!({ "x": { "0": 1 } })).is_err());
        assert!(RouteMatrix::from_config(&json!({ "0": { "0": 1.5 } })).is_err());
        assert!(RouteMatrix::from_config(&json!({ "0": { "64": 1 } })).is_err());
        assert!(RouteMatrix::from_config(&json!({})).is_err());
    }
}
