//! Conversion-stage factories.

use pk_core::{error::Result, format::SampleFormat};

use crate::{pcm::SharedPcm, route::RouteMatrix};

/// Factories for the conversion collaborators an adaptation chain
/// composes.
///
/// Each factory wraps `slave` in a new node performing one conversion
/// dimension and returns the wrapper; on failure the slave is untouched
/// and stays with the caller. `slave_format` (and the other
/// slave-side arguments) describe the configuration the *downstream*
/// side of the new node speaks. `close_slave` tells the wrapper whether
/// closing it must close its slave too.
///
/// The sample kernels behind these nodes live outside this workspace; an
/// implementation is injected where a chain-building node is constructed.
pub trait ConverterSet {
    /// Linear integer (and float) format conversion.
    fn open_linear(
        &mut self,
        name: Option<&str>,
        slave_format: SampleFormat,
        slave: SharedPcm,
        close_slave: bool,
    ) -> Result<SharedPcm>;

    /// Mu-Law companding and expansion.
    fn open_mulaw(
        &mut self,
        name: Option<&str>,
        slave_format: SampleFormat,
        slave: SharedPcm,
        close_slave: bool,
    ) -> Result<SharedPcm>;

    /// A-Law companding and expansion.
    fn open_alaw(
        &mut self,
        name: Option<&str>,
        slave_format: SampleFormat,
        slave: SharedPcm,
        close_slave: bool,
    ) -> Result<SharedPcm>;

    /// IMA ADPCM compression and expansion.
    fn open_adpcm(
        &mut self,
        name: Option<&str>,
        slave_format: SampleFormat,
        slave: SharedPcm,
        close_slave: bool,
    ) -> Result<SharedPcm>;

    /// Rate conversion at `slave_rate` on the downstream side.
    fn open_rate(
        &mut self,
        name: Option<&str>,
        slave_format: SampleFormat,
        slave_rate: u32,
        slave: SharedPcm,
        close_slave: bool,
    ) -> Result<SharedPcm>;

    /// Channel routing through `ttable` onto `slave_channels` downstream
    /// channels.
    fn open_route(
        &mut self,
        name: Option<&str>,
        slave_format: SampleFormat,
        slave_channels: u32,
        ttable: RouteMatrix,
        slave: SharedPcm,
        close_slave: bool,
    ) -> Result<SharedPcm>;

    /// Access-layout repacking.
    fn open_copy(
        &mut self,
        name: Option<&str>,
        slave: SharedPcm,
        close_slave: bool,
    ) -> Result<SharedPcm>;
}
