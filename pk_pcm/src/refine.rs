//! Two-way client/slave parameter refinement.
//!
//! A node that adapts between a client-side and a slave-side parameter
//! space implements [`SlaveRefine`]; [`refine_with_slave`] drives the two
//! passes until both blocks describe a consistent feasible set.

use pk_core::error::Result;

use crate::hwparams::HwParams;

/// The hooks a two-sided node specializes.
pub trait SlaveRefine {
    /// Adjust the client block before anything else happens.
    fn cprepare(&mut self, params: &mut HwParams) -> Result<()>;

    /// Initialize the slave block.
    fn sprepare(&mut self, sparams: &mut HwParams) -> Result<()>;

    /// Project client constraints onto the slave block.
    fn schange(&mut self, params: &mut HwParams, sparams: &mut HwParams) -> Result<()>;

    /// Project slave constraints back onto the client block.
    fn cchange(&mut self, params: &mut HwParams, sparams: &mut HwParams) -> Result<()>;

    /// Refine the slave block against the downstream device.
    fn srefine(&mut self, sparams: &mut HwParams) -> Result<()>;
}

/// Bring a client block and a freshly prepared slave block to a
/// consistent feasible set.
///
/// An error in any hook aborts the whole refine; when the slave-side
/// refine fails, the client block still receives the back-projection so
/// the caller can see what the slave would have accepted.
pub fn refine_with_slave(ops: &mut dyn SlaveRefine, params: &mut HwParams) -> Result<()> {
    ops.cprepare(params)?;
    let mut sparams = HwParams::any();
    ops.sprepare(&mut sparams)?;
    ops.schange(params, &mut sparams)?;
    if let Err(err) = ops.srefine(&mut sparams) {
        let _ = ops.cchange(params, &mut sparams);
        return Err(err);
    }
    ops.cchange(params, &mut sparams)?;
    params.refine_soft()
}
