pub mod combination;
pub mod line;
pub mod period;
pub mod region;

pub use combination::CombinationTally;
pub use line::LineTally;
pub use period::PeriodRmse;
pub use region::{AuditLog, RegionTally};

use crate::error::NcResult;
use crate::params::ParameterDescriptor;
use crate::transit::TransitLine;

/// A pluggable fitness function over one simulation run. Lower is better.
///
/// Arithmetic edge cases (a zero-boardings truth line under percent error)
/// produce infinity rather than an error: an infinite fitness naturally loses
/// every comparison, which is exactly the signal wanted. Errors are reserved
/// for unusable input data.
pub trait ErrorTally: Send + Sync {
    fn compute_error(
        &self,
        parameters: &[ParameterDescriptor],
        truth: &[TransitLine],
        predicted: &[TransitLine],
    ) -> NcResult<f32>;
}
