use super::ErrorTally;
use crate::error::NcResult;
use crate::params::ParameterDescriptor;
use crate::transit::TransitLine;

/// Linear combination of two nested tallies:
/// `first * first_weight + second * second_weight`.
///
/// Typically used to fold line-level and region-level fitness into the single
/// scalar the search strategies need.
pub struct CombinationTally {
    pub first: Box<dyn ErrorTally>,
    pub first_weight: f32,
    pub second: Box<dyn ErrorTally>,
    pub second_weight: f32,
}

impl ErrorTally for CombinationTally {
    fn compute_error(
        &self,
        parameters: &[ParameterDescriptor],
        truth: &[TransitLine],
        predicted: &[TransitLine],
    ) -> NcResult<f32> {
        let first = self.first.compute_error(parameters, truth, predicted)?;
        let second = self.second.compute_error(parameters, truth, predicted)?;
        Ok(first * self.first_weight + second * self.second_weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(f32);

    impl ErrorTally for Constant {
        fn compute_error(
            &self,
            _parameters: &[ParameterDescriptor],
            _truth: &[TransitLine],
            _predicted: &[TransitLine],
        ) -> NcResult<f32> {
            Ok(self.0)
        }
    }

    #[test]
    fn weighted_sum_of_nested_tallies() {
        let tally = CombinationTally {
            first: Box::new(Constant(10.0)),
            first_weight: 2.0,
            second: Box::new(Constant(3.0)),
            second_weight: 0.5,
        };
        assert_eq!(tally.compute_error(&[], &[], &[]).unwrap(), 21.5);
    }
}
