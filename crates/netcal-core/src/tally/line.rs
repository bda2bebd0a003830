use super::ErrorTally;
use crate::config::TallyWeights;
use crate::error::NcResult;
use crate::params::ParameterDescriptor;
use crate::transit::{aggregate_onto_truth, TransitLine};

/// Line-level error: predicted boardings are aggregated onto each truth line
/// by alias membership, then the per-line errors are folded into
/// `rmse_weight * sum(e^2) + mabs_weight * sum(|e|) + terror_weight * sum(e)`.
///
/// The squared-error term is the raw sum, not a mean. Downstream weights were
/// tuned against that accumulation, so it stays.
pub struct LineTally {
    pub weights: TallyWeights,
}

impl LineTally {
    pub fn new(weights: TallyWeights) -> Self {
        Self { weights }
    }
}

impl ErrorTally for LineTally {
    fn compute_error(
        &self,
        _parameters: &[ParameterDescriptor],
        truth: &[TransitLine],
        predicted: &[TransitLine],
    ) -> NcResult<f32> {
        let (agg, _orphans) = aggregate_onto_truth(truth, predicted);

        let mut squared = 0.0f64;
        let mut absolute = 0.0f64;
        let mut signed = 0.0f64;
        for (truth_line, &predicted_sum) in truth.iter().zip(&agg) {
            let error = if self.weights.percent_error {
                // zero truth divides to infinity, which is the intended
                // "this candidate is bad" signal, not a crash
                ((predicted_sum - truth_line.boardings) / truth_line.boardings).abs()
            } else {
                predicted_sum - truth_line.boardings
            };
            let error = error as f64;
            squared += error * error;
            absolute += error.abs();
            signed += error;
        }

        Ok((self.weights.rmse_weight as f64 * squared
            + self.weights.mabs_weight as f64 * absolute
            + self.weights.terror_weight as f64 * signed) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, boardings: f32) -> TransitLine {
        TransitLine {
            ids: vec![id.to_string()],
            boardings,
            mode: 'b',
        }
    }

    fn weights(rmse: f32, mabs: f32, terror: f32) -> TallyWeights {
        TallyWeights {
            rmse_weight: rmse,
            mabs_weight: mabs,
            terror_weight: terror,
            percent_error: false,
        }
    }

    #[test]
    fn squared_error_term_is_a_sum_not_a_mean() {
        let truth = vec![line("A", 100.0), line("B", 200.0)];
        let predicted = vec![line("A", 110.0), line("B", 190.0)];
        let tally = LineTally::new(weights(1.0, 0.0, 0.0));
        let value = tally.compute_error(&[], &truth, &predicted).unwrap();
        // errors {10, -10} -> squared {100, 100} -> 200
        assert_eq!(value, 200.0);
    }

    #[test]
    fn mabs_and_terror_terms() {
        let truth = vec![line("A", 100.0), line("B", 200.0)];
        let predicted = vec![line("A", 110.0), line("B", 190.0)];

        let mabs = LineTally::new(weights(0.0, 1.0, 0.0));
        assert_eq!(mabs.compute_error(&[], &truth, &predicted).unwrap(), 20.0);

        // +10 and -10 cancel in the signed total
        let terror = LineTally::new(weights(0.0, 0.0, 1.0));
        assert_eq!(terror.compute_error(&[], &truth, &predicted).unwrap(), 0.0);
    }

    #[test]
    fn percent_error_with_zero_truth_is_infinite() {
        let truth = vec![line("A", 0.0)];
        let predicted = vec![line("A", 50.0)];
        let tally = LineTally::new(TallyWeights {
            percent_error: true,
            ..weights(1.0, 0.0, 0.0)
        });
        let value = tally.compute_error(&[], &truth, &predicted).unwrap();
        assert!(value.is_infinite());
    }

    #[test]
    fn unmatched_predicted_lines_are_dropped() {
        let truth = vec![line("A", 100.0)];
        let predicted = vec![line("A", 100.0), line("Z", 9999.0)];
        let tally = LineTally::new(weights(1.0, 1.0, 1.0));
        assert_eq!(tally.compute_error(&[], &truth, &predicted).unwrap(), 0.0);
    }
}
