use crate::assignment::NetworkAssignment;
use crate::error::NcResult;
use crate::params::ParameterDescriptor;
use crate::tally::ErrorTally;
use crate::transit::TransitLine;
use std::sync::Mutex;
use tracing::info;

/// Glues the black-box assignment to the error tallies: one call runs the
/// simulation and folds every tally into the single scalar the search
/// strategies consume. Improvements over the best-seen fitness are logged.
pub struct EvaluationPipeline {
    assignment: Box<dyn NetworkAssignment>,
    tallies: Vec<Box<dyn ErrorTally>>,
    truth: Vec<TransitLine>,
    best: Mutex<f32>,
}

impl EvaluationPipeline {
    pub fn new(
        assignment: Box<dyn NetworkAssignment>,
        tallies: Vec<Box<dyn ErrorTally>>,
        truth: Vec<TransitLine>,
    ) -> Self {
        Self {
            assignment,
            tallies,
            truth,
            best: Mutex::new(f32::MAX),
        }
    }

    pub fn truth(&self) -> &[TransitLine] {
        &self.truth
    }

    pub fn evaluate(&self, parameters: &[ParameterDescriptor]) -> NcResult<f32> {
        let predicted = self.assignment.run_assignment(parameters)?;
        let mut sum = 0.0f32;
        for tally in &self.tallies {
            sum += tally.compute_error(parameters, &self.truth, &predicted)?;
        }
        let mut best = self.best.lock().expect("best fitness lock poisoned");
        if sum < *best {
            *best = sum;
            info!(fitness = sum, "new best evaluation");
        }
        Ok(sum)
    }

    pub fn best_seen(&self) -> f32 {
        *self.best.lock().expect("best fitness lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TallyWeights;
    use crate::tally::LineTally;

    struct FixedAssignment {
        lines: Vec<TransitLine>,
    }

    impl NetworkAssignment for FixedAssignment {
        fn run_assignment(
            &self,
            _parameters: &[ParameterDescriptor],
        ) -> NcResult<Vec<TransitLine>> {
            Ok(self.lines.clone())
        }
    }

    fn line(id: &str, boardings: f32) -> TransitLine {
        TransitLine {
            ids: vec![id.to_string()],
            boardings,
            mode: 'b',
        }
    }

    #[test]
    fn sums_all_tallies_and_tracks_best() {
        let truth = vec![line("A", 100.0)];
        let predicted = vec![line("A", 110.0)];
        let weights = TallyWeights {
            rmse_weight: 1.0,
            mabs_weight: 0.0,
            terror_weight: 0.0,
            percent_error: false,
        };
        let pipeline = EvaluationPipeline::new(
            Box::new(FixedAssignment { lines: predicted }),
            vec![
                Box::new(LineTally::new(weights.clone())),
                Box::new(LineTally::new(weights)),
            ],
            truth,
        );
        let params: Vec<ParameterDescriptor> = Vec::new();
        let value = pipeline.evaluate(&params).unwrap();
        assert_eq!(value, 200.0);
        assert_eq!(pipeline.best_seen(), 200.0);
    }
}
