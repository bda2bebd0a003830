use super::ErrorTally;
use crate::config::TallyWeights;
use crate::error::{NcResult, NetcalError};
use crate::params::ParameterDescriptor;
use crate::transit::TransitLine;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// Region key: the line's mode together with the first character of its
/// primary alias (a coarse geographic/operator bucket in most networks).
type RegionKey = (char, char);

/// Appends one audit row per tally call for offline inspection. Owns its own
/// call sequence so concurrent tallies never share a hidden counter.
pub struct AuditLog {
    path: PathBuf,
    sequence: Mutex<u64>,
}

impl AuditLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            sequence: Mutex::new(0),
        }
    }

    fn append(&self, errors: &BTreeMap<RegionKey, f32>) -> NcResult<()> {
        let mut sequence = self.sequence.lock().expect("audit sequence poisoned");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        write!(file, "{}", *sequence)?;
        for ((mode, head), error) in errors {
            write!(file, ",{}{}:{}", mode, head, error)?;
        }
        writeln!(file)?;
        *sequence += 1;
        Ok(())
    }
}

/// Region-level error: truth and predicted boardings are both bucketed by
/// region key, and the same weighted sum as the line tally is computed over
/// the per-region errors.
pub struct RegionTally {
    pub weights: TallyWeights,
    pub audit: Option<AuditLog>,
}

impl RegionTally {
    pub fn new(weights: TallyWeights) -> Self {
        Self {
            weights,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    fn region_of(line: &TransitLine) -> NcResult<RegionKey> {
        let head = line
            .ids
            .first()
            .and_then(|id| id.chars().next())
            .ok_or_else(|| {
                NetcalError::Validation(format!(
                    "a truth record with boardings {} has an empty or missing alias; \
                     the input dataset is unusable",
                    line.boardings
                ))
            })?;
        Ok((line.mode, head))
    }
}

impl ErrorTally for RegionTally {
    fn compute_error(
        &self,
        _parameters: &[ParameterDescriptor],
        truth: &[TransitLine],
        predicted: &[TransitLine],
    ) -> NcResult<f32> {
        let mut truth_regions: BTreeMap<RegionKey, f32> = BTreeMap::new();
        for line in truth {
            *truth_regions.entry(Self::region_of(line)?).or_default() += line.boardings;
        }

        let mut predicted_regions: BTreeMap<RegionKey, f32> = BTreeMap::new();
        for line in predicted {
            // predicted lines always come out of the parser with one alias;
            // anything else is still only aggregated, never fatal
            if let Some(head) = line.ids.first().and_then(|id| id.chars().next()) {
                *predicted_regions.entry((line.mode, head)).or_default() += line.boardings;
            }
        }

        let mut squared = 0.0f64;
        let mut absolute = 0.0f64;
        let mut signed = 0.0f64;
        let mut region_errors: BTreeMap<RegionKey, f32> = BTreeMap::new();
        for (key, &truth_sum) in &truth_regions {
            let predicted_sum = predicted_regions.get(key).copied().unwrap_or(0.0);
            let error = if self.weights.percent_error {
                ((predicted_sum - truth_sum) / truth_sum).abs()
            } else {
                predicted_sum - truth_sum
            };
            region_errors.insert(*key, error);
            let error = error as f64;
            squared += error * error;
            absolute += error.abs();
            signed += error;
        }

        if let Some(audit) = &self.audit {
            audit.append(&region_errors)?;
        }

        Ok((self.weights.rmse_weight as f64 * squared
            + self.weights.mabs_weight as f64 * absolute
            + self.weights.terror_weight as f64 * signed) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, boardings: f32, mode: char) -> TransitLine {
        TransitLine {
            ids: vec![id.to_string()],
            boardings,
            mode,
        }
    }

    fn sum_weights() -> TallyWeights {
        TallyWeights {
            rmse_weight: 0.0,
            mabs_weight: 1.0,
            terror_weight: 0.0,
            percent_error: false,
        }
    }

    #[test]
    fn buckets_by_mode_and_leading_character() {
        // N-prefixed bus lines form one region, S-prefixed another
        let truth = vec![
            line("N12", 100.0, 'b'),
            line("N40", 50.0, 'b'),
            line("S01", 30.0, 's'),
        ];
        let predicted = vec![
            line("N12", 120.0, 'b'),
            line("N40", 40.0, 'b'),
            line("S01", 25.0, 's'),
        ];
        let tally = RegionTally::new(sum_weights());
        // region ('b','N'): |160 - 150| = 10; region ('s','S'): |25 - 30| = 5
        let value = tally.compute_error(&[], &truth, &predicted).unwrap();
        assert_eq!(value, 15.0);
    }

    #[test]
    fn empty_alias_is_fatal() {
        let truth = vec![TransitLine {
            ids: vec![],
            boardings: 10.0,
            mode: 'b',
        }];
        let tally = RegionTally::new(sum_weights());
        let err = tally.compute_error(&[], &truth, &[]).unwrap_err();
        assert!(matches!(err, NetcalError::Validation(_)));
    }

    #[test]
    fn audit_rows_carry_a_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("region_audit.csv");
        let tally =
            RegionTally::new(sum_weights()).with_audit(AuditLog::new(path.clone()));
        let truth = vec![line("N12", 100.0, 'b')];
        let predicted = vec![line("N12", 90.0, 'b')];
        tally.compute_error(&[], &truth, &predicted).unwrap();
        tally.compute_error(&[], &truth, &predicted).unwrap();

        let contents = std::fs::read_to_string(path).unwrap();
        let rows: Vec<&str> = contents.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("0,"));
        assert!(rows[1].starts_with("1,"));
    }
}
