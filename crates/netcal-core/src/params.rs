use crate::error::{NcResult, NetcalError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One tunable dimension of the search space.
///
/// `slot` routes the value into the external simulation (the adapter decides
/// what the number means). The descriptor set is immutable for a run; only
/// `current` moves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub slot: u32,
    pub start: f32,
    pub stop: f32,
    #[serde(default)]
    pub current: f32,
}

impl ParameterDescriptor {
    pub fn range(&self) -> f32 {
        self.stop - self.start
    }

    /// Clamp `current` back into `[start, stop]`.
    pub fn clamp(&mut self) {
        if self.current < self.start {
            self.current = self.start;
        } else if self.current > self.stop {
            self.current = self.stop;
        }
    }
}

#[derive(Deserialize)]
struct InstructionFile {
    parameters: Vec<InstructionEntry>,
}

#[derive(Deserialize)]
struct InstructionEntry {
    name: String,
    slot: u32,
    start: f32,
    stop: f32,
}

/// The canonical, order-stable parameter sequence used everywhere else.
///
/// Every clone made from this space keeps the same length and order, which is
/// what allows the positional mapping in crossover, serialization columns and
/// worker-side value application.
#[derive(Debug, Clone)]
pub struct ParameterSpace {
    descriptors: Vec<ParameterDescriptor>,
}

impl ParameterSpace {
    pub fn new(descriptors: Vec<ParameterDescriptor>) -> NcResult<Self> {
        if descriptors.is_empty() {
            return Err(NetcalError::Config(
                "parameter instruction set is empty".into(),
            ));
        }
        for d in &descriptors {
            if d.start > d.stop {
                return Err(NetcalError::Config(format!(
                    "parameter '{}' has start {} greater than stop {}",
                    d.name, d.start, d.stop
                )));
            }
        }
        Ok(Self { descriptors })
    }

    /// Load the declarative instruction file. Missing or malformed input is
    /// fatal: nothing downstream can run without the canonical ordering.
    pub fn load<P: AsRef<Path>>(path: P) -> NcResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            NetcalError::Config(format!(
                "parameter instruction file '{}' was not readable: {}",
                path.display(),
                e
            ))
        })?;
        let file: InstructionFile = serde_json::from_str(&raw).map_err(|e| {
            NetcalError::Config(format!(
                "parameter instruction file '{}' is malformed: {}",
                path.display(),
                e
            ))
        })?;
        let descriptors = file
            .parameters
            .into_iter()
            .map(|p| ParameterDescriptor {
                current: p.start,
                name: p.name,
                slot: p.slot,
                start: p.start,
                stop: p.stop,
            })
            .collect();
        Self::new(descriptors)
    }

    pub fn descriptors(&self) -> &[ParameterDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.descriptors.iter().map(|d| d.name.clone()).collect()
    }

    pub fn bounds(&self) -> Vec<(f32, f32)> {
        self.descriptors.iter().map(|d| (d.start, d.stop)).collect()
    }

    /// Fresh clone with each dimension drawn uniformly from its bounds.
    pub fn randomized(&self, rng: &mut fastrand::Rng) -> Vec<ParameterDescriptor> {
        let mut set = self.descriptors.clone();
        for d in &mut set {
            d.current = d.start + d.range() * rng.f32();
        }
        set
    }

    /// Map a received value vector onto a fresh descriptor clone by position.
    pub fn apply_values(&self, values: &[f32]) -> NcResult<Vec<ParameterDescriptor>> {
        if values.len() != self.descriptors.len() {
            return Err(NetcalError::Validation(format!(
                "received {} parameter values for a space of {} dimensions",
                values.len(),
                self.descriptors.len()
            )));
        }
        let mut set = self.descriptors.clone();
        for (d, &v) in set.iter_mut().zip(values) {
            d.current = v;
            d.clamp();
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_instructions(json: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(json.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_instruction_file_in_order() {
        let f = write_instructions(
            r#"{"parameters":[
                {"name":"wait_weight","slot":10,"start":0.0,"stop":3.0},
                {"name":"walk_weight","slot":11,"start":-1.0,"stop":1.0}
            ]}"#,
        );
        let space = ParameterSpace::load(f.path()).unwrap();
        assert_eq!(space.len(), 2);
        assert_eq!(space.descriptors()[0].name, "wait_weight");
        assert_eq!(space.descriptors()[1].slot, 11);
        // current initialises to start
        assert_eq!(space.descriptors()[0].current, 0.0);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = ParameterSpace::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, NetcalError::Config(_)));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let f = write_instructions(
            r#"{"parameters":[{"name":"x","slot":1,"start":2.0,"stop":1.0}]}"#,
        );
        assert!(ParameterSpace::load(f.path()).is_err());
    }

    #[test]
    fn apply_values_clamps_and_checks_length() {
        let f = write_instructions(
            r#"{"parameters":[{"name":"x","slot":1,"start":0.0,"stop":1.0}]}"#,
        );
        let space = ParameterSpace::load(f.path()).unwrap();
        let set = space.apply_values(&[5.0]).unwrap();
        assert_eq!(set[0].current, 1.0);
        assert!(space.apply_values(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn randomized_respects_bounds() {
        let f = write_instructions(
            r#"{"parameters":[{"name":"x","slot":1,"start":-4.0,"stop":-2.0}]}"#,
        );
        let space = ParameterSpace::load(f.path()).unwrap();
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..100 {
            let set = space.randomized(&mut rng);
            assert!(set[0].current >= -4.0 && set[0].current <= -2.0);
        }
    }
}
