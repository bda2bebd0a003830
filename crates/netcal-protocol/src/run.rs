use serde::Serialize;
use sha2::{Digest, Sha256};

/// Stable identity of an estimation run.
///
/// Hashed from the parameter space and the strategy configuration so that a
/// worker started against a different instruction file (or a host restarted
/// with different settings) is refused instead of silently contributing
/// mismatched vectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIdentifier {
    pub hash: String,
}

impl RunIdentifier {
    pub fn from_parts<S: Serialize>(
        parameter_names: &[String],
        bounds: &[(f32, f32)],
        strategy_label: &str,
        strategy_config: &S,
    ) -> Self {
        let mut hasher = Sha256::new();
        for name in parameter_names {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
        }
        for (start, stop) in bounds {
            hasher.update(start.to_le_bytes());
            hasher.update(stop.to_le_bytes());
        }
        hasher.update(strategy_label.as_bytes());
        let config_json =
            serde_json::to_string(strategy_config).expect("strategy config must serialize");
        hasher.update(config_json.as_bytes());

        Self {
            hash: hex::encode(hasher.finalize()),
        }
    }
}
