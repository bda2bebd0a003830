use crate::error::NcResult;
use crate::evallog::EvaluationLog;
use crate::params::ParameterDescriptor;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Seed a kernel before descent. Priority order: resume from the best row of
/// a prior evaluation log, then an explicit initial-values file, then uniform
/// random per dimension.
pub fn seed_kernel(
    kernel: &mut [ParameterDescriptor],
    rng: &mut fastrand::Rng,
    continue_from_best: bool,
    evaluation_file: Option<&str>,
    initial_values: Option<&str>,
) -> NcResult<()> {
    if continue_from_best {
        if let Some(path) = evaluation_file {
            if Path::new(path).exists() {
                let log = EvaluationLog::new(path);
                if let Some((value, values)) = log.best_row(kernel.len())? {
                    info!(value, "resuming kernel from best prior evaluation");
                    for (d, &v) in kernel.iter_mut().zip(&values) {
                        d.current = v;
                        d.clamp();
                    }
                    return Ok(());
                }
            }
        }
    }

    if let Some(path) = initial_values {
        if Path::new(path).exists() {
            let raw = std::fs::read_to_string(path)?;
            let named: HashMap<String, f32> = serde_json::from_str(&raw)?;
            for d in kernel.iter_mut() {
                if let Some(&v) = named.get(&d.name) {
                    d.current = v;
                    d.clamp();
                }
            }
            return Ok(());
        }
    }

    for d in kernel.iter_mut() {
        d.current = d.start + (d.stop - d.start) * rng.f32();
    }
    Ok(())
}
