use crate::error::{NcResult, NetcalError};
use crate::params::ParameterDescriptor;
use crate::transit::{self, TransitLine};
use serde::Serialize;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// The black-box simulation seam: accept a parameter vector, produce the
/// predicted transit-line boardings. Everything behind this trait (which
/// modelling package runs, how values reach it) is deliberately opaque to the
/// search core.
pub trait NetworkAssignment: Send + Sync {
    fn run_assignment(&self, parameters: &[ParameterDescriptor]) -> NcResult<Vec<TransitLine>>;
}

#[derive(Serialize)]
struct ExchangeEntry<'a> {
    name: &'a str,
    slot: u32,
    value: f32,
}

/// Adapter that drives an external simulation command: the parameter vector
/// is written to a JSON exchange file, the command runs, and its
/// predicted-boardings CSV is read back.
pub struct CommandAssignment {
    pub program: String,
    pub args: Vec<String>,
    /// Where the parameter vector is written before each run.
    pub input_file: PathBuf,
    /// Where the command leaves its predicted boardings.
    pub output_file: PathBuf,
}

impl CommandAssignment {
    fn write_input(&self, parameters: &[ParameterDescriptor]) -> NcResult<()> {
        let entries: Vec<ExchangeEntry> = parameters
            .iter()
            .map(|p| ExchangeEntry {
                name: &p.name,
                slot: p.slot,
                value: p.current,
            })
            .collect();
        let json = serde_json::to_string_pretty(&entries)?;
        std::fs::write(&self.input_file, json)?;
        Ok(())
    }
}

impl NetworkAssignment for CommandAssignment {
    fn run_assignment(&self, parameters: &[ParameterDescriptor]) -> NcResult<Vec<TransitLine>> {
        self.write_input(parameters)?;
        debug!(program = %self.program, "running assignment");
        let status = Command::new(&self.program).args(&self.args).status()?;
        if !status.success() {
            return Err(NetcalError::Validation(format!(
                "assignment command '{}' exited with {}",
                self.program, status
            )));
        }
        transit::load_predicted(&self.output_file)
    }
}
