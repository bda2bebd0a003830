use crate::error::{NcResult, NetcalError};
use std::fs::File;
use std::path::Path;

/// A transit line aggregate, either observed ("truth") or produced by one
/// simulation run ("predicted").
///
/// Truth lines can carry several ids after the alias map is applied; predicted
/// lines usually carry exactly one.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitLine {
    pub ids: Vec<String>,
    pub boardings: f32,
    pub mode: char,
}

/// A predicted line that matched no truth line. Tracked for diagnostics,
/// excluded from every tally.
#[derive(Debug, Clone, PartialEq)]
pub struct Orphan {
    pub id: String,
    pub boardings: f32,
}

/// Load the observed-boardings ground truth. Columns: `boardings,line-id[,mode]`.
/// Duplicate line ids indicate an unusable dataset and abort the run.
pub fn load_truth<P: AsRef<Path>>(path: P) -> NcResult<Vec<TransitLine>> {
    let file = File::open(path.as_ref())?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(file);

    let mut truth: Vec<TransitLine> = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        if record.len() < 2 {
            continue;
        }
        let boardings: f32 = record[0].trim().parse().map_err(|_| {
            NetcalError::Validation(format!(
                "truth row {} has a non-numeric boardings value '{}'",
                row + 1,
                &record[0]
            ))
        })?;
        let id = record[1].trim().to_string();
        if id.is_empty() {
            continue;
        }
        let mode = if record.len() > 2 {
            record[2].trim().chars().next().unwrap_or('b')
        } else {
            'b'
        };
        for (j, existing) in truth.iter().enumerate() {
            if existing.ids[0] == id {
                return Err(NetcalError::Validation(format!(
                    "the truth record {} at line {} has a duplicate entry on line {}",
                    id,
                    j + 1,
                    row + 1
                )));
            }
        }
        truth.push(TransitLine {
            ids: vec![id],
            boardings,
            mode,
        });
    }
    Ok(truth)
}

/// Load a predicted-boardings file from one simulation run.
/// Columns: `line-id,boardings[,mode]`.
pub fn load_predicted<P: AsRef<Path>>(path: P) -> NcResult<Vec<TransitLine>> {
    let file = File::open(path.as_ref())?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(file);

    let mut lines = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if record.len() < 2 {
            continue;
        }
        let id = record[0].trim().to_string();
        if id.is_empty() {
            continue;
        }
        let Ok(boardings) = record[1].trim().parse::<f32>() else {
            continue;
        };
        let mode = if record.len() > 2 {
            record[2].trim().chars().next().unwrap_or('b')
        } else {
            'b'
        };
        lines.push(TransitLine {
            ids: vec![id],
            boardings,
            mode,
        });
    }
    Ok(lines)
}

/// Replace each truth line's id with the set of network aliases mapped to it.
/// Columns of the alias map: `truth-id,network-id` (many rows per truth id).
/// A truth line that ends up with no aliases is fatal: it could never be
/// matched against any simulation output.
pub fn apply_alias_map<P: AsRef<Path>>(truth: &mut [TransitLine], path: P) -> NcResult<()> {
    let file = File::open(path.as_ref())?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(file);

    let mut aliases: Vec<Vec<String>> = vec![Vec::new(); truth.len()];
    for record in rdr.records() {
        let record = record?;
        if record.len() < 2 {
            continue;
        }
        let truth_id = record[0].trim();
        let network_id = record[1].trim().to_string();
        for (i, line) in truth.iter().enumerate() {
            if line.ids[0] == truth_id {
                aliases[i].push(network_id);
                break;
            }
        }
    }

    for (line, mapped) in truth.iter_mut().zip(aliases) {
        if mapped.is_empty() {
            return Err(NetcalError::Validation(format!(
                "the truth record {} has no network lines associated with it",
                line.ids[0]
            )));
        }
        line.ids = mapped;
    }
    Ok(())
}

/// Aggregate predicted boardings onto the truth lines by alias-set
/// intersection. The first matching truth line wins; predicted lines that
/// match nothing are returned as orphans.
pub fn aggregate_onto_truth(
    truth: &[TransitLine],
    predicted: &[TransitLine],
) -> (Vec<f32>, Vec<Orphan>) {
    let mut agg = vec![0.0f32; truth.len()];
    let mut orphans = Vec::new();
    for line in predicted {
        let mut matched = false;
        for (j, truth_line) in truth.iter().enumerate() {
            if line.ids.iter().any(|id| truth_line.ids.contains(id)) {
                agg[j] += line.boardings;
                matched = true;
                break;
            }
        }
        if !matched {
            orphans.push(Orphan {
                id: line.ids[0].clone(),
                boardings: line.boardings,
            });
        }
    }
    (agg, orphans)
}
