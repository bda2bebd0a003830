use crate::error::NcResult;
use crate::params::ParameterDescriptor;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Append-only audit trail of every processed evaluation, and the seed source
/// for "continue from best" runs.
///
/// Row format: `Generation,Client,Value,<parameter values...>` with the
/// header written once. Writes open-append-close per row; a locked file (a
/// spreadsheet left open on it, another writer) is retried with a short fixed
/// backoff rather than surfaced, since each row is tiny and local.
pub struct EvaluationLog {
    path: PathBuf,
}

/// One parsed log row.
#[derive(Debug, Clone)]
pub struct EvaluationRow {
    pub generation: u32,
    pub client: String,
    pub value: f32,
    pub values: Vec<f32>,
}

const RETRY_BACKOFF: Duration = Duration::from_millis(10);

impl EvaluationLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(
        &self,
        generation: u32,
        client: &str,
        value: f32,
        parameters: &[ParameterDescriptor],
    ) -> NcResult<()> {
        loop {
            match self.try_append(generation, client, value, parameters) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("evaluation log append failed ({}), retrying", e);
                    std::thread::sleep(RETRY_BACKOFF);
                }
            }
        }
    }

    fn try_append(
        &self,
        generation: u32,
        client: &str,
        value: f32,
        parameters: &[ParameterDescriptor],
    ) -> std::io::Result<()> {
        let write_header = !self.path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if write_header {
            write!(file, "Generation,Client,Value")?;
            for p in parameters {
                write!(file, ",{}", p.name)?;
            }
            writeln!(file)?;
        }
        write!(file, "{},{},{}", generation, client, value)?;
        for p in parameters {
            write!(file, ",{}", p.current)?;
        }
        writeln!(file)
    }

    /// Read the whole log: the parameter names from the header and every
    /// well-formed row. Rows with the wrong width (another run's log, a torn
    /// write) are skipped.
    pub fn read_all(&self) -> NcResult<(Vec<String>, Vec<EvaluationRow>)> {
        let file = File::open(&self.path)?;
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(file);

        let names: Vec<String> = rdr
            .headers()?
            .iter()
            .skip(3)
            .map(|s| s.to_string())
            .collect();
        let dimensions = names.len();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            if record.len() != dimensions + 3 {
                continue;
            }
            let Ok(generation) = record[0].trim().parse::<u32>() else {
                continue;
            };
            let Ok(value) = record[2].trim().parse::<f32>() else {
                continue;
            };
            let mut values = Vec::with_capacity(dimensions);
            let mut ok = true;
            for i in 0..dimensions {
                match record[3 + i].trim().parse::<f32>() {
                    Ok(v) => values.push(v),
                    Err(_) => {
                        ok = false;
                        break;
                    }
                }
            }
            if ok {
                rows.push(EvaluationRow {
                    generation,
                    client: record[1].trim().to_string(),
                    value,
                    values,
                });
            }
        }
        Ok((names, rows))
    }

    /// Scan for the lowest-fitness row, returning its parameter values in
    /// column order. Rows with the wrong width (another run's log, a torn
    /// write) are skipped.
    pub fn best_row(&self, dimensions: usize) -> NcResult<Option<(f32, Vec<f32>)>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let file = File::open(&self.path)?;
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(file);

        let mut best: Option<(f32, Vec<f32>)> = None;
        for record in rdr.records() {
            let record = record?;
            if record.len() != dimensions + 3 {
                continue;
            }
            let Ok(value) = record[2].trim().parse::<f32>() else {
                continue;
            };
            if best.as_ref().is_none_or(|(b, _)| value < *b) {
                let mut values = Vec::with_capacity(dimensions);
                let mut ok = true;
                for i in 0..dimensions {
                    match record[3 + i].trim().parse::<f32>() {
                        Ok(v) => values.push(v),
                        Err(_) => {
                            ok = false;
                            break;
                        }
                    }
                }
                if ok {
                    best = Some((value, values));
                }
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, current: f32) -> ParameterDescriptor {
        ParameterDescriptor {
            name: name.to_string(),
            slot: 0,
            start: -10.0,
            stop: 10.0,
            current,
        }
    }

    #[test]
    fn header_is_written_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = EvaluationLog::new(dir.path().join("evaluation.csv"));
        let params = vec![descriptor("wait", 1.5), descriptor("walk", -0.5)];

        log.append(0, "worker-a", 42.0, &params).unwrap();
        log.append(0, "worker-b", 17.0, &params).unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Generation,Client,Value,wait,walk");
        assert_eq!(lines[1], "0,worker-a,42,1.5,-0.5");
    }

    #[test]
    fn best_row_returns_lowest_value() {
        let dir = tempfile::tempdir().unwrap();
        let log = EvaluationLog::new(dir.path().join("evaluation.csv"));
        let params = vec![descriptor("wait", 0.0)];

        let mut p = params.clone();
        p[0].current = 3.0;
        log.append(0, "w", 50.0, &p).unwrap();
        p[0].current = 7.0;
        log.append(1, "w", 12.5, &p).unwrap();
        p[0].current = 5.0;
        log.append(1, "w", 80.0, &p).unwrap();

        let (value, values) = log.best_row(1).unwrap().unwrap();
        assert_eq!(value, 12.5);
        assert_eq!(values, vec![7.0]);
    }

    #[test]
    fn read_all_recovers_names_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let log = EvaluationLog::new(dir.path().join("evaluation.csv"));
        let params = vec![descriptor("wait", 2.0), descriptor("walk", -1.0)];
        log.append(0, "worker-a", 40.0, &params).unwrap();
        log.append(1, "worker-b", 30.0, &params).unwrap();

        let (names, rows) = log.read_all().unwrap();
        assert_eq!(names, vec!["wait", "walk"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].generation, 1);
        assert_eq!(rows[1].client, "worker-b");
        assert_eq!(rows[1].values, vec![2.0, -1.0]);
    }

    #[test]
    fn best_row_on_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let log = EvaluationLog::new(dir.path().join("nope.csv"));
        assert!(log.best_row(2).unwrap().is_none());
    }
}
