//! Persistence of finished bands.
//!
//! A sink receives the interior rows of one band (ghost rows are trimmed)
//! together with the index of the worker that owns it. Bands are written
//! independently, one stream per worker.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::{concatenate, Array2, ArrayView2, Axis, ShapeError};
use thiserror::Error;

/// Errors from result sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Bands cannot be assembled: {0}")]
    Shape(#[from] ShapeError),

    #[error("No band received from worker {0}")]
    MissingBand(usize),
}

/// Receives the final band of a worker.
pub trait ResultSink {
    fn write_band(&mut self, rank: usize, band: ArrayView2<'_, f64>) -> Result<(), SinkError>;
}

/// Write `field` as comma-separated rows with two decimals.
pub fn write_csv<W: Write>(writer: &mut W, field: ArrayView2<'_, f64>) -> io::Result<()> {
    for row in field.rows() {
        let mut first = true;
        for value in row {
            if !first {
                write!(writer, ",")?;
            }
            write!(writer, "{:.2}", value)?;
            first = false;
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Write `field` as CSV to a file, creating parent directories.
pub fn write_csv_file(path: &Path, field: ArrayView2<'_, f64>) -> Result<(), SinkError> {
    let io_err = |source: io::Error| SinkError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    write_csv(&mut writer, field).map_err(io_err)?;
    writer.flush().map_err(io_err)
}

/// Writes each band to `heat_output_rank{k}.csv` in a directory.
#[derive(Debug, Clone)]
pub struct CsvDirectorySink {
    directory: PathBuf,
    written: Vec<PathBuf>,
}

impl CsvDirectorySink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            written: Vec::new(),
        }
    }

    /// File name used for the band of worker `rank`.
    pub fn file_name(rank: usize) -> String {
        format!("heat_output_rank{}.csv", rank)
    }

    pub fn path_for(&self, rank: usize) -> PathBuf {
        self.directory.join(Self::file_name(rank))
    }

    /// Files written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl ResultSink for CsvDirectorySink {
    fn write_band(&mut self, rank: usize, band: ArrayView2<'_, f64>) -> Result<(), SinkError> {
        let path = self.path_for(rank);
        write_csv_file(&path, band)?;
        log::info!("Worker {}: band saved to {}", rank, path.display());
        self.written.push(path);
        Ok(())
    }
}

/// Keeps bands in memory, keyed by worker index.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    bands: BTreeMap<usize, Array2<f64>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn band(&self, rank: usize) -> Option<&Array2<f64>> {
        self.bands.get(&rank)
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Stack the bands of workers `0..workers` into the global field.
    pub fn assemble(&self, workers: usize) -> Result<Array2<f64>, SinkError> {
        let views = (0..workers)
            .map(|rank| {
                self.bands
                    .get(&rank)
                    .map(|band| band.view())
                    .ok_or(SinkError::MissingBand(rank))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(concatenate(Axis(0), &views)?)
    }
}

impl ResultSink for MemorySink {
    fn write_band(&mut self, rank: usize, band: ArrayView2<'_, f64>) -> Result<(), SinkError> {
        self.bands.insert(rank, band.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_csv_two_decimals() {
        let field = array![[100.0, 12.346, 0.0], [75.0, 1.0 / 3.0, 25.0]];
        let mut out = Vec::new();
        write_csv(&mut out, field.view()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "100.00,12.35,0.00\n75.00,0.33,25.00\n"
        );
    }

    #[test]
    fn test_file_names_follow_worker_index() {
        let sink = CsvDirectorySink::new("out");
        assert_eq!(CsvDirectorySink::file_name(3), "heat_output_rank3.csv");
        assert_eq!(sink.path_for(0), Path::new("out").join("heat_output_rank0.csv"));
    }

    #[test]
    fn test_csv_directory_sink_writes_file() {
        let dir = std::env::temp_dir().join(format!("heatband-sink-{}", std::process::id()));
        let mut sink = CsvDirectorySink::new(&dir);
        sink.write_band(1, array![[1.0, 2.5]].view()).unwrap();

        let path = dir.join("heat_output_rank1.csv");
        assert_eq!(sink.written(), &[path.clone()]);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1.00,2.50\n");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_memory_sink_assembles_in_rank_order() {
        let mut sink = MemorySink::new();
        sink.write_band(1, array![[3.0, 4.0]].view()).unwrap();
        sink.write_band(0, array![[1.0, 2.0]].view()).unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.assemble(2).unwrap(), array![[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn test_memory_sink_missing_band() {
        let mut sink = MemorySink::new();
        sink.write_band(0, array![[1.0]].view()).unwrap();
        assert!(matches!(sink.assemble(2), Err(SinkError::MissingBand(1))));
    }
}
