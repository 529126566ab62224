//! Per-run CSV log
//!
//! Each run gets a fresh file `<label>_<n>.csv` in the log directory, where
//! `n` is the first number not already taken. The file starts with
//! `#`-prefixed preamble lines describing the run, then one header line and
//! one row per sample. Rows are flushed as they are written.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local};
use log::{error, info, warn};

use resistrig_core::config::{PhaseConfig, Timing};
use resistrig_core::recorder::{Sample, SampleSink, SinkError};
use resistrig_core::state::RunId;

/// Column header, in row order
pub const HEADER: &str =
    "date,time,absolute_time_ms,voltage_V,current_pA,temperature_C,humidity_RH%,range_id,speed";

const DATE_FORMAT: &str = "%d-%m-%Y";
const TIME_FORMAT: &str = "%H:%M:%S";

/// Label used when the operator gave none
const DEFAULT_LABEL: &str = "run";

struct OpenLog {
    path: PathBuf,
    writer: BufWriter<File>,
    /// Wall-clock time of the run start
    started: DateTime<Local>,
}

/// CSV sample sink
pub struct RunLog {
    dir: PathBuf,
    current: Option<OpenLog>,
}

impl RunLog {
    /// Log into `dir`, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, current: None })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File of the run being logged
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|log| log.path.as_path())
    }

    /// Create `<label>_<n>.csv` with the first free `n`
    fn create_file(&self, label: &str) -> io::Result<(PathBuf, File)> {
        let stem = file_stem(label);
        for n in 1u32.. {
            let path = self.dir.join(format!("{stem}_{n}.csv"));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(io::ErrorKind::Other, "no free log file name"))
    }

    fn write_row(&mut self, sample: &Sample) -> io::Result<()> {
        let Some(log) = self.current.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "no run log open"));
        };
        let at = log.started + Duration::milliseconds(sample.elapsed_ms as i64);
        writeln!(
            log.writer,
            "{},{},{},{},{},{},{},{},{}",
            at.format(DATE_FORMAT),
            at.format(TIME_FORMAT),
            at.timestamp_millis(),
            field(sample.voltage),
            field(sample.current),
            field(sample.temperature),
            field(sample.humidity),
            sample.range.index(),
            sample.speed.as_str(),
        )?;
        log.writer.flush()
    }
}

/// Keep file names portable: letters, digits, `-` and `_`
fn file_stem(label: &str) -> String {
    let stem: String = label
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        DEFAULT_LABEL.to_string()
    } else {
        stem
    }
}

/// Missing reads are empty fields
fn field<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_preamble(
    writer: &mut impl Write,
    run: RunId,
    config: &PhaseConfig,
    started: &DateTime<Local>,
) -> io::Result<()> {
    writeln!(writer, "# run: {run}")?;
    writeln!(writer, "# label: {}", config.label())?;
    writeln!(writer, "# type: {}", config.kind().as_str())?;
    writeln!(writer, "# source: {:?}", config.source())?;
    writeln!(writer, "# voltage_V: {}", config.voltage())?;
    for (name, timing) in [("t1_s", Timing::T1), ("t2_s", Timing::T2), ("t3_s", Timing::T3)] {
        if let Some(s) = config.timing_s(timing) {
            writeln!(writer, "# {name}: {s}")?;
        }
    }
    writeln!(
        writer,
        "# started: {} {}",
        started.format(DATE_FORMAT),
        started.format(TIME_FORMAT)
    )?;
    writeln!(writer, "{HEADER}")
}

impl SampleSink for RunLog {
    fn open_run(&mut self, run: RunId, config: &PhaseConfig) -> Result<(), SinkError> {
        // A run never inherits the previous file
        if self.current.is_some() {
            let _ = self.close_run();
        }

        let (path, file) = self.create_file(config.label()).map_err(|e| {
            error!("cannot create run log in {}: {}", self.dir.display(), e);
            SinkError::OpenFailed
        })?;
        let started = Local::now();
        let mut writer = BufWriter::new(file);
        write_preamble(&mut writer, run, config, &started)
            .and_then(|_| writer.flush())
            .map_err(|e| {
                error!("cannot write {}: {}", path.display(), e);
                SinkError::OpenFailed
            })?;

        info!("run {} logging to {}", run, path.display());
        self.current = Some(OpenLog {
            path,
            writer,
            started,
        });
        Ok(())
    }

    fn append(&mut self, sample: &Sample) -> Result<(), SinkError> {
        if self.current.is_none() {
            return Err(SinkError::NotOpen);
        }
        self.write_row(sample).map_err(|e| {
            warn!("sample {} not written: {}", sample.seq, e);
            SinkError::WriteFailed
        })
    }

    fn close_run(&mut self) -> Result<(), SinkError> {
        let mut log = self.current.take().ok_or(SinkError::NotOpen)?;
        log.writer.flush().map_err(|_| SinkError::WriteFailed)?;
        info!("closed {}", log.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resistrig_core::config::{MeasurementSpeed, RunRequest};
    use resistrig_core::range::MeasurementRange;
    use resistrig_core::state::Phase;
    use resistrig_core::traits::SourceKind;

    fn config(label: &str) -> PhaseConfig {
        RunRequest::pdc(SourceKind::HvAmp, 1000, 60, 600, 600)
            .with_label(label)
            .validate()
            .unwrap()
    }

    fn sample(seq: u32) -> Sample {
        Sample {
            run: 1,
            seq,
            timestamp_ms: 5000 + seq as u64 * 1000,
            elapsed_ms: seq as u64 * 1000,
            phase: Phase::Polarize,
            voltage: Some(1013.5),
            current: Some(250.25),
            temperature: Some(23.5),
            humidity: None,
            range: MeasurementRange::fixed(4).unwrap(),
            speed: MeasurementSpeed::Stable,
        }
    }

    #[test]
    fn test_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::new(dir.path()).unwrap();

        log.open_run(1, &config("pet film")).unwrap();
        let path = log.current_path().unwrap().to_path_buf();
        log.append(&sample(0)).unwrap();
        log.append(&sample(1)).unwrap();
        log.close_run().unwrap();

        assert_eq!(path.file_name().unwrap(), "pet_film_1.csv");
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        let header = lines.iter().position(|l| *l == HEADER).unwrap();
        assert!(lines[..header].iter().all(|l| l.starts_with('#')));
        assert!(lines.contains(&"# type: PDC"));
        assert!(lines.contains(&"# t3_s: 600"));

        let rows = &lines[header + 1..];
        assert_eq!(rows.len(), 2);
        let first: Vec<&str> = rows[0].split(',').collect();
        let second: Vec<&str> = rows[1].split(',').collect();
        assert_eq!(first.len(), 9);
        assert_eq!(&first[3..], &["1013.5", "250.25", "23.5", "", "4", "stable"]);
        let t0: i64 = first[2].parse().unwrap();
        let t1: i64 = second[2].parse().unwrap();
        assert_eq!(t1 - t0, 1000);
    }

    #[test]
    fn test_numeric_suffix_avoids_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::new(dir.path()).unwrap();

        log.open_run(1, &config("")).unwrap();
        log.close_run().unwrap();
        log.open_run(2, &config("")).unwrap();
        let second = log.current_path().unwrap().to_path_buf();
        log.close_run().unwrap();

        assert!(dir.path().join("run_1.csv").exists());
        assert_eq!(second, dir.path().join("run_2.csv"));
    }

    #[test]
    fn test_append_without_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::new(dir.path()).unwrap();
        assert_eq!(log.append(&sample(0)), Err(SinkError::NotOpen));
        assert_eq!(log.close_run(), Err(SinkError::NotOpen));
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let mut log = RunLog::new(&nested).unwrap();
        log.open_run(1, &config("x")).unwrap();
        assert!(nested.join("x_1.csv").exists());
    }
}
