//! Recorder cadence
//!
//! While armed, the recorder reads every instrument once per interval and
//! hands one [`Sample`] to a [`SampleSink`]. Where the samples end up is the
//! sink's business; the host writes them to a per-run CSV file.

use crate::config::{MeasurementSpeed, PhaseConfig, RecorderConfig};
use crate::range::{MeasurementRange, Reading};
use crate::state::{Phase, RunId, SystemState};
use crate::traits::{CurrentMeter, HardwareError, MeasurementProbe, SourceKind};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One recorded measurement
///
/// Missing values are instrument reads that failed on this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sample {
    /// Run the sample belongs to
    pub run: RunId,
    /// Sequence number within the run, from 0
    pub seq: u32,
    /// Controller clock (ms)
    pub timestamp_ms: u64,
    /// Time since the run started (ms)
    pub elapsed_ms: u64,
    /// Phase at the time of sampling
    pub phase: Phase,
    /// HV probe voltage (V)
    pub voltage: Option<f32>,
    /// Current through the run's source (pA); `0` is the overflow sentinel
    pub current: Option<f64>,
    /// Sample temperature (°C)
    pub temperature: Option<f32>,
    /// Relative humidity (%)
    pub humidity: Option<f32>,
    /// Meter range the current was read on
    pub range: MeasurementRange,
    /// Electrometer speed setting
    pub speed: MeasurementSpeed,
}

impl Sample {
    /// Current classified for range control
    pub fn reading(&self) -> Reading {
        Reading::classify(self.current)
    }
}

/// Sample sink errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SinkError {
    /// The run log could not be created
    OpenFailed,
    /// A sample could not be written
    WriteFailed,
    /// No run log is open
    NotOpen,
}

/// Destination for recorded samples
pub trait SampleSink {
    /// Start a fresh log for a run
    fn open_run(&mut self, run: RunId, config: &PhaseConfig) -> Result<(), SinkError>;

    /// Append one sample
    fn append(&mut self, sample: &Sample) -> Result<(), SinkError>;

    /// Finish the current run's log
    fn close_run(&mut self) -> Result<(), SinkError>;
}

/// Sink that keeps nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl SampleSink for NullSink {
    fn open_run(&mut self, _run: RunId, _config: &PhaseConfig) -> Result<(), SinkError> {
        Ok(())
    }

    fn append(&mut self, _sample: &Sample) -> Result<(), SinkError> {
        Ok(())
    }

    fn close_run(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct ArmedRun {
    run: RunId,
    started_ms: u64,
}

/// Periodic sampler
#[derive(Debug, Clone)]
pub struct Recorder {
    config: RecorderConfig,
    armed: Option<ArmedRun>,
    next_seq: u32,
    latest: Option<Sample>,
}

impl Recorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            armed: None,
            next_seq: 0,
            latest: None,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.config.interval_ms as u64
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Most recent sample of the current or last run
    pub fn latest(&self) -> Option<&Sample> {
        self.latest.as_ref()
    }

    /// Latest `(sequence, reading)` for the range controller
    pub fn latest_reading(&self) -> Option<(u32, Reading)> {
        self.latest.as_ref().map(|s| (s.seq, s.reading()))
    }

    /// Open the run log and start sampling
    ///
    /// A sink failure is logged; the run still proceeds unrecorded.
    pub fn arm<S: SampleSink + ?Sized>(
        &mut self,
        sink: &mut S,
        run: RunId,
        config: &PhaseConfig,
        now_ms: u64,
    ) {
        if let Err(e) = sink.open_run(run, config) {
            error!("run {} log could not be opened: {:?}", run, e);
        }
        self.armed = Some(ArmedRun {
            run,
            started_ms: now_ms,
        });
        self.next_seq = 0;
        self.latest = None;
    }

    /// Stop sampling and close the run log
    pub fn disarm<S: SampleSink + ?Sized>(&mut self, sink: &mut S) {
        if self.armed.take().is_some() {
            if let Err(e) = sink.close_run() {
                warn!("run log close failed: {:?}", e);
            }
        }
    }

    /// Take one sample and append it
    ///
    /// The current is always the electrometer's, whichever source polarizes
    /// the sample; the range controller steps that meter on it. Returns
    /// `None` when not armed.
    pub fn sample<H, S>(
        &mut self,
        hw: &mut H,
        sink: &mut S,
        state: &SystemState,
        now_ms: u64,
    ) -> Option<Sample>
    where
        H: CurrentMeter + MeasurementProbe + ?Sized,
        S: SampleSink + ?Sized,
    {
        let armed = self.armed?;
        let sample = Sample {
            run: armed.run,
            seq: self.next_seq,
            timestamp_ms: now_ms,
            elapsed_ms: now_ms.saturating_sub(armed.started_ms),
            phase: state.phase,
            voltage: logged(hw.read_voltage(), "voltage"),
            current: logged(hw.read_current(SourceKind::Electrometer), "current"),
            temperature: logged(hw.read_temperature(), "temperature"),
            humidity: logged(hw.read_humidity(), "humidity"),
            range: state.range,
            speed: self.config.speed,
        };
        self.next_seq = self.next_seq.wrapping_add(1);

        if let Err(e) = sink.append(&sample) {
            warn!("sample {} not written: {:?}", sample.seq, e);
        }
        self.latest = Some(sample);
        Some(sample)
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(RecorderConfig::default())
    }
}

fn logged<T>(result: Result<T, HardwareError>, what: &'static str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{} read failed: {:?}", what, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunRequest;
    use crate::mock::MockRig;

    #[derive(Default)]
    struct VecSink {
        opened: std::vec::Vec<RunId>,
        samples: std::vec::Vec<Sample>,
        closed: usize,
    }

    impl SampleSink for VecSink {
        fn open_run(&mut self, run: RunId, _config: &PhaseConfig) -> Result<(), SinkError> {
            self.opened.push(run);
            Ok(())
        }

        fn append(&mut self, sample: &Sample) -> Result<(), SinkError> {
            self.samples.push(*sample);
            Ok(())
        }

        fn close_run(&mut self) -> Result<(), SinkError> {
            self.closed += 1;
            Ok(())
        }
    }

    fn config() -> PhaseConfig {
        RunRequest::pdc(SourceKind::Electrometer, 100, 5, 5, 5)
            .validate()
            .unwrap()
    }

    #[test]
    fn test_disarmed_recorder_samples_nothing() {
        let mut recorder = Recorder::default();
        let mut hw = MockRig::safe();
        let mut sink = VecSink::default();
        let state = SystemState::new();
        assert_eq!(recorder.sample(&mut hw, &mut sink, &state, 0), None);
        assert!(sink.samples.is_empty());
    }

    #[test]
    fn test_samples_numbered_from_arm() {
        let mut recorder = Recorder::default();
        let mut hw = MockRig::safe();
        hw.currents = [0.0, 42.0];
        let mut sink = VecSink::default();
        let state = SystemState::new();

        recorder.arm(&mut sink, 3, &config(), 10_000);
        recorder.sample(&mut hw, &mut sink, &state, 11_000);
        let second = recorder.sample(&mut hw, &mut sink, &state, 12_000).unwrap();

        assert_eq!(sink.opened, [3]);
        assert_eq!(sink.samples.len(), 2);
        assert_eq!(second.seq, 1);
        assert_eq!(second.elapsed_ms, 2000);
        assert_eq!(second.current, Some(42.0));
        assert_eq!(second.speed, MeasurementSpeed::Stable);
        assert_eq!(recorder.latest_reading(), Some((1, Reading::Value(42.0))));
    }

    #[test]
    fn test_hv_amp_run_records_electrometer_current() {
        let mut recorder = Recorder::default();
        let mut hw = MockRig::safe();
        hw.currents = [1.0e6, 5.0];
        let mut sink = VecSink::default();
        let state = SystemState::new();
        let hv_amp = RunRequest::manual(SourceKind::HvAmp, 1000).validate().unwrap();

        recorder.arm(&mut sink, 1, &hv_amp, 0);
        let sample = recorder.sample(&mut hw, &mut sink, &state, 1000).unwrap();
        assert_eq!(sample.current, Some(5.0));
    }

    #[test]
    fn test_failed_reads_recorded_as_missing() {
        let mut recorder = Recorder::default();
        let mut hw = MockRig::safe();
        hw.fail_reads = true;
        let mut sink = VecSink::default();
        let state = SystemState::new();

        recorder.arm(&mut sink, 1, &config(), 0);
        let sample = recorder.sample(&mut hw, &mut sink, &state, 1000).unwrap();
        assert_eq!(sample.voltage, None);
        assert_eq!(sample.current, None);
        assert_eq!(sample.reading(), Reading::Disconnected);
    }

    #[test]
    fn test_disarm_closes_once() {
        let mut recorder = Recorder::default();
        let mut sink = VecSink::default();
        recorder.arm(&mut sink, 1, &config(), 0);
        recorder.disarm(&mut sink);
        recorder.disarm(&mut sink);
        assert_eq!(sink.closed, 1);
        assert!(!recorder.is_armed());
    }
}
