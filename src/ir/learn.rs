/// Capturing IR codes from the sensor
///
/// `Capture` is fed one sensor sample per tick and doesn't touch the
/// hardware itself; `IrDriver::learn_ir` does the timer programming and
/// sampling.
///
/// A level change is only accepted after `debounce_ticks` equal samples in a
/// row; those samples are counted for the new pulse, shorter glitches stay
/// part of the current one. Either way every tick is accounted to exactly
/// one pulse.

use crate::config::IrConfig;
use crate::error::IrError;
use crate::hardware::{
	Hardware,
	LowLevel,
};
use crate::pulse::{
	Level,
	Pulse,
	PulseSequence,
};

use super::IrDriver;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CaptureLimits {
	pub max_pulses: usize,
	pub max_pulse_ticks: u32,
	pub idle_timeout_ticks: u64,
	pub debounce_ticks: u32,
}

impl<'a> From<&'a IrConfig> for CaptureLimits {
	fn from(config: &'a IrConfig) -> Self {
		CaptureLimits {
			max_pulses: config.max_pulses,
			max_pulse_ticks: config.max_pulse_ticks,
			idle_timeout_ticks: config.idle_timeout_ticks(),
			debounce_ticks: config.debounce_ticks.max(1),
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum CaptureState {
	/// waiting for the first mark
	Idle,
	Capturing,
	Done,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Step {
	Continue,
	Done,
}

pub struct Capture {
	limits: CaptureLimits,
	state: CaptureState,
	// accepted level of the running pulse
	level: Level,
	// ticks of the running pulse, including `pending`
	run: u32,
	// samples in a row that differ from `level`
	pending: u32,
	idle: u64,
	truncated: bool,
	sequence: PulseSequence,
}

impl Capture {
	pub fn new(limits: CaptureLimits) -> Self {
		Capture {
			limits,
			state: CaptureState::Idle,
			level: Level::Low,
			run: 0,
			pending: 0,
			idle: 0,
			truncated: false,
			sequence: PulseSequence::with_capacity(limits.max_pulses),
		}
	}

	pub fn state(&self) -> CaptureState {
		self.state
	}

	/// capture ended because the buffer was full
	pub fn is_truncated(&self) -> bool {
		self.truncated
	}

	pub fn sequence(&self) -> &PulseSequence {
		&self.sequence
	}

	pub fn into_sequence(self) -> PulseSequence {
		self.sequence
	}

	fn record(&mut self, pulse: Pulse) -> Result<Step, IrError> {
		self.sequence.push(pulse)?;
		if self.sequence.len() >= self.limits.max_pulses {
			warn!("capture buffer full after {} pulses, signal truncated", self.sequence.len());
			self.truncated = true;
			self.state = CaptureState::Done;
			return Ok(Step::Done);
		}
		Ok(Step::Continue)
	}

	/// Feed the sensor level of one tick.
	pub fn sample(&mut self, level: Level) -> Result<Step, IrError> {
		match self.state {
			CaptureState::Done => Ok(Step::Done),
			CaptureState::Idle => {
				self.idle += 1;
				if Level::High == level {
					self.pending += 1;
					if self.pending >= self.limits.debounce_ticks {
						trace!("first mark after {} ticks", self.idle);
						self.state = CaptureState::Capturing;
						self.level = Level::High;
						self.run = self.pending;
						self.pending = 0;
						return Ok(Step::Continue);
					}
				} else {
					self.pending = 0;
				}
				if self.idle >= self.limits.idle_timeout_ticks {
					return Err(IrError::NoSignal);
				}
				Ok(Step::Continue)
			},
			CaptureState::Capturing => {
				self.run += 1;
				if level == self.level {
					self.pending = 0;
				} else {
					self.pending += 1;
					if self.pending >= self.limits.debounce_ticks {
						let finished = Pulse {
							level: self.level,
							ticks: self.run - self.pending,
						};
						self.level = level;
						self.run = self.pending;
						self.pending = 0;
						if Step::Done == self.record(finished)? {
							return Ok(Step::Done);
						}
					}
				}

				let committed = self.run - self.pending;
				if committed >= self.limits.max_pulse_ticks {
					match self.level {
						Level::High => return Err(IrError::HighPulseTooLong),
						Level::Low => {
							// long enough silence: end of signal (the gap
							// always fits, the buffer wasn't full yet)
							self.sequence.push(Pulse::space(committed))?;
							self.state = CaptureState::Done;
							return Ok(Step::Done);
						},
					}
				}
				Ok(Step::Continue)
			},
		}
	}
}

impl<H: Hardware> IrDriver<H> {
	/// Record a code from the sensor.
	///
	/// Reprograms the timer for sampling and restores the carrier setup
	/// afterwards, also on errors. An abort raised before the call makes it
	/// return `Aborted` right away; the flag is cleared when it returns.
	pub fn learn_ir(&mut self) -> Result<PulseSequence, IrError> {
		self.ensure_initialized()?;

		let config = self.config;
		self.hardware.program_tick(&config.tick);
		let result = self.capture(CaptureLimits::from(&config));
		self.hardware.program_carrier(&config.carrier);
		self.abort.reset();

		match result {
			Ok(ref sequence) => info!("captured {} pulses ({} ticks)", sequence.len(), sequence.total_ticks()),
			Err(ref e) => debug!("learning failed: {}", e),
		}
		result
	}

	fn capture(&mut self, limits: CaptureLimits) -> Result<PulseSequence, IrError> {
		let sensor = self.config.sensor;
		let active_low = self.config.sensor_active_low;
		let mut capture = Capture::new(limits);
		loop {
			if self.abort.is_aborted() {
				return Err(IrError::Aborted);
			}
			let level = self.hardware.sensor_level(sensor, active_low);
			if Step::Done == capture.sample(level)? {
				return Ok(capture.into_sequence());
			}
			self.hardware.wait_ticks(1);
		}
	}
}
