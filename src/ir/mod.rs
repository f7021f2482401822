/// IR transmit / learn driver
///
/// One `IrDriver` owns the hardware; transmitting and learning both need
/// `&mut self`, so they can't overlap.
///
/// Pulses are emitted by switching the carrier on (HIGH) or off (LOW) and
/// waiting the requested number of ticks minus the trim compensation. The
/// carrier is always off again after a call returns.

use std::sync::Arc;
use std::sync::atomic::{
	AtomicBool,
	Ordering,
};

pub mod learn;
pub mod nec;

use crate::config::IrConfig;
use crate::error::IrError;
use crate::hardware::{
	Hardware,
	LowLevel,
};
use crate::pulse::{
	Level,
	PulseSequence,
};

/// Lets another thread stop a running `learn_ir`.
///
/// An abort raised while no capture runs stays pending and stops the next
/// `learn_ir` immediately; `learn_ir` clears the flag when it returns.
#[derive(Clone, Debug, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
	pub fn new() -> Self {
		AbortHandle::default()
	}

	pub fn abort(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_aborted(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}

	fn reset(&self) {
		self.0.store(false, Ordering::SeqCst);
	}
}

pub struct IrDriver<H: Hardware> {
	hardware: H,
	config: IrConfig,
	initialized: bool,
	abort: AbortHandle,
}

impl<H: Hardware> IrDriver<H> {
	pub fn new(hardware: H, config: IrConfig) -> Self {
		IrDriver {
			hardware,
			config,
			initialized: false,
			abort: AbortHandle::new(),
		}
	}

	pub fn config(&self) -> &IrConfig {
		&self.config
	}

	pub fn hardware(&mut self) -> &mut H {
		&mut self.hardware
	}

	pub fn into_hardware(self) -> H {
		self.hardware
	}

	pub fn is_initialized(&self) -> bool {
		self.initialized
	}

	pub fn abort_handle(&self) -> AbortHandle {
		self.abort.clone()
	}

	/// Program Timer0 for the carrier and configure output and sensor pins.
	///
	/// Calling it again reprograms the timer from the current configuration.
	pub fn init_ir(&mut self) -> Result<(), IrError> {
		self.initialized = false;
		self.config.validate()?;

		self.hardware.program_carrier(&self.config.carrier);
		self.hardware.set_carrier(Level::Low);
		self.hardware.configure_sensor(self.config.sensor);
		self.initialized = true;

		info!("IR timer initialized: carrier {} Hz (duty {}%), tick {} µs",
			self.config.carrier.carrier_hz(self.config.clock_hz),
			self.config.carrier.duty_percent(),
			self.config.tick_us,
		);
		Ok(())
	}

	fn ensure_initialized(&self) -> Result<(), IrError> {
		if self.initialized {
			Ok(())
		} else {
			Err(IrError::NotInitialized)
		}
	}

	fn emit(&mut self, level: Level, ticks: u32) {
		self.hardware.set_carrier(level);
		self.hardware.wait_ticks(ticks.saturating_sub(self.config.trim_ticks()));
		if Level::High == level {
			self.hardware.set_carrier(Level::Low);
		}
	}

	/// Drive the output to `level` for `ticks` ticks.
	pub fn send_pulse(&mut self, level: Level, ticks: u32) -> Result<(), IrError> {
		self.ensure_initialized()?;
		if 0 == ticks {
			return Err(IrError::InvalidDuration);
		}
		self.emit(level, ticks);
		Ok(())
	}

	/// Like `send_pulse`, duration in µs (rounded to the nearest tick).
	pub fn send_pulse_d(&mut self, level: Level, duration_us: u32) -> Result<(), IrError> {
		self.ensure_initialized()?;
		let ticks = self.config.us_to_ticks(duration_us);
		self.send_pulse(level, ticks)
	}

	/// ON for `mark` ticks, then OFF for `space` ticks
	pub fn send_mark_space(&mut self, mark: u32, space: u32) -> Result<(), IrError> {
		self.ensure_initialized()?;
		if 0 == mark || 0 == space {
			return Err(IrError::InvalidDuration);
		}
		self.emit(Level::High, mark);
		self.emit(Level::Low, space);
		Ok(())
	}

	/// Replay a recorded or prebuilt sequence verbatim.
	///
	/// Sequences are checked before anything is sent.
	pub fn send_sequence(&mut self, sequence: &PulseSequence) -> Result<(), IrError> {
		self.ensure_initialized()?;
		if sequence.is_empty() {
			return Err(IrError::EmptySequence);
		}
		if sequence.len() > self.config.max_pulses {
			return Err(IrError::SigTooLong);
		}
		debug!("sending sequence of {} pulses ({} ticks)", sequence.len(), sequence.total_ticks());
		for pulse in sequence {
			self.emit(pulse.level, pulse.ticks);
		}
		Ok(())
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::hardware::{
		Register,
		SimulatedHardware,
		COM0B1,
		PD5,
	};
	use crate::pulse::Pulse;

	pub fn sim_config() -> IrConfig {
		IrConfig {
			trim_us: 0,
			..IrConfig::default()
		}
	}

	pub fn sim_driver() -> IrDriver<SimulatedHardware> {
		let config = sim_config();
		let mut driver = IrDriver::new(SimulatedHardware::new(&config), config);
		driver.init_ir().unwrap();
		driver
	}

	#[test]
	fn init_programs_timer() {
		let driver = sim_driver();
		let mut hw = driver.into_hardware();
		assert_eq!(hw.register(Register::Ocr0a), 53);
		assert_eq!(hw.register(Register::Ocr0b), 18);
		assert_eq!(hw.register(Register::Tccr0a), 0b0000_0011);
		assert_eq!(hw.register(Register::Tccr0b), 0b0000_1010);
		assert_ne!(hw.register(Register::Ddrd) & (1 << PD5), 0);
		assert!(hw.emitted().is_empty());
	}

	#[test]
	fn init_rejects_bad_config() {
		let mut config = sim_config();
		config.carrier.prescaler_flags = 0;
		let mut driver = IrDriver::new(SimulatedHardware::new(&config), config);
		match driver.init_ir() {
			Err(IrError::InvalidTimerConfig(_)) => (),
			r => panic!("unexpected result {:?}", r),
		}
		assert!(!driver.is_initialized());
		assert_eq!(driver.send_pulse(Level::High, 5), Err(IrError::NotInitialized));
	}

	#[test]
	fn everything_needs_init() {
		let config = sim_config();
		let mut driver = IrDriver::new(SimulatedHardware::new(&config), config);
		let mut seq = PulseSequence::new();
		seq.push_mark_space(10, 10).unwrap();

		assert_eq!(driver.send_pulse(Level::High, 5), Err(IrError::NotInitialized));
		assert_eq!(driver.send_pulse_d(Level::High, 500), Err(IrError::NotInitialized));
		assert_eq!(driver.send_mark_space(5, 5), Err(IrError::NotInitialized));
		assert_eq!(driver.send_sequence(&seq), Err(IrError::NotInitialized));
		assert_eq!(driver.send_nec_byte(0x12), Err(IrError::NotInitialized));
		assert_eq!(driver.send_nec_command(0x04, 0xc5), Err(IrError::NotInitialized));
		assert_eq!(driver.send_nec_repeat(), Err(IrError::NotInitialized));
		assert_eq!(driver.learn_ir(), Err(IrError::NotInitialized));
		assert!(driver.into_hardware().emitted().is_empty());
	}

	#[test]
	fn pulses() {
		let mut driver = sim_driver();
		driver.send_pulse(Level::High, 56).unwrap();
		driver.send_pulse(Level::Low, 169).unwrap();
		driver.send_pulse_d(Level::High, 9000).unwrap();
		driver.send_pulse_d(Level::Low, 4504).unwrap();
		assert_eq!(driver.send_pulse(Level::High, 0), Err(IrError::InvalidDuration));
		assert_eq!(driver.send_pulse_d(Level::Low, 3), Err(IrError::InvalidDuration));

		let hw = driver.hardware();
		assert_eq!(hw.register(Register::Tccr0a) & (1 << COM0B1), 0, "carrier left on");
		assert_eq!(hw.emitted().pulses(), &[
			Pulse::mark(56),
			Pulse::space(169),
			Pulse::mark(900),
			Pulse::space(450),
		]);
	}

	#[test]
	fn huge_durations_dont_overflow() {
		let mut driver = sim_driver();
		driver.send_pulse(Level::High, 5).unwrap();
		driver.send_pulse_d(Level::Low, u32::max_value()).unwrap();
		assert_eq!(driver.hardware().emitted().pulses(), &[
			Pulse::mark(5),
			Pulse::space(429_496_730),
		]);
	}

	#[test]
	fn trim_shortens_pulses() {
		let config = IrConfig::default();
		let mut driver = IrDriver::new(SimulatedHardware::new(&config), config);
		driver.init_ir().unwrap();
		driver.send_mark_space(60, 100).unwrap();
		// a pulse shorter than the trim value collapses
		driver.send_mark_space(20, 100).unwrap();
		assert_eq!(driver.hardware().emitted().pulses(), &[
			Pulse::mark(30),
			Pulse::space(140),
		]);
	}

	#[test]
	fn sequences() {
		let mut driver = sim_driver();
		assert_eq!(driver.send_sequence(&PulseSequence::new()), Err(IrError::EmptySequence));

		let mut long = PulseSequence::new();
		for _ in 0..65 {
			long.push_mark_space(6, 6).unwrap();
		}
		assert_eq!(long.len(), 130);
		assert_eq!(driver.send_sequence(&long), Err(IrError::SigTooLong));
		assert!(driver.hardware().emitted().is_empty());

		let seq = PulseSequence::from_wire(&[90, 45, 6, 17, 6, 0], 10).unwrap();
		driver.send_sequence(&seq).unwrap();
		assert_eq!(driver.hardware().emitted(), seq);
	}
}
