use crate::config::IrConfig;
use crate::ir::AbortHandle;
use crate::pulse::{
	Level,
	Pulse,
	PulseSequence,
};

use super::*;

/// Register file with a virtual tick clock
///
/// Carrier switching (COM0B1) is recorded as an output trace; the sensor
/// pin replays scripted carrier intervals.
pub struct SimulatedHardware {
	registers: [u8; 0x100],
	now: u64,
	sensor: SensorPin,
	sensor_active_low: bool,
	// [start, end) tick intervals with a carrier at the sensor
	input: Vec<(u64, u64)>,
	// ticks at which the sensor reads inverted
	glitches: Vec<u64>,
	carrier_on: bool,
	carrier_since: u64,
	trace: PulseSequence,
	abort: Option<(u64, AbortHandle)>,
}

impl SimulatedHardware {
	pub fn new(config: &IrConfig) -> Self {
		SimulatedHardware {
			registers: [0u8; 0x100],
			now: 0,
			sensor: config.sensor,
			sensor_active_low: config.sensor_active_low,
			input: Vec::new(),
			glitches: Vec::new(),
			carrier_on: false,
			carrier_since: 0,
			trace: PulseSequence::new(),
			abort: None,
		}
	}

	/// current time in ticks
	pub fn now(&self) -> u64 {
		self.now
	}

	pub fn register(&self, register: Register) -> u8 {
		self.registers[register.address()]
	}

	/// Schedule `pulses` to arrive at the sensor `delay` ticks from now.
	pub fn feed(&mut self, delay: u64, pulses: &[Pulse]) {
		let mut t = self.now + delay;
		for pulse in pulses {
			let end = t + pulse.ticks as u64;
			if pulse.level == Level::High {
				self.input.push((t, end));
			}
			t = end;
		}
	}

	/// Invert the sensor reading for the single tick `at`.
	pub fn glitch_at(&mut self, at: u64) {
		self.glitches.push(at);
	}

	/// Raise `handle` once the clock reaches `at`.
	pub fn abort_at(&mut self, at: u64, handle: AbortHandle) {
		self.abort = Some((at, handle));
	}

	fn carrier_at_sensor(&self, t: u64) -> bool {
		let carrier = self.input.iter().any(|&(start, end)| start <= t && t < end);
		carrier != self.glitches.contains(&t)
	}

	fn close_run(&mut self) {
		let ticks = self.now - self.carrier_since;
		// time before the first mark isn't part of a transmission
		let leading = self.trace.is_empty() && !self.carrier_on;
		if ticks > 0 && !leading {
			let _ = self.trace.push(Pulse {
				level: Level::from(self.carrier_on),
				ticks: ticks as u32,
			});
		}
		self.carrier_since = self.now;
	}

	/// Everything transmitted since creation (or `clear_trace`), up to now
	pub fn emitted(&mut self) -> PulseSequence {
		self.close_run();
		self.trace.clone()
	}

	pub fn clear_trace(&mut self) {
		self.trace = PulseSequence::new();
		self.carrier_since = self.now;
	}
}

impl Hardware for SimulatedHardware {
	fn write_register(&mut self, register: Register, value: u8) {
		trace!("@{} {:?} <- 0x{:02x}", self.now, register, value);
		if Register::Tccr0a == register {
			let carrier_on = 0 != value & (1 << COM0B1);
			if carrier_on != self.carrier_on {
				self.close_run();
				self.carrier_on = carrier_on;
			}
		}
		self.registers[register.address()] = value;
	}

	fn read_register(&mut self, register: Register) -> u8 {
		let value = self.registers[register.address()];
		if register != self.sensor.port.pin_register() {
			return value;
		}
		let mask = 1u8 << self.sensor.bit;
		if self.carrier_at_sensor(self.now) != self.sensor_active_low {
			value | mask
		} else {
			value & !mask
		}
	}

	fn wait_ticks(&mut self, ticks: u32) {
		self.now += ticks as u64;
		let due = match self.abort {
			Some((at, _)) => self.now >= at,
			None => false,
		};
		if due {
			if let Some((_, handle)) = self.abort.take() {
				handle.abort();
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn records_carrier_runs() {
		let mut hw = SimulatedHardware::new(&IrConfig::default());
		hw.wait_ticks(7);
		hw.set_carrier(Level::High);
		hw.wait_ticks(10);
		hw.set_carrier(Level::Low);
		hw.wait_ticks(20);
		hw.set_carrier(Level::High);
		hw.wait_ticks(5);
		hw.set_carrier(Level::Low);
		let emitted = hw.emitted();
		assert_eq!(emitted.pulses(), &[Pulse::mark(10), Pulse::space(20), Pulse::mark(5)]);
	}

	#[test]
	fn sensor_follows_script() {
		let config = IrConfig::default();
		let mut hw = SimulatedHardware::new(&config);
		hw.feed(2, &[Pulse::mark(3), Pulse::space(2)]);
		let mut levels = Vec::new();
		for _ in 0..8 {
			levels.push(hw.sensor_level(config.sensor, config.sensor_active_low));
			hw.wait_ticks(1);
		}
		use crate::pulse::Level::*;
		assert_eq!(levels, vec![Low, Low, High, High, High, Low, Low, Low]);
		// active low: idle reads as 1
		assert!(hw.read_sensor(config.sensor));
	}
}
