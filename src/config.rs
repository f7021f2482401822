use crate::error::IrError;
use crate::hardware::{
	Port,
	SensorPin,
};
use crate::pulse::WIRE_UNIT_US;
use crate::timer::{
	TickConfig,
	TimerConfig,
};

pub mod consts {
	use super::Port;
	use crate::timer::{
		CS00,
		CS01,
	};

	/// CPU clock feeding Timer0
	pub const F_CPU: u32 = 16_000_000;

	/// TOP for the 8 bit Timer0 in fast PWM mode; with `PRESCALER_FLAGS`
	/// this gives a carrier as close to 38 kHz as possible.
	pub const OCR0A_VALUE: u8 = 53;
	/// duty cycle compare value, about 1/3 of `OCR0A_VALUE`
	pub const OCR0B_VALUE: u8 = 18;
	/// clk/8
	pub const PRESCALER_FLAGS: u8 = 1 << CS01;

	/// carrier used when the frequency gets recalculated for another clock
	pub const CARRIER_HZ: u32 = 38_000;
	pub const CARRIER_DUTY: u32 = 33;

	/// µs subtracted from every transmitted pulse to compensate loop
	/// overhead; best determined with an oscilloscope.
	pub const TRIM: u32 = 300;

	pub const IRSENSOR_PIN: Port = Port::B;
	/// PB2
	pub const IRSENSOR_BIT: u8 = 2;

	/// sampling period in µs, must match `TICK_OCR`/`TICK_PRESCALER`
	pub const TICK_DURATION: u32 = 10;
	/// counts per tick
	pub const TICK_OCR: u8 = 0xA0;
	/// clk/1
	pub const TICK_PRESCALER: u8 = 1 << CS00;

	/// capacity of a pulse sequence: 64 (on, off) pairs, i.e. a 128 byte
	/// buffer in wire format
	pub const MAX_PULSES: usize = 128;
	/// longest HIGH or LOW pulse in ticks (25 ms)
	pub const MAX_PULSE_TICKS: u32 = 2500;
	/// number of `MAX_PULSE_TICKS` periods to wait for the first mark
	pub const TIMEOUT_COUNT: u32 = 200;
	/// a level change must be seen this many ticks in a row
	pub const DEBOUNCE_TICKS: u32 = 2;
}

use self::consts::*;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct IrConfig {
	pub clock_hz: u32,
	pub carrier: TimerConfig,
	pub tick: TickConfig,
	pub tick_us: u32,
	pub trim_us: u32,
	/// capture and send limit; stored codes stay limited to `MAX_PULSES`
	pub max_pulses: usize,
	pub max_pulse_ticks: u32,
	pub timeout_count: u32,
	pub debounce_ticks: u32,
	pub sensor: SensorPin,
	/// typical 38 kHz receiver modules pull their output low while they
	/// see a carrier
	pub sensor_active_low: bool,
}

impl Default for IrConfig {
	fn default() -> Self {
		IrConfig {
			clock_hz: F_CPU,
			carrier: TimerConfig::default(),
			tick: TickConfig::default(),
			tick_us: TICK_DURATION,
			trim_us: TRIM,
			max_pulses: MAX_PULSES,
			max_pulse_ticks: MAX_PULSE_TICKS,
			timeout_count: TIMEOUT_COUNT,
			debounce_ticks: DEBOUNCE_TICKS,
			sensor: SensorPin {
				port: IRSENSOR_PIN,
				bit: IRSENSOR_BIT,
			},
			sensor_active_low: true,
		}
	}
}

impl IrConfig {
	/// Recalculate carrier and tick timer values for a different CPU clock.
	pub fn with_clock(mut self, clock_hz: u32, carrier_hz: u32, duty_percent: u32) -> Result<Self, IrError> {
		self.clock_hz = clock_hz;
		self.carrier = TimerConfig::for_carrier(clock_hz, carrier_hz, duty_percent)?;
		self.tick = TickConfig::for_duration(clock_hz, self.tick_us)?;
		Ok(self)
	}

	pub fn validate(&self) -> Result<(), IrError> {
		self.carrier.validate()?;
		self.tick.validate(self.clock_hz, self.tick_us)?;
		if 0 == self.max_pulses || 0 == self.max_pulse_ticks {
			return Err(IrError::InvalidTimerConfig("pulse limits must not be zero"));
		}
		if self.sensor.bit > 7 {
			return Err(IrError::InvalidTimerConfig("sensor bit out of range"));
		}
		Ok(())
	}

	pub fn trim_ticks(&self) -> u32 {
		self.trim_us / self.tick_us
	}

	/// ticks to wait for the first mark before giving up
	pub fn idle_timeout_ticks(&self) -> u64 {
		self.timeout_count as u64 * self.max_pulse_ticks as u64
	}

	pub fn us_to_ticks(&self, duration_us: u32) -> u32 {
		let tick_us = self.tick_us.max(1) as u64;
		// never more than `duration_us`, so it fits
		((duration_us as u64 + tick_us / 2) / tick_us) as u32
	}

	/// ticks per unit of the stored wire format
	pub fn wire_unit_ticks(&self) -> u32 {
		self.us_to_ticks(WIRE_UNIT_US).max(1)
	}
}
