/// Timer0 configuration: carrier PWM and sampling tick
///
/// The carrier runs in fast PWM mode 7 (TOP = OCR0A), so the output
/// frequency is `f_clk / (N * (1 + OCR0A))`, and OC0B stays high for
/// `OCR0B + 1` of those counts.
///
/// While learning the same timer is reprogrammed to CTC mode to produce one
/// compare match per sampling tick.

use std::fmt;

use crate::config::consts::*;
use crate::error::IrError;

// clock select bits in TCCR0B
pub const CS00: u8 = 0;
pub const CS01: u8 = 1;
pub const CS02: u8 = 2;
const CS_MASK: u8 = (1 << CS02) | (1 << CS01) | (1 << CS00);

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Prescaler {
	Div1,
	Div8,
	Div64,
	Div256,
	Div1024,
}

impl Prescaler {
	pub const ALL: [Prescaler; 5] = [
		Prescaler::Div1,
		Prescaler::Div8,
		Prescaler::Div64,
		Prescaler::Div256,
		Prescaler::Div1024,
	];

	// "stopped" (0b000) and the external clock sources (0b110, 0b111) are
	// not usable for us
	pub fn from_flags(flags: u8) -> Option<Self> {
		if 0 != flags & !CS_MASK {
			return None;
		}
		match flags {
			0b001 => Some(Prescaler::Div1),
			0b010 => Some(Prescaler::Div8),
			0b011 => Some(Prescaler::Div64),
			0b100 => Some(Prescaler::Div256),
			0b101 => Some(Prescaler::Div1024),
			_ => None,
		}
	}

	pub fn flags(self) -> u8 {
		match self {
			Prescaler::Div1 => 0b001,
			Prescaler::Div8 => 0b010,
			Prescaler::Div64 => 0b011,
			Prescaler::Div256 => 0b100,
			Prescaler::Div1024 => 0b101,
		}
	}

	pub fn divisor(self) -> u32 {
		match self {
			Prescaler::Div1 => 1,
			Prescaler::Div8 => 8,
			Prescaler::Div64 => 64,
			Prescaler::Div256 => 256,
			Prescaler::Div1024 => 1024,
		}
	}
}

impl fmt::Display for Prescaler {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "clk/{}", self.divisor())
	}
}

/// Carrier PWM configuration
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TimerConfig {
	pub prescaler_flags: u8,
	pub ocr_a: u8,
	pub ocr_b: u8,
}

impl Default for TimerConfig {
	fn default() -> Self {
		TimerConfig {
			prescaler_flags: PRESCALER_FLAGS,
			ocr_a: OCR0A_VALUE,
			ocr_b: OCR0B_VALUE,
		}
	}
}

impl TimerConfig {
	/// Find the smallest prescaler whose TOP value fits 8 bits.
	pub fn for_carrier(clock_hz: u32, carrier_hz: u32, duty_percent: u32) -> Result<Self, IrError> {
		if 0 == carrier_hz {
			return Err(IrError::InvalidTimerConfig("carrier frequency must not be zero"));
		}
		if 0 == duty_percent || duty_percent > 100 {
			return Err(IrError::InvalidTimerConfig("duty cycle out of range"));
		}

		for prescaler in Prescaler::ALL.iter() {
			let period = carrier_hz as u64 * prescaler.divisor() as u64;
			let counts = (clock_hz as u64 + period / 2) / period;
			if counts < 2 || counts > 256 {
				continue;
			}
			let high = ((counts * duty_percent as u64 + 50) / 100).max(1);
			return Ok(TimerConfig {
				prescaler_flags: prescaler.flags(),
				ocr_a: (counts - 1) as u8,
				ocr_b: (high - 1) as u8,
			});
		}

		Err(IrError::InvalidTimerConfig("carrier frequency out of range"))
	}

	pub fn validate(&self) -> Result<Prescaler, IrError> {
		let prescaler = Prescaler::from_flags(self.prescaler_flags)
			.ok_or(IrError::InvalidTimerConfig("unsupported carrier prescaler flags"))?;
		if 0 == self.ocr_a {
			return Err(IrError::InvalidTimerConfig("OCR0A must not be zero"));
		}
		if self.ocr_b > self.ocr_a {
			return Err(IrError::InvalidTimerConfig("OCR0B must not exceed OCR0A"));
		}
		Ok(prescaler)
	}

	/// Effective carrier frequency; 0 for an invalid configuration
	pub fn carrier_hz(&self, clock_hz: u32) -> u32 {
		match Prescaler::from_flags(self.prescaler_flags) {
			None => 0,
			Some(p) => clock_hz / (p.divisor() * (self.ocr_a as u32 + 1)),
		}
	}

	pub fn duty_percent(&self) -> u32 {
		(self.ocr_b as u32 + 1) * 100 / (self.ocr_a as u32 + 1)
	}
}

/// Sampling tick configuration (CTC mode)
///
/// `ocr` is the number of prescaled timer counts per tick.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TickConfig {
	pub prescaler_flags: u8,
	pub ocr: u8,
}

impl Default for TickConfig {
	fn default() -> Self {
		TickConfig {
			prescaler_flags: TICK_PRESCALER,
			ocr: TICK_OCR,
		}
	}
}

impl TickConfig {
	pub fn for_duration(clock_hz: u32, tick_us: u32) -> Result<Self, IrError> {
		let tick_counts = clock_hz as u64 * tick_us as u64 / 1_000_000;
		for prescaler in Prescaler::ALL.iter() {
			let counts = tick_counts / prescaler.divisor() as u64;
			if 0 < counts && counts <= 255 {
				return Ok(TickConfig {
					prescaler_flags: prescaler.flags(),
					ocr: counts as u8,
				});
			}
		}
		Err(IrError::InvalidTimerConfig("tick duration out of range"))
	}

	pub fn tick_ns(&self, clock_hz: u32) -> u64 {
		match Prescaler::from_flags(self.prescaler_flags) {
			None => 0,
			Some(p) => self.ocr as u64 * p.divisor() as u64 * 1_000_000_000 / clock_hz as u64,
		}
	}

	/// the configured tick must match `tick_us` within 1%
	pub fn validate(&self, clock_hz: u32, tick_us: u32) -> Result<Prescaler, IrError> {
		let prescaler = Prescaler::from_flags(self.prescaler_flags)
			.ok_or(IrError::InvalidTimerConfig("unsupported tick prescaler flags"))?;
		if 0 == self.ocr {
			return Err(IrError::InvalidTimerConfig("tick OCR must not be zero"));
		}
		if 0 == tick_us || 0 == clock_hz {
			return Err(IrError::InvalidTimerConfig("tick duration and clock must not be zero"));
		}
		let wanted = tick_us as u64 * 1000;
		let actual = self.tick_ns(clock_hz);
		let diff = if actual > wanted { actual - wanted } else { wanted - actual };
		if diff * 100 > wanted {
			return Err(IrError::InvalidTimerConfig("tick OCR/prescaler don't match the tick duration"));
		}
		Ok(prescaler)
	}
}
