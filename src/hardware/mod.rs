/// Register level access to an ATmega style Timer0 and the I/O ports
///
/// The carrier is generated by Timer0 in fast PWM mode on OC0B (PD5);
/// switching the compare output mode (COM0B1 in TCCR0A) on and off keys the
/// IR LED. The sensor is sampled through one of the PINx registers.
///
/// Register addresses are data space addresses (ATmega328P / ATmega32u4).

use std::thread;
use std::time::{
	Duration,
	Instant,
};

mod linux;
mod low_level;
mod sim;

pub use self::linux::open_register_window;

pub use self::low_level::LowLevel;

pub use self::sim::SimulatedHardware;

// TCCR0A
pub const WGM00: u8 = 0;
pub const WGM01: u8 = 1;
pub const COM0B1: u8 = 5;
// TCCR0B
pub const WGM02: u8 = 3;
// TIFR0
pub const OCF0A: u8 = 1;
// OC0B output
pub const PD5: u8 = 5;

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

// the scheduler can't do better than this; spin for the rest
const SPIN_MARGIN: Duration = Duration::from_micros(200);

/// Return at `deadline` (or right away if it already passed).
pub fn sleep_until(deadline: Instant) {
	loop {
		let now = Instant::now();
		if now >= deadline {
			return;
		}
		let left = deadline - now;
		if left > SPIN_MARGIN {
			thread::sleep(left - SPIN_MARGIN);
		} else {
			thread::yield_now();
		}
	}
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Register {
	Pinb,
	Ddrb,
	Portb,
	Pinc,
	Ddrc,
	Portc,
	Pind,
	Ddrd,
	Portd,
	Tifr0,
	Tccr0a,
	Tccr0b,
	Tcnt0,
	Ocr0a,
	Ocr0b,
}

impl Register {
	pub fn address(self) -> usize {
		match self {
			Register::Pinb => 0x23,
			Register::Ddrb => 0x24,
			Register::Portb => 0x25,
			Register::Pinc => 0x26,
			Register::Ddrc => 0x27,
			Register::Portc => 0x28,
			Register::Pind => 0x29,
			Register::Ddrd => 0x2a,
			Register::Portd => 0x2b,
			Register::Tifr0 => 0x35,
			Register::Tccr0a => 0x44,
			Register::Tccr0b => 0x45,
			Register::Tcnt0 => 0x46,
			Register::Ocr0a => 0x47,
			Register::Ocr0b => 0x48,
		}
	}
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Port {
	B,
	C,
	D,
}

impl Port {
	pub fn pin_register(self) -> Register {
		match self {
			Port::B => Register::Pinb,
			Port::C => Register::Pinc,
			Port::D => Register::Pind,
		}
	}

	pub fn ddr_register(self) -> Register {
		match self {
			Port::B => Register::Ddrb,
			Port::C => Register::Ddrc,
			Port::D => Register::Ddrd,
		}
	}
}

/// Input pin the IR receiver module is connected to
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SensorPin {
	pub port: Port,
	pub bit: u8,
}

pub trait Hardware {
	fn write_register(&mut self, register: Register, value: u8);
	fn read_register(&mut self, register: Register) -> u8;

	// block until `ticks` sampling ticks passed
	fn wait_ticks(&mut self, ticks: u32);
}

impl<'a, H: ?Sized + Hardware> Hardware for &'a mut H {
	fn write_register(&mut self, register: Register, value: u8) {
		H::write_register(*self, register, value)
	}

	fn read_register(&mut self, register: Register) -> u8 {
		H::read_register(*self, register)
	}

	fn wait_ticks(&mut self, ticks: u32) {
		H::wait_ticks(*self, ticks)
	}
}
