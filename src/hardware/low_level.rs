use crate::pulse::Level;
use crate::timer::{
	TickConfig,
	TimerConfig,
};

use super::*;

pub trait LowLevel: Hardware {
	fn set_bits(&mut self, register: Register, mask: u8) {
		let value = self.read_register(register);
		self.write_register(register, value | mask);
	}

	fn clear_bits(&mut self, register: Register, mask: u8) {
		let value = self.read_register(register);
		self.write_register(register, value & !mask);
	}

	// connect (HIGH) or disconnect (LOW) OC0B from the PWM generator
	fn set_carrier(&mut self, level: Level) {
		match level {
			Level::High => self.set_bits(Register::Tccr0a, 1 << COM0B1),
			Level::Low => self.clear_bits(Register::Tccr0a, 1 << COM0B1),
		}
	}

	// fast PWM mode 7 (TOP = OCR0A), OC0B as output, carrier off
	fn program_carrier(&mut self, config: &TimerConfig) {
		self.set_bits(Register::Ddrd, 1 << PD5);
		self.write_register(Register::Ocr0a, config.ocr_a);
		self.write_register(Register::Ocr0b, config.ocr_b);
		self.write_register(Register::Tccr0a, (1 << WGM01) | (1 << WGM00));
		self.write_register(Register::Tccr0b, (1 << WGM02) | config.prescaler_flags);
	}

	// CTC mode 2 (TOP = OCR0A), outputs disconnected; one compare match per
	// tick
	fn program_tick(&mut self, config: &TickConfig) {
		// stop timer while reprogramming
		self.write_register(Register::Tccr0b, 0);
		self.write_register(Register::Tcnt0, 0);
		self.write_register(Register::Ocr0a, config.ocr);
		self.write_register(Register::Tccr0a, 1 << WGM01);
		// writing 1 clears a pending compare match flag
		self.write_register(Register::Tifr0, 1 << OCF0A);
		self.write_register(Register::Tccr0b, config.prescaler_flags);
	}

	fn configure_sensor(&mut self, pin: SensorPin) {
		self.clear_bits(pin.port.ddr_register(), 1 << pin.bit);
	}

	// raw pin state
	fn read_sensor(&mut self, pin: SensorPin) -> bool {
		0 != self.read_register(pin.port.pin_register()) & (1 << pin.bit)
	}

	// HIGH while the sensor sees a carrier
	fn sensor_level(&mut self, pin: SensorPin, active_low: bool) -> Level {
		Level::from(self.read_sensor(pin) != active_low)
	}
}

impl<H: Hardware + ?Sized> LowLevel for H {
}
