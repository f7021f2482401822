use std::fmt;
use std::slice;

use crate::config::consts::MAX_PULSES;
use crate::error::IrError;

/// Resolution of the stored byte-pair format in µs
pub const WIRE_UNIT_US: u32 = 100;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Level {
	/// carrier off
	Low,
	/// carrier on
	High,
}

impl From<bool> for Level {
	fn from(v: bool) -> Self {
		match v {
			false => Level::Low,
			true => Level::High,
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Pulse {
	pub level: Level,
	pub ticks: u32,
}

impl Pulse {
	pub fn mark(ticks: u32) -> Self {
		Pulse { level: Level::High, ticks }
	}

	pub fn space(ticks: u32) -> Self {
		Pulse { level: Level::Low, ticks }
	}
}

impl fmt::Display for Pulse {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self.level {
			Level::High => write!(f, "+{}", self.ticks),
			Level::Low => write!(f, "-{}", self.ticks),
		}
	}
}

/// Ordered list of pulses, durations in ticks
///
/// Adjacent pulses of the same level are merged when pushed, so levels
/// always alternate.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct PulseSequence {
	pulses: Vec<Pulse>,
}

impl PulseSequence {
	pub fn new() -> Self {
		PulseSequence::default()
	}

	pub fn with_capacity(capacity: usize) -> Self {
		PulseSequence {
			pulses: Vec::with_capacity(capacity),
		}
	}

	pub fn push(&mut self, pulse: Pulse) -> Result<(), IrError> {
		if 0 == pulse.ticks {
			return Err(IrError::InvalidDuration);
		}
		match self.pulses.last_mut() {
			Some(last) if last.level == pulse.level => {
				last.ticks = last.ticks.checked_add(pulse.ticks).ok_or(match pulse.level {
					Level::High => IrError::HighPulseTooLong,
					Level::Low => IrError::LowPulseTooLong,
				})?;
			},
			_ => self.pulses.push(pulse),
		}
		Ok(())
	}

	pub fn push_mark_space(&mut self, mark: u32, space: u32) -> Result<(), IrError> {
		self.push(Pulse::mark(mark))?;
		self.push(Pulse::space(space))
	}

	pub fn len(&self) -> usize {
		self.pulses.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pulses.is_empty()
	}

	pub fn pulses(&self) -> &[Pulse] {
		&self.pulses
	}

	pub fn iter(&self) -> slice::Iter<Pulse> {
		self.pulses.iter()
	}

	pub fn total_ticks(&self) -> u64 {
		self.pulses.iter().map(|p| p.ticks as u64).sum()
	}

	/// Parse byte pairs `(on, off)` in units of `unit_ticks`, terminated by
	/// a `0x00` ON byte (or the end of the data).
	///
	/// An OFF byte of zero means the mark isn't followed by a space.
	pub fn from_wire(data: &[u8], unit_ticks: u32) -> Result<Self, IrError> {
		let mut sequence = PulseSequence::new();
		let mut pairs = 0usize;
		for pair in data.chunks(2) {
			let on = pair[0];
			if 0 == on {
				break;
			}
			pairs += 1;
			if pairs * 2 > MAX_PULSES {
				return Err(IrError::SigTooLong);
			}
			sequence.push(Pulse::mark(on as u32 * unit_ticks))?;
			let off = pair.get(1).cloned().unwrap_or(0);
			if 0 != off {
				sequence.push(Pulse::space(off as u32 * unit_ticks))?;
			}
		}
		if sequence.is_empty() {
			return Err(IrError::EmptySequence);
		}
		Ok(sequence)
	}

	/// Inverse of `from_wire`, including the `0x00` terminator
	///
	/// Durations are rounded to the nearest unit (at least one). Leading
	/// spaces can't be represented and are dropped.
	///
	/// The format is fixed at `MAX_PULSES` pulses (64 pairs) regardless of
	/// `IrConfig::max_pulses`; longer sequences fail with `SigTooLong`.
	pub fn to_wire(&self, unit_ticks: u32) -> Result<Vec<u8>, IrError> {
		fn units(ticks: u32, unit_ticks: u32) -> u64 {
			let unit_ticks = unit_ticks.max(1) as u64;
			((ticks as u64 + unit_ticks / 2) / unit_ticks).max(1)
		}

		let mut out = Vec::with_capacity(self.pulses.len() + 1);
		for pulse in self.pulses.iter().skip_while(|p| p.level == Level::Low) {
			let u = units(pulse.ticks, unit_ticks);
			match pulse.level {
				Level::High => {
					if u > 255 {
						return Err(IrError::HighPulseTooLong);
					}
					out.push(u as u8);
				},
				Level::Low => {
					if u > 255 {
						return Err(IrError::LowPulseTooLong);
					}
					out.push(u as u8);
				},
			}
		}
		if out.is_empty() {
			return Err(IrError::EmptySequence);
		}
		if 1 == out.len() % 2 {
			// trailing mark without space
			out.push(0);
		}
		if out.len() > MAX_PULSES {
			return Err(IrError::SigTooLong);
		}
		out.push(0);
		Ok(out)
	}
}

impl<'a> IntoIterator for &'a PulseSequence {
	type Item = &'a Pulse;
	type IntoIter = slice::Iter<'a, Pulse>;

	fn into_iter(self) -> Self::IntoIter {
		self.pulses.iter()
	}
}

impl fmt::Display for PulseSequence {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		for (i, pulse) in self.pulses.iter().enumerate() {
			if i > 0 {
				write!(f, " ")?;
			}
			write!(f, "{}", pulse)?;
		}
		Ok(())
	}
}

/// Parse a wire-format code from hex (whitespace and `,` are ignored)
pub fn parse_hex(code: &str) -> crate::AResult<Vec<u8>> {
	let digits: Vec<u8> = code.bytes()
		.filter(|b| !b.is_ascii_whitespace() && *b != b',')
		.collect();
	ensure!(0 == digits.len() % 2, "odd number of hex digits in {:?}", code);
	let mut out = Vec::with_capacity(digits.len() / 2);
	for pair in digits.chunks(2) {
		let s = std::str::from_utf8(pair)?;
		out.push(u8::from_str_radix(s, 16).map_err(|e| format_err!("invalid hex {:?}: {}", s, e))?);
	}
	Ok(out)
}

pub fn format_hex(data: &[u8]) -> String {
	let mut s = String::with_capacity(data.len() * 2);
	for b in data {
		s.push_str(&format!("{:02x}", b));
	}
	s
}

#[cfg(test)]
mod tests {
	use super::*;

	// lead-in, two bits and lead-out from a recorded "off" command
	const SAMPLE: [u8; 9] = [90, 45, 6, 6, 6, 17, 6, 11, 0];

	#[test]
	fn push_merges_same_level() {
		let mut seq = PulseSequence::new();
		seq.push(Pulse::mark(5)).unwrap();
		seq.push(Pulse::mark(7)).unwrap();
		seq.push(Pulse::space(3)).unwrap();
		assert_eq!(seq.pulses(), &[Pulse::mark(12), Pulse::space(3)]);
		assert_eq!(seq.push(Pulse::space(0)), Err(IrError::InvalidDuration));
	}

	#[test]
	fn wire_format() {
		let seq = PulseSequence::from_wire(&SAMPLE, 10).unwrap();
		assert_eq!(seq.len(), 8);
		assert_eq!(seq.pulses()[0], Pulse::mark(900));
		assert_eq!(seq.pulses()[1], Pulse::space(450));
		assert_eq!(seq.pulses()[3], Pulse::space(60));
		assert_eq!(seq.pulses()[5], Pulse::space(170));
		assert_eq!(seq.to_wire(10).unwrap(), &SAMPLE[..]);
	}

	#[test]
	fn wire_terminator_and_missing_space() {
		// everything after the terminator is ignored
		let seq = PulseSequence::from_wire(&[10, 0, 20, 5, 0, 99, 99], 10).unwrap();
		assert_eq!(seq.pulses(), &[Pulse::mark(300), Pulse::space(50)]);
		// no terminator at all
		let seq = PulseSequence::from_wire(&[10, 5], 10).unwrap();
		assert_eq!(seq.pulses(), &[Pulse::mark(100), Pulse::space(50)]);
		assert_eq!(PulseSequence::from_wire(&[0], 10), Err(IrError::EmptySequence));

		let mut trailing = PulseSequence::new();
		trailing.push(Pulse::mark(57)).unwrap();
		assert_eq!(trailing.to_wire(10).unwrap(), vec![6, 0, 0]);
	}

	#[test]
	fn wire_limits() {
		let mut seq = PulseSequence::new();
		seq.push_mark_space(2560, 10).unwrap();
		assert_eq!(seq.to_wire(10), Err(IrError::HighPulseTooLong));

		let mut seq = PulseSequence::new();
		seq.push_mark_space(10, 2560).unwrap();
		assert_eq!(seq.to_wire(10), Err(IrError::LowPulseTooLong));

		let long = vec![1u8; MAX_PULSES + 2];
		assert_eq!(PulseSequence::from_wire(&long, 10), Err(IrError::SigTooLong));

		let mut seq = PulseSequence::new();
		for _ in 0..(MAX_PULSES / 2 + 1) {
			seq.push_mark_space(10, 10).unwrap();
		}
		assert_eq!(seq.to_wire(10), Err(IrError::SigTooLong));

		// no overflow while rounding huge durations
		let mut seq = PulseSequence::new();
		seq.push(Pulse::mark(u32::max_value())).unwrap();
		assert_eq!(seq.to_wire(10), Err(IrError::HighPulseTooLong));
	}

	#[test]
	fn merging_saturates_into_error() {
		let mut seq = PulseSequence::new();
		seq.push(Pulse::space(u32::max_value() - 1)).unwrap();
		assert_eq!(seq.push(Pulse::space(1)), Ok(()));
		assert_eq!(seq.push(Pulse::space(1)), Err(IrError::LowPulseTooLong));
		assert_eq!(seq.pulses(), &[Pulse::space(u32::max_value())]);

		seq.push(Pulse::mark(u32::max_value())).unwrap();
		assert_eq!(seq.push(Pulse::mark(5)), Err(IrError::HighPulseTooLong));
	}

	#[test]
	fn hex() {
		let data = parse_hex("5a 2d,06 06 00").unwrap();
		assert_eq!(data, vec![0x5a, 0x2d, 6, 6, 0]);
		assert_eq!(format_hex(&data), "5a2d060600");
		assert!(parse_hex("5a2").is_err());
		assert!(parse_hex("zz").is_err());
	}

	#[test]
	fn display() {
		let mut seq = PulseSequence::new();
		seq.push_mark_space(56, 169).unwrap();
		assert_eq!(seq.to_string(), "+56 -169");
	}
}
