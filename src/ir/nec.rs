/// NEC protocol
///
/// Pulse distance coding with a 562.5 µs unit:
/// - leader: 9 ms mark, 4.5 ms space
/// - bit: 562.5 µs mark, then 562.5 µs space ("0") or 1687.5 µs space ("1")
/// - data: address, inverted address, command, inverted command; each byte
///   LSB first
/// - stop: 562.5 µs mark
///
/// Extended NEC replaces the inverted address with the high byte of a 16-bit
/// address. A held button sends repeat frames: 9 ms mark, 2.25 ms space,
/// stop mark.

use std::fmt;

use failure::Fail;

use crate::config::IrConfig;
use crate::error::IrError;
use crate::hardware::Hardware;
use crate::pulse::{
	Level,
	Pulse,
	PulseSequence,
};

use super::IrDriver;

const LEADER_MARK_US: u32 = 9000;
const LEADER_SPACE_US: u32 = 4500;
const REPEAT_SPACE_US: u32 = 2250;
const BIT_MARK_US: u32 = 562;
const ZERO_SPACE_US: u32 = 562;
const ONE_SPACE_US: u32 = 1687;
// frames (and repeats) start every 108 ms while a button is held
const FRAME_PERIOD_US: u32 = 108_000;

/// NEC durations in ticks
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NecTiming {
	pub leader_mark: u32,
	pub leader_space: u32,
	pub repeat_space: u32,
	pub bit_mark: u32,
	pub zero_space: u32,
	pub one_space: u32,
	pub frame_period: u32,
}

impl NecTiming {
	pub fn for_config(config: &IrConfig) -> Self {
		NecTiming {
			leader_mark: config.us_to_ticks(LEADER_MARK_US),
			leader_space: config.us_to_ticks(LEADER_SPACE_US),
			repeat_space: config.us_to_ticks(REPEAT_SPACE_US),
			bit_mark: config.us_to_ticks(BIT_MARK_US),
			zero_space: config.us_to_ticks(ZERO_SPACE_US),
			one_space: config.us_to_ticks(ONE_SPACE_US),
			frame_period: config.us_to_ticks(FRAME_PERIOD_US),
		}
	}

	fn bit_space(&self, bit: bool) -> u32 {
		if bit { self.one_space } else { self.zero_space }
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NecCommand {
	pub address: u16,
	pub command: u8,
	pub extended: bool,
}

impl NecCommand {
	pub fn new(address: u8, command: u8) -> Self {
		NecCommand {
			address: address as u16,
			command,
			extended: false,
		}
	}

	pub fn extended(address: u16, command: u8) -> Self {
		NecCommand {
			address,
			command,
			extended: true,
		}
	}

	/// bytes in transmission order
	pub fn bytes(&self) -> [u8; 4] {
		let (lo, hi) = if self.extended {
			(self.address as u8, (self.address >> 8) as u8)
		} else {
			(self.address as u8, !(self.address as u8))
		};
		[lo, hi, self.command, !self.command]
	}
}

impl fmt::Display for NecCommand {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		if self.extended {
			write!(f, "NEC address 0x{:04x} command 0x{:02x}", self.address, self.command)
		} else {
			write!(f, "NEC address 0x{:02x} command 0x{:02x}", self.address, self.command)
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NecFrame {
	Command(NecCommand),
	Repeat,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Fail)]
pub enum NecDecodeError {
	#[fail(display = "no NEC leader")]
	NoLeader,
	#[fail(display = "signal ends after {} bits", _0)]
	Truncated(usize),
	#[fail(display = "bit {} has unexpected timing", _0)]
	BadBit(usize),
	#[fail(display = "missing stop bit")]
	MissingStop,
	#[fail(display = "command doesn't match its inverted copy")]
	BadChecksum,
}

fn matches(actual: u32, expected: u32) -> bool {
	let diff = if actual > expected { actual - expected } else { expected - actual };
	diff * 4 <= expected
}

fn push_byte(sequence: &mut PulseSequence, timing: &NecTiming, byte: u8) -> Result<(), IrError> {
	for i in 0..8 {
		sequence.push_mark_space(timing.bit_mark, timing.bit_space(0 != (byte >> i) & 0x01))?;
	}
	Ok(())
}

/// Complete frame as a sequence (leader, 32 data bits, stop mark)
pub fn encode(command: &NecCommand, timing: &NecTiming) -> Result<PulseSequence, IrError> {
	let mut sequence = PulseSequence::with_capacity(67);
	sequence.push_mark_space(timing.leader_mark, timing.leader_space)?;
	for byte in command.bytes().iter() {
		push_byte(&mut sequence, timing, *byte)?;
	}
	sequence.push(Pulse::mark(timing.bit_mark))?;
	Ok(sequence)
}

pub fn encode_repeat(timing: &NecTiming) -> Result<PulseSequence, IrError> {
	let mut sequence = PulseSequence::with_capacity(3);
	sequence.push_mark_space(timing.leader_mark, timing.repeat_space)?;
	sequence.push(Pulse::mark(timing.bit_mark))?;
	Ok(sequence)
}

/// Decode bits without leader: each (mark, space) pair is one bit, LSB
/// first. Stops at the first mark not followed by a space (or at the end)
/// and returns the complete bytes plus the number of decoded bits.
pub fn decode_bits(pulses: &[Pulse], timing: &NecTiming) -> Result<(Vec<u8>, usize), NecDecodeError> {
	let mut bytes = Vec::new();
	let mut current = 0u8;
	let mut bits = 0usize;
	for pair in pulses.chunks(2) {
		if pair.len() < 2 {
			break;
		}
		let (mark, space) = (pair[0], pair[1]);
		if mark.level != Level::High || !matches(mark.ticks, timing.bit_mark) {
			return Err(NecDecodeError::BadBit(bits));
		}
		let bit = if matches(space.ticks, timing.zero_space) {
			false
		} else if matches(space.ticks, timing.one_space) {
			true
		} else if 0 == bits % 8 {
			// long gap after a complete byte: end of the bit stream
			break;
		} else {
			return Err(NecDecodeError::BadBit(bits));
		};
		if bit {
			current |= 1 << (bits % 8);
		}
		bits += 1;
		if 0 == bits % 8 {
			bytes.push(current);
			current = 0;
		}
	}
	Ok((bytes, bits))
}

/// Decode a full frame; leading spaces and anything after the stop mark
/// are ignored.
pub fn decode(pulses: &[Pulse], timing: &NecTiming) -> Result<NecFrame, NecDecodeError> {
	let start = pulses.iter().position(|p| p.level == Level::High).ok_or(NecDecodeError::NoLeader)?;
	let pulses = &pulses[start..];
	if pulses.len() < 2 || !matches(pulses[0].ticks, timing.leader_mark) {
		return Err(NecDecodeError::NoLeader);
	}

	if matches(pulses[1].ticks, timing.repeat_space) {
		return match pulses.get(2) {
			Some(stop) if matches(stop.ticks, timing.bit_mark) => Ok(NecFrame::Repeat),
			_ => Err(NecDecodeError::MissingStop),
		};
	}
	if !matches(pulses[1].ticks, timing.leader_space) {
		return Err(NecDecodeError::NoLeader);
	}

	// 32 bits, i.e. 64 pulses
	let data = &pulses[2..];
	if data.len() < 64 {
		let (_, bits) = decode_bits(data, timing)?;
		return Err(NecDecodeError::Truncated(bits));
	}
	let (bytes, bits) = decode_bits(&data[..64], timing)?;
	if bits < 32 {
		return Err(NecDecodeError::Truncated(bits));
	}
	match data.get(64) {
		Some(stop) if matches(stop.ticks, timing.bit_mark) => (),
		_ => return Err(NecDecodeError::MissingStop),
	}

	if bytes[3] != !bytes[2] {
		return Err(NecDecodeError::BadChecksum);
	}
	let command = if bytes[1] == !bytes[0] {
		NecCommand::new(bytes[0], bytes[2])
	} else {
		NecCommand::extended(bytes[0] as u16 | (bytes[1] as u16) << 8, bytes[2])
	};
	Ok(NecFrame::Command(command))
}

impl<H: Hardware> IrDriver<H> {
	pub fn nec_timing(&self) -> NecTiming {
		NecTiming::for_config(&self.config)
	}

	/// Send eight bits, LSB first, without leader or stop mark.
	pub fn send_nec_byte(&mut self, byte: u8) -> Result<(), IrError> {
		self.ensure_initialized()?;
		let timing = self.nec_timing();
		for i in 0..8 {
			self.emit(Level::High, timing.bit_mark);
			self.emit(Level::Low, timing.bit_space(0 != (byte >> i) & 0x01));
		}
		Ok(())
	}

	/// Leader, address, inverted address, command, inverted command, stop
	pub fn send_nec_command(&mut self, address: u8, command: u8) -> Result<(), IrError> {
		self.send_nec(&NecCommand::new(address, command))
	}

	pub fn send_nec(&mut self, command: &NecCommand) -> Result<(), IrError> {
		self.ensure_initialized()?;
		debug!("sending {}", command);
		let timing = self.nec_timing();
		self.emit(Level::High, timing.leader_mark);
		self.emit(Level::Low, timing.leader_space);
		for byte in command.bytes().iter() {
			self.send_nec_byte(*byte)?;
		}
		self.emit(Level::High, timing.bit_mark);
		Ok(())
	}

	pub fn send_nec_repeat(&mut self) -> Result<(), IrError> {
		self.ensure_initialized()?;
		let timing = self.nec_timing();
		self.emit(Level::High, timing.leader_mark);
		self.emit(Level::Low, timing.repeat_space);
		self.emit(Level::High, timing.bit_mark);
		Ok(())
	}

	/// A command followed by `repeats` repeat frames, as sent while a
	/// button is held down; frames are padded to the 108 ms period.
	pub fn send_nec_held(&mut self, command: &NecCommand, repeats: usize) -> Result<(), IrError> {
		self.ensure_initialized()?;
		let timing = self.nec_timing();
		let frame = encode(command, &timing)?.total_ticks();
		let repeat = encode_repeat(&timing)?.total_ticks();

		self.send_nec(command)?;
		let mut sent = frame;
		for _ in 0..repeats {
			let gap = (timing.frame_period as u64).saturating_sub(sent).max(1);
			self.emit(Level::Low, gap as u32);
			self.send_nec_repeat()?;
			sent = repeat;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ir::tests::{
		sim_config,
		sim_driver,
	};

	fn timing() -> NecTiming {
		NecTiming::for_config(&sim_config())
	}

	#[test]
	fn canonical_timing() {
		let t = timing();
		assert_eq!((t.leader_mark, t.leader_space, t.repeat_space), (900, 450, 225));
		assert_eq!((t.bit_mark, t.zero_space, t.one_space), (56, 56, 169));
	}

	#[test]
	fn every_byte_decodes() {
		for b in 0..=255u8 {
			let mut driver = sim_driver();
			driver.send_nec_byte(b).unwrap();
			let emitted = driver.hardware().emitted();
			assert_eq!(emitted.len(), 16);
			let (bytes, bits) = decode_bits(emitted.pulses(), &timing()).unwrap();
			assert_eq!(bits, 8);
			assert_eq!(bytes, vec![b]);
		}
	}

	#[test]
	fn lsb_first() {
		let mut driver = sim_driver();
		driver.send_nec_byte(0x01).unwrap();
		let emitted = driver.hardware().emitted();
		assert_eq!(emitted.pulses()[1], Pulse::space(169));
		assert_eq!(emitted.pulses()[3], Pulse::space(56));
	}

	#[test]
	fn command_decodes_with_checksum() {
		for &(address, command) in [(0x04, 0xc5), (0x00, 0x00), (0xff, 0x12), (0x5a, 0xa5)].iter() {
			let mut driver = sim_driver();
			driver.send_nec_command(address, command).unwrap();
			let emitted = driver.hardware().emitted();
			assert_eq!(emitted.len(), 67);
			assert_eq!(emitted.pulses()[0], Pulse::mark(900));
			assert_eq!(emitted.pulses()[1], Pulse::space(450));
			assert_eq!(emitted.pulses()[66], Pulse::mark(56));

			let (bytes, _) = decode_bits(&emitted.pulses()[2..66], &timing()).unwrap();
			assert_eq!(bytes, vec![address, !address, command, !command]);
			assert_eq!(
				decode(emitted.pulses(), &timing()).unwrap(),
				NecFrame::Command(NecCommand::new(address, command))
			);
		}
	}

	#[test]
	fn streamed_matches_encoded() {
		let command = NecCommand::extended(0x1234, 0x42);
		let mut driver = sim_driver();
		driver.send_nec(&command).unwrap();
		let encoded = encode(&command, &timing()).unwrap();
		assert_eq!(driver.hardware().emitted(), encoded);
		assert_eq!(decode(encoded.pulses(), &timing()), Ok(NecFrame::Command(command)));
	}

	#[test]
	fn repeat() {
		let mut driver = sim_driver();
		driver.send_nec_repeat().unwrap();
		let emitted = driver.hardware().emitted();
		assert_eq!(emitted, encode_repeat(&timing()).unwrap());
		assert_eq!(decode(emitted.pulses(), &timing()), Ok(NecFrame::Repeat));
	}

	#[test]
	fn held_button() {
		let mut driver = sim_driver();
		driver.send_nec_held(&NecCommand::new(0x04, 0xc5), 2).unwrap();
		let emitted = driver.hardware().emitted();
		let pulses = emitted.pulses();
		assert_eq!(pulses.len(), 67 + 2 * 4);
		let period = timing().frame_period as u64;
		let sum = |p: &[Pulse]| p.iter().map(|p| p.ticks as u64).sum::<u64>();
		assert_eq!(sum(&pulses[..68]), period);
		assert_eq!(sum(&pulses[68..72]), period);
		assert_eq!(decode(&pulses[72..], &timing()), Ok(NecFrame::Repeat));
	}

	#[test]
	fn tolerant_decoding() {
		// timings of a real (slightly slow) remote, in 100 µs units
		let seq = PulseSequence::from_wire(&[
			90, 45,
			6, 6, 6, 6, 6, 17, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6,
			6, 17, 6, 17, 6, 6, 6, 17, 6, 17, 6, 17, 6, 17, 6, 17,
			6, 17, 6, 6, 6, 17, 6, 6, 6, 6, 6, 6, 6, 17, 6, 17,
			6, 6, 6, 17, 6, 6, 6, 17, 6, 17, 6, 17, 6, 6, 6, 6,
			6, 11, 0,
		], 10).unwrap();
		assert_eq!(decode(seq.pulses(), &timing()), Ok(NecFrame::Command(NecCommand::new(0x04, 0xc5))));
	}

	#[test]
	fn decode_errors() {
		let t = timing();
		let mut seq = PulseSequence::new();
		seq.push_mark_space(300, 300).unwrap();
		assert_eq!(decode(seq.pulses(), &t), Err(NecDecodeError::NoLeader));

		let full = encode(&NecCommand::new(0x04, 0xc5), &t).unwrap();
		assert_eq!(decode(&full.pulses()[..20], &t), Err(NecDecodeError::Truncated(9)));
		assert_eq!(decode(&full.pulses()[..66], &t), Err(NecDecodeError::MissingStop));

		let mut bad = NecCommand::new(0x04, 0xc5).bytes();
		bad[3] = 0;
		let mut seq = PulseSequence::new();
		seq.push_mark_space(t.leader_mark, t.leader_space).unwrap();
		for byte in bad.iter() {
			push_byte(&mut seq, &t, *byte).unwrap();
		}
		seq.push(Pulse::mark(t.bit_mark)).unwrap();
		assert_eq!(decode(seq.pulses(), &t), Err(NecDecodeError::BadChecksum));
	}
}
