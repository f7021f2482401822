/// 24C series I²C EEPROM (M24C64: 8 KiB, 32 byte pages) used as a code bank
///
/// Memory addresses are 16 bit, sent MSB first after the device address.
/// Page writes only increment the lower 5 address bits, so data crossing a
/// page boundary wraps around to the start of the page.
///
/// While the chip performs an internal write cycle it doesn't acknowledge
/// its address; every access retries until it does.

use std::time::Duration;

mod linux;
mod sim;

pub use self::linux::open_i2c_bus;
pub use self::sim::SimulatedEeprom;

use crate::config::consts::MAX_PULSES;
use crate::error::IrError;
use crate::hardware::reliable_sleep;
use crate::pulse::PulseSequence;

/// device address in the 8 bit form (R/W bit 0); chip enable pins tied to
/// ground
pub const EEPROM_ADDRESS: u8 = 0xa0;
pub const PAGE_SIZE: usize = 32;
/// M24C64
pub const EEPROM_SIZE: usize = 8192;
/// room for one code in wire format (64 on/off pairs)
pub const SLOT_SIZE: usize = 128;

const WRITE_CYCLE_POLL: Duration = Duration::from_millis(1);
// write cycle takes at most 5 ms
const WRITE_CYCLE_RETRIES: usize = 20;

pub trait I2cBus {
	/// Write `data` to the device with the 7 bit `address`; fails if the
	/// device doesn't acknowledge.
	fn write(&mut self, address: u8, data: &[u8]) -> crate::AResult<()>;
	fn read(&mut self, address: u8, target: &mut [u8]) -> crate::AResult<()>;
}

impl<'a, B: ?Sized + I2cBus> I2cBus for &'a mut B {
	fn write(&mut self, address: u8, data: &[u8]) -> crate::AResult<()> {
		B::write(*self, address, data)
	}

	fn read(&mut self, address: u8, target: &mut [u8]) -> crate::AResult<()> {
		B::read(*self, address, target)
	}
}

impl<B: ?Sized + I2cBus> I2cBus for Box<B> {
	fn write(&mut self, address: u8, data: &[u8]) -> crate::AResult<()> {
		B::write(&mut **self, address, data)
	}

	fn read(&mut self, address: u8, target: &mut [u8]) -> crate::AResult<()> {
		B::read(&mut **self, address, target)
	}
}

pub struct Eeprom24c<B: I2cBus> {
	bus: B,
	device: u8,
}

impl<B: I2cBus> Eeprom24c<B> {
	pub fn new(bus: B) -> Self {
		Eeprom24c {
			bus,
			device: EEPROM_ADDRESS >> 1,
		}
	}

	pub fn bus(&mut self) -> &mut B {
		&mut self.bus
	}

	// repeat `op` until the chip acknowledges (i.e. isn't busy anymore)
	fn with_retry<F, R>(&mut self, mut op: F) -> crate::AResult<R>
	where
		F: FnMut(&mut B, u8) -> crate::AResult<R>,
	{
		let mut attempt = 0;
		loop {
			match op(&mut self.bus, self.device) {
				Ok(r) => return Ok(r),
				Err(e) => {
					attempt += 1;
					if attempt > WRITE_CYCLE_RETRIES {
						bail!("EEPROM at 0x{:02x} not responding: {}", self.device << 1, e);
					}
					trace!("EEPROM busy ({}), retrying", e);
					reliable_sleep(WRITE_CYCLE_POLL);
				},
			}
		}
	}

	pub fn write_byte(&mut self, address: u16, data: u8) -> crate::AResult<()> {
		self.with_retry(|bus, device| {
			bus.write(device, &[(address >> 8) as u8, address as u8, data])
		})
	}

	/// Write up to one page; see module documentation about wrapping.
	pub fn write_page(&mut self, address: u16, data: &[u8]) -> crate::AResult<()> {
		ensure!(data.len() <= PAGE_SIZE, "page write of {} bytes exceeds page size {}", data.len(), PAGE_SIZE);
		if address as usize % PAGE_SIZE + data.len() > PAGE_SIZE {
			warn!("page write at 0x{:04x} with {} bytes wraps around", address, data.len());
		}
		let mut buf = Vec::with_capacity(data.len() + 2);
		buf.push((address >> 8) as u8);
		buf.push(address as u8);
		buf.extend_from_slice(data);
		self.with_retry(|bus, device| bus.write(device, &buf))
	}

	/// Write arbitrary amounts, split at page boundaries.
	pub fn write_data(&mut self, mut address: u16, mut data: &[u8]) -> crate::AResult<()> {
		while !data.is_empty() {
			let room = PAGE_SIZE - address as usize % PAGE_SIZE;
			let (page, rest) = data.split_at(room.min(data.len()));
			self.write_page(address, page)?;
			address = address.wrapping_add(page.len() as u16);
			data = rest;
		}
		Ok(())
	}

	pub fn read_byte(&mut self, address: u16) -> crate::AResult<u8> {
		let mut data = [0u8];
		self.read_data(address, &mut data)?;
		Ok(data[0])
	}

	/// Read at the chip's address pointer (which is incremented afterwards).
	pub fn read_current_byte(&mut self) -> crate::AResult<u8> {
		let mut data = [0u8];
		self.with_retry(|bus, device| bus.read(device, &mut data))?;
		Ok(data[0])
	}

	/// Sequential read of `target.len()` bytes starting at `address`.
	pub fn read_data(&mut self, address: u16, target: &mut [u8]) -> crate::AResult<()> {
		// "dummy write" of the address sets the pointer
		self.with_retry(|bus, device| bus.write(device, &[(address >> 8) as u8, address as u8]))?;
		self.with_retry(|bus, device| bus.read(device, target))
	}
}

/// Learned codes in fixed size slots, stored in wire format
pub struct CodeBank<B: I2cBus> {
	eeprom: Eeprom24c<B>,
	slots: usize,
	unit_ticks: u32,
}

impl<B: I2cBus> CodeBank<B> {
	/// `unit_ticks`: ticks per wire format unit (100 µs)
	pub fn new(eeprom: Eeprom24c<B>, size: usize, unit_ticks: u32) -> Self {
		CodeBank {
			eeprom,
			slots: size / SLOT_SIZE,
			unit_ticks,
		}
	}

	pub fn slots(&self) -> usize {
		self.slots
	}

	fn slot_address(&self, slot: usize) -> crate::AResult<u16> {
		ensure!(slot < self.slots, "slot {} out of range (have {} slots)", slot, self.slots);
		Ok((slot * SLOT_SIZE) as u16)
	}

	pub fn store(&mut self, slot: usize, sequence: &PulseSequence) -> crate::AResult<()> {
		let address = self.slot_address(slot)?;
		let mut wire = match sequence.to_wire(self.unit_ticks) {
			Err(IrError::SigTooLong) => bail!(
				"code has {} pulses, stored codes hold at most {}", sequence.len(), MAX_PULSES
			),
			r => r?,
		};
		if wire.len() > SLOT_SIZE {
			// a full slot doesn't need the terminator
			wire.pop();
		}
		ensure!(wire.len() <= SLOT_SIZE, "code needs {} bytes, slot has {}", wire.len(), SLOT_SIZE);
		debug!("storing {} bytes in slot {}", wire.len(), slot);
		self.eeprom.write_data(address, &wire)?;

		// verify
		let mut check = vec![0u8; wire.len()];
		self.eeprom.read_data(address, &mut check)?;
		for (offset, (&expected, &found)) in wire.iter().zip(check.iter()).enumerate() {
			ensure!(expected == found,
				"Verify failed at {:04x}: expected {:02x}, EEPROM has {:02x}", address as usize + offset, expected, found
			);
		}
		Ok(())
	}

	/// `None` for an erased (or never written) slot
	pub fn load(&mut self, slot: usize) -> crate::AResult<Option<PulseSequence>> {
		let address = self.slot_address(slot)?;
		let mut buf = [0u8; SLOT_SIZE];
		self.eeprom.read_data(address, &mut buf)?;
		if 0xff == buf[0] || 0x00 == buf[0] {
			return Ok(None);
		}
		let sequence = PulseSequence::from_wire(&buf, self.unit_ticks)
			.map_err(|e| format_err!("slot {}: invalid code: {}", slot, e))?;
		Ok(Some(sequence))
	}

	pub fn erase(&mut self, slot: usize) -> crate::AResult<()> {
		let address = self.slot_address(slot)?;
		self.eeprom.write_byte(address, 0xff)
	}

	/// all non-empty slots
	pub fn list(&mut self) -> crate::AResult<Vec<(usize, PulseSequence)>> {
		let mut codes = Vec::new();
		for slot in 0..self.slots {
			if let Some(sequence) = self.load(slot)? {
				codes.push((slot, sequence));
			}
		}
		Ok(codes)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::pulse::Pulse;

	fn eeprom() -> Eeprom24c<SimulatedEeprom> {
		Eeprom24c::new(SimulatedEeprom::new(EEPROM_SIZE))
	}

	#[test]
	fn bytes() {
		let mut ee = eeprom();
		assert_eq!(ee.read_byte(0x0123).unwrap(), 0xff);
		ee.write_byte(0x0123, 0x42).unwrap();
		ee.write_byte(0x0124, 0x43).unwrap();
		assert_eq!(ee.read_byte(0x0123).unwrap(), 0x42);
		assert_eq!(ee.read_current_byte().unwrap(), 0x43);
		assert_eq!(ee.read_current_byte().unwrap(), 0xff);
	}

	#[test]
	fn page_write_wraps() {
		let mut ee = eeprom();
		let data: Vec<u8> = (1..=8).collect();
		ee.write_page(0x003c, &data).unwrap();
		let mut page = [0u8; PAGE_SIZE];
		ee.read_data(0x0020, &mut page).unwrap();
		assert_eq!(&page[28..], &[1, 2, 3, 4]);
		assert_eq!(&page[..4], &[5, 6, 7, 8]);
		assert_eq!(ee.read_byte(0x0040).unwrap(), 0xff);

		assert!(ee.write_page(0, &[0u8; PAGE_SIZE + 1]).is_err());
	}

	#[test]
	fn split_writes() {
		let mut ee = eeprom();
		let data: Vec<u8> = (0..100).collect();
		ee.write_data(0x0010, &data).unwrap();
		let mut back = vec![0u8; 100];
		ee.read_data(0x0010, &mut back).unwrap();
		assert_eq!(back, data);
	}

	#[test]
	fn busy_chip() {
		let mut ee = eeprom();
		ee.bus().set_write_cycle_polls(3);
		ee.write_byte(0x10, 1).unwrap();
		ee.write_byte(0x11, 2).unwrap();
		assert_eq!(ee.read_byte(0x10).unwrap(), 1);

		ee.bus().set_write_cycle_polls(WRITE_CYCLE_RETRIES + 5);
		ee.write_byte(0x12, 3).unwrap();
		assert!(ee.read_byte(0x12).is_err());
	}

	#[test]
	fn code_bank() {
		let mut bank = CodeBank::new(eeprom(), EEPROM_SIZE, 10);
		assert_eq!(bank.slots(), 64);
		assert_eq!(bank.load(3).unwrap(), None);

		let mut code = PulseSequence::new();
		code.push_mark_space(900, 450).unwrap();
		code.push_mark_space(60, 170).unwrap();
		code.push(Pulse::mark(60)).unwrap();
		bank.store(3, &code).unwrap();
		assert_eq!(bank.load(3).unwrap(), Some(code.clone()));
		assert_eq!(bank.load(2).unwrap(), None);
		assert_eq!(bank.load(4).unwrap(), None);

		let listed = bank.list().unwrap();
		assert_eq!(listed, vec![(3, code)]);

		bank.erase(3).unwrap();
		assert_eq!(bank.load(3).unwrap(), None);
		assert!(bank.load(64).is_err());
	}

	#[test]
	fn full_slot() {
		let mut bank = CodeBank::new(eeprom(), EEPROM_SIZE, 10);
		let mut code = PulseSequence::new();
		for i in 0..64 {
			code.push_mark_space(60, 60 + 10 * (i % 3)).unwrap();
		}
		bank.store(0, &code).unwrap();
		bank.store(1, &code).unwrap();
		assert_eq!(bank.load(0).unwrap(), Some(code.clone()));
		assert_eq!(bank.load(1).unwrap(), Some(code.clone()));

		// learning may allow longer codes than the wire format holds
		code.push_mark_space(60, 60).unwrap();
		let e = bank.store(2, &code).unwrap_err();
		assert!(e.to_string().contains("at most 128"), "{}", e);
		assert_eq!(bank.load(2).unwrap(), None);
	}
}
