use super::{
	I2cBus,
	EEPROM_ADDRESS,
	PAGE_SIZE,
};

/// In-memory 24C EEPROM on its own bus
///
/// Starts erased (all `0xff`). After a write with data the chip stays busy
/// (doesn't acknowledge) for `write_cycle_polls` accesses.
pub struct SimulatedEeprom {
	memory: Vec<u8>,
	pointer: usize,
	busy: usize,
	write_cycle_polls: usize,
}

impl SimulatedEeprom {
	/// `size` must be a power of two
	pub fn new(size: usize) -> Self {
		assert!(size.is_power_of_two() && size >= PAGE_SIZE);
		SimulatedEeprom {
			memory: vec![0xff; size],
			pointer: 0,
			busy: 0,
			write_cycle_polls: 0,
		}
	}

	pub fn set_write_cycle_polls(&mut self, polls: usize) {
		self.write_cycle_polls = polls;
	}

	fn acknowledge(&mut self, address: u8) -> crate::AResult<()> {
		ensure!(address == EEPROM_ADDRESS >> 1, "no ACK from device 0x{:02x}", address << 1);
		if self.busy > 0 {
			self.busy -= 1;
			bail!("no ACK from device 0x{:02x} (write cycle)", address << 1);
		}
		Ok(())
	}
}

impl I2cBus for SimulatedEeprom {
	fn write(&mut self, address: u8, data: &[u8]) -> crate::AResult<()> {
		self.acknowledge(address)?;
		ensure!(data.len() >= 2, "incomplete memory address");
		let mask = self.memory.len() - 1;
		let start = (((data[0] as usize) << 8) | data[1] as usize) & mask;
		let page = start & !(PAGE_SIZE - 1);
		let mut offset = start % PAGE_SIZE;
		for &byte in &data[2..] {
			self.memory[page + offset] = byte;
			offset = (offset + 1) % PAGE_SIZE;
		}
		self.pointer = page + offset;
		if data.len() > 2 {
			self.busy = self.write_cycle_polls;
		}
		Ok(())
	}

	fn read(&mut self, address: u8, target: &mut [u8]) -> crate::AResult<()> {
		self.acknowledge(address)?;
		let mask = self.memory.len() - 1;
		for byte in target {
			*byte = self.memory[self.pointer];
			self.pointer = (self.pointer + 1) & mask;
		}
		Ok(())
	}
}
