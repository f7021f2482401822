use std::fs;
use std::io::{
	self,
	Read,
	Write,
};
use std::os::unix::io::AsRawFd;

use super::I2cBus;

// linux/i2c-dev.h
const I2C_SLAVE: libc::c_ulong = 0x0703;

/// Adapter exposed by the `i2c-dev` driver (`/dev/i2c-N`)
struct I2cDev {
	file: fs::File,
	// currently selected device
	address: Option<u8>,
}

impl I2cDev {
	fn select(&mut self, address: u8) -> io::Result<()> {
		if Some(address) == self.address {
			return Ok(());
		}
		let res = unsafe { libc::ioctl(self.file.as_raw_fd(), I2C_SLAVE as _, address as libc::c_ulong) };
		if res < 0 {
			self.address = None;
			return Err(io::Error::last_os_error());
		}
		self.address = Some(address);
		Ok(())
	}
}

impl I2cBus for I2cDev {
	fn write(&mut self, address: u8, data: &[u8]) -> crate::AResult<()> {
		self.select(address)?;
		// a missing ACK shows up as ENXIO / EREMOTEIO
		let written = self.file.write(data)?;
		ensure!(written == data.len(), "short I2C write: {} of {} bytes", written, data.len());
		Ok(())
	}

	fn read(&mut self, address: u8, target: &mut [u8]) -> crate::AResult<()> {
		self.select(address)?;
		let read = self.file.read(target)?;
		ensure!(read == target.len(), "short I2C read: {} of {} bytes", read, target.len());
		Ok(())
	}
}

pub fn open_i2c_bus(path: &str) -> crate::AResult<impl I2cBus> {
	let file = with_context!(("couldn't open I2C adapter {}", path), {
		Ok(fs::OpenOptions::new()
			.read(true)
			.write(true)
			.open(path)?)
	})?;
	debug!("opened I2C adapter {}", path);

	Ok(I2cDev {
		file,
		address: None,
	})
}
