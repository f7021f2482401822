use std::time::{
	Duration,
	Instant,
};

mod mapped;

use self::mapped::Mapped;

use super::{
	Hardware,
	Register,
	sleep_until,
};

// covers all I/O registers up to the extended I/O space
const WINDOW_LEN: usize = 0x100;
// a schedule lagging more than this is restarted instead of caught up
const MAX_LAG: Duration = Duration::from_millis(5);

/// Data space of the controller mapped into our address space (UIO or
/// `/dev/mem`); ticks are timed with the host clock.
///
/// Consecutive waits continue from the previous deadline, so time spent
/// between them (and oversleeping) doesn't add up.
struct RegisterWindow {
	mapped: Mapped,
	tick: Duration,
	deadline: Option<Instant>,
}

impl Hardware for RegisterWindow {
	fn write_register(&mut self, register: Register, value: u8) {
		trace!("{:?} <- 0x{:02x}", register, value);
		self.mapped.write_byte(register.address(), value);
	}

	fn read_register(&mut self, register: Register) -> u8 {
		self.mapped.read_byte(register.address())
	}

	fn wait_ticks(&mut self, ticks: u32) {
		let now = Instant::now();
		let start = match self.deadline {
			Some(deadline) if deadline + MAX_LAG >= now => deadline,
			_ => now,
		};
		let deadline = start + self.tick * ticks;
		self.deadline = Some(deadline);
		sleep_until(deadline);
	}
}

pub fn open_register_window(path: &str, tick_us: u32) -> crate::AResult<impl Hardware> {
	let mapped = with_context!(("couldn't map registers from {}", path), {
		Ok(mapped::inner_open(path, WINDOW_LEN)?)
	})?;
	ensure!(mapped.len() > Register::Ocr0b.address(), "register window of {} too small: {} bytes", path, mapped.len());
	debug!("mapped {} bytes of registers from {}", mapped.len(), path);

	Ok(RegisterWindow {
		mapped,
		tick: Duration::from_micros(tick_us as u64),
		deadline: None,
	})
}
