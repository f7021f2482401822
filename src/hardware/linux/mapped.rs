use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::io::{
	FromRawFd,
};
use std::ptr;

use libc::{
	MAP_SHARED,
	O_CLOEXEC,
	O_RDWR,
	O_SYNC,
	PROT_READ,
	PROT_WRITE,
	c_void,
	mmap,
	munmap,
	open,
};

#[derive(Debug)]
pub struct Mapped {
	ptr: ptr::NonNull<u8>, // u8 instead of void for easier offset operations
	len: usize,
	// keep the file open as long as the mapping exists
	_file: fs::File,
}

impl Drop for Mapped {
	fn drop(&mut self) {
		unsafe {
			let res = munmap(
				self.ptr.as_ptr() as *mut c_void,
				self.len,
			);
			if 0 != res {
				error!("munmap failed: {}", io::Error::last_os_error());
			}
		}
	}
}

impl Mapped {
	pub fn len(&self) -> usize {
		self.len
	}

	pub fn read_byte(&self, offset: usize) -> u8 {
		assert!(offset < self.len);
		unsafe { ptr::read_volatile(self.ptr.as_ptr().add(offset)) }
	}

	pub fn write_byte(&mut self, offset: usize, data: u8) {
		assert!(offset < self.len);
		unsafe { ptr::write_volatile(self.ptr.as_ptr().add(offset), data) }
	}
}

// UIO devices report a size of 0; `len` is the size of the register window
// in that case
pub fn inner_open(path: &str, len: usize) -> io::Result<Mapped> {
	let open_flags = O_RDWR | O_CLOEXEC | O_SYNC;
	let mmap_prot_flags = PROT_WRITE | PROT_READ;

	let c_path = CString::new(path)?;

	let fd = unsafe { open(c_path.as_ptr(), open_flags) };
	if -1 == fd {
		return Err(io::Error::last_os_error());
	}
	// now get fd managed to prevent resource leak
	let f = unsafe { fs::File::from_raw_fd(fd) };

	let size = f.metadata()?.len();
	assert!(size < !0usize as u64);
	let size = if 0 == size { len } else { (size as usize).min(len) };
	if 0 == size {
		return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty register window"));
	}

	let area = unsafe {
		mmap(
			ptr::null_mut(),
			size,
			mmap_prot_flags,
			MAP_SHARED,
			fd,
			0,
		)
	};

	if area == libc::MAP_FAILED {
		return Err(io::Error::last_os_error());
	}
	match ptr::NonNull::new(area as *mut u8) {
		None => Err(io::Error::new(io::ErrorKind::Other, "mmap returned NULL")),
		Some(area) => Ok(Mapped {
			ptr: area,
			len: size,
			_file: f,
		}),
	}
}
