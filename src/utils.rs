use crate::prelude::*;

/// The lowest descriptor number a channel handle may occupy; 0, 1 and 2 belong to the stdio slots
const FIRST_FREE_FD: RawFd = 3;

/// A raw file descriptor that is only ever closed explicitly.
///
/// No `Drop` impl: after a split every process holds its own copy of the descriptor table
/// and closes the handles it does not own itself.
#[derive(Hash, Eq, PartialEq, Debug)]
pub struct RustFd {
	fd: RawFd,
}

impl io::Write for RustFd {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		if !self.is_valid() {
			return Err(io::Error::new(io::ErrorKind::Other, "Invalid RustFd"))
		}

		loop {
			let result = unsafe { libc::write(self.fd, buf.as_ptr() as *const c_void, buf.len()) };
			match Errno::result(result) {
				Ok(n) => return Ok(n as usize),
				Err(Errno::EINTR) => continue,
				Err(e) => return Err(e.into())
			}
		}
	}
	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

impl io::Read for RustFd {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if !self.is_valid() {
			return Err(io::Error::new(io::ErrorKind::Other, "Invalid RustFd"));
		}

		loop {
			let result = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut c_void, buf.len()) };
			match Errno::result(result) {
				Ok(n) => return Ok(n as usize),
				Err(Errno::EINTR) => continue,
				Err(e) => return Err(e.into())
			}
		}
	}
}

impl RustFd {
	/// Wrapper for pipe(2), produces two `RustFds` that point to the read and write ends respectively.
	///
	/// If the caller started with one of its stdio slots closed, the kernel hands that slot out
	/// first. Such ends are moved above the stdio range so wiring a stage can never clobber them.
	pub fn pipe() -> Result<(Self,Self), Errno> {
		let mut fds = [0;2];
		Errno::result(unsafe { libc::pipe(fds.as_mut_ptr()) })?;

		let mut r_fd = RustFd { fd: fds[0] };
		let mut w_fd = RustFd { fd: fds[1] };
		if let Err(e) = r_fd.lift_above_stdio().and_then(|_| w_fd.lift_above_stdio()) {
			let _ = r_fd.close();
			let _ = w_fd.close();
			return Err(e)
		}
		Ok((r_fd,w_fd))
	}

	fn lift_above_stdio(&mut self) -> Result<(), Errno> {
		if self.fd >= FIRST_FREE_FD {
			return Ok(())
		}
		let lifted = Errno::result(unsafe { libc::fcntl(self.fd, libc::F_DUPFD, FIRST_FREE_FD) })?;
		unsafe { libc::close(self.fd) };
		trace!("moved pipe end from fd {} to fd {}", self.fd, lifted);
		self.fd = lifted;
		Ok(())
	}

	/// A wrapper for dup2(2): the target slot is atomically replaced by a copy of `self`.
	pub fn dup2<T: AsRawFd>(&self, target: &T) -> Result<(), Errno> {
		let target_fd = target.as_raw_fd();
		if !self.is_valid() || target_fd < 0 {
			return Err(Errno::EBADF);
		}
		if self.fd == target_fd {
			// Nothing to do here
			return Ok(())
		}

		Errno::result(unsafe { libc::dup2(self.fd, target_fd) })?;
		Ok(())
	}

	/// Close the descriptor. Closing an already closed `RustFd` is a no-op.
	pub fn close(&mut self) -> Result<(), Errno> {
		if !self.is_valid() {
			return Ok(())
		}

		let result = unsafe { libc::close(self.fd) };
		self.fd = -1;
		Errno::result(result).map(|_| ())
	}

	pub fn is_valid(&self) -> bool {
		self.fd >= 0
	}
}

impl Display for RustFd {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.fd)
	}
}

impl AsRawFd for RustFd {
	fn as_raw_fd(&self) -> RawFd {
		self.fd
	}
}
