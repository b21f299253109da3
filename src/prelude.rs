pub use std::{
	ffi::{
		c_void,
		CStr,
		CString
	},
	fmt::{
		self,
		Display
	},
	io::{
		self,
		Read,
		Write
	},
	os::fd::{
		AsRawFd,
		RawFd
	}
};

pub use libc::{
	STDIN_FILENO,
	STDOUT_FILENO,
	STDERR_FILENO,
};
pub use nix::{
	errno::Errno,
	unistd::{
		execvp,
		fork,
		getpid,
		ForkResult,
		Pid
	}
};
pub use bitflags::bitflags;
pub use log::{debug, info, trace, warn};
pub use crate::{
	error::{
		fail,
		PlumbErr,
		PlumbResult,
		StdStream,
	},
	utils::RustFd,
};
