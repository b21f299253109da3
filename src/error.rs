use crate::prelude::*;

// Errors raised before the first split abort the whole pipeline from the original process.
// Errors raised after it belong to exactly one stage and only ever end that stage.

/// Exit status for a malformed pipeline plan (sysexits EX_USAGE)
pub const EXIT_USAGE: i32 = 64;
/// Exit status for internal failures that are not tied to a stage (sysexits EX_SOFTWARE)
pub const EXIT_INTERNAL: i32 = 70;

pub type PlumbResult<T> = Result<T, PlumbErr>;

/// One of the two standard streams a stage may have spliced onto a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
	Stdin,
	Stdout
}

impl StdStream {
	pub fn fileno(&self) -> RawFd {
		match self {
			StdStream::Stdin => STDIN_FILENO,
			StdStream::Stdout => STDOUT_FILENO,
		}
	}
}

impl Display for StdStream {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StdStream::Stdin => write!(f, "stdin"),
			StdStream::Stdout => write!(f, "stdout"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlumbErr {
	InvalidPlan(String),
	ResourceExhausted { channel: usize, errno: Errno },
	SplitFailed { split: usize, errno: Errno },
	RedirectFailed { stage: usize, stream: StdStream, errno: Errno },
	ExecFailed { stage: usize, command: String, errno: Errno },
	Internal(String),
}

impl PlumbErr {
	/// Every failure kind gets its own status so a caller can tell them apart
	pub fn exit_code(&self) -> i32 {
		match self {
			PlumbErr::InvalidPlan(_) => EXIT_USAGE,
			PlumbErr::ResourceExhausted { .. } => 1,
			PlumbErr::SplitFailed { .. } => 2,
			PlumbErr::RedirectFailed { stream: StdStream::Stdin, .. } => 3,
			PlumbErr::RedirectFailed { stream: StdStream::Stdout, .. } => 4,
			PlumbErr::ExecFailed { errno: Errno::ENOENT, .. } => 127,
			PlumbErr::ExecFailed { .. } => 126,
			PlumbErr::Internal(_) => EXIT_INTERNAL,
		}
	}

	/// The stage this error belongs to, if it was raised after splitting
	pub fn stage(&self) -> Option<usize> {
		match self {
			PlumbErr::RedirectFailed { stage, .. } |
			PlumbErr::ExecFailed { stage, .. } => Some(*stage),
			_ => None
		}
	}

	/// Whether the error takes the whole pipeline down rather than a single stage
	pub fn is_pipeline_fatal(&self) -> bool {
		self.stage().is_none()
	}

	pub fn errno(&self) -> Option<Errno> {
		match self {
			PlumbErr::ResourceExhausted { errno, .. } |
			PlumbErr::SplitFailed { errno, .. } |
			PlumbErr::RedirectFailed { errno, .. } |
			PlumbErr::ExecFailed { errno, .. } => Some(*errno),
			PlumbErr::InvalidPlan(_) |
			PlumbErr::Internal(_) => None
		}
	}
}

impl Display for PlumbErr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PlumbErr::InvalidPlan(msg) => write!(f, "{}", msg),
			PlumbErr::ResourceExhausted { channel, errno } => write!(f, "couldn't get pipe for channel {}: {}", channel, errno.desc()),
			PlumbErr::SplitFailed { split, errno } => write!(f, "couldn't fork at split {}: {}", split, errno.desc()),
			PlumbErr::RedirectFailed { stage, stream, errno } => write!(f, "stage {}: could not redirect {}: {}", stage, stream, errno.desc()),
			PlumbErr::ExecFailed { stage, command, errno } => write!(f, "stage {}: {}: {}", stage, command, errno.desc()),
			PlumbErr::Internal(msg) => write!(f, "Internal Error: {}", msg),
		}
	}
}

impl std::error::Error for PlumbErr {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			PlumbErr::ResourceExhausted { errno, .. } |
			PlumbErr::SplitFailed { errno, .. } |
			PlumbErr::RedirectFailed { errno, .. } |
			PlumbErr::ExecFailed { errno, .. } => Some(errno),
			PlumbErr::InvalidPlan(_) |
			PlumbErr::Internal(_) => None
		}
	}
}

/// Report `err` on stderr, tagged with this process's id, and exit with the error's status.
///
/// After the split every stage shares the same stderr, so the pid (and the stage index
/// carried by post-split errors) is the only way to tell the diagnostics apart.
pub fn fail(err: PlumbErr) -> ! {
	let pid = getpid();
	debug!("[{}] failing with status {}: {:?}", pid, err.exit_code(), err);
	eprintln!("[{}] plumb: {}", pid, err);
	std::process::exit(err.exit_code())
}
