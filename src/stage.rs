use nix::sys::signal::{signal, SigHandler, Signal};

use crate::{channel::ChannelSet, plan::PipelinePlan, prelude::*};

bitflags! {
	/// Which of a stage's standard streams get spliced onto a channel
	#[derive(Debug,Clone,Copy,PartialEq,Eq)]
	pub struct StageFlags: u32 {
		const READS_CHANNEL  = 0b00000000000000000000000000000001;
		const WRITES_CHANNEL = 0b00000000000000000000000000000010;
	}
}

impl StageFlags {
	/// The first stage keeps the caller's stdin, the last keeps the caller's stdout,
	/// everything in between reads one channel and writes the next.
	pub fn for_position(index: usize, stage_count: usize) -> Self {
		let mut flags = StageFlags::empty();
		if index > 0 {
			flags |= StageFlags::READS_CHANNEL;
		}
		if index + 1 < stage_count {
			flags |= StageFlags::WRITES_CHANNEL;
		}
		flags
	}
}

/// Unwired -> InputWired -> OutputWired -> HandlesClosed -> Executing, or Failed at any step.
/// The input and output steps are skipped by the stages that keep the caller's streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageState {
	Unwired,
	InputWired,
	OutputWired,
	HandlesClosed,
	Executing,
	Failed(PlumbErr),
}

/// One process of the pipeline, knowing its own position in it
#[derive(Debug)]
pub struct Stage {
	index: usize,
	plan: PipelinePlan,
	channels: ChannelSet,
	state: StageState,
}

impl Stage {
	pub(crate) fn new(index: usize, plan: PipelinePlan, channels: ChannelSet) -> Self {
		Self { index, plan, channels, state: StageState::Unwired }
	}

	pub fn index(&self) -> usize {
		self.index
	}

	pub fn is_last(&self) -> bool {
		self.index + 1 == self.plan.len()
	}

	pub fn flags(&self) -> StageFlags {
		StageFlags::for_position(self.index, self.plan.len())
	}

	pub fn state(&self) -> &StageState {
		&self.state
	}

	pub fn channels(&self) -> &ChannelSet {
		&self.channels
	}

	pub fn channels_mut(&mut self) -> &mut ChannelSet {
		&mut self.channels
	}

	/// Splice this stage's standard streams onto its channels and close every channel handle.
	///
	/// After this returns `Ok`, the only references this process holds to any channel are
	/// the ones living in its stdin/stdout slots. A failed redirect leaves the stage `Failed`.
	pub fn wire(&mut self) -> PlumbResult<()> {
		if self.state != StageState::Unwired {
			return Err(PlumbErr::Internal(format!("stage {} wired twice (state: {:?})", self.index, self.state)))
		}
		if let Err(e) = self.splice_stdio() {
			self.state = StageState::Failed(e.clone());
			return Err(e)
		}

		self.channels.close_all();
		self.state = StageState::HandlesClosed;
		debug!("[{}] stage {} wired ({:?})", getpid(), self.index, self.flags());
		Ok(())
	}

	fn splice_stdio(&mut self) -> PlumbResult<()> {
		let flags = self.flags();
		if flags.contains(StageFlags::READS_CHANNEL) {
			self.redirect(self.index - 1, StdStream::Stdin)?;
			self.state = StageState::InputWired;
		}
		if flags.contains(StageFlags::WRITES_CHANNEL) {
			self.redirect(self.index, StdStream::Stdout)?;
			self.state = StageState::OutputWired;
		}
		Ok(())
	}

	fn redirect(&self, channel: usize, stream: StdStream) -> PlumbResult<()> {
		let stage = self.index;
		let Some(ch) = self.channels.get(channel) else {
			return Err(PlumbErr::Internal(format!("stage {} has no channel {}", stage, channel)))
		};
		let end = match stream {
			StdStream::Stdin => ch.read_end(),
			StdStream::Stdout => ch.write_end(),
		};
		end.dup2(&stream.fileno())
			.map_err(|errno| PlumbErr::RedirectFailed { stage, stream, errno })?;
		trace!("stage {}: {} <- channel {} (fd {})", stage, stream, channel, end);
		Ok(())
	}

	/// Replace this process's image with the stage's command.
	///
	/// Only ever comes back with the reason the replacement failed; on success there is
	/// nothing left to return to.
	fn exec(&mut self) -> PlumbErr {
		let Some(command) = self.plan.command(self.index) else {
			return PlumbErr::Internal(format!("stage {} has no command", self.index))
		};
		let command = command.to_owned();

		// The stage runs with default signal dispositions, like any program started by a shell
		if let Err(e) = unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl) } {
			warn!("stage {}: could not restore SIGPIPE: {}", self.index, e);
		}

		self.state = StageState::Executing;
		let Err(errno) = execvp(&command, &[command.as_c_str()]);
		PlumbErr::ExecFailed {
			stage: self.index,
			command: command.to_string_lossy().into_owned(),
			errno
		}
	}

	/// Wire this stage and become its command. Any failure ends this process, and only this one.
	pub fn wire_and_exec(mut self) -> ! {
		if let Err(e) = self.wire() {
			fail(e)
		}
		let e = self.exec();
		self.state = StageState::Failed(e.clone());
		fail(e)
	}
}
