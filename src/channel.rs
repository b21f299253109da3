use crate::prelude::*;

/// One unidirectional byte stream between two adjacent stages
#[derive(Debug)]
pub struct Channel {
	read: RustFd,
	write: RustFd,
}

impl Channel {
	pub fn open() -> Result<Self, Errno> {
		let (read, write) = RustFd::pipe()?;
		Ok(Self { read, write })
	}

	pub fn read_end(&self) -> &RustFd {
		&self.read
	}

	pub fn write_end(&self) -> &RustFd {
		&self.write
	}

	pub fn read_end_mut(&mut self) -> &mut RustFd {
		&mut self.read
	}

	pub fn write_end_mut(&mut self) -> &mut RustFd {
		&mut self.write
	}

	/// Close both ends. Both closes are attempted even if the first one fails.
	pub fn close(&mut self) -> Result<(), Errno> {
		let read = self.read.close();
		let write = self.write.close();
		read.and(write)
	}

	pub fn is_open(&self) -> bool {
		self.read.is_valid() || self.write.is_valid()
	}
}

/// Every channel of a pipeline, allocated in one go by the original process.
///
/// Channel `i` carries stage `i`'s stdout to stage `i + 1`'s stdin. All of them must exist
/// before the first split, since a process only inherits the descriptors that were open
/// at the moment it was split off.
#[derive(Debug)]
pub struct ChannelSet {
	channels: Vec<Channel>
}

impl ChannelSet {
	/// Allocate the `stage_count - 1` channels for a pipeline of `stage_count` stages.
	///
	/// On failure every channel allocated so far is closed again, so nothing leaks into a
	/// process tree that will never exist.
	pub fn build(stage_count: usize) -> PlumbResult<Self> {
		if stage_count < 2 {
			return Err(PlumbErr::InvalidPlan(format!("a pipeline needs at least 2 stages, got {}", stage_count)))
		}

		let mut channels = Vec::with_capacity(stage_count - 1);
		for channel in 0..stage_count - 1 {
			match Channel::open() {
				Ok(ch) => {
					trace!("channel {}: read end {}, write end {}", channel, ch.read_end(), ch.write_end());
					channels.push(ch);
				}
				Err(errno) => {
					let mut partial = Self { channels };
					partial.close_all();
					return Err(PlumbErr::ResourceExhausted { channel, errno })
				}
			}
		}
		debug!("allocated {} channels for {} stages", channels.len(), stage_count);
		Ok(Self { channels })
	}

	pub fn len(&self) -> usize {
		self.channels.len()
	}

	pub fn get(&self, index: usize) -> Option<&Channel> {
		self.channels.get(index)
	}

	pub fn get_mut(&mut self, index: usize) -> Option<&mut Channel> {
		self.channels.get_mut(index)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Channel> {
		self.channels.iter()
	}

	/// Number of handles, counting both ends of every channel, that are still open in this process
	pub fn open_handles(&self) -> usize {
		self.channels.iter()
			.map(|ch| ch.read_end().is_valid() as usize + ch.write_end().is_valid() as usize)
			.sum()
	}

	/// Close both ends of every channel.
	///
	/// A stray write end kept open anywhere means the reader on that channel never sees
	/// end-of-stream, so nothing is skipped here, including handles this process never touched.
	pub fn close_all(&mut self) {
		for (index, channel) in self.channels.iter_mut().enumerate() {
			if let Err(e) = channel.close() {
				// close(2) releases the descriptor even when it reports an error
				trace!("channel {}: close reported {}", index, e);
			}
		}
	}
}
