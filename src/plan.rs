use serde::Serialize;

use crate::{prelude::*, stage::StageFlags};

pub const USAGE: &str = "usage: plumb cmd1 cmd2 [cmd3 ... cmdN]";

/// The ordered, immutable list of programs making up a pipeline.
///
/// Index 0 is the leftmost command and reads the caller's stdin, index `len() - 1` is the
/// rightmost and writes to the caller's stdout. Names are converted to C strings up front,
/// so no stage can discover a malformed name after the process has already been split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePlan {
	commands: Vec<CString>
}

impl PipelinePlan {
	pub fn new<I, S>(commands: I) -> PlumbResult<Self>
	where
		I: IntoIterator<Item = S>,
		S: Into<Vec<u8>>,
	{
		let mut converted = vec![];
		for (index, command) in commands.into_iter().enumerate() {
			let bytes: Vec<u8> = command.into();
			if bytes.is_empty() {
				return Err(PlumbErr::InvalidPlan(format!("command {} is empty", index)))
			}
			let command = CString::new(bytes)
				.map_err(|e| PlumbErr::InvalidPlan(format!("command {} contains a nul byte at position {}", index, e.nul_position())))?;
			converted.push(command);
		}
		if converted.len() < 2 {
			return Err(PlumbErr::InvalidPlan(USAGE.into()))
		}
		Ok(Self { commands: converted })
	}

	/// Number of stages
	pub fn len(&self) -> usize {
		self.commands.len()
	}

	/// Number of channels needed to connect the stages
	pub fn channel_count(&self) -> usize {
		self.commands.len() - 1
	}

	pub fn command(&self, index: usize) -> Option<&CStr> {
		self.commands.get(index).map(|cmd| cmd.as_c_str())
	}

	pub fn commands(&self) -> &[CString] {
		&self.commands
	}

	/// Where each stage's stdin and stdout will end up once it is wired
	pub fn describe(&self) -> Vec<StageWiring> {
		let stage_count = self.len();
		self.commands.iter().enumerate().map(|(index, command)| {
			let flags = StageFlags::for_position(index, stage_count);
			let stdin = if flags.contains(StageFlags::READS_CHANNEL) {
				Endpoint::ChannelRead(index - 1)
			} else {
				Endpoint::Inherit
			};
			let stdout = if flags.contains(StageFlags::WRITES_CHANNEL) {
				Endpoint::ChannelWrite(index)
			} else {
				Endpoint::Inherit
			};
			StageWiring {
				index,
				command: command.to_string_lossy().into_owned(),
				stdin,
				stdout
			}
		}).collect()
	}

	pub fn describe_json(&self) -> PlumbResult<String> {
		serde_json::to_string(&self.describe())
			.map_err(|e| PlumbErr::Internal(format!("could not serialize pipeline wiring: {}", e)))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
	/// The stream the original process was started with
	Inherit,
	ChannelRead(usize),
	ChannelWrite(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageWiring {
	pub index: usize,
	pub command: String,
	pub stdin: Endpoint,
	pub stdout: Endpoint,
}
