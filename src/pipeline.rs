use crate::{channel::ChannelSet, fanout::fan_out, plan::PipelinePlan, prelude::*};

/// Run `plan` as `cmd1 | cmd2 | ... | cmdN`, with the calling process becoming the last command.
///
/// Never returns. Allocation and split failures end the original process before any
/// command runs in it; wiring and exec failures end only the stage that hit them.
pub fn run(plan: PipelinePlan) -> ! {
	info!("running pipeline: {}", display_plan(&plan));

	let channels = match ChannelSet::build(plan.len()) {
		Ok(channels) => channels,
		Err(e) => fail(e)
	};

	// Anything still buffered would otherwise be written once per process
	if let Err(e) = io::stdout().flush() {
		trace!("flushing stdout before the split: {}", e);
	}
	if let Err(e) = io::stderr().flush() {
		trace!("flushing stderr before the split: {}", e);
	}

	let stage = match fan_out(plan, channels) {
		Ok(stage) => stage,
		Err(e) => fail(e)
	};
	stage.wire_and_exec()
}

/// `a | b | c`, for log lines
pub fn display_plan(plan: &PipelinePlan) -> String {
	plan.commands()
		.iter()
		.map(|cmd| cmd.to_string_lossy())
		.collect::<Vec<_>>()
		.join(" | ")
}
