use crate::{channel::ChannelSet, plan::PipelinePlan, prelude::*, stage::Stage};

/// Turn the calling process into one process per stage of `plan`.
///
/// Performs `plan.len() - 1` splits. At split `k` the new child stops splitting and becomes
/// stage `k`, while the original process carries on. The original performs every split and
/// becomes the last stage, so whoever launched it ends up waiting on the rightmost command,
/// as with a shell pipeline.
///
/// The plan and the channel set are handed to each resulting process through the returned
/// `Stage`, and every process gets the same view of the channels.
///
/// A failed split is returned from the original process. Stages split off before it
/// carry on with their wiring; the caller is expected to `fail()` so that its own
/// handles are released and those stages drain.
pub fn fan_out(plan: PipelinePlan, channels: ChannelSet) -> PlumbResult<Stage> {
	let stage_count = plan.len();
	if channels.len() + 1 != stage_count {
		return Err(PlumbErr::Internal(format!("{} channels cannot connect {} stages", channels.len(), stage_count)))
	}

	for split in 0..stage_count - 1 {
		// The child must not touch the logger or allocate before it has its identity;
		// the caller may be running other threads.
		match unsafe { fork() } {
			Ok(ForkResult::Child) => return Ok(Stage::new(split, plan, channels)),
			Ok(ForkResult::Parent { child }) => {
				debug!("split {}: stage {} is pid {}", split, split, child);
			}
			Err(errno) => return Err(PlumbErr::SplitFailed { split, errno })
		}
	}

	debug!("stage {} is pid {}", stage_count - 1, getpid());
	Ok(Stage::new(stage_count - 1, plan, channels))
}
