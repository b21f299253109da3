//! Splice a chain of programs together the way a shell runs `cmd1 | cmd2 | ... | cmdN`.
//!
//! The calling process allocates every channel up front, splits itself into one process
//! per command, and each process wires its own stdin/stdout before becoming its command.

pub mod prelude;
pub mod error;
pub mod utils;
pub mod plan;
pub mod channel;
pub mod fanout;
pub mod stage;
pub mod pipeline;


pub use channel::{Channel, ChannelSet};
pub use error::{fail, PlumbErr, PlumbResult};
pub use fanout::fan_out;
pub use pipeline::run;
pub use plan::PipelinePlan;
pub use stage::{Stage, StageFlags, StageState};
