use std::{ffi::OsString, os::unix::ffi::OsStringExt};

use clap::{value_parser, Arg, ArgAction, Command};
use log::debug;

use plumb::{fail, pipeline, PipelinePlan};

fn cli() -> Command {
	Command::new("plumb")
		.about("Run programs as a pipeline: plumb cmd1 cmd2 ... behaves like cmd1 | cmd2 | ...")
		.version(env!("CARGO_PKG_VERSION"))
		.arg(
			Arg::new("verbose")
				.short('v')
				.long("verbose")
				.action(ArgAction::Count)
				.help("Log more (repeat for more detail). RUST_LOG takes precedence")
		)
		.arg(
			Arg::new("plan")
				.long("plan")
				.action(ArgAction::SetTrue)
				.help("Print how each stage would be wired, as JSON, without running anything")
		)
		.arg(
			Arg::new("commands")
				.value_name("COMMAND")
				.num_args(2..)
				.required(true)
				.value_parser(value_parser!(OsString))
				.help("Programs to chain, leftmost first. Each is run without arguments")
		)
}

fn init_logger(verbosity: u8) {
	let default_filter = match verbosity {
		0 => "warn",
		1 => "info",
		2 => "debug",
		_ => "trace",
	};
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
}

fn main() {
	let matches = cli().get_matches();
	init_logger(matches.get_count("verbose"));

	let commands = matches.get_many::<OsString>("commands")
		.into_iter()
		.flatten()
		.map(|cmd| cmd.clone().into_vec());
	let plan = match PipelinePlan::new(commands) {
		Ok(plan) => plan,
		Err(e) => fail(e)
	};
	debug!("plan: {:?}", plan);

	if matches.get_flag("plan") {
		match plan.describe_json() {
			Ok(json) => println!("{}", json),
			Err(e) => fail(e)
		}
		return
	}

	pipeline::run(plan)
}
