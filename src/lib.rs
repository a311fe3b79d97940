//! Replays formula graph scripts against a [`Daemon`](formula_daemon::Daemon).
//!
//! Each line of a script is one host event: a formula registered, a root
//! added, a pet name written, a session holding a formula, or a collection
//! request. Collections print what they removed.

#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

mod script;
mod settings;

pub use script::{parse_line, Command, Replay, ScriptError};
pub use settings::{parse_args, Settings};

use std::{
    fs::File,
    io::{self, BufReader},
    process::ExitCode,
};

pub fn run() -> ExitCode {
    let settings = parse_args();
    init_logger(settings.verbose);
    debug!("replaying with {settings:?}");

    let stdout = io::stdout();
    let mut replay = Replay::new(settings.daemon(), settings.auto_collect, stdout.lock());
    let result = match &settings.script {
        Some(path) => match File::open(path) {
            Ok(file) => replay.run(BufReader::new(file)),
            Err(source) => Err(ScriptError::Open {
                path: path.clone(),
                source,
            }),
        },
        None => replay.run(io::stdin().lock()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("replay stopped: {err}");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logger(verbose: u64) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}
