use clap::{App, AppSettings, Arg, ArgMatches};
use formula_daemon::{CollectorSettings, Daemon};
use std::{ffi::OsString, path::PathBuf, time::Duration};

/// Everything the command line decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub verbose: u64,
    /// read from stdin when absent
    pub script: Option<PathBuf>,
    pub collector: CollectorSettings,
    /// run a scheduled pass after every command that changes the graph
    pub auto_collect: bool,
    /// only ids hosted on this node are collectible
    pub local_node: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verbose: 0,
            script: None,
            collector: CollectorSettings::default(),
            auto_collect: false,
            local_node: None,
        }
    }
}

impl Settings {
    pub fn daemon(&self) -> Daemon {
        match &self.local_node {
            Some(node) => Daemon::for_node(self.collector, node.clone()),
            None => Daemon::new(self.collector),
        }
    }

    pub fn from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = app().get_matches_from_safe(args)?;
        Self::from_matches(&matches)
    }

    fn from_matches(matches: &ArgMatches) -> Result<Self, clap::Error> {
        let mut settings = Settings {
            verbose: matches.occurrences_of("verbose"),
            script: matches.value_of_os("script").map(PathBuf::from),
            local_node: matches.value_of("local-node").map(str::to_owned),
            ..Default::default()
        };
        if matches.is_present("no-collect") {
            settings.collector = CollectorSettings::disabled();
        }
        if matches.is_present("min-interval-ms") {
            let millis = value_t!(matches, "min-interval-ms", u64)?;
            settings.collector = settings
                .collector
                .with_min_interval(Duration::from_millis(millis));
            settings.auto_collect = true;
        }
        Ok(settings)
    }
}

fn app<'a, 'b>() -> App<'a, 'b> {
    App::new(crate_name!())
        .version(crate_version!())
        .author(crate_authors!())
        .about("Replays formula graph scripts and prints what each collection removes.")
        .setting(AppSettings::DeriveDisplayOrder)
        .arg(
            Arg::with_name("script")
                .required(false)
                .help("script to replay, stdin when omitted"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Give the verbosity (can be applied multiple times)"),
        )
        .arg(
            Arg::with_name("no-collect")
                .long("no-collect")
                .help("Disable collection; collect commands report nothing"),
        )
        .arg(
            Arg::with_name("min-interval-ms")
                .long("min-interval-ms")
                .takes_value(true)
                .value_name("MS")
                .help("Collect after every command, at most once per MS milliseconds"),
        )
        .arg(
            Arg::with_name("local-node")
                .long("local-node")
                .takes_value(true)
                .value_name("NODE")
                .help("Only collect ids of the form <number>:NODE"),
        )
}

/// Parses the process arguments, exiting with clap's message on error.
pub fn parse_args() -> Settings {
    Settings::from_args(std::env::args_os()).unwrap_or_else(|e| e.exit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Settings {
        Settings::from_args(std::iter::once("formula-gc").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        assert_eq!(parse(&[]), Settings::default());
    }

    #[test]
    fn flags() {
        let settings = parse(&["-vv", "--no-collect", "--local-node", "n0", "boot.fgc"]);
        assert_eq!(settings.verbose, 2);
        assert!(!settings.collector.enabled);
        assert_eq!(settings.local_node.as_deref(), Some("n0"));
        assert_eq!(settings.script, Some(PathBuf::from("boot.fgc")));
        assert!(!settings.auto_collect);
    }

    #[test]
    fn min_interval_turns_on_auto_collect() {
        let settings = parse(&["--min-interval-ms", "250"]);
        assert!(settings.auto_collect);
        assert_eq!(settings.collector.min_interval, Duration::from_millis(250));

        let err = Settings::from_args(["formula-gc", "--min-interval-ms", "soon"]);
        assert!(err.is_err());
    }
}
