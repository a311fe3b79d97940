use formula_daemon::{Collection, Daemon, DaemonError, Disconnect, RetainerId};
use formula_graph::{Formula, FormulaId};
use itertools::Itertools;
use std::{
    collections::BTreeMap,
    io::{self, BufRead, Write},
    path::PathBuf,
};

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("line {line}: unknown command {command:?}")]
    UnknownCommand { line: usize, command: String },
    #[error("line {line}: usage: {usage}")]
    Usage { line: usize, usage: &'static str },
    #[error("line {line}: invalid formula: {source}")]
    Formula {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: {source}")]
    Daemon {
        line: usize,
        #[source]
        source: DaemonError,
    },
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Root(FormulaId),
    Add(FormulaId, Formula),
    Pin(FormulaId),
    Unpin(FormulaId),
    Name {
        store: FormulaId,
        pet: String,
        id: FormulaId,
    },
    Unname {
        store: FormulaId,
        pet: String,
    },
    Rename {
        store: FormulaId,
        from: String,
        to: String,
    },
    Retain {
        session: String,
        id: FormulaId,
    },
    Collect,
    Group(FormulaId),
}

impl Command {
    fn changes_graph(&self) -> bool {
        !matches!(self, Command::Collect | Command::Group(_))
    }
}

/// Parses line number `line` (1-based) of a script. Blank lines and `#`
/// comments give `None`.
pub fn parse_line(line: usize, text: &str) -> Result<Option<Command>, ScriptError> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }
    let (command, rest) = text
        .split_once(char::is_whitespace)
        .map_or((text, ""), |(command, rest)| (command, rest.trim_start()));

    // `add` takes the rest of the line as JSON
    if command == "add" {
        let (id, json) = rest
            .split_once(char::is_whitespace)
            .ok_or(ScriptError::Usage {
                line,
                usage: "add <id> <json formula>",
            })?;
        let formula = serde_json::from_str(json.trim())
            .map_err(|source| ScriptError::Formula { line, source })?;
        return Ok(Some(Command::Add(FormulaId::from(id), formula)));
    }

    let args: Vec<&str> = rest.split_whitespace().collect();
    let usage = |usage| ScriptError::Usage { line, usage };
    let command = match (command, args.as_slice()) {
        ("root", [id]) => Command::Root(FormulaId::from(*id)),
        ("root", _) => return Err(usage("root <id>")),
        ("pin", [id]) => Command::Pin(FormulaId::from(*id)),
        ("pin", _) => return Err(usage("pin <id>")),
        ("unpin", [id]) => Command::Unpin(FormulaId::from(*id)),
        ("unpin", _) => return Err(usage("unpin <id>")),
        ("name", [store, pet, id]) => Command::Name {
            store: FormulaId::from(*store),
            pet: pet.to_string(),
            id: FormulaId::from(*id),
        },
        ("name", _) => return Err(usage("name <store> <pet> <id>")),
        ("unname", [store, pet]) => Command::Unname {
            store: FormulaId::from(*store),
            pet: pet.to_string(),
        },
        ("unname", _) => return Err(usage("unname <store> <pet>")),
        ("rename", [store, from, to]) => Command::Rename {
            store: FormulaId::from(*store),
            from: from.to_string(),
            to: to.to_string(),
        },
        ("rename", _) => return Err(usage("rename <store> <from> <to>")),
        ("retain", [session, id]) => Command::Retain {
            session: session.to_string(),
            id: FormulaId::from(*id),
        },
        ("retain", _) => return Err(usage("retain <session> <id>")),
        ("collect", []) => Command::Collect,
        ("collect", _) => return Err(usage("collect")),
        ("group", [id]) => Command::Group(FormulaId::from(*id)),
        ("group", _) => return Err(usage("group <id>")),
        (other, _) => {
            return Err(ScriptError::UnknownCommand {
                line,
                command: other.to_owned(),
            })
        }
    };
    Ok(Some(command))
}

/// Feeds script commands to a daemon and writes what happens to `out`.
pub struct Replay<W> {
    daemon: Daemon,
    sessions: BTreeMap<String, RetainerId>,
    auto_collect: bool,
    out: W,
}

impl<W: Write> Replay<W> {
    pub fn new(daemon: Daemon, auto_collect: bool, out: W) -> Self {
        daemon.set_terminate_hook(|worker| info!("terminating worker {worker}"));
        Self {
            daemon,
            sessions: BTreeMap::new(),
            auto_collect,
            out,
        }
    }

    pub fn daemon(&self) -> &Daemon {
        &self.daemon
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn run<R: BufRead>(&mut self, input: R) -> Result<(), ScriptError> {
        for (index, text) in input.lines().enumerate() {
            let line = index + 1;
            if let Some(command) = parse_line(line, &text?)? {
                self.execute(line, command)?;
            }
        }
        Ok(())
    }

    pub fn execute(&mut self, line: usize, command: Command) -> Result<(), ScriptError> {
        trace!("line {line}: {command:?}");
        let at = |source: DaemonError| ScriptError::Daemon { line, source };
        let changes_graph = command.changes_graph();
        match command {
            Command::Root(id) => self.daemon.add_root(&id),
            Command::Add(id, formula) => self.daemon.formulate(id, formula),
            Command::Pin(id) => self.daemon.pin_transient(&id),
            Command::Unpin(id) => self.daemon.unpin_transient(&id),
            Command::Name { store, pet, id } => {
                self.daemon.write_name(&store, &pet, id).map_err(at)?
            }
            Command::Unname { store, pet } => {
                self.daemon.remove_name(&store, &pet).map_err(at)?;
            }
            Command::Rename { store, from, to } => {
                self.daemon.rename_name(&store, &from, &to).map_err(at)?
            }
            Command::Retain { session, id } => {
                let retainer = self.session(&session);
                self.daemon.retain(retainer, &id).map_err(at)?
            }
            Command::Collect => {
                let collection = self.daemon.collect_if_dirty();
                self.report(&collection)?;
            }
            Command::Group(id) => {
                let group = self.daemon.find_group(&id);
                writeln!(self.out, "group {id}: {group}")?;
            }
        }
        if changes_graph && self.auto_collect {
            let collection = self.daemon.maybe_collect();
            if !collection.is_empty() {
                self.report(&collection)?;
            }
        }
        Ok(())
    }

    /// The retainer standing for `name`, registered on first use. A closed
    /// session comes back as a fresh one.
    fn session(&mut self, name: &str) -> RetainerId {
        if let Some(&retainer) = self.sessions.get(name) {
            return retainer;
        }
        let label = name.to_owned();
        let retainer = self
            .daemon
            .register_retainer(move |reason: &Disconnect| info!("session {label}: {reason}"));
        self.sessions.insert(name.to_owned(), retainer);
        retainer
    }

    fn report(&mut self, collection: &Collection) -> io::Result<()> {
        if collection.is_empty() {
            writeln!(self.out, "collected: nothing")?;
            return Ok(());
        }
        writeln!(self.out, "collected: {}", collection.collected().iter().join(", "))?;
        for closed in &collection.closed {
            let name = self
                .sessions
                .iter()
                .find(|(_, retainer)| **retainer == closed.retainer)
                .map(|(name, _)| name.clone());
            if let Some(name) = name {
                self.sessions.remove(&name);
                writeln!(self.out, "closed {name}: {}", closed.reason)?;
            }
        }
        for worker in &collection.terminated {
            writeln!(self.out, "terminated {worker}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Option<Command> {
        parse_line(1, text).unwrap()
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("   # pins survive restarts"), None);
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse("root w1"), Some(Command::Root(FormulaId::from("w1"))));
        assert_eq!(
            parse("  name  pets  my-worker w1 "),
            Some(Command::Name {
                store: FormulaId::from("pets"),
                pet: "my-worker".to_owned(),
                id: FormulaId::from("w1"),
            })
        );
        assert_eq!(parse("collect"), Some(Command::Collect));
        assert_eq!(
            parse(r#"add h1 {"type": "handle", "agent": "g1"}"#),
            Some(Command::Add(
                FormulaId::from("h1"),
                Formula::Handle {
                    agent: FormulaId::from("g1")
                }
            ))
        );
    }

    #[test]
    fn errors_carry_line_numbers() {
        let err = parse_line(7, "root").unwrap_err();
        assert_eq!(err.to_string(), "line 7: usage: root <id>");

        let err = parse_line(3, "sweep").unwrap_err();
        assert_eq!(err.to_string(), r#"line 3: unknown command "sweep""#);

        let err = parse_line(2, r#"add x {"type": "nope"}"#).unwrap_err();
        assert!(matches!(err, ScriptError::Formula { line: 2, .. }));

        let err = parse_line(4, "add x").unwrap_err();
        assert!(matches!(err, ScriptError::Usage { line: 4, .. }));
    }
}
