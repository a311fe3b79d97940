use formula_daemon::{CollectorSettings, Daemon, Disconnect};
use formula_graph::{Formula, FormulaId};

fn id(s: &str) -> FormulaId {
    FormulaId::from(s)
}

/// The formulas a freshly initialized daemon starts with.
fn boot() -> Daemon {
    let daemon = Daemon::new(CollectorSettings::default());
    let formulas = [
        (
            "endo",
            Formula::Endo {
                networks: id("networks"),
                pins: id("pins"),
                peers: id("peers"),
                host: id("host"),
                least_authority: id("least-authority"),
            },
        ),
        ("networks", Formula::PetStore),
        ("pins", Formula::PetStore),
        ("peers", Formula::KnownPeersStore),
        ("least-authority", Formula::LeastAuthority),
        (
            "host",
            Formula::Host {
                handle: id("host-handle"),
                host_handle: id("host-handle"),
                worker: id("main-worker"),
                inspector: id("host-inspector"),
                pet_store: id("host-pets"),
                mailbox_store: id("host-mail"),
                mail_hub: id("host-hub"),
                endo: id("endo"),
                networks: id("networks"),
                pins: id("pins"),
            },
        ),
        ("host-handle", Formula::Handle { agent: id("host") }),
        ("main-worker", Formula::Worker),
        (
            "host-inspector",
            Formula::PetInspector {
                pet_store: id("host-pets"),
            },
        ),
        ("host-pets", Formula::PetStore),
        ("host-mail", Formula::MailboxStore),
        (
            "host-hub",
            Formula::MailHub {
                store: id("host-mail"),
            },
        ),
    ];
    for (name, formula) in formulas {
        daemon.formulate(id(name), formula);
    }
    for root in ["endo", "peers", "least-authority", "main-worker"] {
        daemon.add_root(&id(root));
    }
    daemon
}

fn make_guest(daemon: &Daemon) {
    let formulas = [
        (
            "guest",
            Formula::Guest {
                handle: id("guest-handle"),
                host_handle: id("host-handle"),
                host_agent: id("host"),
                pet_store: id("guest-pets"),
                mailbox_store: id("guest-mail"),
                mail_hub: id("guest-hub"),
                worker: id("guest-worker"),
            },
        ),
        ("guest-handle", Formula::Handle { agent: id("guest") }),
        ("guest-pets", Formula::PetStore),
        ("guest-mail", Formula::MailboxStore),
        (
            "guest-hub",
            Formula::MailHub {
                store: id("guest-mail"),
            },
        ),
        ("guest-worker", Formula::Worker),
        (
            "guest-eval",
            Formula::Eval {
                worker: id("guest-worker"),
                source: "E(powers).request()".to_owned(),
                names: vec![],
                values: vec![],
            },
        ),
    ];
    // the host holds the guest for the whole time it is being made
    daemon.pin_transient(&id("guest-handle"));
    for (name, formula) in formulas {
        daemon.formulate(id(name), formula);
    }
    daemon
        .write_name(&id("guest-pets"), "job", id("guest-eval"))
        .unwrap();
    daemon
        .write_name(&id("host-pets"), "alice", id("guest-handle"))
        .unwrap();
    daemon.unpin_transient(&id("guest-handle"));
}

#[test]
fn booted_daemon_keeps_everything() {
    let daemon = boot();
    let before = daemon.len();
    assert!(daemon.collect_if_dirty().is_empty());
    assert_eq!(daemon.len(), before);
    assert_eq!(daemon.find_group(&id("host")), daemon.find_group(&id("host-handle")));
}

#[test]
fn forgetting_a_guest_collects_everything_it_owned() {
    let daemon = boot();
    let before = daemon.len();
    make_guest(&daemon);
    assert!(daemon.collect_if_dirty().is_empty());

    let closed = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = closed.clone();
    let session = daemon.register_retainer(move |reason: &Disconnect| {
        sink.lock().unwrap().push(reason.id.clone());
    });
    daemon.retain(session, &id("guest-handle")).unwrap();
    daemon.retain(session, &id("host-handle")).unwrap();

    assert_eq!(
        daemon.remove_name(&id("host-pets"), "alice"),
        Ok(id("guest-handle"))
    );
    let collection = daemon.collect_if_dirty();
    assert_eq!(
        collection.collected(),
        [
            "guest",
            "guest-eval",
            "guest-handle",
            "guest-hub",
            "guest-mail",
            "guest-pets",
            "guest-worker",
        ]
        .map(id)
    );
    assert_eq!(collection.terminated, vec![id("guest-worker")]);
    assert_eq!(collection.closed.len(), 1);
    assert_eq!(*closed.lock().unwrap(), vec![id("guest-handle")]);
    assert_eq!(daemon.len(), before);
    assert!(daemon.list_names(&id("guest-pets")).is_err());
    assert!(daemon.contains(&id("host")));
}

#[cfg(feature = "threading")]
#[test]
fn daemon_is_shared_between_threads() {
    let daemon = boot();
    std::thread::scope(|scope| {
        for n in 0..4 {
            let daemon = &daemon;
            scope.spawn(move || {
                let worker = id(&format!("w{n}"));
                daemon.formulate(worker.clone(), Formula::Worker);
                daemon
                    .write_name(&id("host-pets"), &format!("worker-{n}"), worker)
                    .unwrap();
            });
        }
    });
    assert!(daemon.collect_if_dirty().is_empty());
    assert_eq!(daemon.list_names(&id("host-pets")).unwrap().len(), 4);
}

#[cfg(feature = "threading")]
#[test]
fn retainers_may_lock_the_daemon_from_another_pass() {
    use std::sync::{mpsc, Arc};
    use std::time::Duration;

    let daemon = Arc::new(boot());
    let weak = Arc::downgrade(&daemon);
    let (seen, reasons) = mpsc::channel();
    let session = daemon.register_retainer(move |reason: &Disconnect| {
        if let Some(daemon) = weak.upgrade() {
            seen.send((reason.id.clone(), daemon.is_dirty())).unwrap();
        }
    });
    daemon.formulate(id("w1"), Formula::Worker);
    daemon.retain(session, &id("w1")).unwrap();

    let (done, finished) = mpsc::channel();
    let shared = Arc::clone(&daemon);
    std::thread::spawn(move || done.send(shared.collect_if_dirty()).unwrap());
    let collection = finished
        .recv_timeout(Duration::from_secs(5))
        .expect("collection pass did not return");
    assert_eq!(collection.collected(), [id("w1")]);
    assert_eq!(reasons.try_recv(), Ok((id("w1"), false)));
}
