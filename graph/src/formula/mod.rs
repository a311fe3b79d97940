//! Formula records as the host hands them to the graph.
//!
//! The graph never owns these: it reads the type tag for the identity-merge
//! policy and traces the referenced ids once, at registration.

mod id;

pub use id::{FormulaId, IdError};

use crate::gc::Trace;
use formula_derive::Trace;
use std::collections::BTreeMap;

/// One formula definition. Every [`FormulaId`] field that is not marked
/// `#[notrace]` is a static dependency.
#[derive(Debug, Clone, PartialEq, Eq, Trace)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "type", rename_all = "kebab-case")
)]
pub enum Formula {
    #[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
    Endo {
        networks: FormulaId,
        pins: FormulaId,
        peers: FormulaId,
        host: FormulaId,
        least_authority: FormulaId,
    },
    #[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
    Host {
        handle: FormulaId,
        #[notrace]
        host_handle: FormulaId,
        worker: FormulaId,
        inspector: FormulaId,
        pet_store: FormulaId,
        mailbox_store: FormulaId,
        mail_hub: FormulaId,
        endo: FormulaId,
        networks: FormulaId,
        pins: FormulaId,
    },
    #[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
    Guest {
        handle: FormulaId,
        host_handle: FormulaId,
        host_agent: FormulaId,
        pet_store: FormulaId,
        mailbox_store: FormulaId,
        mail_hub: FormulaId,
        worker: FormulaId,
    },
    Handle {
        agent: FormulaId,
    },
    Worker,
    PetStore,
    MailboxStore,
    KnownPeersStore,
    LeastAuthority,
    LoopbackNetwork,
    #[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
    PetInspector {
        pet_store: FormulaId,
    },
    #[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
    Directory {
        pet_store: FormulaId,
    },
    MailHub {
        store: FormulaId,
    },
    Marshal {
        #[notrace]
        body: String,
        #[cfg_attr(feature = "serde", serde(default))]
        slots: Vec<FormulaId>,
    },
    Eval {
        worker: FormulaId,
        #[notrace]
        source: String,
        #[notrace]
        #[cfg_attr(feature = "serde", serde(default))]
        names: Vec<String>,
        #[cfg_attr(feature = "serde", serde(default))]
        values: Vec<FormulaId>,
    },
    Lookup {
        hub: FormulaId,
        #[notrace]
        path: Vec<String>,
    },
    MakeUnconfined {
        worker: FormulaId,
        powers: FormulaId,
        #[notrace]
        specifier: String,
        #[notrace]
        #[cfg_attr(feature = "serde", serde(default))]
        env: BTreeMap<String, String>,
    },
    MakeBundle {
        worker: FormulaId,
        powers: FormulaId,
        bundle: FormulaId,
        #[notrace]
        #[cfg_attr(feature = "serde", serde(default))]
        env: BTreeMap<String, String>,
    },
    Peer {
        networks: FormulaId,
        #[notrace]
        node: String,
        #[notrace]
        #[cfg_attr(feature = "serde", serde(default))]
        addresses: Vec<String>,
    },
    #[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
    Message {
        from: FormulaId,
        to: FormulaId,
        #[cfg_attr(feature = "serde", serde(default))]
        ids: Vec<FormulaId>,
        #[cfg_attr(
            feature = "serde",
            serde(default, skip_serializing_if = "Option::is_none")
        )]
        promise_id: Option<FormulaId>,
        #[cfg_attr(
            feature = "serde",
            serde(default, skip_serializing_if = "Option::is_none")
        )]
        resolver_id: Option<FormulaId>,
    },
    Promise {
        store: FormulaId,
    },
    Resolver {
        store: FormulaId,
    },
    #[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
    Invitation {
        host_agent: FormulaId,
        host_handle: FormulaId,
        #[notrace]
        guest_name: String,
    },
    ReadableBlob {
        #[notrace]
        content: String,
    },
}

impl Formula {
    /// The type tag, spelled the way formula records spell it.
    pub fn kind(&self) -> &'static str {
        match self {
            Formula::Endo { .. } => "endo",
            Formula::Host { .. } => "host",
            Formula::Guest { .. } => "guest",
            Formula::Handle { .. } => "handle",
            Formula::Worker => "worker",
            Formula::PetStore => "pet-store",
            Formula::MailboxStore => "mailbox-store",
            Formula::KnownPeersStore => "known-peers-store",
            Formula::LeastAuthority => "least-authority",
            Formula::LoopbackNetwork => "loopback-network",
            Formula::PetInspector { .. } => "pet-inspector",
            Formula::Directory { .. } => "directory",
            Formula::MailHub { .. } => "mail-hub",
            Formula::Marshal { .. } => "marshal",
            Formula::Eval { .. } => "eval",
            Formula::Lookup { .. } => "lookup",
            Formula::MakeUnconfined { .. } => "make-unconfined",
            Formula::MakeBundle { .. } => "make-bundle",
            Formula::Peer { .. } => "peer",
            Formula::Message { .. } => "message",
            Formula::Promise { .. } => "promise",
            Formula::Resolver { .. } => "resolver",
            Formula::Invitation { .. } => "invitation",
            Formula::ReadableBlob { .. } => "readable-blob",
        }
    }

    /// Stores whose entries are pet-store edges in the graph.
    pub fn is_naming_store(&self) -> bool {
        matches!(
            self,
            Formula::PetStore | Formula::MailboxStore | Formula::KnownPeersStore
        )
    }

    /// Every formula id this definition refers to, in field order.
    pub fn deps(&self) -> Vec<FormulaId> {
        let mut deps = Vec::new();
        self.trace(&mut |id| deps.push(id.clone()));
        deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> FormulaId {
        FormulaId::from(s)
    }

    #[test]
    fn guest_deps_follow_field_order() {
        let guest = Formula::Guest {
            handle: id("h"),
            host_handle: id("hh"),
            host_agent: id("ha"),
            pet_store: id("ps"),
            mailbox_store: id("ms"),
            mail_hub: id("mh"),
            worker: id("w"),
        };
        assert_eq!(
            guest.deps(),
            ["h", "hh", "ha", "ps", "ms", "mh", "w"].map(id).to_vec()
        );
    }

    #[test]
    fn notrace_fields_are_not_deps() {
        let host = Formula::Host {
            handle: id("h"),
            host_handle: id("hh"),
            worker: id("w"),
            inspector: id("i"),
            pet_store: id("ps"),
            mailbox_store: id("ms"),
            mail_hub: id("mh"),
            endo: id("e"),
            networks: id("n"),
            pins: id("p"),
        };
        assert!(!host.deps().contains(&id("hh")));
        assert_eq!(host.deps().len(), 9);

        let lookup = Formula::Lookup {
            hub: id("hub"),
            path: vec!["a".to_owned(), "b".to_owned()],
        };
        assert_eq!(lookup.deps(), vec![id("hub")]);
    }

    #[test]
    fn optional_and_repeated_refs() {
        let message = Formula::Message {
            from: id("f"),
            to: id("t"),
            ids: vec![id("x"), id("y")],
            promise_id: None,
            resolver_id: Some(id("r")),
        };
        assert_eq!(message.deps(), ["f", "t", "x", "y", "r"].map(id).to_vec());
        assert!(Formula::Worker.deps().is_empty());
    }

    #[test]
    fn kind_and_naming_stores() {
        assert_eq!(Formula::KnownPeersStore.kind(), "known-peers-store");
        assert!(Formula::MailboxStore.is_naming_store());
        assert!(!Formula::Promise { store: id("s") }.is_naming_store());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn records_round_trip_through_json() {
        let formula: Formula =
            serde_json::from_str(r#"{"type":"guest","handle":"h","hostHandle":"hh","hostAgent":"ha","petStore":"ps","mailboxStore":"ms","mailHub":"mh","worker":"w"}"#)
                .unwrap();
        assert_eq!(formula.kind(), "guest");
        assert_eq!(formula.deps()[1], id("hh"));

        let worker: Formula = serde_json::from_str(r#"{"type":"worker"}"#).unwrap();
        assert_eq!(worker, Formula::Worker);

        let marshal: Formula = serde_json::from_str(r#"{"type":"marshal","body":"{}"}"#).unwrap();
        assert!(marshal.deps().is_empty());
    }
}
