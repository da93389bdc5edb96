//! Extension hooks around tree traversal.
//!
//! Extensions observe the loaded tree without owning any of it. A traversal
//! fires four checkpoints per node, in document order over the member
//! tables: `before_node`, then for declarations `before_members`, the
//! recursive member visits, `after_members`, and finally `after_node`.
//! Aliases get the node checkpoints only; traversal never resolves them, so
//! a broken alias cannot fail a visit.
//!
//! Extensions run in registration order at every checkpoint.

use crate::collection::ModulesCollection;
use crate::model::{Member, NodeId};

/// One observer over tree traversal. Every checkpoint has a default empty
/// body; implement only the ones you need.
pub trait Extension {
    fn before_node(&mut self, _collection: &ModulesCollection, _id: NodeId) {}

    /// Fires after `before_node`, only for declarations.
    fn before_members(&mut self, _collection: &ModulesCollection, _id: NodeId) {}

    /// Fires after the last member visit, only for declarations.
    fn after_members(&mut self, _collection: &ModulesCollection, _id: NodeId) {}

    fn after_node(&mut self, _collection: &ModulesCollection, _id: NodeId) {}
}

/// An ordered set of extensions driven over a collection.
#[derive(Default)]
pub struct ExtensionSet {
    extensions: Vec<Box<dyn Extension>>,
}

impl ExtensionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an extension; it runs after every previously registered one.
    pub fn register(&mut self, extension: Box<dyn Extension>) {
        self.extensions.push(extension);
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Visit every registered top-level package in registration order.
    pub fn visit_all(&mut self, collection: &ModulesCollection) {
        let roots: Vec<NodeId> = collection.modules().map(|(_, id)| id).collect();
        for root in roots {
            self.visit(collection, root);
        }
    }

    /// Visit one subtree.
    pub fn visit(&mut self, collection: &ModulesCollection, id: NodeId) {
        for extension in &mut self.extensions {
            extension.before_node(collection, id);
        }

        if let Member::Decl(decl) = collection.node(id) {
            for extension in &mut self.extensions {
                extension.before_members(collection, id);
            }
            let members: Vec<NodeId> = decl.members().map(|(_, child)| child).collect();
            for child in members {
                self.visit(collection, child);
            }
            for extension in &mut self.extensions {
                extension.after_members(collection, id);
            }
        }

        for extension in &mut self.extensions {
            extension.after_node(collection, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::model::{Alias, Decl};

    struct Recorder {
        tag: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Recorder {
        fn record(&self, event: &str, coll: &ModulesCollection, id: NodeId) {
            self.log
                .borrow_mut()
                .push(format!("{}:{event}:{}", self.tag, coll.path_of(id)));
        }
    }

    impl Extension for Recorder {
        fn before_node(&mut self, coll: &ModulesCollection, id: NodeId) {
            self.record("before_node", coll, id);
        }

        fn before_members(&mut self, coll: &ModulesCollection, id: NodeId) {
            self.record("before_members", coll, id);
        }

        fn after_members(&mut self, coll: &ModulesCollection, id: NodeId) {
            self.record("after_members", coll, id);
        }

        fn after_node(&mut self, coll: &ModulesCollection, id: NodeId) {
            self.record("after_node", coll, id);
        }
    }

    fn fixture() -> ModulesCollection {
        let mut coll = ModulesCollection::new();
        let pkg = coll.alloc(Member::Decl(
            Decl::module("pkg").with_source("pkg/__init__.py"),
        ));
        coll.register_module(pkg);
        let class = coll.alloc(Member::Decl(Decl::class("Thing")));
        coll.set(pkg, "Thing", class).unwrap();
        let method = coll.alloc(Member::Decl(Decl::function("run")));
        coll.set(pkg, "Thing.run", method).unwrap();
        let alias = coll.alloc(Member::Alias(Alias::new("broken", "nowhere.at.all")));
        coll.set(pkg, "broken", alias).unwrap();
        coll
    }

    #[test]
    fn checkpoints_fire_in_document_order() {
        let coll = fixture();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut set = ExtensionSet::new();
        set.register(Box::new(Recorder {
            tag: "r",
            log: Rc::clone(&log),
        }));

        set.visit_all(&coll);

        let events = log.borrow();
        assert_eq!(
            *events,
            vec![
                "r:before_node:pkg",
                "r:before_members:pkg",
                "r:before_node:pkg.Thing",
                "r:before_members:pkg.Thing",
                "r:before_node:pkg.Thing.run",
                "r:before_members:pkg.Thing.run",
                "r:after_members:pkg.Thing.run",
                "r:after_node:pkg.Thing.run",
                "r:after_members:pkg.Thing",
                "r:after_node:pkg.Thing",
                // The broken alias still gets its node checkpoints and
                // nothing else.
                "r:before_node:pkg.broken",
                "r:after_node:pkg.broken",
                "r:after_members:pkg",
                "r:after_node:pkg",
            ]
        );
    }

    #[test]
    fn extensions_run_in_registration_order() {
        let mut coll = ModulesCollection::new();
        let pkg = coll.alloc(Member::Decl(Decl::module("pkg")));
        coll.register_module(pkg);

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut set = ExtensionSet::new();
        set.register(Box::new(Recorder {
            tag: "first",
            log: Rc::clone(&log),
        }));
        set.register(Box::new(Recorder {
            tag: "second",
            log: Rc::clone(&log),
        }));

        set.visit(&coll, pkg);

        let events = log.borrow();
        assert_eq!(events[0], "first:before_node:pkg");
        assert_eq!(events[1], "second:before_node:pkg");
    }
}
