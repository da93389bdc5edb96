//! The modules collection: root registry and path-addressed member table.
//!
//! A [`ModulesCollection`] is created once per load session, owns the arena
//! holding every node, and is the only place alias target paths are resolved
//! against. Top-level package registration is the only mutation of the root
//! registry; everything below that goes through [`get`](ModulesCollection::get),
//! [`set`](ModulesCollection::set), and [`delete`](ModulesCollection::delete).
//!
//! # Conflict policy on `set`
//!
//! When the final segment already names a member:
//!
//! 1. an existing alias is unconditionally replaced, no merge;
//! 2. two modules backed by different sources, exactly one of them a stub,
//!    are folded by the stub merger and the merge result is bound;
//! 3. otherwise any alias in the collection whose cached resolution was the
//!    displaced member is invalidated and re-resolved best-effort, so
//!    existing re-exports keep working (a repoint that would cycle is
//!    skipped, not propagated).
//!
//! In every case the bound value's parent pointer is set as the final step.

use indexmap::IndexMap;
use thiserror::Error;

use crate::model::{Arena, Member, NodeId};
use crate::resolve::ResolveError;
use crate::span::Location;
use crate::stubs;

/// Errors from member-table misuse.
#[derive(Debug, Error)]
pub enum PathError {
    /// The path was empty or contained an empty segment.
    #[error("invalid member path '{path}'")]
    InvalidPath { path: String },

    /// A segment was absent partway through the descent.
    #[error("member '{segment}' not found while walking '{path}'")]
    NotFound { path: String, segment: String },

    /// Descent transited an alias that could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Result type for member-table operations.
pub type PathResult<T> = Result<T, PathError>;

/// Root registry mapping top-level package name to its module, plus the
/// arena owning every node. Single owner per load session; never copied.
#[derive(Debug, Default)]
pub struct ModulesCollection {
    pub(crate) arena: Arena,
    roots: IndexMap<String, NodeId>,
}

impl ModulesCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(arena: Arena, roots: IndexMap<String, NodeId>) -> Self {
        Self { arena, roots }
    }

    pub(crate) fn roots(&self) -> &IndexMap<String, NodeId> {
        &self.roots
    }

    // ------------------------------------------------------------------
    // Allocation and root registration
    // ------------------------------------------------------------------

    /// Allocate a node in the collection's arena.
    pub fn alloc(&mut self, member: Member) -> NodeId {
        self.arena.alloc(member)
    }

    /// Borrow a node.
    pub fn node(&self, id: NodeId) -> &Member {
        self.arena.get(id)
    }

    /// Mutably borrow a node.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Member {
        self.arena.get_mut(id)
    }

    /// Checked variant of [`node`](ModulesCollection::node) for ids of
    /// uncertain provenance.
    pub fn try_node(&self, id: NodeId) -> Option<&Member> {
        self.arena.try_get(id)
    }

    /// Register a top-level package module under its own name. Returns the
    /// module it displaced, if any.
    pub fn register_module(&mut self, id: NodeId) -> Option<NodeId> {
        let name = self.arena.get(id).name().to_string();
        let displaced = self.roots.insert(name.clone(), id);
        if let Some(old) = displaced {
            tracing::debug!(package = %name, ?old, "top-level module re-registered");
            self.arena.get_mut(old).set_parent(None);
        }
        displaced
    }

    /// Top-level packages in registration order.
    pub fn modules(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.roots.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Look up a top-level package by name.
    pub fn module(&self, name: &str) -> Option<NodeId> {
        self.roots.get(name).copied()
    }

    // ------------------------------------------------------------------
    // Path-addressed access
    // ------------------------------------------------------------------

    fn segments<'p>(path: &'p str, full: &str) -> PathResult<Vec<&'p str>> {
        if path.is_empty() {
            return Err(PathError::InvalidPath {
                path: full.to_string(),
            });
        }
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|seg| seg.is_empty()) {
            return Err(PathError::InvalidPath {
                path: full.to_string(),
            });
        }
        Ok(segments)
    }

    /// The declaration to descend into: the node itself, or its resolved
    /// target when it is an alias.
    fn descent_decl(&self, id: NodeId) -> Result<NodeId, ResolveError> {
        match self.arena.get(id) {
            Member::Decl(_) => Ok(id),
            Member::Alias(_) => self.resolve_alias(id),
        }
    }

    /// Descend `path` one segment at a time from `parent`.
    ///
    /// The returned member is not resolved: it may be an alias. Aliases
    /// transited mid-path are resolved, which can fail with a resolve error.
    pub fn get(&self, parent: NodeId, path: &str) -> PathResult<NodeId> {
        let segments = Self::segments(path, path)?;
        let mut current = parent;
        for segment in segments {
            let container = self.descent_decl(current)?;
            let decl = match self.arena.decl(container) {
                Some(decl) => decl,
                None => {
                    return Err(PathError::NotFound {
                        path: path.to_string(),
                        segment: segment.to_string(),
                    })
                }
            };
            current = decl.member(segment).ok_or_else(|| PathError::NotFound {
                path: path.to_string(),
                segment: segment.to_string(),
            })?;
        }
        Ok(current)
    }

    /// Resolve an absolute dotted path against the root registry.
    pub fn lookup(&self, path: &str) -> PathResult<NodeId> {
        let segments = Self::segments(path, path)?;
        let (first, rest) = segments
            .split_first()
            .expect("segments is never empty here");
        let root = self
            .roots
            .get(*first)
            .copied()
            .ok_or_else(|| PathError::NotFound {
                path: path.to_string(),
                segment: (*first).to_string(),
            })?;
        if rest.is_empty() {
            return Ok(root);
        }
        self.get(root, &rest.join("."))
    }

    /// Bind `value` at `path` below `parent`, applying the conflict policy.
    /// Returns the id actually bound (the merge result when a stub merge
    /// took place).
    pub fn set(&mut self, parent: NodeId, path: &str, value: NodeId) -> PathResult<NodeId> {
        let mut segments = Self::segments(path, path)?;
        let last = segments.pop().expect("segments is never empty here");

        let container = if segments.is_empty() {
            self.descent_decl(parent)?
        } else {
            let prefix = self.get(parent, &segments.join("."))?;
            self.descent_decl(prefix)?
        };
        let existing = match self.arena.decl(container) {
            Some(decl) => decl.member(last),
            None => {
                return Err(PathError::NotFound {
                    path: path.to_string(),
                    segment: last.to_string(),
                })
            }
        };

        let bound = match existing {
            None => self.bind(container, last, value),
            Some(old) if self.arena.get(old).is_alias() => {
                // An alias binding is replaced outright, never merged.
                self.arena.get_mut(old).set_parent(None);
                self.bind(container, last, value)
            }
            Some(old) if self.is_module_twin(old, value) => {
                match stubs::merge(self, old, value) {
                    Ok(merged) => self.bind(container, last, merged),
                    Err(err) => {
                        tracing::warn!(%err, "module twin merge failed, replacing binding");
                        self.arena.get_mut(old).set_parent(None);
                        self.bind(container, last, value)
                    }
                }
            }
            Some(old) => {
                let repoint = self.aliases_pointing_at(old);
                self.arena.get_mut(old).set_parent(None);
                let bound = self.bind(container, last, value);
                self.repoint_aliases(&repoint);
                bound
            }
        };
        Ok(bound)
    }

    /// Bind a member under its own name directly below `parent`.
    pub fn insert_member(&mut self, parent: NodeId, value: NodeId) -> PathResult<NodeId> {
        let name = self.arena.get(value).name().to_string();
        self.set(parent, &name, value)
    }

    /// Remove the binding at `path` below `parent`, returning the unbound
    /// member.
    pub fn delete(&mut self, parent: NodeId, path: &str) -> PathResult<NodeId> {
        let mut segments = Self::segments(path, path)?;
        let last = segments.pop().expect("segments is never empty here");

        let container = if segments.is_empty() {
            self.descent_decl(parent)?
        } else {
            let prefix = self.get(parent, &segments.join("."))?;
            self.descent_decl(prefix)?
        };

        let removed = self
            .arena
            .decl_mut(container)
            .and_then(|decl| decl.members.shift_remove(last))
            .ok_or_else(|| PathError::NotFound {
                path: path.to_string(),
                segment: last.to_string(),
            })?;
        self.arena.get_mut(removed).set_parent(None);
        Ok(removed)
    }

    fn bind(&mut self, container: NodeId, name: &str, value: NodeId) -> NodeId {
        if let Some(decl) = self.arena.decl_mut(container) {
            decl.members.insert(name.to_string(), value);
        }
        // Parent pointer last, per the table invariant.
        self.arena.get_mut(value).set_parent(Some(container));
        value
    }

    /// True when both nodes are modules backed by different concrete
    /// sources, exactly one of them a stub.
    fn is_module_twin(&self, old: NodeId, new: NodeId) -> bool {
        let (Some(old_decl), Some(new_decl)) = (self.arena.decl(old), self.arena.decl(new))
        else {
            return false;
        };
        let (Some(old_mod), Some(new_mod)) = (old_decl.module_data(), new_decl.module_data())
        else {
            return false;
        };
        let (Some(old_src), Some(new_src)) = (&old_mod.source, &new_mod.source) else {
            return false;
        };
        old_src != new_src && (old_decl.is_stub_module() != new_decl.is_stub_module())
    }

    fn aliases_pointing_at(&self, displaced: NodeId) -> Vec<NodeId> {
        self.arena
            .ids()
            .filter(|&id| {
                self.arena
                    .alias(id)
                    .is_some_and(|alias| alias.cached_target() == Some(displaced))
            })
            .collect()
    }

    /// Invalidate and best-effort re-resolve aliases that pointed at a
    /// displaced member. Cycles are skipped, never propagated.
    fn repoint_aliases(&self, aliases: &[NodeId]) {
        for &id in aliases {
            let Some(alias) = self.arena.alias(id) else {
                continue;
            };
            alias.invalidate_cache();
            if let Err(err) = self.resolve_alias(id) {
                tracing::debug!(alias = %alias.target(), %err, "alias repoint skipped");
            }
        }
    }

    // ------------------------------------------------------------------
    // Derived node information
    // ------------------------------------------------------------------

    /// Dot-joined chain of ancestor names from the tree root.
    pub fn path_of(&self, id: NodeId) -> String {
        let mut names = vec![self.arena.get(id).name().to_string()];
        let mut current = self.arena.get(id).parent();
        while let Some(parent) = current {
            names.push(self.arena.get(parent).name().to_string());
            current = self.arena.get(parent).parent();
        }
        names.reverse();
        names.join(".")
    }

    /// Best-effort source location for diagnostics: the nearest enclosing
    /// module's source file plus the node's own start line.
    pub fn location_of(&self, id: NodeId) -> Location {
        let line = self.arena.get(id).span().map(|span| span.start_line);
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(decl) = self.arena.decl(node) {
                if let Some(data) = decl.module_data() {
                    return Location::new(data.source.clone(), line);
                }
            }
            current = self.arena.get(node).parent();
        }
        Location::new(None, line)
    }

    /// A module with no backing source file and no parent is a namespace
    /// package.
    pub fn is_namespace_package(&self, id: NodeId) -> bool {
        self.arena.decl(id).is_some_and(|decl| {
            decl.module_data()
                .is_some_and(|data| data.source.is_none())
                && decl.parent().is_none()
        })
    }

    /// A sourceless module below a namespace package (or below another
    /// namespace subpackage) is a namespace subpackage.
    ///
    /// The parent check guards the whole disjunction; a module with no
    /// parent, or with a concrete parent, is not a namespace subpackage.
    pub fn is_namespace_subpackage(&self, id: NodeId) -> bool {
        let Some(decl) = self.arena.decl(id) else {
            return false;
        };
        let sourceless_module = decl
            .module_data()
            .is_some_and(|data| data.source.is_none());
        if !sourceless_module {
            return false;
        }
        match decl.parent() {
            Some(parent) => {
                self.is_namespace_package(parent) || self.is_namespace_subpackage(parent)
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Alias, Decl};

    fn collection_with_pkg() -> (ModulesCollection, NodeId) {
        let mut coll = ModulesCollection::new();
        let pkg = coll.alloc(Member::Decl(Decl::module("pkg").with_source("pkg/__init__.py")));
        coll.register_module(pkg);
        (coll, pkg)
    }

    mod get {
        use super::*;

        #[test]
        fn descends_segment_by_segment() {
            let (mut coll, pkg) = collection_with_pkg();
            let class = coll.alloc(Member::Decl(Decl::class("Thing")));
            let method = coll.alloc(Member::Decl(Decl::function("run")));
            coll.set(pkg, "Thing", class).unwrap();
            coll.set(pkg, "Thing.run", method).unwrap();

            assert_eq!(coll.get(pkg, "Thing.run").unwrap(), method);
            assert_eq!(coll.lookup("pkg.Thing.run").unwrap(), method);
        }

        #[test]
        fn checked_node_lookup_rejects_foreign_ids() {
            let (coll, pkg) = collection_with_pkg();
            assert!(coll.try_node(pkg).is_some());
            assert!(coll.try_node(NodeId::from_index(42)).is_none());
        }

        #[test]
        fn missing_segment_is_not_found() {
            let (coll, pkg) = collection_with_pkg();
            let err = coll.get(pkg, "nope.deeper").unwrap_err();
            assert!(matches!(err, PathError::NotFound { segment, .. } if segment == "nope"));
        }

        #[test]
        fn empty_path_is_invalid() {
            let (coll, pkg) = collection_with_pkg();
            assert!(matches!(
                coll.get(pkg, "").unwrap_err(),
                PathError::InvalidPath { .. }
            ));
            assert!(matches!(
                coll.get(pkg, "a..b").unwrap_err(),
                PathError::InvalidPath { .. }
            ));
        }
    }

    mod set {
        use super::*;

        #[test]
        fn binding_sets_parent_pointer() {
            let (mut coll, pkg) = collection_with_pkg();
            let attr = coll.alloc(Member::Decl(Decl::attribute("x")));
            coll.set(pkg, "x", attr).unwrap();
            assert_eq!(coll.node(attr).parent(), Some(pkg));
        }

        #[test]
        fn existing_alias_is_replaced_without_merge() {
            let (mut coll, pkg) = collection_with_pkg();
            let alias = coll.alloc(Member::Alias(Alias::new("x", "pkg.other.x")));
            coll.set(pkg, "x", alias).unwrap();

            let attr = coll.alloc(Member::Decl(Decl::attribute("x")));
            coll.set(pkg, "x", attr).unwrap();

            assert_eq!(coll.get(pkg, "x").unwrap(), attr);
            assert_eq!(coll.node(alias).parent(), None);
        }

        #[test]
        fn displacement_repoints_cached_aliases() {
            let (mut coll, pkg) = collection_with_pkg();
            let attr = coll.alloc(Member::Decl(Decl::attribute("x")));
            coll.set(pkg, "x", attr).unwrap();

            // A re-export elsewhere, resolved so its cache points at `attr`.
            let holder = coll.alloc(Member::Decl(
                Decl::module("reexport").with_source("pkg/reexport.py"),
            ));
            coll.set(pkg, "reexport", holder).unwrap();
            let export = coll.alloc(Member::Alias(Alias::new("x", "pkg.x")));
            coll.set(pkg, "reexport.x", export).unwrap();
            assert_eq!(coll.resolve_alias(export).unwrap(), attr);

            let replacement = coll.alloc(Member::Decl(Decl::attribute("x")));
            coll.set(pkg, "x", replacement).unwrap();

            // The re-export now resolves to the replacement.
            assert_eq!(coll.resolve_alias(export).unwrap(), replacement);
        }
    }

    mod delete {
        use super::*;

        #[test]
        fn removes_binding_and_clears_parent() {
            let (mut coll, pkg) = collection_with_pkg();
            let attr = coll.alloc(Member::Decl(Decl::attribute("x")));
            coll.set(pkg, "x", attr).unwrap();

            let removed = coll.delete(pkg, "x").unwrap();
            assert_eq!(removed, attr);
            assert_eq!(coll.node(attr).parent(), None);
            assert!(coll.get(pkg, "x").is_err());
        }

        #[test]
        fn missing_binding_is_not_found() {
            let (mut coll, pkg) = collection_with_pkg();
            assert!(matches!(
                coll.delete(pkg, "ghost").unwrap_err(),
                PathError::NotFound { .. }
            ));
        }
    }

    mod paths_and_locations {
        use super::*;
        use crate::span::Span;

        #[test]
        fn path_is_dot_joined_ancestry() {
            let (mut coll, pkg) = collection_with_pkg();
            let class = coll.alloc(Member::Decl(Decl::class("Thing")));
            let method = coll.alloc(Member::Decl(Decl::function("run")));
            coll.set(pkg, "Thing", class).unwrap();
            coll.set(pkg, "Thing.run", method).unwrap();

            assert_eq!(coll.path_of(method), "pkg.Thing.run");
            assert_eq!(coll.path_of(pkg), "pkg");
        }

        #[test]
        fn location_uses_enclosing_module_source() {
            let (mut coll, pkg) = collection_with_pkg();
            let class = coll.alloc(Member::Decl(Decl::class("Thing").with_span(Span::line(7))));
            coll.set(pkg, "Thing", class).unwrap();

            assert_eq!(coll.location_of(class).to_string(), "pkg/__init__.py:7");
        }
    }

    mod namespace_classification {
        use super::*;

        #[test]
        fn sourceless_root_module_is_namespace_package() {
            let mut coll = ModulesCollection::new();
            let ns = coll.alloc(Member::Decl(Decl::module("ns")));
            coll.register_module(ns);
            assert!(coll.is_namespace_package(ns));
            // Grouping pin: with no parent at all, the subpackage
            // classification is false, not inherited from the package test.
            assert!(!coll.is_namespace_subpackage(ns));
        }

        #[test]
        fn sourceless_child_of_namespace_package_is_subpackage() {
            let mut coll = ModulesCollection::new();
            let ns = coll.alloc(Member::Decl(Decl::module("ns")));
            coll.register_module(ns);
            let sub = coll.alloc(Member::Decl(Decl::module("sub")));
            coll.set(ns, "sub", sub).unwrap();
            let subsub = coll.alloc(Member::Decl(Decl::module("deep")));
            coll.set(ns, "sub.deep", subsub).unwrap();

            assert!(coll.is_namespace_subpackage(sub));
            assert!(coll.is_namespace_subpackage(subsub));
        }

        #[test]
        fn sourceless_child_of_concrete_package_is_not_subpackage() {
            // Grouping pin: the parent condition guards the whole
            // disjunction, so a concrete (sourced) parent answers false even
            // though the child itself is sourceless.
            let (mut coll, pkg) = collection_with_pkg();
            let sub = coll.alloc(Member::Decl(Decl::module("sub")));
            coll.set(pkg, "sub", sub).unwrap();
            assert!(!coll.is_namespace_subpackage(sub));
        }
    }
}
