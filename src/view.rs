//! Read-only handles over collection nodes.
//!
//! [`MemberRef`] wraps any node; [`DeclRef`] is a proof-carrying handle to a
//! declaration slot. The capability surface shared by declarations and
//! aliases is the [`ObjectApi`] trait: declarations answer directly, aliases
//! delegate every capability to their resolved target, which is why every
//! `ObjectApi` method is fallible. Identity fields (name, parent, path,
//! target path) never resolve.

use std::collections::BTreeSet;

use crate::collection::{ModulesCollection, PathResult};
use crate::docstring::Docstring;
use crate::expr::{Expr, Param};
use crate::model::{Decl, Kind, Member, NodeId};
use crate::resolve::ResolveResult;
use crate::span::Span;

/// Handle to any node: declaration or alias.
#[derive(Clone, Copy)]
pub struct MemberRef<'a> {
    coll: &'a ModulesCollection,
    id: NodeId,
}

/// Handle to a node known to be a declaration.
#[derive(Clone, Copy)]
pub struct DeclRef<'a> {
    coll: &'a ModulesCollection,
    id: NodeId,
}

impl<'a> MemberRef<'a> {
    pub(crate) fn new(coll: &'a ModulesCollection, id: NodeId) -> Self {
        Self { coll, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    // ------------------------------------------------------------------
    // Identity: never resolves.
    // ------------------------------------------------------------------

    pub fn name(&self) -> &'a str {
        self.coll.node(self.id).name()
    }

    pub fn span(&self) -> Option<Span> {
        self.coll.node(self.id).span()
    }

    pub fn parent(&self) -> Option<MemberRef<'a>> {
        self.coll
            .node(self.id)
            .parent()
            .map(|parent| MemberRef::new(self.coll, parent))
    }

    /// Dot-joined chain of ancestor names from the tree root.
    pub fn path(&self) -> String {
        self.coll.path_of(self.id)
    }

    pub fn is_alias(&self) -> bool {
        self.coll.node(self.id).is_alias()
    }

    /// The alias's target path; `None` for declarations.
    pub fn target_path(&self) -> Option<&'a str> {
        match self.coll.node(self.id) {
            Member::Decl(_) => None,
            Member::Alias(alias) => Some(alias.target()),
        }
    }

    /// Whether this member is part of its container's public surface: the
    /// explicit export list when the container has one, the leading
    /// underscore convention otherwise.
    pub fn is_public(&self) -> bool {
        is_public_member(self.coll, self.id)
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// This node when it is a declaration.
    pub fn as_decl(&self) -> Option<DeclRef<'a>> {
        match self.coll.node(self.id) {
            Member::Decl(_) => Some(DeclRef {
                coll: self.coll,
                id: self.id,
            }),
            Member::Alias(_) => None,
        }
    }

    /// The declaration this member ultimately denotes: itself, or the
    /// alias's resolved target.
    pub fn resolved(&self) -> ResolveResult<DeclRef<'a>> {
        let id = self.coll.resolve_alias(self.id)?;
        Ok(DeclRef {
            coll: self.coll,
            id,
        })
    }
}

impl<'a> DeclRef<'a> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    fn decl(&self) -> &'a Decl {
        match self.coll.node(self.id) {
            Member::Decl(decl) => decl,
            Member::Alias(_) => unreachable!("DeclRef always points at a declaration slot"),
        }
    }

    pub fn as_member(&self) -> MemberRef<'a> {
        MemberRef::new(self.coll, self.id)
    }

    pub fn name(&self) -> &'a str {
        &self.decl().name
    }

    pub fn kind(&self) -> Kind {
        self.decl().kind_tag()
    }

    pub fn docstring(&self) -> Option<&'a Docstring> {
        self.decl().docstring.as_ref()
    }

    pub fn labels(&self) -> &'a BTreeSet<String> {
        &self.decl().labels
    }

    /// Own-declared members, in insertion order.
    pub fn members(&self) -> impl Iterator<Item = (&'a str, MemberRef<'a>)> + '_ {
        let coll = self.coll;
        self.decl()
            .members()
            .map(move |(name, id)| (name, MemberRef::new(coll, id)))
    }

    pub fn member(&self, name: &str) -> Option<MemberRef<'a>> {
        self.decl()
            .member(name)
            .map(|id| MemberRef::new(self.coll, id))
    }

    /// Descend a dotted path below this declaration.
    pub fn get(&self, path: &str) -> PathResult<MemberRef<'a>> {
        let id = self.coll.get(self.id, path)?;
        Ok(MemberRef::new(self.coll, id))
    }

    /// The module's explicit export list, when declared.
    pub fn exports(&self) -> Option<&'a [String]> {
        self.decl()
            .module_data()
            .and_then(|data| data.exports.as_deref())
    }

    /// Declared base expressions; empty for non-classes.
    pub fn bases(&self) -> &'a [Expr] {
        self.decl()
            .class_data()
            .map(|data| data.bases.as_slice())
            .unwrap_or_default()
    }

    /// Parameters; empty for non-functions.
    pub fn params(&self) -> &'a [Param] {
        self.decl()
            .function_data()
            .map(|data| data.params.as_slice())
            .unwrap_or_default()
    }

    /// Return annotation; `None` for non-functions.
    pub fn returns(&self) -> Option<&'a Expr> {
        self.decl()
            .function_data()
            .and_then(|data| data.returns.as_ref())
    }
}

// ============================================================================
// Shared Capability Surface
// ============================================================================

/// The capability surface shared by declarations and aliases.
///
/// Every method can fail: on an alias it first resolves the target, which
/// can raise [`crate::resolve::ResolveError::Unresolvable`] or
/// [`crate::resolve::ResolveError::Cycle`], and callers must handle those
/// explicitly. On a declaration the methods never actually fail.
pub trait ObjectApi {
    fn kind(&self) -> ResolveResult<Kind>;
    fn docstring(&self) -> ResolveResult<Option<&Docstring>>;
    fn labels(&self) -> ResolveResult<&BTreeSet<String>>;
    fn member_names(&self) -> ResolveResult<Vec<String>>;
    fn member_id(&self, name: &str) -> ResolveResult<Option<NodeId>>;
}

impl ObjectApi for DeclRef<'_> {
    fn kind(&self) -> ResolveResult<Kind> {
        Ok(DeclRef::kind(self))
    }

    fn docstring(&self) -> ResolveResult<Option<&Docstring>> {
        Ok(DeclRef::docstring(self))
    }

    fn labels(&self) -> ResolveResult<&BTreeSet<String>> {
        Ok(DeclRef::labels(self))
    }

    fn member_names(&self) -> ResolveResult<Vec<String>> {
        Ok(self.members().map(|(name, _)| name.to_string()).collect())
    }

    fn member_id(&self, name: &str) -> ResolveResult<Option<NodeId>> {
        Ok(self.member(name).map(|m| m.id()))
    }
}

impl ObjectApi for MemberRef<'_> {
    fn kind(&self) -> ResolveResult<Kind> {
        self.resolved().map(|decl| decl.kind())
    }

    fn docstring(&self) -> ResolveResult<Option<&Docstring>> {
        self.resolved().map(|decl| DeclRef::docstring(&decl))
    }

    fn labels(&self) -> ResolveResult<&BTreeSet<String>> {
        self.resolved().map(|decl| DeclRef::labels(&decl))
    }

    fn member_names(&self) -> ResolveResult<Vec<String>> {
        let decl = self.resolved()?;
        ObjectApi::member_names(&decl)
    }

    fn member_id(&self, name: &str) -> ResolveResult<Option<NodeId>> {
        let decl = self.resolved()?;
        ObjectApi::member_id(&decl, name)
    }
}

pub(crate) fn is_public_member(coll: &ModulesCollection, id: NodeId) -> bool {
    let node = coll.node(id);
    let name = node.name();
    if let Some(parent) = node.parent() {
        if let Some(decl) = coll.node(parent).as_decl() {
            if let Some(data) = decl.module_data() {
                if let Some(exports) = &data.exports {
                    // The export list is authoritative, convention ignored.
                    return exports.iter().any(|export| export == name);
                }
            }
        }
    }
    !name.starts_with('_')
}

impl ModulesCollection {
    /// A read-only handle over a node.
    pub fn member_ref(&self, id: NodeId) -> MemberRef<'_> {
        MemberRef::new(self, id)
    }
}
