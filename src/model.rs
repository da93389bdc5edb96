//! The declaration tree: arena, tagged kinds, and member tables.
//!
//! Every node of the model lives in an [`Arena`] and is addressed by a
//! stable [`NodeId`]. Parents and member tables store ids, never owning
//! pointers, so parent back-references cannot form ownership cycles.
//!
//! A slot holds a [`Member`]: either a concrete [`Decl`] (module, class,
//! function, attribute, or type alias) or an [`Alias`], a named pointer to a
//! declaration living elsewhere. Member tables are insertion-ordered; the
//! order reflects declaration order in source and is preserved through
//! serialization.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::docstring::Docstring;
use crate::expr::{Expr, Param, TypeParam};
use crate::span::Span;

// ============================================================================
// Node Identity
// ============================================================================

/// Stable index of a node in its collection's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// The kind tag of a member, including the alias case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kind {
    Module,
    Class,
    Function,
    Attribute,
    TypeAlias,
    Alias,
}

// ============================================================================
// Kind-Specific Data
// ============================================================================

/// Module-specific fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleData {
    /// Backing source file, if any. Namespace packages have none; stub
    /// modules end in `.pyi`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Explicit export list (the `__all__` equivalent). Authoritative for
    /// publicness when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exports: Option<Vec<String>>,
    /// Imports seen in the module body: local name -> full dotted target.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub imports: IndexMap<String, String>,
    /// Overload registrations: function name -> overload declarations.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub overloads: IndexMap<String, Vec<NodeId>>,
}

/// Class-specific fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassData {
    /// Declared base expressions, in declaration order, unresolved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<TypeParam>,
    /// Imports seen in the class body: local name -> full dotted target.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub imports: IndexMap<String, String>,
    /// Overload registrations: method name -> overload declarations.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub overloads: IndexMap<String, Vec<NodeId>>,
}

/// Function-specific fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionData {
    /// Parameters in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returns: Option<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<TypeParam>,
}

/// Attribute-specific fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Expr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Expr>,
}

/// Type-alias-specific fields (`type X = ...` / assignment aliases).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeAliasData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<TypeParam>,
}

/// The tagged union of declaration kinds. Every per-kind operation in the
/// crate matches exhaustively on this, so adding a kind is compile-checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeclKind {
    Module(ModuleData),
    Class(ClassData),
    Function(FunctionData),
    Attribute(AttributeData),
    TypeAlias(TypeAliasData),
}

impl DeclKind {
    pub fn tag(&self) -> Kind {
        match self {
            DeclKind::Module(_) => Kind::Module,
            DeclKind::Class(_) => Kind::Class,
            DeclKind::Function(_) => Kind::Function,
            DeclKind::Attribute(_) => Kind::Attribute,
            DeclKind::TypeAlias(_) => Kind::TypeAlias,
        }
    }
}

// ============================================================================
// Declarations
// ============================================================================

fn default_runtime() -> bool {
    true
}

/// A concrete declaration node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decl {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<Docstring>,
    /// Free-form classification tags ("deprecated", "typed-dict", ...).
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub labels: BTreeSet<String>,
    /// False for members that exist only in a stub and are never present at
    /// runtime.
    #[serde(default = "default_runtime")]
    pub runtime: bool,
    pub kind: DeclKind,
    /// Member table: child name -> node, insertion-ordered.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub(crate) members: IndexMap<String, NodeId>,
    /// Owning container; rebuilt after decode. Mutated only by table
    /// operations, never assigned directly.
    #[serde(skip)]
    pub(crate) parent: Option<NodeId>,
}

impl Decl {
    fn new(name: impl Into<String>, kind: DeclKind) -> Self {
        Self {
            name: name.into(),
            span: None,
            docstring: None,
            labels: BTreeSet::new(),
            runtime: true,
            kind,
            members: IndexMap::new(),
            parent: None,
        }
    }

    pub fn module(name: impl Into<String>) -> Self {
        Self::new(name, DeclKind::Module(ModuleData::default()))
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, DeclKind::Class(ClassData::default()))
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self::new(name, DeclKind::Function(FunctionData::default()))
    }

    pub fn attribute(name: impl Into<String>) -> Self {
        Self::new(name, DeclKind::Attribute(AttributeData::default()))
    }

    pub fn type_alias(name: impl Into<String>) -> Self {
        Self::new(name, DeclKind::TypeAlias(TypeAliasData::default()))
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_docstring(mut self, docstring: Docstring) -> Self {
        self.docstring = Some(docstring);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    /// Set the backing source file. Only meaningful for modules.
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        if let DeclKind::Module(data) = &mut self.kind {
            data.source = Some(source.into());
        }
        self
    }

    /// Append a declared base expression. Only meaningful for classes.
    pub fn with_base(mut self, base: impl Into<Expr>) -> Self {
        if let DeclKind::Class(data) = &mut self.kind {
            data.bases.push(base.into());
        }
        self
    }

    pub fn kind_tag(&self) -> Kind {
        self.kind.tag()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Own-declared members, in insertion order.
    pub fn members(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.members.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn member(&self, name: &str) -> Option<NodeId> {
        self.members.get(name).copied()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn module_data(&self) -> Option<&ModuleData> {
        match &self.kind {
            DeclKind::Module(data) => Some(data),
            _ => None,
        }
    }

    pub fn module_data_mut(&mut self) -> Option<&mut ModuleData> {
        match &mut self.kind {
            DeclKind::Module(data) => Some(data),
            _ => None,
        }
    }

    pub fn class_data(&self) -> Option<&ClassData> {
        match &self.kind {
            DeclKind::Class(data) => Some(data),
            _ => None,
        }
    }

    pub fn function_data(&self) -> Option<&FunctionData> {
        match &self.kind {
            DeclKind::Function(data) => Some(data),
            _ => None,
        }
    }

    pub fn function_data_mut(&mut self) -> Option<&mut FunctionData> {
        match &mut self.kind {
            DeclKind::Function(data) => Some(data),
            _ => None,
        }
    }

    pub fn attribute_data(&self) -> Option<&AttributeData> {
        match &self.kind {
            DeclKind::Attribute(data) => Some(data),
            _ => None,
        }
    }

    /// True when this is a stub module (its source has the stub suffix).
    pub fn is_stub_module(&self) -> bool {
        match &self.kind {
            DeclKind::Module(data) => data
                .source
                .as_deref()
                .and_then(|p| p.extension())
                .is_some_and(|ext| ext == "pyi"),
            _ => false,
        }
    }
}

// ============================================================================
// Aliases
// ============================================================================

/// A named pointer to a declaration living elsewhere, created by a
/// re-export or import. It does not own its target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    /// Absolute dotted path of the target, resolved against the collection.
    target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(skip)]
    pub(crate) parent: Option<NodeId>,
    /// Resolution cache; invalidated when the target path is reassigned.
    /// Derivable, never serialized.
    #[serde(skip)]
    cached: Cell<Option<NodeId>>,
}

impl Alias {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            span: None,
            parent: None,
            cached: Cell::new(None),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Reassign the target path. Invalidates the resolution cache.
    pub fn set_target(&mut self, target: impl Into<String>) {
        self.target = target.into();
        self.cached.set(None);
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub(crate) fn cached_target(&self) -> Option<NodeId> {
        self.cached.get()
    }

    pub(crate) fn cache_target(&self, id: NodeId) {
        self.cached.set(Some(id));
    }

    pub(crate) fn invalidate_cache(&self) {
        self.cached.set(None);
    }
}

// ============================================================================
// Members and the Arena
// ============================================================================

/// A slot in the arena: a concrete declaration or an alias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Member {
    Decl(Decl),
    Alias(Alias),
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Member::Decl(decl) => &decl.name,
            Member::Alias(alias) => &alias.name,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Member::Decl(decl) => decl.span,
            Member::Alias(alias) => alias.span,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Member::Decl(decl) => decl.parent,
            Member::Alias(alias) => alias.parent,
        }
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeId>) {
        match self {
            Member::Decl(decl) => decl.parent = parent,
            Member::Alias(alias) => alias.parent = parent,
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, Member::Alias(_))
    }

    pub fn as_decl(&self) -> Option<&Decl> {
        match self {
            Member::Decl(decl) => Some(decl),
            Member::Alias(_) => None,
        }
    }

    pub fn as_decl_mut(&mut self) -> Option<&mut Decl> {
        match self {
            Member::Decl(decl) => Some(decl),
            Member::Alias(_) => None,
        }
    }

    pub fn as_alias(&self) -> Option<&Alias> {
        match self {
            Member::Decl(_) => None,
            Member::Alias(alias) => Some(alias),
        }
    }

    pub fn as_alias_mut(&mut self) -> Option<&mut Alias> {
        match self {
            Member::Decl(_) => None,
            Member::Alias(alias) => Some(alias),
        }
    }
}

/// Owns every node of a collection. Ids are stable for the life of the
/// arena; deletion unbinds nodes from their parent table but never reuses
/// slots within a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Arena {
    nodes: Vec<Member>,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, member: Member) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(member);
        id
    }

    /// Borrow a node. Panics on an id this arena never allocated; use
    /// [`try_get`](Arena::try_get) for ids of uncertain provenance.
    pub fn get(&self, id: NodeId) -> &Member {
        &self.nodes[id.index()]
    }

    /// Mutably borrow a node. Panics on an id this arena never allocated;
    /// use [`try_get_mut`](Arena::try_get_mut) for ids of uncertain
    /// provenance.
    pub fn get_mut(&mut self, id: NodeId) -> &mut Member {
        &mut self.nodes[id.index()]
    }

    /// Checked lookup for ids that may come from another collection.
    pub fn try_get(&self, id: NodeId) -> Option<&Member> {
        self.nodes.get(id.index())
    }

    /// Checked mutable lookup for ids that may come from another
    /// collection.
    pub fn try_get_mut(&mut self, id: NodeId) -> Option<&mut Member> {
        self.nodes.get_mut(id.index())
    }

    pub fn decl(&self, id: NodeId) -> Option<&Decl> {
        self.get(id).as_decl()
    }

    pub fn decl_mut(&mut self, id: NodeId) -> Option<&mut Decl> {
        self.get_mut(id).as_decl_mut()
    }

    pub fn alias(&self, id: NodeId) -> Option<&Alias> {
        self.get(id).as_alias()
    }

    pub fn alias_mut(&mut self, id: NodeId) -> Option<&mut Alias> {
        self.get_mut(id).as_alias_mut()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every id currently allocated, in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId::from_index)
    }
}
