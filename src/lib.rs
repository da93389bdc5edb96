//! A semantic model of a Python package's public API.
//!
//! The crate takes the output of a parsing front end (declarations, spans,
//! docstrings, import statements) and turns it into a queryable object
//! tree: modules, classes, functions, attributes, type aliases, and the
//! aliases created by re-exports. On top of the tree it provides the
//! derived views a documentation or analysis tool needs.
//!
//! # Architecture
//!
//! - [`model`] — the arena, node identity, and the tagged declaration kinds.
//! - [`collection`] — the root registry and path-addressed member table,
//!   including the conflict policy applied when a binding is replaced.
//! - [`resolve`] — alias chain resolution with cycle detection, plus the
//!   package-wide fixpoint resolver and the reflection-provider seam.
//! - [`view`] — read-only handles and the capability surface shared by
//!   declarations and aliases.
//! - [`mro`] — C3 linearization and inherited-member views.
//! - [`stubs`] — folding stub modules into their concrete twins.
//! - [`docstring`] — docstring cleaning, the section model, and style
//!   inference.
//! - [`extensions`] — traversal checkpoints for external observers.
//! - [`encode`] — JSON persistence with parent-pointer relinking on decode.
//!
//! # Example
//!
//! ```
//! use apiscope::collection::ModulesCollection;
//! use apiscope::model::{Alias, Decl, Member};
//!
//! let mut coll = ModulesCollection::new();
//! let pkg = coll.alloc(Member::Decl(Decl::module("pkg").with_source("pkg/__init__.py")));
//! coll.register_module(pkg);
//!
//! let class = coll.alloc(Member::Decl(Decl::class("Thing")));
//! coll.set(pkg, "Thing", class)?;
//! let alias = coll.alloc(Member::Alias(Alias::new("T", "pkg.Thing")));
//! coll.set(pkg, "T", alias)?;
//!
//! assert_eq!(coll.resolve_alias(alias)?, class);
//! # Ok::<(), apiscope::error::ApiscopeError>(())
//! ```

pub mod collection;
pub mod docstring;
pub mod encode;
pub mod error;
pub mod expr;
pub mod extensions;
pub mod model;
pub mod mro;
pub mod resolve;
pub mod span;
pub mod stubs;
pub mod view;

pub use collection::{ModulesCollection, PathError};
pub use docstring::{Docstring, Section, SectionKind, Style};
pub use error::{ApiscopeError, Result};
pub use expr::{Expr, Param, ParamKind, TypeParam};
pub use model::{Alias, Decl, DeclKind, Kind, Member, NodeId};
pub use resolve::{ResolveError, ResolveOptions, ResolveStats, Resolver};
pub use span::{Location, Span};
pub use view::{DeclRef, MemberRef, ObjectApi};
