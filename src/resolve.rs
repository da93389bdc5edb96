//! Alias resolution: chains, cycles, caching, and the fixpoint pass.
//!
//! An alias names a target by absolute dotted path. Resolution walks the
//! path segment by segment from the collection root; landing on (or
//! transiting through) another alias continues from *its* target path,
//! recording every target path visited. A repeated path is a cycle; a
//! chain that passes the depth limit without repeating is reported as too
//! long, never as cyclic.
//!
//! Successful resolutions are cached on the alias and invalidated when its
//! target path is reassigned.
//!
//! # The fixpoint pass
//!
//! [`Resolver::resolve_all`] is a work-list algorithm: it tracks only the
//! currently-unresolved aliases and rescans them until a pass makes no
//! progress or the pass cap is reached. Aliases still unresolved afterward
//! are left in place; later direct access re-attempts resolution and raises
//! on failure. The `implicit`/`external` gates control which aliases are
//! attempted at all (cost control, not correctness).

use thiserror::Error;

use crate::collection::ModulesCollection;
use crate::model::{Member, NodeId};
use crate::view::is_public_member;

/// Upper bound on chain length before resolution gives up. Guards against
/// self-growing splices like an alias whose target passes back through
/// itself, which grow without ever repeating a path.
const MAX_ALIAS_CHAIN: usize = 128;

/// Errors raised while resolving an alias.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The target path is absent from the collection.
    #[error("cannot resolve alias target '{target}'")]
    Unresolvable { target: String },

    /// The target chain came back to an already-visited path.
    #[error("cyclic alias chain: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    /// The chain passed the depth limit without repeating a path.
    #[error("alias chain exceeded {limit} links while resolving '{target}'")]
    ChainTooLong { target: String, limit: usize },
}

/// Result type for alias resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

impl ModulesCollection {
    /// Resolve an alias to its ultimate declaration, following chains and
    /// detecting cycles. The result is cached on the alias.
    ///
    /// Calling this on a declaration node returns the node itself.
    pub fn resolve_alias(&self, id: NodeId) -> ResolveResult<NodeId> {
        let alias = match self.node(id) {
            Member::Decl(_) => return Ok(id),
            Member::Alias(alias) => alias,
        };
        if let Some(cached) = alias.cached_target() {
            return Ok(cached);
        }
        let resolved = self.resolve_target(alias.target())?;
        alias.cache_target(resolved);
        Ok(resolved)
    }

    /// Resolve an absolute dotted target path to a declaration, following
    /// alias indirections anywhere along the way.
    pub fn resolve_target(&self, start: &str) -> ResolveResult<NodeId> {
        let mut seen: Vec<String> = Vec::new();
        let mut target = start.to_string();
        'chain: loop {
            if seen.contains(&target) {
                return Err(ResolveError::Cycle { chain: seen });
            }
            if seen.len() >= MAX_ALIAS_CHAIN {
                return Err(ResolveError::ChainTooLong {
                    target,
                    limit: MAX_ALIAS_CHAIN,
                });
            }
            seen.push(target.clone());

            let segments: Vec<&str> = target.split('.').collect();
            let (first, rest) = match segments.split_first() {
                Some(parts) if !parts.0.is_empty() => parts,
                _ => return Err(ResolveError::Unresolvable { target }),
            };
            let Some(mut current) = self.module(first) else {
                return Err(ResolveError::Unresolvable { target });
            };

            for (i, segment) in rest.iter().enumerate() {
                match self.node(current) {
                    Member::Decl(decl) => match decl.member(segment) {
                        Some(next) => current = next,
                        None => return Err(ResolveError::Unresolvable { target }),
                    },
                    Member::Alias(alias) => {
                        // Transit alias mid-path: continue from its target
                        // with the unconsumed segments spliced on.
                        let spliced = format!("{}.{}", alias.target(), rest[i..].join("."));
                        target = spliced;
                        continue 'chain;
                    }
                }
            }

            match self.node(current) {
                Member::Decl(_) => return Ok(current),
                Member::Alias(alias) => {
                    target = alias.target().to_string();
                }
            }
        }
    }
}

// ============================================================================
// Reflection Provider
// ============================================================================

/// Optional collaborator that synthesizes declarations for packages the
/// static front end never saw, by inspecting a running instance of the
/// analyzed code. The core treats its output identically to front-end
/// output and never itself executes target code.
pub trait ReflectionProvider {
    /// Build a module description for a top-level package, allocating its
    /// nodes into the collection. Returns the module node, not yet
    /// registered.
    fn describe(&self, package: &str, collection: &mut ModulesCollection) -> Option<NodeId>;
}

// ============================================================================
// Fixpoint Resolver
// ============================================================================

/// Knobs for [`Resolver::resolve_all`].
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Attempt aliases that are not part of their module's public surface.
    pub implicit: bool,
    /// Attempt aliases pointing outside the loaded set of packages.
    pub external: bool,
    /// Hard cap on full passes; termination guarantee, not a performance
    /// knob.
    pub max_passes: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            implicit: false,
            external: false,
            max_passes: 10,
        }
    }
}

/// Accounting from a fixpoint pass. Individually-unresolved aliases are
/// never an error at this level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// Passes actually executed.
    pub passes: usize,
    /// Aliases newly resolved across all passes.
    pub resolved: usize,
    /// Aliases attempted but still unresolved at the end.
    pub unresolved: usize,
    /// Aliases excluded up front by the `implicit`/`external` gates.
    pub skipped: usize,
}

/// Package-wide alias resolver. Construct one per pass configuration; the
/// reflection provider, when present, is consulted for external packages.
pub struct Resolver<'p> {
    options: ResolveOptions,
    provider: Option<&'p dyn ReflectionProvider>,
}

impl<'p> Resolver<'p> {
    pub fn new(options: ResolveOptions) -> Self {
        Self {
            options,
            provider: None,
        }
    }

    pub fn with_provider(mut self, provider: &'p dyn ReflectionProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Run the fixpoint pass: rescan the unresolved work list until a scan
    /// makes no progress or the pass cap is reached.
    pub fn resolve_all(&self, collection: &mut ModulesCollection) -> ResolveStats {
        let mut stats = ResolveStats::default();
        let mut worklist: Vec<NodeId> = Vec::new();

        for id in collection.arena.ids() {
            let Some(alias) = collection.arena.alias(id) else {
                continue;
            };
            if alias.cached_target().is_some() {
                continue;
            }
            let top = alias.target().split('.').next().unwrap_or_default();
            let external = collection.module(top).is_none();
            if external && !self.options.external {
                stats.skipped += 1;
                continue;
            }
            if !self.options.implicit && !is_public_member(collection, id) {
                stats.skipped += 1;
                continue;
            }
            worklist.push(id);
        }

        while stats.passes < self.options.max_passes && !worklist.is_empty() {
            stats.passes += 1;
            let mut progress = false;
            let mut remaining = Vec::with_capacity(worklist.len());

            for id in worklist.drain(..) {
                self.adopt_external_package(collection, id);
                match collection.resolve_alias(id) {
                    Ok(_) => {
                        stats.resolved += 1;
                        progress = true;
                    }
                    Err(err) => {
                        tracing::trace!(?id, %err, "alias unresolved this pass");
                        remaining.push(id);
                    }
                }
            }

            worklist = remaining;
            tracing::debug!(
                pass = stats.passes,
                resolved = stats.resolved,
                remaining = worklist.len(),
                "alias resolution pass finished"
            );
            if !progress {
                break;
            }
        }

        stats.unresolved = worklist.len();
        stats
    }

    /// When an alias points at an unloaded top-level package and a
    /// reflection provider is available, adopt the provider's synthesized
    /// module before attempting resolution.
    fn adopt_external_package(&self, collection: &mut ModulesCollection, id: NodeId) {
        let Some(provider) = self.provider else {
            return;
        };
        let Some(alias) = collection.arena.alias(id) else {
            return;
        };
        let top = match alias.target().split('.').next() {
            Some(top) if !top.is_empty() => top.to_string(),
            _ => return,
        };
        if collection.module(&top).is_some() {
            return;
        }
        if let Some(module) = provider.describe(&top, collection) {
            tracing::debug!(package = %top, "adopted reflected module description");
            collection.register_module(module);
        }
    }
}
