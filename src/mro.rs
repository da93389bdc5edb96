//! Method Resolution Order computation using C3 linearization.
//!
//! # Algorithm
//!
//! C3 linearization guarantees that children precede their parents, that
//! direct bases keep their declared order, and that one consistent ordering
//! exists across the hierarchy. The merge step repeatedly picks, from the
//! head of the input lists, a candidate appearing in no list's tail; if no
//! head qualifies the hierarchy has no consistent linearization.
//!
//! # Base resolution
//!
//! Declared bases are unevaluated expressions. Each is resolved through the
//! enclosing scopes (member tables first, then recorded imports, then the
//! collection root) and through any alias indirections. A base that does
//! not resolve to a class — a subscripted generic, a dynamically computed
//! expression, an alias that fails to resolve — is silently dropped from
//! the list. This is a documented limitation, not an error.

use std::collections::HashSet;

use indexmap::IndexMap;
use thiserror::Error;

use crate::collection::ModulesCollection;
use crate::expr::Expr;
use crate::model::{DeclKind, NodeId};

/// Errors from MRO computation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MroError {
    /// No consistent linearization exists: conflicting base orders, a
    /// duplicated direct base, or an inheritance cycle.
    #[error("cannot compute a consistent method resolution order for class '{class}'")]
    Conflict { class: String },
}

/// Result type for MRO operations.
pub type MroResult<T> = Result<T, MroError>;

/// Resolve a class's declared base expressions to class declarations,
/// silently dropping anything that is not one.
pub fn resolved_bases(coll: &ModulesCollection, class: NodeId) -> Vec<NodeId> {
    let Some(decl) = coll.node(class).as_decl() else {
        return Vec::new();
    };
    let Some(data) = decl.class_data() else {
        return Vec::new();
    };
    let mut bases = Vec::with_capacity(data.bases.len());
    for base in &data.bases {
        match resolve_base_expr(coll, class, base) {
            Some(id) => bases.push(id),
            None => {
                tracing::debug!(
                    class = %coll.path_of(class),
                    base = %base,
                    "base did not resolve to a class, dropped"
                );
            }
        }
    }
    bases
}

/// Resolve one base expression through enclosing scopes, import registries,
/// and alias chains, keeping only class declarations.
fn resolve_base_expr(coll: &ModulesCollection, class: NodeId, base: &Expr) -> Option<NodeId> {
    if !base.is_dotted_name() {
        return None;
    }
    let text = base.as_str();
    let first = text.split('.').next()?;

    let mut scope = coll.node(class).parent();
    while let Some(scope_id) = scope {
        if let Some(decl) = coll.node(scope_id).as_decl() {
            if decl.member(first).is_some() {
                // Innermost scope declaring the name wins, resolved or not.
                let found = coll.get(scope_id, text).ok()?;
                let resolved = coll.resolve_alias(found).ok()?;
                return as_class(coll, resolved);
            }
            let imports = match &decl.kind {
                DeclKind::Module(data) => Some(&data.imports),
                DeclKind::Class(data) => Some(&data.imports),
                DeclKind::Function(_) | DeclKind::Attribute(_) | DeclKind::TypeAlias(_) => None,
            };
            if let Some(target) = imports.and_then(|imports| imports.get(first)) {
                let full = match text.split_once('.') {
                    Some((_, rest)) => format!("{target}.{rest}"),
                    None => target.clone(),
                };
                let resolved = coll.resolve_target(&full).ok()?;
                return as_class(coll, resolved);
            }
        }
        scope = coll.node(scope_id).parent();
    }

    let found = coll.lookup(text).ok()?;
    let resolved = coll.resolve_alias(found).ok()?;
    as_class(coll, resolved)
}

fn as_class(coll: &ModulesCollection, id: NodeId) -> Option<NodeId> {
    match coll.node(id).as_decl().map(|decl| &decl.kind) {
        Some(DeclKind::Class(_)) => Some(id),
        _ => None,
    }
}

/// Compute the MRO of a class: its ancestors in resolution order, the class
/// itself excluded. A class with no resolvable bases has an empty MRO.
pub fn mro(coll: &ModulesCollection, class: NodeId) -> MroResult<Vec<NodeId>> {
    let mut visiting = HashSet::new();
    let linearized = linearize(coll, class, &mut visiting)?;
    Ok(linearized.into_iter().skip(1).collect())
}

/// Full linearization including the class itself, with cycle detection.
fn linearize(
    coll: &ModulesCollection,
    class: NodeId,
    visiting: &mut HashSet<NodeId>,
) -> MroResult<Vec<NodeId>> {
    if !visiting.insert(class) {
        return Err(MroError::Conflict {
            class: coll.path_of(class),
        });
    }

    let bases = resolved_bases(coll, class);
    let mut result = vec![class];

    if !bases.is_empty() {
        let mut seqs: Vec<Vec<NodeId>> = Vec::with_capacity(bases.len() + 1);
        for &base in &bases {
            let base_linearization = linearize(coll, base, visiting);
            match base_linearization {
                Ok(seq) => seqs.push(seq),
                Err(err) => {
                    visiting.remove(&class);
                    return Err(err);
                }
            }
        }
        seqs.push(bases);

        match merge(&mut seqs) {
            Some(merged) => result.extend(merged),
            None => {
                visiting.remove(&class);
                return Err(MroError::Conflict {
                    class: coll.path_of(class),
                });
            }
        }
    }

    visiting.remove(&class);
    Ok(result)
}

/// C3 merge: pick a head appearing in no tail, append it, strip it from
/// every head, repeat. `None` when no consistent ordering exists.
fn merge(seqs: &mut Vec<Vec<NodeId>>) -> Option<Vec<NodeId>> {
    let mut result = Vec::new();

    loop {
        seqs.retain(|seq| !seq.is_empty());
        if seqs.is_empty() {
            return Some(result);
        }

        let mut candidate = None;
        for seq in seqs.iter() {
            let head = seq[0];
            let in_tail = seqs.iter().any(|s| s.len() > 1 && s[1..].contains(&head));
            if !in_tail {
                candidate = Some(head);
                break;
            }
        }

        let candidate = candidate?;
        result.push(candidate);
        for seq in seqs.iter_mut() {
            if seq.first() == Some(&candidate) {
                seq.remove(0);
            }
        }
    }
}

/// Members reachable through the MRO but not declared on the class itself.
/// Nearer ancestors shadow farther ones by construction of the MRO order.
pub fn inherited_members(
    coll: &ModulesCollection,
    class: NodeId,
) -> MroResult<IndexMap<String, NodeId>> {
    let own: HashSet<&str> = coll
        .node(class)
        .as_decl()
        .map(|decl| decl.members().map(|(name, _)| name).collect())
        .unwrap_or_default();

    let mut inherited = IndexMap::new();
    for ancestor in mro(coll, class)? {
        let Some(decl) = coll.node(ancestor).as_decl() else {
            continue;
        };
        for (name, id) in decl.members() {
            if own.contains(name) || inherited.contains_key(name) {
                continue;
            }
            inherited.insert(name.to_string(), id);
        }
    }
    Ok(inherited)
}

/// Own-declared members with inherited ones filling the remaining names.
pub fn all_members(
    coll: &ModulesCollection,
    class: NodeId,
) -> MroResult<IndexMap<String, NodeId>> {
    let mut members: IndexMap<String, NodeId> = coll
        .node(class)
        .as_decl()
        .map(|decl| {
            decl.members()
                .map(|(name, id)| (name.to_string(), id))
                .collect()
        })
        .unwrap_or_default();

    for (name, id) in inherited_members(coll, class)? {
        members.entry(name).or_insert(id);
    }
    Ok(members)
}
