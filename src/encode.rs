//! JSON persistence for a modules collection.
//!
//! The wire form is the arena plus the root registry. Parent pointers and
//! alias resolution caches are derivable, so they are never written; decode
//! rebuilds parents from the member tables and leaves every alias cache
//! cold. Member-table order survives the round trip.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collection::ModulesCollection;
use crate::model::{Arena, NodeId};

/// Errors from encoding or decoding a collection.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A member table or the root registry references a node the arena does
    /// not contain.
    #[error("node reference {id:?} is outside the arena ({len} nodes)")]
    DanglingId { id: NodeId, len: usize },
}

/// Result type for persistence operations.
pub type EncodeResult<T> = Result<T, EncodeError>;

#[derive(Serialize, Deserialize)]
struct CollectionRepr {
    arena: Arena,
    roots: IndexMap<String, NodeId>,
}

/// Serialize a collection to compact JSON.
pub fn to_json(collection: &ModulesCollection) -> EncodeResult<String> {
    let repr = CollectionRepr {
        arena: collection.arena.clone(),
        roots: collection.roots().clone(),
    };
    Ok(serde_json::to_string(&repr)?)
}

/// Serialize a collection to human-readable JSON.
pub fn to_json_pretty(collection: &ModulesCollection) -> EncodeResult<String> {
    let repr = CollectionRepr {
        arena: collection.arena.clone(),
        roots: collection.roots().clone(),
    };
    Ok(serde_json::to_string_pretty(&repr)?)
}

/// Deserialize a collection from JSON, validating every node reference and
/// rebuilding the parent pointers.
pub fn from_json(text: &str) -> EncodeResult<ModulesCollection> {
    let repr: CollectionRepr = serde_json::from_str(text)?;
    let mut collection = ModulesCollection::from_parts(repr.arena, repr.roots);
    relink(&mut collection)?;
    Ok(collection)
}

/// Walk every member table, validate the ids it holds, and point each child
/// back at its container.
fn relink(collection: &mut ModulesCollection) -> EncodeResult<()> {
    let len = collection.arena.len();
    let in_bounds = |id: NodeId| -> EncodeResult<()> {
        if id.index() < len {
            Ok(())
        } else {
            Err(EncodeError::DanglingId { id, len })
        }
    };

    for (_, root) in collection.modules() {
        in_bounds(root)?;
    }

    let mut links: Vec<(NodeId, NodeId)> = Vec::new();
    for id in collection.arena.ids() {
        if let Some(decl) = collection.arena.decl(id) {
            for (_, child) in decl.members() {
                in_bounds(child)?;
                links.push((child, id));
            }
        }
    }
    for (child, parent) in links {
        collection.node_mut(child).set_parent(Some(parent));
    }
    Ok(())
}
