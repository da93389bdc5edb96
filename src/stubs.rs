//! Folding stub modules into their concrete twins.
//!
//! A stub module carries type information (annotations, overloads, exports)
//! for a concrete module it mirrors. [`merge`] folds the stub into the
//! concrete declaration in place and returns the concrete node; the stub's
//! own node is left unbound.
//!
//! # Merge policy
//!
//! The concrete module stays authoritative for structure and runtime
//! behavior; the stub is authoritative for typing:
//!
//! - parameter and attribute annotations and return types are taken from
//!   the stub outright, absent ones included;
//! - the stub's export list replaces the concrete one when present;
//! - docstrings are only filled in where the concrete side has none;
//! - members that exist only in the stub are adopted and marked as not
//!   present at runtime;
//! - on a kind disagreement the stub's declaration wins, with a warning.

use thiserror::Error;

use crate::collection::ModulesCollection;
use crate::model::{Decl, DeclKind, NodeId};

/// Errors from stub merging.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Neither side is a stub module.
    #[error("cannot merge '{path}': neither module is a stub")]
    BothConcrete { path: String },

    /// Both sides are stub modules.
    #[error("cannot merge '{path}': both modules are stubs")]
    BothStubs { path: String },
}

/// Result type for stub merging.
pub type MergeResult<T> = Result<T, MergeError>;

/// Fold a stub module into its concrete twin, in either argument order.
/// Returns the concrete module, now carrying the stub's typing information.
pub fn merge(coll: &mut ModulesCollection, a: NodeId, b: NodeId) -> MergeResult<NodeId> {
    let a_stub = coll.node(a).as_decl().is_some_and(Decl::is_stub_module);
    let b_stub = coll.node(b).as_decl().is_some_and(Decl::is_stub_module);

    let (concrete, stub) = match (a_stub, b_stub) {
        (false, true) => (a, b),
        (true, false) => (b, a),
        (true, true) => {
            return Err(MergeError::BothStubs {
                path: coll.path_of(a),
            })
        }
        (false, false) => {
            return Err(MergeError::BothConcrete {
                path: coll.path_of(a),
            })
        }
    };

    tracing::debug!(
        module = %coll.path_of(concrete),
        stub = %coll.location_of(stub),
        "merging stub into concrete module"
    );
    merge_container(coll, concrete, stub);
    Ok(concrete)
}

/// Merge container-level data (modules and classes), then recurse over the
/// stub's members.
fn merge_container(coll: &mut ModulesCollection, concrete: NodeId, stub: NodeId) {
    let Some(stub_decl) = coll.node(stub).as_decl().cloned() else {
        return;
    };

    if let Some(decl) = coll.arena.decl_mut(concrete) {
        if decl.docstring.is_none() {
            decl.docstring = stub_decl.docstring.clone();
        }
        decl.labels.extend(stub_decl.labels.iter().cloned());

        match (&mut decl.kind, &stub_decl.kind) {
            (DeclKind::Module(data), DeclKind::Module(stub_data)) => {
                for (name, target) in &stub_data.imports {
                    data.imports
                        .entry(name.clone())
                        .or_insert_with(|| target.clone());
                }
                if stub_data.exports.is_some() {
                    // The stub's export list is the typed public surface.
                    data.exports = stub_data.exports.clone();
                }
                for (name, overloads) in &stub_data.overloads {
                    data.overloads
                        .entry(name.clone())
                        .or_insert_with(|| overloads.clone());
                }
            }
            (DeclKind::Class(data), DeclKind::Class(stub_data)) => {
                if data.type_params.is_empty() {
                    data.type_params = stub_data.type_params.clone();
                }
                if data.bases.is_empty() {
                    data.bases = stub_data.bases.clone();
                }
                for (name, target) in &stub_data.imports {
                    data.imports
                        .entry(name.clone())
                        .or_insert_with(|| target.clone());
                }
                for (name, overloads) in &stub_data.overloads {
                    data.overloads
                        .entry(name.clone())
                        .or_insert_with(|| overloads.clone());
                }
            }
            _ => {}
        }
    }

    let stub_members: Vec<(String, NodeId)> = stub_decl
        .members()
        .map(|(name, id)| (name.to_string(), id))
        .collect();

    for (name, stub_member) in stub_members {
        if coll.node(stub_member).is_alias() {
            // Stub re-exports describe the stub's own surface, not the
            // concrete module's structure.
            continue;
        }

        let existing = coll
            .arena
            .decl(concrete)
            .and_then(|decl| decl.member(&name));

        let Some(existing) = existing else {
            adopt_stub_member(coll, concrete, &name, stub_member);
            continue;
        };

        let target = match coll.resolve_alias(existing) {
            Ok(target) => target,
            Err(err) => {
                tracing::debug!(
                    member = %coll.path_of(existing),
                    %err,
                    "existing member did not resolve, stub member skipped"
                );
                continue;
            }
        };

        let concrete_tag = coll.node(target).as_decl().map(Decl::kind_tag);
        let stub_tag = coll.node(stub_member).as_decl().map(Decl::kind_tag);
        if concrete_tag != stub_tag {
            tracing::warn!(
                member = %coll.path_of(target),
                location = %coll.location_of(stub_member),
                "kind disagreement between stub and concrete member, stub wins"
            );
            coll.node_mut(existing).set_parent(None);
            rebind(coll, concrete, &name, stub_member);
            continue;
        }

        match coll.node(stub_member).as_decl().map(|decl| &decl.kind) {
            Some(DeclKind::Module(_)) | Some(DeclKind::Class(_)) => {
                merge_container(coll, target, stub_member);
            }
            Some(DeclKind::Function(_)) => merge_function(coll, target, stub_member),
            Some(DeclKind::Attribute(_)) => merge_attribute(coll, target, stub_member),
            Some(DeclKind::TypeAlias(_)) => merge_type_alias(coll, target, stub_member),
            None => {}
        }
    }
}

/// Adopt a stub-only member into the concrete container, marking its whole
/// subtree as absent at runtime.
fn adopt_stub_member(coll: &mut ModulesCollection, concrete: NodeId, name: &str, member: NodeId) {
    mark_stub_only(coll, member);
    rebind(coll, concrete, name, member);
}

fn rebind(coll: &mut ModulesCollection, container: NodeId, name: &str, member: NodeId) {
    if let Some(decl) = coll.arena.decl_mut(container) {
        decl.members.insert(name.to_string(), member);
    }
    coll.node_mut(member).set_parent(Some(container));
}

fn mark_stub_only(coll: &mut ModulesCollection, id: NodeId) {
    let children: Vec<NodeId> = match coll.arena.decl_mut(id) {
        Some(decl) => {
            decl.runtime = false;
            decl.members().map(|(_, child)| child).collect()
        }
        None => return,
    };
    for child in children {
        mark_stub_only(coll, child);
    }
}

fn merge_function(coll: &mut ModulesCollection, concrete: NodeId, stub: NodeId) {
    let Some(stub_data) = coll
        .arena
        .decl(stub)
        .and_then(Decl::function_data)
        .cloned()
    else {
        return;
    };

    fill_docstring(coll, concrete, stub);
    let Some(data) = coll
        .arena
        .decl_mut(concrete)
        .and_then(Decl::function_data_mut)
    else {
        return;
    };

    // The stub owns the typing story outright: a matched parameter takes
    // the stub's annotation even when that annotation is absent, and the
    // return annotation is replaced wholesale. Differing signatures keep
    // the concrete parameter list untouched otherwise.
    for stub_param in &stub_data.params {
        if let Some(param) = data.params.iter_mut().find(|p| p.name == stub_param.name) {
            param.annotation = stub_param.annotation.clone();
        }
    }
    data.returns = stub_data.returns;
    if data.type_params.is_empty() {
        data.type_params = stub_data.type_params;
    }
}

fn merge_attribute(coll: &mut ModulesCollection, concrete: NodeId, stub: NodeId) {
    let Some(stub_data) = coll
        .arena
        .decl(stub)
        .and_then(Decl::attribute_data)
        .cloned()
    else {
        return;
    };

    fill_docstring(coll, concrete, stub);
    let Some(decl) = coll.arena.decl_mut(concrete) else {
        return;
    };
    if let DeclKind::Attribute(data) = &mut decl.kind {
        // The annotation is the stub's to set or to clear.
        data.annotation = stub_data.annotation;
        // `x: int = ...` carries no real value; only a concrete stub value
        // transfers.
        if let Some(value) = stub_data.value {
            if !value.is_ellipsis() {
                data.value = Some(value);
            }
        }
    }
}

fn merge_type_alias(coll: &mut ModulesCollection, concrete: NodeId, stub: NodeId) {
    let Some(stub_data) = coll
        .arena
        .decl(stub)
        .and_then(|decl| match &decl.kind {
            DeclKind::TypeAlias(data) => Some(data.clone()),
            _ => None,
        })
    else {
        return;
    };

    fill_docstring(coll, concrete, stub);
    let Some(decl) = coll.arena.decl_mut(concrete) else {
        return;
    };
    if let DeclKind::TypeAlias(data) = &mut decl.kind {
        if stub_data.value.is_some() {
            data.value = stub_data.value;
        }
        if data.type_params.is_empty() {
            data.type_params = stub_data.type_params;
        }
    }
}

fn fill_docstring(coll: &mut ModulesCollection, concrete: NodeId, stub: NodeId) {
    let stub_doc = coll
        .arena
        .decl(stub)
        .and_then(|decl| decl.docstring.clone());
    if let Some(decl) = coll.arena.decl_mut(concrete) {
        if decl.docstring.is_none() {
            decl.docstring = stub_doc;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docstring::Docstring;
    use crate::expr::Param;
    use crate::model::{Alias, Member};

    fn twins() -> (ModulesCollection, NodeId, NodeId) {
        let mut coll = ModulesCollection::new();
        let concrete = coll.alloc(Member::Decl(Decl::module("mod").with_source("pkg/mod.py")));
        coll.register_module(concrete);
        let stub = coll.alloc(Member::Decl(Decl::module("mod").with_source("pkg/mod.pyi")));
        (coll, concrete, stub)
    }

    mod orientation {
        use super::*;

        #[test]
        fn argument_order_does_not_matter() {
            let (mut coll, concrete, stub) = twins();
            assert_eq!(merge(&mut coll, concrete, stub).unwrap(), concrete);

            let (mut coll, concrete, stub) = twins();
            assert_eq!(merge(&mut coll, stub, concrete).unwrap(), concrete);
        }

        #[test]
        fn two_concrete_modules_refuse_to_merge() {
            let mut coll = ModulesCollection::new();
            let a = coll.alloc(Member::Decl(Decl::module("mod").with_source("a/mod.py")));
            coll.register_module(a);
            let b = coll.alloc(Member::Decl(Decl::module("mod").with_source("b/mod.py")));

            assert!(matches!(
                merge(&mut coll, a, b).unwrap_err(),
                MergeError::BothConcrete { .. }
            ));
        }

        #[test]
        fn two_stubs_refuse_to_merge() {
            let mut coll = ModulesCollection::new();
            let a = coll.alloc(Member::Decl(Decl::module("mod").with_source("a/mod.pyi")));
            coll.register_module(a);
            let b = coll.alloc(Member::Decl(Decl::module("mod").with_source("b/mod.pyi")));

            assert!(matches!(
                merge(&mut coll, a, b).unwrap_err(),
                MergeError::BothStubs { .. }
            ));
        }
    }

    mod typing_transfer {
        use super::*;

        #[test]
        fn annotations_and_returns_come_from_the_stub() {
            let (mut coll, concrete, stub) = twins();

            let mut runtime_fn = Decl::function("add");
            if let DeclKind::Function(data) = &mut runtime_fn.kind {
                data.params = vec![Param::new("a"), Param::new("b")];
                data.returns = Some("Any".into());
            }
            let runtime_fn = coll.alloc(Member::Decl(runtime_fn));
            coll.set(concrete, "add", runtime_fn).unwrap();

            let mut stub_fn = Decl::function("add");
            if let DeclKind::Function(data) = &mut stub_fn.kind {
                data.params = vec![
                    Param::new("a").with_annotation("int"),
                    Param::new("b").with_annotation("int"),
                ];
                data.returns = Some("int".into());
            }
            let stub_fn = coll.alloc(Member::Decl(stub_fn));
            if let Some(decl) = coll.arena.decl_mut(stub) {
                decl.members.insert("add".to_string(), stub_fn);
            }

            merge(&mut coll, concrete, stub).unwrap();

            let data = coll
                .arena
                .decl(runtime_fn)
                .and_then(Decl::function_data)
                .unwrap();
            assert_eq!(
                data.params[0].annotation.as_ref().map(|a| a.as_str()),
                Some("int")
            );
            assert_eq!(data.returns.as_ref().map(|r| r.as_str()), Some("int"));
        }

        #[test]
        fn unannotated_stub_function_clears_concrete_typing() {
            let (mut coll, concrete, stub) = twins();

            let mut runtime_fn = Decl::function("f");
            if let DeclKind::Function(data) = &mut runtime_fn.kind {
                data.params = vec![Param::new("a").with_annotation("int")];
                data.returns = Some("Any".into());
            }
            let runtime_fn = coll.alloc(Member::Decl(runtime_fn));
            coll.set(concrete, "f", runtime_fn).unwrap();

            // The stub declares `f` with no annotations at all.
            let mut stub_fn = Decl::function("f");
            if let DeclKind::Function(data) = &mut stub_fn.kind {
                data.params = vec![Param::new("a")];
            }
            let stub_fn = coll.alloc(Member::Decl(stub_fn));
            if let Some(decl) = coll.arena.decl_mut(stub) {
                decl.members.insert("f".to_string(), stub_fn);
            }

            merge(&mut coll, concrete, stub).unwrap();

            let data = coll
                .arena
                .decl(runtime_fn)
                .and_then(Decl::function_data)
                .unwrap();
            assert_eq!(data.params[0].annotation, None);
            assert_eq!(data.returns, None);
        }

        #[test]
        fn unannotated_stub_attribute_clears_concrete_annotation() {
            let (mut coll, concrete, stub) = twins();

            let mut runtime_attr = Decl::attribute("x");
            if let DeclKind::Attribute(data) = &mut runtime_attr.kind {
                data.annotation = Some("str".into());
                data.value = Some("'v'".into());
            }
            let runtime_attr = coll.alloc(Member::Decl(runtime_attr));
            coll.set(concrete, "x", runtime_attr).unwrap();

            let stub_attr = coll.alloc(Member::Decl(Decl::attribute("x")));
            if let Some(decl) = coll.arena.decl_mut(stub) {
                decl.members.insert("x".to_string(), stub_attr);
            }

            merge(&mut coll, concrete, stub).unwrap();

            let data = coll
                .arena
                .decl(runtime_attr)
                .and_then(Decl::attribute_data)
                .unwrap();
            assert_eq!(data.annotation, None);
            // The value gate is unaffected: no stub value, concrete stays.
            assert_eq!(data.value.as_ref().map(|v| v.as_str()), Some("'v'"));
        }

        #[test]
        fn attribute_annotation_transfers_but_ellipsis_value_does_not() {
            let (mut coll, concrete, stub) = twins();

            let mut runtime_attr = Decl::attribute("x");
            if let DeclKind::Attribute(data) = &mut runtime_attr.kind {
                data.value = Some("42".into());
            }
            let runtime_attr = coll.alloc(Member::Decl(runtime_attr));
            coll.set(concrete, "x", runtime_attr).unwrap();

            let mut stub_attr = Decl::attribute("x");
            if let DeclKind::Attribute(data) = &mut stub_attr.kind {
                data.annotation = Some("int".into());
                data.value = Some("...".into());
            }
            let stub_attr = coll.alloc(Member::Decl(stub_attr));
            if let Some(decl) = coll.arena.decl_mut(stub) {
                decl.members.insert("x".to_string(), stub_attr);
            }

            merge(&mut coll, concrete, stub).unwrap();

            let data = coll
                .arena
                .decl(runtime_attr)
                .and_then(Decl::attribute_data)
                .unwrap();
            assert_eq!(data.annotation.as_ref().map(|a| a.as_str()), Some("int"));
            assert_eq!(data.value.as_ref().map(|v| v.as_str()), Some("42"));
        }

        #[test]
        fn stub_exports_replace_concrete_exports() {
            let (mut coll, concrete, stub) = twins();
            if let Some(data) = coll.arena.decl_mut(concrete).and_then(Decl::module_data_mut) {
                data.exports = Some(vec!["old".to_string()]);
            }
            if let Some(data) = coll.arena.decl_mut(stub).and_then(Decl::module_data_mut) {
                data.exports = Some(vec!["new".to_string()]);
            }

            merge(&mut coll, concrete, stub).unwrap();

            let data = coll.arena.decl(concrete).and_then(Decl::module_data).unwrap();
            assert_eq!(data.exports.as_deref(), Some(&["new".to_string()][..]));
        }

        #[test]
        fn type_alias_value_and_params_transfer() {
            let (mut coll, concrete, stub) = twins();

            let runtime_ta = coll.alloc(Member::Decl(Decl::type_alias("Result")));
            coll.set(concrete, "Result", runtime_ta).unwrap();

            let mut stub_ta = Decl::type_alias("Result");
            if let DeclKind::TypeAlias(data) = &mut stub_ta.kind {
                data.value = Some("dict[str, int]".into());
                data.type_params = vec![crate::expr::TypeParam::new("T")];
            }
            let stub_ta = coll.alloc(Member::Decl(stub_ta));
            if let Some(decl) = coll.arena.decl_mut(stub) {
                decl.members.insert("Result".to_string(), stub_ta);
            }

            merge(&mut coll, concrete, stub).unwrap();

            let decl = coll.arena.decl(runtime_ta).unwrap();
            if let DeclKind::TypeAlias(data) = &decl.kind {
                assert_eq!(
                    data.value.as_ref().map(|v| v.as_str()),
                    Some("dict[str, int]")
                );
                assert_eq!(data.type_params.len(), 1);
            } else {
                panic!("expected a type alias");
            }
        }

        #[test]
        fn stub_imports_and_overloads_fill_missing_entries() {
            let (mut coll, concrete, stub) = twins();
            if let Some(data) = coll.arena.decl_mut(concrete).and_then(Decl::module_data_mut) {
                data.imports
                    .insert("Local".to_string(), "pkg.local.Local".to_string());
            }
            let overload = coll.alloc(Member::Decl(Decl::function("open")));
            if let Some(data) = coll.arena.decl_mut(stub).and_then(Decl::module_data_mut) {
                data.imports
                    .insert("Local".to_string(), "stub.shadowed.Local".to_string());
                data.imports
                    .insert("Extra".to_string(), "typing.Any".to_string());
                data.overloads.insert("open".to_string(), vec![overload]);
            }

            merge(&mut coll, concrete, stub).unwrap();

            let data = coll.arena.decl(concrete).and_then(Decl::module_data).unwrap();
            // Existing entries stay; only missing ones are pulled.
            assert_eq!(data.imports.get("Local").unwrap(), "pkg.local.Local");
            assert_eq!(data.imports.get("Extra").unwrap(), "typing.Any");
            assert_eq!(data.overloads.get("open"), Some(&vec![overload]));
        }

        #[test]
        fn docstring_fills_only_when_absent() {
            let (mut coll, concrete, stub) = twins();
            if let Some(decl) = coll.arena.decl_mut(stub) {
                decl.docstring = Some(Docstring::new("From the stub."));
            }

            merge(&mut coll, concrete, stub).unwrap();
            assert_eq!(
                coll.arena
                    .decl(concrete)
                    .and_then(|d| d.docstring.as_ref())
                    .map(|d| d.value.as_str()),
                Some("From the stub.")
            );
        }
    }

    mod structure {
        use super::*;

        #[test]
        fn stub_only_members_are_adopted_as_non_runtime() {
            let (mut coll, concrete, stub) = twins();
            let typed_only = coll.alloc(Member::Decl(Decl::class("Protocolish")));
            if let Some(decl) = coll.arena.decl_mut(stub) {
                decl.members.insert("Protocolish".to_string(), typed_only);
            }

            merge(&mut coll, concrete, stub).unwrap();

            assert_eq!(coll.get(concrete, "Protocolish").unwrap(), typed_only);
            let decl = coll.arena.decl(typed_only).unwrap();
            assert!(!decl.runtime);
            assert_eq!(decl.parent(), Some(concrete));
        }

        #[test]
        fn kind_disagreement_lets_the_stub_win() {
            let (mut coll, concrete, stub) = twins();
            let as_attr = coll.alloc(Member::Decl(Decl::attribute("thing")));
            coll.set(concrete, "thing", as_attr).unwrap();
            let as_class = coll.alloc(Member::Decl(Decl::class("thing")));
            if let Some(decl) = coll.arena.decl_mut(stub) {
                decl.members.insert("thing".to_string(), as_class);
            }

            merge(&mut coll, concrete, stub).unwrap();
            assert_eq!(coll.get(concrete, "thing").unwrap(), as_class);
        }

        #[test]
        fn stub_aliases_are_ignored() {
            let (mut coll, concrete, stub) = twins();
            let reexport = coll.alloc(Member::Alias(Alias::new("Path", "pathlib.Path")));
            if let Some(decl) = coll.arena.decl_mut(stub) {
                decl.members.insert("Path".to_string(), reexport);
            }

            merge(&mut coll, concrete, stub).unwrap();
            assert!(coll.get(concrete, "Path").is_err());
        }

        #[test]
        fn unresolvable_concrete_alias_skips_the_member() {
            let (mut coll, concrete, stub) = twins();
            let broken = coll.alloc(Member::Alias(Alias::new("thing", "nowhere.thing")));
            coll.set(concrete, "thing", broken).unwrap();
            let stub_fn = coll.alloc(Member::Decl(Decl::function("thing")));
            if let Some(decl) = coll.arena.decl_mut(stub) {
                decl.members.insert("thing".to_string(), stub_fn);
            }

            merge(&mut coll, concrete, stub).unwrap();
            // The broken alias binding is left alone rather than replaced.
            assert_eq!(coll.get(concrete, "thing").unwrap(), broken);
        }

        #[test]
        fn merge_is_idempotent() {
            let (mut coll, concrete, stub) = twins();
            let typed_only = coll.alloc(Member::Decl(Decl::function("helper")));
            if let Some(decl) = coll.arena.decl_mut(stub) {
                decl.members.insert("helper".to_string(), typed_only);
            }

            merge(&mut coll, concrete, stub).unwrap();
            merge(&mut coll, concrete, stub).unwrap();

            let decl = coll.arena.decl(concrete).unwrap();
            assert_eq!(decl.member_count(), 1);
            assert_eq!(decl.member("helper"), Some(typed_only));
        }

        #[test]
        fn classes_merge_recursively() {
            let (mut coll, concrete, stub) = twins();

            let runtime_class = coll.alloc(Member::Decl(Decl::class("Thing")));
            coll.set(concrete, "Thing", runtime_class).unwrap();
            let runtime_method = coll.alloc(Member::Decl(Decl::function("run")));
            coll.set(concrete, "Thing.run", runtime_method).unwrap();

            let stub_class = coll.alloc(Member::Decl(Decl::class("Thing")));
            let mut stub_method = Decl::function("run");
            if let DeclKind::Function(data) = &mut stub_method.kind {
                data.returns = Some("None".into());
            }
            let stub_method = coll.alloc(Member::Decl(stub_method));
            if let Some(decl) = coll.arena.decl_mut(stub_class) {
                decl.members.insert("run".to_string(), stub_method);
            }
            if let Some(decl) = coll.arena.decl_mut(stub) {
                decl.members.insert("Thing".to_string(), stub_class);
            }

            merge(&mut coll, concrete, stub).unwrap();

            // Structure kept from the runtime side, typing from the stub.
            assert_eq!(coll.get(concrete, "Thing.run").unwrap(), runtime_method);
            let data = coll
                .arena
                .decl(runtime_method)
                .and_then(Decl::function_data)
                .unwrap();
            assert_eq!(data.returns.as_ref().map(|r| r.as_str()), Some("None"));
        }
    }
}
