//! Parallel traversal and synthesis of allele trees.
//!
//! Both algorithms visit children before parents, keys in sorted order, and hand
//! their handlers flattened nodes: nested metadata alleles are replaced by their
//! scalar value, so handlers only ever see raw metadata.
//!
//! Structure is checked for the whole tree set before any handler runs.

use super::alleles::{Allele, Metadatum};
use crate::error::{ClanTuneError, Result};
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Filter admitting nodes flagged for mutation.
pub fn can_mutate(allele: &Allele) -> bool {
    allele.can_mutate()
}

/// Filter admitting nodes flagged for crossbreeding.
pub fn can_crossbreed(allele: &Allele) -> bool {
    allele.can_crossbreed()
}

/// Filter admitting every node.
pub fn any_allele(_allele: &Allele) -> bool {
    true
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.to_string()
    }
}

fn child_nodes<'a>(nodes: &[&'a Allele], key: &str) -> Vec<&'a Allele> {
    nodes
        .iter()
        .filter_map(|node| node.metadata_entry(key).and_then(Metadatum::as_allele))
        .collect()
}

/// Every node must expose the same metadata keys, and each key must hold an
/// allele in all nodes or a raw value in all nodes.
pub fn check_structure(nodes: &[&Allele], path: &str) -> Result<()> {
    let Some((first, rest)) = nodes.split_first() else {
        return Ok(());
    };

    for (index, node) in rest.iter().enumerate() {
        if !node.metadata().keys().eq(first.metadata().keys()) {
            return Err(ClanTuneError::TypeMismatch {
                path: display_path(path),
                detail: format!(
                    "tree {} has metadata keys {:?}, tree 0 has {:?}",
                    index + 1,
                    node.metadata().keys().collect::<Vec<_>>(),
                    first.metadata().keys().collect::<Vec<_>>()
                ),
            });
        }
    }

    for (key, entry) in first.metadata() {
        let child_path = join(path, key);
        for (index, node) in rest.iter().enumerate() {
            let other = node.metadata_entry(key).map(Metadatum::is_allele);
            if other != Some(entry.is_allele()) {
                return Err(ClanTuneError::TypeMismatch {
                    path: child_path,
                    detail: format!(
                        "tree 0 holds {} but tree {} holds {}",
                        describe(entry.is_allele()),
                        index + 1,
                        describe(!entry.is_allele())
                    ),
                });
            }
        }
        if entry.is_allele() {
            check_structure(&child_nodes(nodes, key), &child_path)?;
        }
    }
    Ok(())
}

fn describe(is_allele: bool) -> &'static str {
    if is_allele {
        "an allele"
    } else {
        "a raw value"
    }
}

/// Variant, domain, capability flags and raw metadata must be identical at every
/// position. Assumes [`check_structure`] passed.
pub fn check_schema(nodes: &[&Allele], path: &str) -> Result<()> {
    let Some((first, rest)) = nodes.split_first() else {
        return Ok(());
    };

    for (index, node) in rest.iter().enumerate() {
        let tree = index + 1;
        let mismatch = if node.kind() != first.kind() {
            Some(format!("variant {} differs from {}", node.kind(), first.kind()))
        } else if node.domain() != first.domain() {
            Some(format!(
                "domain {:?} differs from {:?}",
                node.domain(),
                first.domain()
            ))
        } else if node.can_mutate() != first.can_mutate() {
            Some(format!("can_mutate is {}", node.can_mutate()))
        } else if node.can_crossbreed() != first.can_crossbreed() {
            Some(format!("can_crossbreed is {}", node.can_crossbreed()))
        } else {
            None
        };
        if let Some(detail) = mismatch {
            return Err(ClanTuneError::SchemaMismatch {
                path: display_path(path),
                detail: format!("tree {}: {}", tree, detail),
            });
        }

        for (key, entry) in first.metadata() {
            if let Metadatum::Raw(expected) = entry {
                if let Some(Metadatum::Raw(actual)) = node.metadata_entry(key) {
                    if actual != expected {
                        return Err(ClanTuneError::SchemaMismatch {
                            path: join(path, key),
                            detail: format!(
                                "tree {} holds {}, tree 0 holds {}",
                                tree, actual, expected
                            ),
                        });
                    }
                }
            }
        }
    }

    for (key, entry) in first.metadata() {
        if entry.is_allele() {
            check_schema(&child_nodes(nodes, key), &join(path, key))?;
        }
    }
    Ok(())
}

struct Frame<'a> {
    nodes: Vec<&'a Allele>,
    children: Vec<&'a str>,
    next: usize,
}

impl<'a> Frame<'a> {
    fn new(nodes: Vec<&'a Allele>) -> Self {
        let children = nodes
            .first()
            .map(|node| {
                node.metadata()
                    .iter()
                    .filter(|(_, entry)| entry.is_allele())
                    .map(|(key, _)| key.as_str())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            nodes,
            children,
            next: 0,
        }
    }
}

/// Lazy post-order walk over parallel allele trees. Built by [`walk`] or [`walk_forest`].
pub struct Walk<'a, T, H, P> {
    stack: Vec<Frame<'a>>,
    handler: H,
    include_if: P,
    _output: PhantomData<fn() -> T>,
}

impl<'a, T, H, P> Iterator for Walk<'a, T, H, P>
where
    H: FnMut(&[Allele]) -> Option<T>,
    P: Fn(&Allele) -> bool,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            let frame = self.stack.last_mut()?;
            if frame.next < frame.children.len() {
                let key = frame.children[frame.next];
                frame.next += 1;
                let nodes = child_nodes(&frame.nodes, key);
                self.stack.push(Frame::new(nodes));
                continue;
            }

            let frame = self.stack.pop()?;
            // The predicate sees the first tree's unflattened node.
            if !(self.include_if)(frame.nodes[0]) {
                continue;
            }
            let flattened: Vec<Allele> = frame.nodes.iter().map(|node| node.flattened()).collect();
            if let Some(result) = (self.handler)(&flattened) {
                return Some(result);
            }
        }
    }
}

/// Walks N parallel trees, yielding every non-`None` handler result.
///
/// Fails with [`ClanTuneError::TypeMismatch`] before any handler call if the trees
/// are not structurally parallel.
pub fn walk<'a, T, H, P>(trees: &[&'a Allele], handler: H, include_if: P) -> Result<Walk<'a, T, H, P>>
where
    H: FnMut(&[Allele]) -> Option<T>,
    P: Fn(&Allele) -> bool,
{
    walk_forest(vec![(String::new(), trees.to_vec())], handler, include_if)
}

/// Walks several named groups of parallel trees one after another, in the given order.
pub fn walk_forest<'a, T, H, P>(
    forest: Vec<(String, Vec<&'a Allele>)>,
    handler: H,
    include_if: P,
) -> Result<Walk<'a, T, H, P>>
where
    H: FnMut(&[Allele]) -> Option<T>,
    P: Fn(&Allele) -> bool,
{
    for (name, trees) in &forest {
        check_structure(trees, name)?;
    }

    let stack = forest
        .into_iter()
        .rev()
        .filter(|(_, trees)| !trees.is_empty())
        .map(|(_, trees)| Frame::new(trees))
        .collect();

    Ok(Walk {
        stack,
        handler,
        include_if,
        _output: PhantomData,
    })
}

/// Builds one tree from a template and N parallel input trees.
///
/// Child positions are resolved first. A node failing `include_if` keeps its
/// value but still receives its resolved children. Otherwise the handler gets the
/// flattened template and inputs and returns the new node, into which the
/// resolved children are substituted back.
pub fn synthesize<H, P>(template: &Allele, trees: &[&Allele], handler: H, include_if: P) -> Result<Allele>
where
    H: FnMut(&Allele, &[Allele]) -> Result<Allele>,
    P: Fn(&Allele) -> bool,
{
    synthesize_rooted("", template, trees, handler, include_if)
}

/// [`synthesize`] with `root` prefixed to every error path.
pub(crate) fn synthesize_rooted<H, P>(
    root: &str,
    template: &Allele,
    trees: &[&Allele],
    mut handler: H,
    include_if: P,
) -> Result<Allele>
where
    H: FnMut(&Allele, &[Allele]) -> Result<Allele>,
    P: Fn(&Allele) -> bool,
{
    if trees.is_empty() {
        return Err(ClanTuneError::Precondition(format!(
            "synthesis of '{}' requires at least one input tree",
            display_path(root)
        )));
    }

    let mut all = Vec::with_capacity(trees.len() + 1);
    all.push(template);
    all.extend_from_slice(trees);
    check_structure(&all, root)?;
    check_schema(&all, root)?;

    synthesize_node(root, template, trees, &mut handler, &include_if)
}

fn synthesize_node<H, P>(
    path: &str,
    template: &Allele,
    trees: &[&Allele],
    handler: &mut H,
    include_if: &P,
) -> Result<Allele>
where
    H: FnMut(&Allele, &[Allele]) -> Result<Allele>,
    P: Fn(&Allele) -> bool,
{
    let mut resolved = BTreeMap::new();
    for (key, entry) in template.metadata() {
        if let Metadatum::Allele(child) = entry {
            let inputs = child_nodes(trees, key);
            let child_path = join(path, key);
            let synthesized = synthesize_node(&child_path, child, &inputs, handler, include_if)?;
            resolved.insert(key.clone(), synthesized);
        }
    }

    let candidate = template.with_children(&resolved);
    if !include_if(&candidate) {
        return Ok(candidate);
    }

    log::trace!("synthesizing '{}' from {} trees", display_path(path), trees.len());
    let flat_template = candidate.flattened();
    let flat_inputs: Vec<Allele> = trees.iter().map(|tree| tree.flattened()).collect();
    let produced = handler(&flat_template, &flat_inputs)?;
    if produced.kind() != template.kind() {
        return Err(ClanTuneError::SchemaMismatch {
            path: display_path(path),
            detail: format!(
                "handler returned a {} allele for a {} position",
                produced.kind(),
                template.kind()
            ),
        });
    }
    Ok(produced.with_children(&resolved))
}
