//! Rebuild nested trees from an archive's flat field list.
//!
//! Archives store observations and actions as a flat, ordered list of fields.
//! The mapper walks the target schema depth-first and pairs schema slots with
//! list positions:
//!
//! - A **leaf** takes the entry at the current position (one position).
//! - A **bundled** group is stored in a single cell: child `k` is the cell's
//!   `k`-th transposed row (numpy `cell.T[k]`), and the whole group consumes
//!   one position however many children it declares.
//! - A **special** group, named by the [`StoragePolicy`], has no cell of its
//!   own. Its children sit in consecutive cells of the parent list, so the
//!   group advances the position only by what its children consume.
//!
//! MineRL recordings need both: `inventory` is one `(steps, items)` matrix,
//! while `equipped_items.mainhand.{damage,maxDamage,type}` are separate fields.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::space::SchemaNode;
use crate::error::SchemaError;
use crate::trajectory::tensor::Tensor;
use crate::trajectory::types::Tree;

/// Group names whose children are stored as separate consecutive fields.
pub const DEFAULT_SPECIAL_GROUPS: &[&str] = &["equipped_items", "mainhand"];

/// Declares which schema groups do not own a flat-list cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePolicy {
    special_groups: BTreeSet<String>,
}

impl StoragePolicy {
    pub fn new<S: Into<String>>(special_groups: impl IntoIterator<Item = S>) -> Self {
        Self {
            special_groups: special_groups.into_iter().map(Into::into).collect(),
        }
    }

    /// A policy where every group is bundled into one cell.
    pub fn all_bundled() -> Self {
        Self {
            special_groups: BTreeSet::new(),
        }
    }

    pub fn is_special(&self, group: &str) -> bool {
        self.special_groups.contains(group)
    }
}

impl Default for StoragePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SPECIAL_GROUPS.iter().copied())
    }
}

/// Where a schema node reads its values from.
enum Cells<'a> {
    /// The archive's flat field list.
    List(&'a [Tensor]),
    /// Transposed rows of a single bundled cell.
    Packed(Tensor),
}

impl Cells<'_> {
    fn len(&self) -> usize {
        match self {
            Cells::List(list) => list.len(),
            Cells::Packed(t) => t.last_axis_len().unwrap_or(0),
        }
    }

    fn get(&self, key: &str, index: usize) -> Result<Tensor, SchemaError> {
        let found = match self {
            Cells::List(list) => list.get(index).cloned(),
            Cells::Packed(t) => {
                if t.ndim() == 0 {
                    return Err(SchemaError::NotIndexable {
                        key: key.to_string(),
                    });
                }
                t.transposed_row(index)
            }
        };
        found.ok_or_else(|| SchemaError::OutOfBounds {
            key: key.to_string(),
            index,
            available: self.len(),
        })
    }
}

/// Maps flat field lists onto schemas under a [`StoragePolicy`].
#[derive(Debug, Clone, Default)]
pub struct SchemaMapper {
    policy: StoragePolicy,
}

impl SchemaMapper {
    pub fn new(policy: StoragePolicy) -> Self {
        Self { policy }
    }

    /// Rebuild the tree described by `schema` from `flat`.
    ///
    /// Top-level keys in `ignore_keys` are left out of the result and consume
    /// no position. Fails if the list is too short for the schema or has
    /// entries left over once the schema has been walked.
    pub fn map_to_dict(
        &self,
        flat: &[Tensor],
        schema: &SchemaNode,
        ignore_keys: &BTreeSet<String>,
    ) -> Result<Tree, SchemaError> {
        let SchemaNode::Group(slots) = schema else {
            return Err(SchemaError::NotAGroup);
        };
        let cells = Cells::List(flat);
        let mut out = Vec::with_capacity(slots.len());
        let mut position = 0;
        for (key, node) in slots {
            if ignore_keys.contains(key) {
                continue;
            }
            let (subtree, consumed) = self.map_node(&cells, position, key, node)?;
            out.push((key.clone(), subtree));
            position += consumed;
        }
        if position != flat.len() {
            return Err(SchemaError::Unconsumed {
                consumed: position,
                available: flat.len(),
            });
        }
        Ok(Tree::Group(out))
    }

    /// Map one slot starting at `position`; returns the subtree and the number
    /// of positions of `cells` it used.
    fn map_node(
        &self,
        cells: &Cells<'_>,
        position: usize,
        key: &str,
        node: &SchemaNode,
    ) -> Result<(Tree, usize), SchemaError> {
        let children = match node {
            SchemaNode::Leaf => return Ok((Tree::Leaf(cells.get(key, position)?), 1)),
            SchemaNode::Group(children) => children,
        };

        if self.policy.is_special(key) {
            let mut out = Vec::with_capacity(children.len());
            let mut consumed = 0;
            for (child_key, child) in children {
                let (subtree, used) = self.map_node(cells, position + consumed, child_key, child)?;
                out.push((child_key.clone(), subtree));
                consumed += used;
            }
            return Ok((Tree::Group(out), consumed));
        }

        let packed = Cells::Packed(cells.get(key, position)?);
        let mut out = Vec::with_capacity(children.len());
        for (index, (child_key, child)) in children.iter().enumerate() {
            let (subtree, _) = self.map_node(&packed, index, child_key, child)?;
            out.push((child_key.clone(), subtree));
        }
        Ok((Tree::Group(out), 1))
    }
}
