//! Target schemas: the nested shape of observation and action data.
//!
//! A schema is an ordered tree of named slots. Leaves carry no type
//! information; the loader only needs the names and the nesting to rebuild
//! trees from the archive's flat field list.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::error::SchemaError;

// ---------------------------------------------------------------------------
// Schema nodes
// ---------------------------------------------------------------------------

/// One slot of a schema: a leaf or an ordered group of named sub-slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaNode {
    Leaf,
    Group(Vec<(String, SchemaNode)>),
}

impl SchemaNode {
    /// Build a group from `(name, node)` pairs, keeping their order.
    pub fn group<K: Into<String>>(children: impl IntoIterator<Item = (K, SchemaNode)>) -> Self {
        SchemaNode::Group(children.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a group whose children are all leaves.
    pub fn leaves(names: &[&str]) -> Self {
        SchemaNode::Group(
            names
                .iter()
                .map(|n| (n.to_string(), SchemaNode::Leaf))
                .collect(),
        )
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, SchemaNode::Leaf)
    }

    /// Direct children of a group (empty for a leaf).
    pub fn children(&self) -> &[(String, SchemaNode)] {
        match self {
            SchemaNode::Group(children) => children,
            SchemaNode::Leaf => &[],
        }
    }

    /// Dotted paths of every leaf in declaration order.
    pub fn leaf_paths(&self) -> Vec<String> {
        fn walk(node: &SchemaNode, prefix: &str, out: &mut Vec<String>) {
            for (key, child) in node.children() {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                match child {
                    SchemaNode::Leaf => out.push(path),
                    SchemaNode::Group(_) => walk(child, &path, out),
                }
            }
        }
        let mut out = Vec::new();
        walk(self, "", &mut out);
        out
    }

    /// Parse a node from JSON: objects are groups (key order preserved), any
    /// other value is a leaf.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => SchemaNode::Group(
                map.iter()
                    .map(|(k, v)| (k.clone(), SchemaNode::from_json(v)))
                    .collect(),
            ),
            _ => SchemaNode::Leaf,
        }
    }
}

impl<'de> Deserialize<'de> for SchemaNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(SchemaNode::from_json(&value))
    }
}

// ---------------------------------------------------------------------------
// Task schemas and providers
// ---------------------------------------------------------------------------

/// The observation and action schemas of one task.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskSchema {
    pub observation: SchemaNode,
    pub action: SchemaNode,
}

/// Hands out the target schemas for a task identifier.
pub trait SchemaProvider {
    fn schema(&self, task_id: &str) -> Result<TaskSchema, SchemaError>;
}

/// Schemas of the recorded MineRL tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSchemas;

const INVENTORY_ITEMS: &[&str] = &[
    "coal",
    "cobblestone",
    "crafting_table",
    "dirt",
    "furnace",
    "iron_axe",
    "iron_ingot",
    "iron_ore",
    "iron_pickaxe",
    "log",
    "planks",
    "stick",
    "stone",
    "stone_axe",
    "stone_pickaxe",
    "torch",
    "wooden_axe",
    "wooden_pickaxe",
];

const OBTAIN_ACTIONS: &[&str] = &[
    "attack",
    "back",
    "camera",
    "craft",
    "equip",
    "forward",
    "jump",
    "left",
    "nearbyCraft",
    "nearbySmelt",
    "place",
    "right",
    "sneak",
    "sprint",
];

const TREECHOP_ACTIONS: &[&str] = &[
    "attack", "back", "camera", "forward", "jump", "left", "right", "sneak", "sprint",
];

impl BuiltinSchemas {
    /// Task identifiers with a built-in schema.
    pub const TASKS: &'static [&'static str] = &[
        "MineRLObtainDiamond-v0",
        "MineRLObtainDiamondDense-v0",
        "MineRLObtainIronPickaxe-v0",
        "MineRLObtainIronPickaxeDense-v0",
        "MineRLTreechop-v0",
    ];

    fn obtain() -> TaskSchema {
        TaskSchema {
            observation: SchemaNode::group([
                (
                    "equipped_items",
                    SchemaNode::group([(
                        "mainhand",
                        SchemaNode::leaves(&["damage", "maxDamage", "type"]),
                    )]),
                ),
                ("inventory", SchemaNode::leaves(INVENTORY_ITEMS)),
                ("pov", SchemaNode::Leaf),
            ]),
            action: SchemaNode::leaves(OBTAIN_ACTIONS),
        }
    }

    fn treechop() -> TaskSchema {
        TaskSchema {
            observation: SchemaNode::leaves(&["pov"]),
            action: SchemaNode::leaves(TREECHOP_ACTIONS),
        }
    }
}

impl SchemaProvider for BuiltinSchemas {
    fn schema(&self, task_id: &str) -> Result<TaskSchema, SchemaError> {
        match task_id {
            "MineRLObtainDiamond-v0"
            | "MineRLObtainDiamondDense-v0"
            | "MineRLObtainIronPickaxe-v0"
            | "MineRLObtainIronPickaxeDense-v0" => Ok(Self::obtain()),
            "MineRLTreechop-v0" => Ok(Self::treechop()),
            other => Err(SchemaError::UnknownTask(other.to_string())),
        }
    }
}

/// Schemas read from a JSON file mapping task id to `{observation, action}`.
#[derive(Debug, Clone, Default)]
pub struct FileSchemas {
    tasks: BTreeMap<String, TaskSchema>,
}

impl FileSchemas {
    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let tasks: BTreeMap<String, TaskSchema> =
            serde_json::from_str(text).map_err(|e| SchemaError::Invalid(e.to_string()))?;
        for (task, schema) in &tasks {
            if schema.observation.is_leaf() || schema.action.is_leaf() {
                return Err(SchemaError::Invalid(format!(
                    "task `{task}` must define observation and action as objects"
                )));
            }
        }
        Ok(Self { tasks })
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SchemaError::Invalid(format!("{}: {e}", path.as_ref().display()))
        })?;
        let schemas = Self::from_json_str(&text)?;
        tracing::debug!(
            path = %path.as_ref().display(),
            tasks = schemas.tasks.len(),
            "Loaded schema file"
        );
        Ok(schemas)
    }
}

impl SchemaProvider for FileSchemas {
    fn schema(&self, task_id: &str) -> Result<TaskSchema, SchemaError> {
        self.tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownTask(task_id.to_string()))
    }
}
