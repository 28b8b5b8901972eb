//! Human-readable names for enumerated action tokens.

/// Enumerations of the MineRL categorical actions, keyed by field prefix.
const MINERL_ENUMS: &[(&str, &[&str])] = &[
    (
        "place",
        &["none", "dirt", "stone", "cobblestone", "crafting_table", "furnace", "torch"],
    ),
    ("nearbySmelt", &["none", "iron_ingot", "coal"]),
    (
        "nearbyCraft",
        &[
            "none",
            "wooden_axe",
            "wooden_pickaxe",
            "stone_axe",
            "stone_pickaxe",
            "iron_axe",
            "iron_pickaxe",
            "furnace",
        ],
    ),
    (
        "equip",
        &[
            "none",
            "air",
            "wooden_axe",
            "wooden_pickaxe",
            "stone_axe",
            "stone_pickaxe",
            "iron_axe",
            "iron_pickaxe",
        ],
    ),
    ("craft", &["none", "torch", "stick", "planks", "crafting_table"]),
];

/// Ordered `(prefix, enumeration)` pairs.
///
/// A `<field>:<order>` head is looked up by the longest prefix in the table
/// that it starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationTable {
    entries: Vec<(String, Vec<String>)>,
}

impl Default for TranslationTable {
    fn default() -> Self {
        Self::new(
            MINERL_ENUMS
                .iter()
                .map(|(prefix, names)| (*prefix, names.iter().copied())),
        )
    }
}

impl TranslationTable {
    pub fn new<P, N, S>(entries: impl IntoIterator<Item = (P, N)>) -> Self
    where
        P: Into<String>,
        N: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(prefix, names)| (prefix.into(), names.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }

    /// Enumeration of the longest non-empty prefix of `head` in the table.
    pub fn lookup(&self, head: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .filter(|(prefix, _)| !prefix.is_empty() && head.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, names)| names.as_slice())
    }

    /// `"place:0:3"` -> `"place:0 -> cobblestone"`.
    ///
    /// Tokens that are not three `:`-separated parts, have no table entry, or
    /// carry a digit outside the enumeration come back unchanged.
    pub fn translate(&self, token: &str) -> String {
        let parts: Vec<&str> = token.split(':').collect();
        let [field, order, digit] = parts.as_slice() else {
            return token.to_string();
        };
        let head = format!("{field}:{order}");
        let name = self
            .lookup(&head)
            .zip(digit.parse::<usize>().ok())
            .and_then(|(names, index)| names.get(index));
        match name {
            Some(name) => format!("{head} -> {name}"),
            None => token.to_string(),
        }
    }
}

/// [`TranslationTable::translate`] with the built-in MineRL table.
pub fn translate(token: &str) -> String {
    TranslationTable::default().translate(token)
}
