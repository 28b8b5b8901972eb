//! Edges and vertex colors of a crafting chain.
//!
//! Vertices are named `"{position}\n{token}"` so repeated tokens stay
//! distinct. Coloring alternates between two palette entries and holds across
//! action vertices.

use serde::Serialize;

use super::translate::TranslationTable;
use super::{ACTION_PREFIXES, PALETTE};
use crate::config::ChainConfig;

/// A directed link between two chain vertices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub label: Option<String>,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Edges of a chain together with the fill color of every vertex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainGraph {
    pub edges: Vec<Edge>,
    /// Vertex -> color, in first-seen order.
    pub colors: Vec<(String, String)>,
}

impl ChainGraph {
    pub fn color_of(&self, vertex: &str) -> Option<&str> {
        self.colors
            .iter()
            .find(|(v, _)| v == vertex)
            .map(|(_, c)| c.as_str())
    }
}

/// Palette and action prefixes used by [`colorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorScheme {
    pub palette: [String; 2],
    pub action_prefixes: Vec<String>,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            palette: PALETTE.map(String::from),
            action_prefixes: ACTION_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl From<&ChainConfig> for ColorScheme {
    fn from(config: &ChainConfig) -> Self {
        Self {
            palette: config.palette.clone(),
            action_prefixes: config.action_prefixes.clone(),
        }
    }
}

impl ColorScheme {
    /// Whether `vertex` names an action rather than an item.
    pub fn is_action(&self, vertex: &str) -> bool {
        let token = token_part(vertex);
        self.action_prefixes.iter().any(|p| token.starts_with(p.as_str()))
    }
}

/// `"3\nplace:0 -> stone"` -> `"place:0 -> stone"`.
fn token_part(vertex: &str) -> &str {
    vertex.split_once('\n').map_or(vertex, |(_, token)| token)
}

/// Link every token to its successor.
///
/// Vertex names carry the 1-based position so that repeated tokens stay
/// distinct: edge `i` joins `"{i}\n{chain[i-1]}"` to `"{i+1}\n{chain[i]}"`,
/// both translated.
pub fn build_edges<S: AsRef<str>>(chain: &[S], table: &TranslationTable) -> Vec<Edge> {
    let names: Vec<String> = chain
        .iter()
        .enumerate()
        .map(|(i, token)| format!("{}\n{}", i + 1, table.translate(token.as_ref())))
        .collect();
    names
        .windows(2)
        .map(|pair| Edge::new(pair[0].clone(), pair[1].clone()))
        .collect()
}

/// Endpoints of `edges` in first-seen order, without duplicates.
pub fn vertexes(edges: &[Edge]) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    for edge in edges {
        for vertex in [edge.from.as_str(), edge.to.as_str()] {
            if !seen.contains(&vertex) {
                seen.push(vertex);
            }
        }
    }
    seen
}

/// Assign alternating palette colors to the vertices of `edges`.
///
/// The color switches after each item vertex and holds across action
/// vertices, so an item and the actions that follow it share one color.
pub fn colorize(edges: &[Edge], scheme: &ColorScheme) -> Vec<(String, String)> {
    vertexes(edges)
        .into_iter()
        .scan(0usize, |current, vertex| {
            let color = scheme.palette[*current].clone();
            if !scheme.is_action(vertex) {
                *current = (*current + 1) % scheme.palette.len();
            }
            Some((vertex.to_string(), color))
        })
        .collect()
}

pub fn build_edges_and_colors<S: AsRef<str>>(
    chain: &[S],
    table: &TranslationTable,
    scheme: &ColorScheme,
) -> ChainGraph {
    let edges = build_edges(chain, table);
    let colors = colorize(&edges, scheme);
    ChainGraph { edges, colors }
}
