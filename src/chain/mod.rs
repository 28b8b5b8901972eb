//! Crafting-chain visualization.
//!
//! A chain is an ordered list of symbolic tokens such as `"log"` or
//! `"craft:planks:3"`. Drawing one takes three steps:
//!
//! - [`translate`] -- rewrite `<field>:<order>:<digit>` tokens into readable
//!   `<field>:<order> -> <name>` labels.
//! - [`graph`] -- link consecutive tokens into [`Edge`]s and color the
//!   vertices so that an item and the actions following it share a color.
//! - [`render`] -- emit DOT with `petgraph` and hand it to Graphviz.

pub mod graph;
pub mod render;
pub mod translate;

pub use graph::{
    build_edges, build_edges_and_colors, colorize, vertexes, ChainGraph, ColorScheme, Edge,
};
pub use render::{save_chain, to_dot, ChainRenderer};
pub use translate::{translate, TranslationTable};

/// The two alternating vertex fill colors.
pub const PALETTE: [&str; 2] = ["#ffe6cc", "#ccffe6"];

/// Token prefixes that mark an action performed on the preceding item.
pub const ACTION_PREFIXES: [&str; 5] = ["equip:", "craft:", "nearbyCraft:", "nearbySmelt:", "place:"];
