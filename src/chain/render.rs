//! DOT output and Graphviz invocation for chain graphs.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use petgraph::dot::{Config, Dot};
use petgraph::graph::DiGraph;

use super::graph::{build_edges_and_colors, vertexes, ChainGraph, ColorScheme};
use super::translate::TranslationTable;
use crate::config::ChainConfig;

/// Quote a string for use inside a DOT attribute.
fn quote(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{escaped}\"")
}

/// Render `graph` as a DOT digraph: filled, colored vertices and black
/// edges.
pub fn to_dot(graph: &ChainGraph) -> String {
    let mut g: DiGraph<String, Option<String>> = DiGraph::new();
    let mut index = HashMap::new();
    for vertex in vertexes(&graph.edges) {
        index.insert(vertex, g.add_node(vertex.to_string()));
    }
    for edge in &graph.edges {
        let (Some(&from), Some(&to)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
        else {
            continue;
        };
        g.add_edge(from, to, edge.label.clone());
    }

    let node_attrs = |_, (_, name): (_, &String)| {
        let mut attrs = format!("label={}, style=filled", quote(name));
        if let Some(color) = graph.color_of(name) {
            attrs.push_str(&format!(", fillcolor={}", quote(color)));
        }
        attrs
    };
    let dot = Dot::with_attr_getters(
        &g,
        &[Config::NodeNoLabel, Config::EdgeNoLabel],
        &|_, edge| match edge.weight() {
            Some(label) => format!("color=black, label={}", quote(label)),
            None => "color=black".to_string(),
        },
        &node_attrs,
    );
    format!("{dot:?}")
}

/// Draws chain graphs with the Graphviz `dot` program.
#[derive(Debug, Clone)]
pub struct ChainRenderer {
    dot_bin: String,
    scheme: ColorScheme,
    table: TranslationTable,
}

impl Default for ChainRenderer {
    fn default() -> Self {
        Self::from_config(&ChainConfig::default())
    }
}

impl ChainRenderer {
    pub fn from_config(config: &ChainConfig) -> Self {
        Self {
            dot_bin: config.dot_bin.clone(),
            scheme: ColorScheme::from(config),
            table: TranslationTable::default(),
        }
    }

    /// Lay out `graph` and write it to `<name>.<format>`.
    pub fn render(&self, graph: &ChainGraph, name: &str, format: &str) -> Result<PathBuf> {
        let output = PathBuf::from(format!("{name}.{format}"));
        let dot = to_dot(graph);

        let mut child = Command::new(&self.dot_bin)
            .arg(format!("-T{format}"))
            .arg("-o")
            .arg(&output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to run {}", self.dot_bin))?;
        child
            .stdin
            .take()
            .context("dot stdin was not captured")?
            .write_all(dot.as_bytes())
            .context("Failed to send the graph to dot")?;
        let result = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for {}", self.dot_bin))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_owned();
            tracing::warn!(status = %result.status, stderr = %stderr, "dot failed");
            bail!("{} exited with {}: {stderr}", self.dot_bin, result.status);
        }
        tracing::info!(
            path = %output.display(),
            vertices = graph.colors.len(),
            edges = graph.edges.len(),
            "Rendered chain"
        );
        Ok(output)
    }

    /// Build, color and render `chain` in one go.
    pub fn save_chain<S: AsRef<str>>(&self, chain: &[S], name: &str, format: &str) -> Result<PathBuf> {
        let graph = build_edges_and_colors(chain, &self.table, &self.scheme);
        self.render(&graph, name, format)
    }
}

/// [`ChainRenderer::save_chain`] with the default configuration.
pub fn save_chain<S: AsRef<str>>(chain: &[S], name: &str, format: &str) -> Result<PathBuf> {
    ChainRenderer::default().save_chain(chain, name, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ChainGraph {
        build_edges_and_colors(
            &["log", "craft:planks:3", "planks"],
            &TranslationTable::default(),
            &ColorScheme::default(),
        )
    }

    #[test]
    fn test_dot_carries_labels_and_colors() {
        let dot = to_dot(&sample());
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains(r#"label="1\nlog""#));
        assert!(dot.contains(r#"label="2\ncraft:planks -> planks""#));
        assert!(dot.contains(r##"fillcolor="#ffe6cc""##));
        assert!(dot.contains(r##"fillcolor="#ccffe6""##));
        assert!(dot.contains("style=filled"));
        assert_eq!(dot.matches("color=black").count(), 2);
        assert!(dot.contains("0 -> 1"));
        assert!(dot.contains("1 -> 2"));
    }

    #[test]
    fn test_edge_labels_are_quoted() {
        let mut graph = sample();
        graph.edges[0] = graph.edges[0].clone().with_label("uses \"3\"");
        let dot = to_dot(&graph);
        assert!(dot.contains(r#"label="uses \"3\"""#));
    }

    #[test]
    fn test_missing_dot_binary() {
        let config = ChainConfig {
            dot_bin: "dredge-no-such-dot".into(),
            ..ChainConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let name = dir.path().join("chain");
        let err = ChainRenderer::from_config(&config)
            .save_chain(&["log", "planks"], &name.to_string_lossy(), "svg")
            .unwrap_err();
        assert!(err.to_string().contains("Failed to run dredge-no-such-dot"));
    }
}
