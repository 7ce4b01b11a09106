//! Graphviz export for debugging

use std::fmt::{self, Write};

use crate::render_graph::graph::FrameGraph;
use crate::render_graph::pass::PassId;

const KEPT_PASS_COLOR: &str = "orange";
const CULLED_PASS_COLOR: &str = "lightgray";
const IMPORTED_RESOURCE_COLOR: &str = "steelblue";
const TRANSIENT_RESOURCE_COLOR: &str = "skyblue";

impl FrameGraph<'_> {
    /// Write the graph in Graphviz DOT format.
    ///
    /// Passes are boxes, resource versions are ellipses. Culled passes are
    /// only known after [`compile`](Self::compile); before that every pass is
    /// drawn as kept.
    pub fn write_dot(&self, out: &mut impl Write) -> fmt::Result {
        writeln!(out, "digraph FrameGraph {{")?;
        writeln!(out, "  graph [style=invis, rankdir=\"TB\", ordering=out, splines=spline]")?;
        writeln!(out, "  node [shape=record, fontname=\"helvetica\", fontsize=10, margin=\"0.2,0.03\"]")?;
        writeln!(out)?;

        for (index, pass) in self.passes.iter().enumerate() {
            let culled = self
                .compiled
                .as_ref()
                .is_some_and(|compiled| compiled.is_culled(PassId::new(index)));
            let color = if culled { CULLED_PASS_COLOR } else { KEPT_PASS_COLOR };
            let style = if culled { "\"rounded,filled,dashed\"" } else { "\"rounded,filled\"" };
            let border = if pass.side_effect { ", penwidth=2.5" } else { "" };
            writeln!(
                out,
                "  P{} [label=<{{ {{<B>{}</B>}} | {}}}>, style={}, fillcolor={}{}]",
                index,
                escape(&pass.name),
                if pass.side_effect { "side effect" } else { "&nbsp;" },
                style,
                color,
                border
            )?;
        }
        writeln!(out)?;

        for (index, node) in self.nodes.iter().enumerate() {
            let entry = &self.entries[node.entry];
            let color = if entry.is_imported() {
                IMPORTED_RESOURCE_COLOR
            } else {
                TRANSIENT_RESOURCE_COLOR
            };
            writeln!(
                out,
                "  R{} [shape=ellipse, label=<{} <FONT POINT-SIZE=\"8\">v{}</FONT><BR/>{}>, style=filled, fillcolor={}]",
                index,
                escape(&entry.name),
                node.version,
                escape(&entry.desc.to_string()),
                color
            )?;
        }
        writeln!(out)?;

        for (index, pass) in self.passes.iter().enumerate() {
            for handle in pass.creates.iter().chain(&pass.writes) {
                writeln!(out, "  P{} -> R{} [color=orangered]", index, handle.index())?;
            }
            for handle in &pass.reads {
                writeln!(out, "  R{} -> P{} [color=olivedrab3]", handle.index(), index)?;
            }
        }

        writeln!(out, "}}")
    }

    /// The graph as a DOT string
    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        // Writing to a String never fails
        let _ = self.write_dot(&mut dot);
        dot
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
