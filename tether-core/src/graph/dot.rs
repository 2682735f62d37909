use std::fmt::Write;

use super::{Node, Plan};

impl Plan {
    /// Graphviz rendering. Data edges are labelled with `output -> input`; ordering edges are
    /// dashed.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        out.push_str("digraph tether {\n");
        let _ = writeln!(out, "  label=\"plan: {}\";", escape(&self.name));
        out.push_str("  labelloc=t;\n");
        out.push_str("  rankdir=LR;\n");

        for node in &self.nodes {
            let shape = match node {
                Node::Resource(_) => "box",
                Node::Action(_) => "ellipse",
            };
            let _ = writeln!(out, "  \"{}\" [shape={shape}];", escape(node.name()));
        }

        for e in &self.edges {
            let _ = writeln!(
                out,
                "  \"{}\" -> \"{}\" [label=\"{} -> {}\"];",
                escape(&e.producer),
                escape(&e.consumer),
                escape(&e.output_key),
                escape(&e.input_key)
            );
        }
        for o in &self.orderings {
            let _ = writeln!(
                out,
                "  \"{}\" -> \"{}\" [style=dashed];",
                escape(&o.before),
                escape(&o.after)
            );
        }

        for level in &self.levels {
            if level.len() > 1 {
                out.push_str("  { rank=same; ");
                for s in level {
                    let _ = write!(out, "\"{}\"; ", escape(s));
                }
                out.push_str("}\n");
            }
        }

        out.push_str("}\n");
        out
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
