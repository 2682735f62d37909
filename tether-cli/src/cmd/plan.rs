use std::path::Path;

use tether_core::Plan;

use super::config::load_plan;
use crate::exit_codes;
use crate::output::{print_result, OutputFormat};
use crate::{ConfigArgs, OutputArgs};

pub fn plan_cmd(path: &Path, output: OutputArgs, config: ConfigArgs) -> i32 {
    let (_, plan) = match load_plan(path, &config, &output) {
        Ok(v) => v,
        Err(code) => return code,
    };

    if output.quiet {
        return exit_codes::SUCCESS;
    }
    match output.format {
        OutputFormat::Json => print_result(output.format, false, &plan.summary()),
        OutputFormat::Dot => println!("{}", plan.to_dot()),
        OutputFormat::Text => print_text(&plan),
    }
    exit_codes::SUCCESS
}

fn print_text(plan: &Plan) {
    println!("plan: {}", plan.name());
    println!("order: {}", plan.topological_order().join(" -> "));

    println!("\nexecution levels:");
    for (idx, level) in plan.levels().iter().enumerate() {
        println!("  Level {idx}: {}", level.join(", "));
    }

    println!("\nnodes:");
    for node in plan.summary().nodes {
        println!("- {} ({})", node.name, kind_label(node.kind));
        if !node.depends_on.is_empty() {
            println!("  depends on: {}", node.depends_on.join(", "));
        }
        if !node.outputs.is_empty() {
            println!("  outputs: {}", node.outputs.join(", "));
        }
    }

    if !plan.exports().is_empty() {
        println!("\nexports:");
        for (name, export) in plan.exports() {
            let reveal = if export.reveal { " (revealed)" } else { "" };
            println!("  {name} = {}.{}{reveal}", export.node, export.key);
        }
    }
}

fn kind_label(kind: tether_core::NodeKind) -> &'static str {
    match kind {
        tether_core::NodeKind::Resource => "resource",
        tether_core::NodeKind::Action => "action",
    }
}
