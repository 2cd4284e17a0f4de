//! Shared terminal formatting helpers. JSON output is produced directly
//! with `serde_json::to_string_pretty` at each call site — there's no
//! intermediate shape to share the way the terminal renderers benefit from
//! one.

use colored::Colorize;
use mu_core::{Node, NodeKind, WarningLevel};

pub fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()));
}

pub fn node_kind_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Module => "module",
        NodeKind::Class => "class",
        NodeKind::Function => "function",
        NodeKind::Method => "method",
        NodeKind::External => "external",
    }
}

/// One-line summary of a node: `kind name  file:line`.
pub fn node_line(node: &Node) -> String {
    format!(
        "{:<9} {}  {}",
        node_kind_label(node.kind).dimmed(),
        node.qualified_name.bold(),
        format!("{}:{}", node.file_path, node.line_start).dimmed(),
    )
}

pub fn warning_icon(level: WarningLevel) -> &'static str {
    match level {
        WarningLevel::Error => "✗",
        WarningLevel::Warn => "⚠",
        WarningLevel::Info => "ℹ",
    }
}

pub fn colored_warning_icon(level: WarningLevel) -> colored::ColoredString {
    match level {
        WarningLevel::Error => warning_icon(level).red(),
        WarningLevel::Warn => warning_icon(level).yellow(),
        WarningLevel::Info => warning_icon(level).dimmed(),
    }
}
