//! `mu query MUQL_STRING [--json] [--csv]` (SPEC_FULL.md §6): tabular by
//! default.

use std::path::Path;

use mu_core::{execute_muql, parse_muql, OpenMode, QueryResult};

use crate::output::print_json;

pub fn run(muql: &str, path: Option<&Path>, json: bool, csv: bool) -> anyhow::Result<()> {
    let root = super::repo_root(path)?;
    let store = super::open_store(&root, OpenMode::ReadOnly)?;
    let graph = store.snapshot_graph()?;

    let query = parse_muql(muql)?;
    let result = execute_muql(&query, &graph)?;

    if json {
        print_json(&serde_json::to_value(&result)?);
        return Ok(());
    }

    match &result {
        QueryResult::Rows(rows) => {
            if rows.is_empty() {
                println!("(0 rows)");
                return Ok(());
            }
            let columns: Vec<&String> = rows[0].keys().collect();
            if csv {
                println!("{}", columns.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(","));
                for row in rows {
                    let cells: Vec<String> = columns.iter().map(|c| csv_cell(row.get(*c))).collect();
                    println!("{}", cells.join(","));
                }
            } else {
                println!("{}", columns.iter().map(|c| c.as_str()).collect::<Vec<_>>().join("  "));
                for row in rows {
                    let cells: Vec<String> = columns.iter().map(|c| plain_cell(row.get(*c))).collect();
                    println!("{}", cells.join("  "));
                }
                println!("({} rows)", rows.len());
            }
        }
        QueryResult::Nodes(nodes) => {
            for node in nodes {
                println!("{}", crate::output::node_line(node));
            }
            println!("({} nodes)", nodes.len());
        }
        QueryResult::Path(path_ids) => {
            if path_ids.is_empty() {
                println!("(no path found)");
            } else {
                println!("{}", path_ids.join(" -> "));
            }
        }
        QueryResult::Analysis(value) => print_json(value),
    }

    Ok(())
}

fn plain_cell(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "nil".to_string(),
    }
}

fn csv_cell(value: Option<&serde_json::Value>) -> String {
    let raw = plain_cell(value);
    if raw.contains(',') || raw.contains('"') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw
    }
}
