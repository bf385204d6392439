//! Key table reload (§3 "Key table"/"Key binding" rows; SPEC_FULL.md §C).
//!
//! A fifth entity family the normal sessions/windows/panes/clients refresh
//! precedence doesn't cover: key tables are reloaded on demand, one table
//! at a time, whenever a caller asks for one. Grounded in the teacher's
//! `executor.rs::get_prefix_bindings` (`list-keys -T <table>`, `bind-key`
//! line parsing), generalized from the hard-coded `prefix` table to any
//! table name and extended to capture the repeat flag and a binding's
//! destination table (a `switch-client -T <table>` command).

use crate::model::{KeyBinding, KeyTable, Model};

use super::Runtime;

fn parse_bind_line(line: &str) -> Option<KeyBinding> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.first() != Some(&"bind-key") {
        return None;
    }
    let t_idx = parts.iter().position(|&p| p == "-T")?;
    let repeatable = parts[1..t_idx].iter().any(|&p| p == "-r");
    let key_code = parts.get(t_idx + 2)?.to_string();
    let command = parts.get(t_idx + 3..)?.join(" ");
    let dest_table = command
        .strip_prefix("switch-client -T ")
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or("")
        .to_string();
    Some(KeyBinding {
        key_code,
        command,
        repeatable,
        dest_table,
    })
}

/// Replaces `table`'s bindings in the model with what `list-keys -T <table>`
/// reports right now.
pub async fn keys_reload(model: &mut Model, rt: &mut impl Runtime, table: &str) -> crate::error::Result<()> {
    let lines = rt.list(&["list-keys".into(), "-T".into(), table.into()]).await?;

    let mut kt = KeyTable::new(table);
    for line in &lines {
        if let Some(binding) = parse_bind_line(line) {
            kt.bindings.insert(binding.key_code.clone(), binding);
        }
    }
    model.key_tables.insert(table.to_string(), kt);
    Ok(())
}
