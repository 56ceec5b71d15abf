//! Pruning tables against a reference identifier set.

use std::collections::HashMap;

use crate::core::table::{IdSet, Result, Table};

/// Rename columns, then keep only the rows whose identifier is in `reference`.
///
/// # Arguments
///
/// * `table` - Table to prune; consumed and returned pruned
/// * `reference` - Identifiers a row must carry to be kept
/// * `renames` - Column name substitutions applied before lookup
/// * `id_column` - Canonical identifier column name (after renaming)
///
/// # Returns
///
/// The pruned table (with renamed headers) and the identifiers of the rows
/// that were kept, i.e. `table ids ∩ reference`.
///
/// # Errors
///
/// Returns a schema error if `id_column` is absent after renaming.
pub fn prune_and_collect(
    mut table: Table,
    reference: &IdSet,
    renames: &HashMap<String, String>,
    id_column: &str,
) -> Result<(Table, IdSet)> {
    table.rename_columns(renames);
    let id_idx = table.require_column(id_column)?;

    let mask: Vec<bool> = table
        .rows
        .iter()
        .map(|row| reference.contains(row.get(id_idx).unwrap_or("")))
        .collect();

    let pruned = table.select(&mask);
    let kept_ids = pruned.identifiers(id_idx);

    Ok((pruned, kept_ids))
}
