//! Deterministic join-alias naming, shared by the SQL builder and the row
//! reconstructor. Both sides must derive identical names or demultiplexing
//! joined rows silently breaks, so this is the only place the scheme lives.

/// Alias for the root table of a statement: the table's own name.
pub fn root(table_name: &str) -> &str {
    table_name
}

/// Alias for the table joined through `relation_column` under
/// `parent_alias`. Path-based, so sibling relations and arbitrarily deep
/// chains never collide.
pub fn child(parent_alias: &str, relation_column: &str) -> String {
    format!("{}__{}", parent_alias, relation_column)
}

/// Select-list label `alias.column`. Table and column identifiers never
/// contain a dot, so the label splits back unambiguously.
pub fn label(alias: &str, column: &str) -> String {
    format!("{}.{}", alias, column)
}

/// Split a select-list label back into (alias, column).
pub fn split_label(label: &str) -> Option<(&str, &str)> {
    label.split_once('.')
}
