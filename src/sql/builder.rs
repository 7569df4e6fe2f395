//! Builds parameterized CREATE/SELECT/INSERT/UPDATE/DELETE statements from
//! table descriptors. Pure string production: no I/O, deterministic output,
//! positional `?` parameters that callers bind in descriptor order.

use crate::schema::{ColumnDescriptor, OneToManyDescriptor, TableDescriptor};
use crate::sql::alias;

/// Quote identifier for MySQL (safe: only from descriptors).
fn quoted(s: &str) -> String {
    format!("`{}`", s.replace('`', "``"))
}

fn column_clause(c: &ColumnDescriptor) -> String {
    let mut clause = format!("{} {}", quoted(&c.name), c.ty.sql_name());
    if !c.flags.nullable {
        clause.push_str(" NOT NULL");
    }
    if c.flags.auto_increment {
        clause.push_str(" AUTO_INCREMENT");
    }
    clause
}

/// CREATE TABLE IF NOT EXISTS: one clause per non-ignored column, then
/// constraints in descriptor order — UNIQUE, PRIMARY KEY, and a FOREIGN KEY
/// per DIRECT relation. Idempotent against an existing table.
pub fn create_table(table: &TableDescriptor, ignore: &[&str]) -> String {
    let kept = || {
        table
            .columns()
            .iter()
            .filter(|c| !ignore.contains(&c.name.as_str()))
    };
    let mut items: Vec<String> = kept().map(column_clause).collect();
    for c in kept() {
        if c.flags.unique {
            items.push(format!("UNIQUE ({})", quoted(&c.name)));
        } else if c.is_primary_key() {
            items.push(format!("PRIMARY KEY ({})", quoted(&c.name)));
        } else if let Some(ref_table) = c.direct_ref() {
            items.push(format!(
                "FOREIGN KEY ({}) REFERENCES {}({})",
                quoted(&c.name),
                quoted(ref_table.name()),
                quoted(ref_table.pk_name())
            ));
        }
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({}) ENGINE = InnoDB",
        quoted(table.name()),
        items.join(", ")
    )
}

/// Select-list entries for `table` under `alias`, recursing into DIRECT
/// relations. Every column is labelled `alias.column` so the raw row can be
/// demultiplexed per alias group.
fn select_columns(table: &TableDescriptor, alias_name: &str, out: &mut Vec<String>) {
    for c in table.columns() {
        out.push(format!(
            "{}.{} AS {}",
            quoted(alias_name),
            quoted(&c.name),
            quoted(&alias::label(alias_name, &c.name))
        ));
    }
    for (c, ref_table) in table.direct_relations() {
        select_columns(ref_table, &alias::child(alias_name, &c.name), out);
    }
}

/// LEFT JOIN clauses for every DIRECT relation of `table`, transitively.
fn join_clauses(table: &TableDescriptor, alias_name: &str, out: &mut Vec<String>) {
    for (c, ref_table) in table.direct_relations() {
        let child = alias::child(alias_name, &c.name);
        out.push(format!(
            "LEFT JOIN {} AS {} ON {}.{} = {}.{}",
            quoted(ref_table.name()),
            quoted(&child),
            quoted(alias_name),
            quoted(&c.name),
            quoted(&child),
            quoted(ref_table.pk_name())
        ));
        join_clauses(ref_table, &child, out);
    }
}

/// SELECT over `table` with its full DIRECT relation tree joined in. A table
/// with no DIRECT relations produces a JOIN-free statement.
pub fn select_all(table: &TableDescriptor) -> String {
    let root = alias::root(table.name());
    let mut columns = Vec::new();
    select_columns(table, root, &mut columns);
    let mut joins = Vec::new();
    join_clauses(table, root, &mut joins);
    let mut sql = format!(
        "SELECT {} FROM {}",
        columns.join(", "),
        quoted(table.name())
    );
    for j in &joins {
        sql.push(' ');
        sql.push_str(j);
    }
    sql
}

/// `select_all` narrowed to one primary key; caller binds the id.
pub fn select_single(table: &TableDescriptor) -> String {
    format!(
        "{} WHERE {}.{} = ?",
        select_all(table),
        quoted(alias::root(table.name())),
        quoted(table.pk_name())
    )
}

/// `select_all` over the child table, filtered by the foreign key pointing
/// back at the owner; caller binds the owner's primary key.
pub fn child_select(relation: &OneToManyDescriptor) -> String {
    format!(
        "{} WHERE {}.{} = ?",
        select_all(&relation.ref_table),
        quoted(alias::root(relation.ref_table.name())),
        quoted(&relation.ref_column)
    )
}

/// INSERT with one placeholder per column, descriptor order. One-to-many
/// relations have no column and never appear.
pub fn insert(table: &TableDescriptor) -> String {
    let names: Vec<String> = table.columns().iter().map(|c| quoted(&c.name)).collect();
    let placeholders = vec!["?"; names.len()];
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quoted(table.name()),
        names.join(", "),
        placeholders.join(", ")
    )
}

/// UPDATE of every column except the primary key and the permission
/// reference; caller binds values in the same exclusion order, then the
/// primary key last.
pub fn update(table: &TableDescriptor) -> String {
    let sets: Vec<String> = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != table.pk_index() && Some(*i) != table.permission_index())
        .map(|(_, c)| format!("{} = ?", quoted(&c.name)))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quoted(table.name()),
        sets.join(", "),
        quoted(table.pk_name())
    )
}

/// DELETE by primary key.
pub fn delete(table: &TableDescriptor) -> String {
    format!(
        "DELETE FROM {} WHERE {} = ?",
        quoted(table.name()),
        quoted(table.pk_name())
    )
}

/// Existence check by primary key; the single result column is `x`.
pub fn exists(table: &TableDescriptor) -> String {
    format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = ?) AS `x`",
        quoted(table.name()),
        quoted(table.pk_name())
    )
}
