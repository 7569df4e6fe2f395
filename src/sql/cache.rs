//! Process-wide cache for generated SQL strings, keyed by table and
//! statement kind. Caches text only, never data.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatementKind {
    CreateTable,
    SelectSingle,
    SelectAll,
    Insert,
    Update,
    Delete,
    Exists,
    ChildSelect,
}

#[derive(Default)]
pub struct StatementCache {
    inner: RwLock<HashMap<(String, StatementKind), Arc<str>>>,
}

impl StatementCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached statement for (key, kind), building it on first
    /// use. For child selects the key carries the relation name
    /// (`table#relation`); every other kind keys on the table name alone.
    pub fn get_or_build(
        &self,
        key: &str,
        kind: StatementKind,
        build: impl FnOnce() -> String,
    ) -> Arc<str> {
        if let Some(sql) = self
            .inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(key.to_string(), kind))
        {
            return sql.clone();
        }
        let sql: Arc<str> = Arc::from(build());
        self.inner
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry((key.to_string(), kind))
            .or_insert_with(|| sql.clone())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_once_per_key_and_kind() {
        let cache = StatementCache::new();
        let mut builds = 0;
        for _ in 0..3 {
            let sql = cache.get_or_build("user", StatementKind::Insert, || {
                builds += 1;
                "INSERT ...".into()
            });
            assert_eq!(&*sql, "INSERT ...");
        }
        assert_eq!(builds, 1);
    }

    #[test]
    fn kinds_do_not_collide() {
        let cache = StatementCache::new();
        cache.get_or_build("user", StatementKind::Insert, || "a".into());
        let sql = cache.get_or_build("user", StatementKind::Update, || "b".into());
        assert_eq!(&*sql, "b");
    }
}
