// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use celledit_app::{OptionEntry, QuerySpec};
use std::collections::HashMap;
use tracing::debug;

use crate::OptionQuery;

/// Page-lifetime memo of option queries, keyed by exact query text.
#[derive(Debug, Clone, Default)]
pub struct QueryCache {
    entries: HashMap<String, Vec<OptionEntry>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_fetch(
        &mut self,
        spec: &QuerySpec,
        source: &dyn OptionQuery,
    ) -> Result<Vec<OptionEntry>> {
        let key = spec.cache_key();
        if let Some(hit) = self.entries.get(&key) {
            return Ok(hit.clone());
        }

        let fetched = source
            .query(spec)
            .with_context(|| format!("load options for column {:?}", spec.key))?;
        debug!(column = %spec.key, count = fetched.len(), "cached option query");
        self.entries.insert(key, fetched.clone());
        Ok(fetched)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::QueryCache;
    use crate::OptionQuery;
    use anyhow::{Result, bail};
    use celledit_app::{OptionEntry, QuerySpec};
    use std::cell::Cell;

    struct Counting {
        calls: Cell<usize>,
        fail: bool,
    }

    impl OptionQuery for Counting {
        fn query(&self, _spec: &QuerySpec) -> Result<Vec<OptionEntry>> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                bail!("connection refused");
            }
            Ok(vec![OptionEntry::new("1", "Avery")])
        }
    }

    #[test]
    fn identical_queries_fetch_once() -> Result<()> {
        let source = Counting {
            calls: Cell::new(0),
            fail: false,
        };
        let mut cache = QueryCache::new();
        let spec = QuerySpec::new("owner_id", "SELECT id, name FROM owners");

        cache.get_or_fetch(&spec, &source)?;
        let again = cache.get_or_fetch(
            &QuerySpec::new("reviewer_id", "SELECT id, name FROM owners"),
            &source,
        )?;
        assert_eq!(again, vec![OptionEntry::new("1", "Avery")]);
        assert_eq!(source.calls.get(), 1);
        assert_eq!(cache.len(), 1);
        Ok(())
    }

    #[test]
    fn failures_are_not_cached() {
        let source = Counting {
            calls: Cell::new(0),
            fail: true,
        };
        let mut cache = QueryCache::new();
        let spec = QuerySpec::new("owner_id", "SELECT id, name FROM owners");

        let error = cache
            .get_or_fetch(&spec, &source)
            .expect_err("query should fail");
        assert!(format!("{error:#}").contains("owner_id"));
        assert!(cache.get_or_fetch(&spec, &source).is_err());
        assert_eq!(source.calls.get(), 2);
        assert!(cache.is_empty());
    }
}
