// tests/reload_properties.rs

mod common;
use crate::common::builders::ModuleTableBuilder;
use crate::common::recording::{Journal, RecordingFactory};

use std::collections::BTreeSet;

use proptest::prelude::*;

use modhost::config::{EngineConfig, ModuleTable};
use modhost::session::Registry;
use modhost::types::LifecycleState;

// Strategy for a module table: unique ids in random order, each either inert
// or with a handful of source units.
fn table_strategy(max_modules: usize) -> impl Strategy<Value = ModuleTable> {
    proptest::collection::btree_set("[a-z][a-z0-9_]{0,6}", 1..=max_modules)
        .prop_flat_map(|ids: BTreeSet<String>| {
            let ids: Vec<String> = ids.into_iter().collect();
            let len = ids.len();
            (
                Just(ids).prop_shuffle(),
                proptest::collection::vec(0usize..4, len),
            )
        })
        .prop_map(|(ids, unit_counts)| {
            let mut builder = ModuleTableBuilder::new();
            for (id, count) in ids.iter().zip(unit_counts) {
                if count == 0 {
                    builder = builder.inert(id);
                } else {
                    let units: Vec<String> = (0..count).map(|i| format!("{id}_{i}.src")).collect();
                    let units: Vec<&str> = units.iter().map(String::as_str).collect();
                    builder = builder.module(id, &units);
                }
            }
            builder.build()
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn registry_mirrors_table_after_reload(table in table_strategy(8)) {
        let journal = Journal::new();
        let factory = RecordingFactory::new(journal.clone());
        let mut registry = Registry::new();

        registry.reload_all(&table, &factory, &EngineConfig::default());
        prop_assert_eq!(registry.ids(), table.ids());

        for entry in table.iter() {
            let expected = if entry.sources.is_empty() {
                LifecycleState::Created
            } else {
                LifecycleState::Running
            };
            prop_assert_eq!(registry.get(&entry.id).map(|s| s.state()), Some(expected));
            prop_assert_eq!(journal.touched_hooks_of(&entry.id), !entry.sources.is_empty());
        }

        let first = registry.states();
        registry.reload_all(&table, &factory, &EngineConfig::default());
        prop_assert_eq!(registry.states(), first);
    }
}
