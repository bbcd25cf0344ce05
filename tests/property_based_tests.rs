mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::strategies::*;
use connection_pool::dispatch::IdAllocator;
use connection_pool::{format_command, DispatchError, Literal, RequestId};
use proptest::prelude::*;

proptest! {
    /// Property: Templates without placeholders pass through untouched
    #[test]
    fn brace_free_templates_are_unchanged(text in plain_text_strategy(), n in any::<i64>()) {
        prop_assert_eq!(format_command(&text, &[]).unwrap(), text.clone());

        let with_arg = format!("{text} {{}}");
        prop_assert_eq!(format_command(&with_arg, &[&n]).unwrap(), format!("{text} {n}"));
    }

    /// Property: Positional and indexed placeholders agree
    #[test]
    fn indexed_and_positional_placeholders_agree(
        table in table_name_strategy(),
        id in any::<u32>(),
        limit in 1u16..1000,
    ) {
        let positional = format_command("select * from {} where id = {} limit {}", &[&table, &id, &limit]).unwrap();
        let indexed = format_command("select * from {0} where id = {1} limit {2}", &[&table, &id, &limit]).unwrap();
        prop_assert_eq!(positional, indexed);
    }

    /// Property: Literal output is a single well-formed SQL string literal
    #[test]
    fn literals_are_quoted_and_escaped(value in literal_value_strategy()) {
        let rendered = Literal(&value).to_string();

        prop_assert!(rendered.starts_with('\'') && rendered.ends_with('\''));
        let inner = &rendered[1..rendered.len() - 1];
        prop_assert_eq!(inner.replace("''", "'"), value.clone());
        // Every quote inside the literal is doubled
        prop_assert_eq!(inner.matches('\'').count(), value.matches('\'').count() * 2);
    }

    /// Property: Supplying more arguments than placeholders is rejected
    #[test]
    fn surplus_arguments_are_rejected(extra in 1usize..4) {
        let values: Vec<usize> = (0..=extra).collect();
        let args: Vec<&dyn std::fmt::Display> = values.iter().map(|v| v as &dyn std::fmt::Display).collect();
        let is_format_error = matches!(
            format_command("select {}", &args),
            Err(DispatchError::Format { .. })
        );
        prop_assert!(is_format_error);
    }

    /// Property: Allocated ids are tracked, unique and strictly increasing
    #[test]
    fn allocated_ids_strictly_increase(count in 1usize..500) {
        let allocator = IdAllocator::new();
        let ids: Vec<RequestId> = (0..count).map(|_| allocator.allocate()).collect();

        prop_assert_eq!(ids[0], RequestId::from(1));
        prop_assert!(ids.iter().all(|id| id.is_tracked()));
        prop_assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        prop_assert_eq!(allocator.last_issued(), ids.last().copied());
    }

    /// Property: Concurrent allocation never hands out the same id twice
    #[test]
    fn concurrent_allocation_is_unique(threads in worker_count_strategy(), per_thread in 1usize..200) {
        let allocator = Arc::new(IdAllocator::new());
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let allocator = allocator.clone();
                std::thread::spawn(move || {
                    (0..per_thread).map(|_| allocator.allocate()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                prop_assert!(seen.insert(id), "id {} issued twice", id);
            }
        }
        prop_assert_eq!(seen.len(), threads * per_thread);
    }
}
