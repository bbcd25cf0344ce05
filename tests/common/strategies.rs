use proptest::prelude::*;

/// Strategy for generating table names
pub fn table_name_strategy() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,30}"
}

/// Strategy for generating template text that contains no braces
pub fn plain_text_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 =,*'_.]{0,40}"
}

/// Strategy for generating arbitrary string values, quotes included
pub fn literal_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ']{0,32}"
}

/// Strategy for generating small worker counts
pub fn worker_count_strategy() -> impl Strategy<Value = usize> {
    1usize..=8
}
