#![allow(dead_code)]

pub use modhost_test_utils::builders;
pub use modhost_test_utils::recording;
pub use modhost_test_utils::{init_tracing, wait_for};
