#![allow(dead_code)]

pub use installd_test_utils::*;
