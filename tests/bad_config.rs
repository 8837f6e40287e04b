use heart_trail::errors::AppError;

use common::build_app;
mod common;

#[test_log::test]
fn misspelled_bool() {
    let result = build_app("tests/test_configs/misspelled_bool.toml");
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test_log::test]
fn missing_end_quote() {
    let result = build_app("tests/test_configs/missing_end_quote.toml");
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test_log::test]
fn zero_capacity() {
    let result = build_app("tests/test_configs/zero_capacity.toml");
    assert!(matches!(result, Err(AppError::HistoryCapacity)));
}

#[test_log::test]
fn missing_required_config() {
    let result = build_app("tests/test_configs/does_not_exist.toml");
    assert!(matches!(result, Err(AppError::Config(_))));
}
