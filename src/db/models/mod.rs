use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod balance;
pub mod claim;
pub mod prize;

#[inline]
const fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub total_items: i64,
    pub total_pages: i64,
    #[serde(default = "default_limit")]
    pub page_size: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total_items: i64, page_size: i64, page: i64) -> Self {
        let total_pages = (total_items as f64 / page_size as f64).ceil() as i64;
        Self {
            items,
            page,
            page_size,
            total_items,
            total_pages,
        }
    }
}

/// Field-level validation failure, rejected before any state change.
#[derive(Debug, Clone, Serialize, Error)]
#[error("invalid field '{field}': {reason}")]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        let page = PaginatedResponse::new(vec![1, 2, 3], 7, 3, 1);
        assert_eq!(page.total_pages, 3);

        let exact = PaginatedResponse::new(vec![1, 2, 3], 6, 3, 1);
        assert_eq!(exact.total_pages, 2);

        let empty = PaginatedResponse::<i64>::new(Vec::new(), 0, 3, 1);
        assert_eq!(empty.total_pages, 0);
    }
}
