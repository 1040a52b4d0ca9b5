//! Pagination and sorting for list endpoints.

use serde::Serialize;

use crate::data::validator::{self, Validator};

/// Sort keys accepted by the resource listing.
pub const RESOURCE_SORT_SAFELIST: &[&str] = &[
    "id", "title", "year", "runtime", "-id", "-title", "-year", "-runtime",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub page: u64,
    pub page_size: u64,
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            sort: "id".to_string(),
            sort_safelist: RESOURCE_SORT_SAFELIST,
        }
    }
}

impl Filters {
    pub fn validate(&self, v: &mut Validator) {
        v.check(self.page > 0, "page", "must be greater than zero");
        v.check(self.page <= 10_000_000, "page", "must be a maximum of 10 million");
        v.check(self.page_size > 0, "page_size", "must be greater than zero");
        v.check(self.page_size <= 100, "page_size", "must be a maximum of 100");
        v.check(
            validator::permitted_value(&self.sort.as_str(), self.sort_safelist),
            "sort",
            "invalid sort value",
        );
    }

    /// The column to sort by, without the direction prefix.
    ///
    /// Only meaningful after [`Filters::validate`] passed.
    pub fn sort_column(&self) -> &str {
        self.sort.trim_start_matches('-')
    }

    pub fn sort_descending(&self) -> bool {
        self.sort.starts_with('-')
    }

    pub fn limit(&self) -> usize {
        self.page_size as usize
    }

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) * self.page_size) as usize
    }
}

/// Pagination details returned next to a page of results.
///
/// All fields are omitted when the result set is empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: u64,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl Metadata {
    pub fn calculate(total_records: u64, page: u64, page_size: u64) -> Self {
        if total_records == 0 {
            return Self::default();
        }
        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: total_records.div_ceil(page_size),
            total_records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_direction() {
        let f = Filters {
            sort: "-year".into(),
            ..Filters::default()
        };
        assert_eq!(f.sort_column(), "year");
        assert!(f.sort_descending());
    }

    #[test]
    fn test_validation() {
        let f = Filters {
            page: 0,
            page_size: 101,
            sort: "rating".into(),
            ..Filters::default()
        };
        let mut v = Validator::new();
        f.validate(&mut v);
        assert_eq!(v.errors().len(), 3);
        assert_eq!(v.errors()["sort"], "invalid sort value");
    }

    #[test]
    fn test_offset() {
        let f = Filters {
            page: 3,
            page_size: 10,
            ..Filters::default()
        };
        assert_eq!(f.offset(), 20);
        assert_eq!(f.limit(), 10);
    }

    #[test]
    fn test_metadata() {
        let m = Metadata::calculate(21, 2, 10);
        assert_eq!(m.last_page, 3);
        assert_eq!(m.first_page, 1);

        let empty = Metadata::calculate(0, 1, 20);
        assert_eq!(serde_json::to_string(&empty).unwrap(), "{}");
    }
}
