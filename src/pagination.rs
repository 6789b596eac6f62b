use serde::{Deserialize, Serialize};

const DEFAULT_LIMIT: i64 = 6;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Limit and offset clamped to sane bounds for SQL.
    pub fn bounds(&self) -> (i64, i64) {
        (self.limit.clamp(1, MAX_LIMIT), self.offset.max(0))
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub results: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_clamped() {
        let p = Pagination { limit: 0, offset: -5 };
        assert_eq!(p.bounds(), (1, 0));
        let p = Pagination { limit: 10_000, offset: 12 };
        assert_eq!(p.bounds(), (MAX_LIMIT, 12));
        assert_eq!(Pagination::default().bounds(), (DEFAULT_LIMIT, 0));
    }
}
