use super::Criteria;
use crate::error::MShopError;
use std::str::FromStr;

/// Largest slice size; doubles as the "no limit" value.
pub const UNBOUNDED: u64 = 0x7fff_ffff;
/// Slice size used when none is configured.
pub const DEFAULT_SLICE: u64 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = MShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" | "asc" | "ASC" => Ok(Direction::Asc),
            "-" | "desc" | "DESC" => Ok(Direction::Desc),
            _ => Err(MShopError::MalformedCriteria(format!("unknown sort direction: {}", s))),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sort {
    pub code: String,
    pub direction: Direction,
}

/// Criteria plus ordering and the requested slice of the result set.
#[derive(Clone, Debug, PartialEq)]
pub struct Search {
    criteria: Option<Criteria>,
    sort: Vec<Sort>,
    offset: u64,
    limit: u64,
    need_total: bool,
}

impl Default for Search {
    fn default() -> Self {
        Search::new()
    }
}

impl Search {
    pub fn new() -> Self {
        Search {
            criteria: None,
            sort: Vec::new(),
            offset: 0,
            limit: DEFAULT_SLICE,
            need_total: false,
        }
    }

    pub fn with_criteria(mut self, criteria: Criteria) -> Self {
        self.criteria = Some(criteria);
        self
    }

    pub fn sort(mut self, direction: Direction, code: impl Into<String>) -> Self {
        self.sort.push(Sort {
            code: code.into(),
            direction,
        });
        self
    }

    /// Limit is clamped to `1..=UNBOUNDED`, offset to what a signed 64 bit bind value holds.
    pub fn slice(mut self, offset: u64, limit: u64) -> Self {
        self.offset = offset.min(i64::MAX as u64);
        self.limit = limit.clamp(1, UNBOUNDED);
        self
    }

    pub fn with_total(mut self) -> Self {
        self.need_total = true;
        self
    }

    pub fn criteria(&self) -> Option<&Criteria> {
        self.criteria.as_ref()
    }

    pub fn sorting(&self) -> &[Sort] {
        &self.sort
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn need_total(&self) -> bool {
        self.need_total
    }

    /// Same ordering and slice with the criteria replaced.
    pub(crate) fn replace_criteria(&self, criteria: Criteria) -> Search {
        Search {
            criteria: Some(criteria),
            ..self.clone()
        }
    }
}
