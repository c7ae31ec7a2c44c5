//! Sort key resolution.

use std::fmt;

use bson::{Document, doc};
use mongodb::options::Collation;

use super::ListParams;

const DESCENDING: i32 = -1;
const COLLATION_LOCALE: &str = "en";

/// Direction for ordering results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Ascending,
    #[default]
    Descending,
}

impl Direction {
    /// `-1` is descending, every other integer ascending.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(|raw| raw.trim().parse::<i32>()) {
            None | Some(Ok(DESCENDING)) | Some(Err(_)) => Direction::Descending,
            Some(Ok(_)) => Direction::Ascending,
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            Direction::Ascending => 1,
            Direction::Descending => DESCENDING,
        }
    }
}

/// Sortable user fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    Name,
    Email,
}

impl SortField {
    /// `name` and `email` are honored; anything else sorts by `createdAt`.
    pub fn from_key(key: Option<&str>) -> Self {
        match key {
            Some("name") => SortField::Name,
            Some("email") => SortField::Email,
            Some("createdAt") | None => SortField::CreatedAt,
            Some(other) => {
                tracing::debug!(sort_key = other, "unknown sort key, using `createdAt`");
                SortField::CreatedAt
            },
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortField::CreatedAt => write!(f, "createdAt"),
            SortField::Name => write!(f, "name"),
            SortField::Email => write!(f, "email"),
        }
    }
}

/// Single-field sort, with `_id` breaking ties in the same direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: Direction,
}

impl SortSpec {
    pub fn from_params(params: &ListParams) -> Self {
        Self {
            field: SortField::from_key(params.sort_key()),
            direction: Direction::from_raw(params.sort()),
        }
    }

    pub fn to_document(&self) -> Document {
        let direction = self.direction.as_i32();
        let mut sort = Document::new();
        sort.insert(self.field.to_string(), direction);
        sort.insert("_id", direction);
        sort
    }

    /// `$sort` pipeline stage.
    pub fn to_stage(&self) -> Document {
        doc! { "$sort": self.to_document() }
    }
}

/// Linguistic string ordering applied by every listing query.
pub fn collation() -> Collation {
    Collation::builder()
        .locale(COLLATION_LOCALE.to_string())
        .build()
}
