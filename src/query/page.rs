//! Page request and page envelope.

use bson::{Document, doc};
use serde::{Deserialize, Serialize};

use super::{ListParams, SortSpec};

pub const DEFAULT_LIMIT: u64 = 10;
pub const DEFAULT_PAGE: u64 = 1;
/// Largest skip the server accepts, a signed 64-bit integer.
const MAX_SKIP: u64 = i64::MAX as u64;

/// 1-indexed page of `limit` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u64,
    pub page: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            page: DEFAULT_PAGE,
        }
    }
}

impl PageRequest {
    /// Parse `limit` and `page`. Unparsable values use the defaults, values
    /// below one are raised to one.
    pub fn from_params(params: &ListParams) -> Self {
        Self {
            limit: parse_positive(params.limit(), DEFAULT_LIMIT),
            page: parse_positive(params.page(), DEFAULT_PAGE),
        }
    }

    /// Records to skip before this page, capped at [`MAX_SKIP`].
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit).min(MAX_SKIP)
    }

    /// `ceil(total / limit)`.
    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }

    /// `$skip` and `$limit` pipeline stages.
    pub fn to_stages(&self) -> [Document; 2] {
        [
            doc! { "$skip": bson_int(self.skip()) },
            doc! { "$limit": bson_int(self.limit) },
        ]
    }
}

fn parse_positive(raw: Option<&str>, default: u64) -> u64 {
    match raw.map(|raw| raw.trim().parse::<i64>()) {
        Some(Ok(value)) => value.max(1).unsigned_abs(),
        Some(Err(_)) => {
            tracing::debug!(raw, default, "unparsable page value, using default");
            default
        },
        None => default,
    }
}

fn bson_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Page envelope returned by every paginating route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_count: u64,
    pub total_pages: u64,
    pub limit: u64,
    pub page: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total_count: u64, request: PageRequest) -> Self {
        Self {
            data,
            total_count,
            total_pages: request.total_pages(total_count),
            limit: request.limit,
            page: request.page,
        }
    }

    /// Convert every record of the page.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total_count: self.total_count,
            total_pages: self.total_pages,
            limit: self.limit,
            page: self.page,
        }
    }
}

/// Output document of [`facet_stages`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetPage<T> {
    pub data: Vec<T>,
    pub total_count: u64,
    pub total_pages: f64,
}

impl<T> FacetPage<T> {
    pub fn into_page(self, request: PageRequest) -> Page<T> {
        Page {
            data: self.data,
            total_count: self.total_count,
            total_pages: self.total_pages as u64,
            limit: request.limit,
            page: request.page,
        }
    }
}

/// Sort, then count and slice in a single `$facet` pass.
///
/// Always yields exactly one document, with a zero count when nothing
/// matched.
pub fn facet_stages(sort: &SortSpec, request: PageRequest) -> Vec<Document> {
    let [skip, limit] = request.to_stages();
    let per_page = bson_int(request.limit);

    vec![
        sort.to_stage(),
        doc! {
            "$facet": {
                "totalCount": [{ "$count": "totalCount" }],
                "data": [skip, limit],
            }
        },
        doc! {
            "$project": {
                "data": 1,
                "totalCount": {
                    "$ifNull": [{ "$arrayElemAt": ["$totalCount.totalCount", 0] }, 0]
                },
            }
        },
        doc! {
            "$addFields": {
                "totalPages": {
                    "$ceil": { "$divide": ["$totalCount", per_page] }
                },
            }
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(limit: Option<&str>, page: Option<&str>) -> PageRequest {
        PageRequest::from_params(&ListParams {
            limit: limit.map(Into::into),
            page: page.map(Into::into),
            ..Default::default()
        })
    }

    #[test]
    fn test_defaults() {
        assert_eq!(request(None, None), PageRequest { limit: 10, page: 1 });
        assert_eq!(request(Some(""), Some("abc")), PageRequest { limit: 10, page: 1 });
    }

    #[test]
    fn test_values_below_one_are_clamped() {
        assert_eq!(request(Some("0"), Some("-3")), PageRequest { limit: 1, page: 1 });
    }

    #[test]
    fn test_third_page_of_twenty_five() {
        let request = request(Some("10"), Some("3"));
        assert_eq!(request.skip(), 20);

        let page = Page::new(vec![0; 5], 25, request);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.limit, 10);
        assert_eq!(page.page, 3);
    }

    #[test]
    fn test_huge_skip_is_capped() {
        let request = request(Some("9223372036854775807"), Some("3"));
        assert_eq!(request.skip(), MAX_SKIP);
        assert!(i64::try_from(request.skip()).is_ok());
        assert_eq!(request.to_stages()[0], doc! { "$skip": i64::MAX });
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let request = PageRequest { limit: 10, page: 1 };
        assert_eq!(request.total_pages(0), 0);
        assert_eq!(request.total_pages(10), 1);
        assert_eq!(request.total_pages(11), 2);
    }

    #[test]
    fn test_envelope_is_camel_case() {
        let page = Page::new(vec!["a"], 1, PageRequest::default());
        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            serde_json::json!({
                "data": ["a"],
                "totalCount": 1,
                "totalPages": 1,
                "limit": 10,
                "page": 1,
            })
        );
    }

    #[test]
    fn test_facet_stages() {
        let stages = facet_stages(&SortSpec::default(), PageRequest { limit: 5, page: 2 });
        assert_eq!(stages.len(), 4);
        assert_eq!(stages[0], doc! { "$sort": { "createdAt": -1, "_id": -1 } });
        assert_eq!(
            stages[1],
            doc! {
                "$facet": {
                    "totalCount": [{ "$count": "totalCount" }],
                    "data": [{ "$skip": 5_i64 }, { "$limit": 5_i64 }],
                }
            }
        );
    }

    #[test]
    fn test_facet_page_from_document() {
        let facet: FacetPage<String> = bson::from_document(doc! {
            "data": ["a", "b"],
            "totalCount": 12,
            "totalPages": 6.0,
        })
        .unwrap();

        let page = facet.into_page(PageRequest { limit: 2, page: 1 });
        assert_eq!(page.total_count, 12);
        assert_eq!(page.total_pages, 6);
        assert_eq!(page.data, vec!["a", "b"]);
    }
}
