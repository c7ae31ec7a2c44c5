//! Listing query construction: filter, sort and page.
mod filter;
mod page;
mod sort;

pub use filter::*;
pub use page::*;
pub use sort::*;

use serde::{Deserialize, Serialize};

/// Raw query string of the listing routes.
///
/// Every value stays a string until resolved. Empty values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub limit: Option<String>,
    pub page: Option<String>,
    pub sort: Option<String>,
    pub sort_key: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub created_ago: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub search_key: Option<String>,
    pub blocked: Option<String>,
    pub email_verified: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

impl ListParams {
    pub fn limit(&self) -> Option<&str> {
        present(&self.limit)
    }

    pub fn page(&self) -> Option<&str> {
        present(&self.page)
    }

    pub fn sort(&self) -> Option<&str> {
        present(&self.sort)
    }

    pub fn sort_key(&self) -> Option<&str> {
        present(&self.sort_key)
    }

    pub fn from_date(&self) -> Option<&str> {
        present(&self.from_date)
    }

    pub fn to_date(&self) -> Option<&str> {
        present(&self.to_date)
    }

    pub fn created_ago(&self) -> Option<&str> {
        present(&self.created_ago)
    }

    pub fn status(&self) -> Option<&str> {
        present(&self.status)
    }

    pub fn search(&self) -> Option<&str> {
        present(&self.search)
    }

    pub fn search_key(&self) -> Option<&str> {
        present(&self.search_key)
    }

    pub fn blocked(&self) -> Option<&str> {
        present(&self.blocked)
    }

    pub fn email_verified(&self) -> Option<&str> {
        present(&self.email_verified)
    }
}

/// Resolved listing request shared by every paginating strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filter: UserFilter,
    pub sort: SortSpec,
    pub page: PageRequest,
}

impl From<&ListParams> for ListQuery {
    fn from(params: &ListParams) -> Self {
        Self {
            filter: UserFilter::from_params(params),
            sort: SortSpec::from_params(params),
            page: PageRequest::from_params(params),
        }
    }
}
