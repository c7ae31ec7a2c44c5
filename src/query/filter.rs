//! Translate raw listing parameters into a MongoDB filter document.

use bson::{Bson, Document, doc};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};

use super::ListParams;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_SEARCH_KEY: &str = "email";
const TRUE_FLAG: &str = "1";

/// Status alias expanded to every synonym stored in the collection.
const DEAD: &str = "dead";
const DEAD_ALIASES: [&str; 4] = ["dead", "deceased", "lifeless", "no more"];

/// Constraint on `createdAt`.
#[derive(Debug, Clone, PartialEq)]
pub enum CreatedAt {
    /// `after < createdAt <= until`.
    Between {
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    },
    /// `after < createdAt`.
    Since(DateTime<Utc>),
}

/// Constraint on `status`.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusMatch {
    Exact(String),
    AnyOf(&'static [&'static str]),
}

/// Case-insensitive substring match on an arbitrary field.
#[derive(Debug, Clone, PartialEq)]
pub struct Search {
    pub field: String,
    pub term: String,
}

/// Every constraint a listing request may put on user records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFilter {
    pub created_at: Option<CreatedAt>,
    pub status: Option<StatusMatch>,
    pub is_blocked: Option<bool>,
    pub is_email_verified: Option<bool>,
    pub search: Option<Search>,
}

impl UserFilter {
    /// Build the filter relative to the current day.
    pub fn from_params(params: &ListParams) -> Self {
        Self::from_params_at(params, Utc::now())
    }

    /// Build the filter relative to `now`.
    ///
    /// `createdAgo` takes precedence over `fromDate`/`toDate` when both are
    /// supplied. Unparsable dates drop their constraint.
    pub fn from_params_at(params: &ListParams, now: DateTime<Utc>) -> Self {
        let range = match (params.from_date(), params.to_date()) {
            (Some(from), Some(to)) => {
                match (start_of_day(from), start_of_day(to)) {
                    (Some(after), Some(until)) => {
                        Some(CreatedAt::Between { after, until })
                    },
                    _ => {
                        tracing::warn!(from, to, "ignoring malformed date range");
                        None
                    },
                }
            },
            _ => None,
        };

        let since = params.created_ago().and_then(|days| {
            let Ok(days) = days.trim().parse::<i64>() else {
                tracing::warn!(days, "ignoring non-integer `createdAgo`");
                return None;
            };
            days_ago(now, days).map(CreatedAt::Since)
        });

        Self {
            created_at: since.or(range),
            status: params.status().map(|status| {
                if status == DEAD {
                    StatusMatch::AnyOf(&DEAD_ALIASES)
                } else {
                    StatusMatch::Exact(status.to_owned())
                }
            }),
            is_blocked: params.blocked().map(|flag| flag == TRUE_FLAG),
            is_email_verified: params.email_verified().map(|flag| flag == TRUE_FLAG),
            search: params.search().map(|term| Search {
                field: params
                    .search_key()
                    .unwrap_or(DEFAULT_SEARCH_KEY)
                    .to_owned(),
                term: term.to_owned(),
            }),
        }
    }

    /// Whether no constraint applies.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Render as a `find`/`$match` document.
    pub fn to_document(&self) -> Document {
        let mut filter = Document::new();

        match &self.created_at {
            Some(CreatedAt::Between { after, until }) => {
                filter.insert(
                    "createdAt",
                    doc! { "$gt": bson::DateTime::from_chrono(*after), "$lte": bson::DateTime::from_chrono(*until) },
                );
            },
            Some(CreatedAt::Since(after)) => {
                filter.insert(
                    "createdAt",
                    doc! { "$gt": bson::DateTime::from_chrono(*after) },
                );
            },
            None => {},
        }

        match &self.status {
            Some(StatusMatch::Exact(status)) => {
                filter.insert("status", status.as_str());
            },
            Some(StatusMatch::AnyOf(statuses)) => {
                filter.insert("status", doc! { "$in": statuses.to_vec() });
            },
            None => {},
        }

        if let Some(blocked) = self.is_blocked {
            filter.insert("isBlocked", blocked);
        }
        if let Some(verified) = self.is_email_verified {
            filter.insert("isEmailVerified", verified);
        }

        // The search field is inserted last so it wins over any field above
        // when `searchKey` names one of them.
        if let Some(search) = &self.search {
            filter.insert(
                search.field.as_str(),
                doc! {
                    "$regex": regex_lite::escape(&search.term),
                    "$options": "i",
                },
            );
        }

        filter
    }

    /// Render as a pipeline stage, or nothing when unconstrained.
    pub fn to_match_stage(&self) -> Option<Document> {
        (!self.is_empty()).then(|| doc! { "$match": Bson::Document(self.to_document()) })
    }
}

/// Midnight UTC of a `YYYY-MM-DD` day.
fn start_of_day(date: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
        .ok()
        .map(|day| day.and_time(NaiveTime::MIN).and_utc())
}

/// Midnight UTC of the day `days` before `now`. Negative values go forward.
fn days_ago(now: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    let today = now.date_naive();
    let day = if days >= 0 {
        today.checked_sub_days(Days::new(days.unsigned_abs()))
    } else {
        today.checked_add_days(Days::new(days.unsigned_abs()))
    };
    day.map(|day| day.and_time(NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn params(pairs: &[(&str, &str)]) -> ListParams {
        let query = pairs
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        let uri: axum::http::Uri = format!("/?{query}").parse().unwrap();
        axum::extract::Query::<ListParams>::try_from_uri(&uri).unwrap().0
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 17, 42, 5).unwrap()
    }

    fn midnight(y: i32, m: u32, d: u32) -> bson::DateTime {
        bson::DateTime::from_chrono(Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_no_params_is_open() {
        let filter = UserFilter::from_params_at(&ListParams::default(), now());
        assert!(filter.is_empty());
        assert_eq!(filter.to_document(), Document::new());
        assert_eq!(filter.to_match_stage(), None);
    }

    #[test]
    fn test_date_range_is_left_open_right_closed() {
        let filter = UserFilter::from_params_at(
            &params(&[("fromDate", "2024-01-01"), ("toDate", "2024-01-31")]),
            now(),
        );
        assert_eq!(
            filter.to_document(),
            doc! { "createdAt": { "$gt": midnight(2024, 1, 1), "$lte": midnight(2024, 1, 31) } }
        );
    }

    #[test]
    fn test_date_range_needs_both_bounds() {
        let filter =
            UserFilter::from_params_at(&params(&[("fromDate", "2024-01-01")]), now());
        assert_eq!(filter.created_at, None);
    }

    #[test]
    fn test_malformed_date_is_ignored() {
        let filter = UserFilter::from_params_at(
            &params(&[("fromDate", "yesterday"), ("toDate", "2024-01-31")]),
            now(),
        );
        assert!(filter.is_empty());
    }

    #[test]
    fn test_created_ago_starts_at_midnight() {
        let filter =
            UserFilter::from_params_at(&params(&[("createdAgo", "7")]), now());
        assert_eq!(
            filter.to_document(),
            doc! { "createdAt": { "$gt": midnight(2024, 3, 8) } }
        );
    }

    #[test]
    fn test_created_ago_overrides_range() {
        let filter = UserFilter::from_params_at(
            &params(&[
                ("fromDate", "2024-01-01"),
                ("toDate", "2024-01-31"),
                ("createdAgo", "0"),
            ]),
            now(),
        );
        assert_eq!(
            filter.created_at,
            Some(CreatedAt::Since(Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()))
        );
    }

    #[test]
    fn test_invalid_created_ago_keeps_range() {
        let filter = UserFilter::from_params_at(
            &params(&[
                ("fromDate", "2024-01-01"),
                ("toDate", "2024-01-31"),
                ("createdAgo", "week"),
            ]),
            now(),
        );
        assert!(matches!(filter.created_at, Some(CreatedAt::Between { .. })));
    }

    #[test]
    fn test_dead_expands_to_aliases() {
        let filter = UserFilter::from_params_at(&params(&[("status", "dead")]), now());
        assert_eq!(
            filter.to_document(),
            doc! { "status": { "$in": ["dead", "deceased", "lifeless", "no more"] } }
        );

        let filter = UserFilter::from_params_at(&params(&[("status", "alive")]), now());
        assert_eq!(filter.to_document(), doc! { "status": "alive" });
    }

    #[test]
    fn test_flags_are_true_only_for_one() {
        let filter = UserFilter::from_params_at(
            &params(&[("blocked", "1"), ("emailVerified", "true")]),
            now(),
        );
        assert_eq!(
            filter.to_document(),
            doc! { "isBlocked": true, "isEmailVerified": false }
        );
    }

    #[test]
    fn test_empty_flag_is_absent() {
        let filter = UserFilter::from_params_at(&params(&[("blocked", "")]), now());
        assert_eq!(filter.is_blocked, None);
    }

    #[test]
    fn test_search_defaults_to_email() {
        let filter = UserFilter::from_params_at(&params(&[("search", "gmail")]), now());
        assert_eq!(
            filter.to_document(),
            doc! { "email": { "$regex": "gmail", "$options": "i" } }
        );
    }

    #[test]
    fn test_search_is_literal() {
        let filter = UserFilter::from_params_at(
            &params(&[("search", "j.doe(1)"), ("searchKey", "name")]),
            now(),
        );
        assert_eq!(
            filter.to_document(),
            doc! { "name": { "$regex": "j\\.doe\\(1\\)", "$options": "i" } }
        );
    }

    #[test]
    fn test_match_stage_wraps_document() {
        let filter = UserFilter::from_params_at(&params(&[("blocked", "0")]), now());
        assert_eq!(
            filter.to_match_stage(),
            Some(doc! { "$match": { "isBlocked": false } })
        );
    }
}
