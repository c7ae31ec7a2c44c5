//! Users-related HTTP API.
mod aggregate;
mod all;
pub mod create;
mod find;
mod paginate;

use axum::Router;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::user::{Gender, Status, User};

/// User as returned by the API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    pub is_email_verified: bool,
    pub is_blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: user.name,
            email: user.email,
            phone: user.phone,
            gender: user.gender,
            is_email_verified: user.is_email_verified,
            is_blocked: user.is_blocked,
            status: user.status,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        // `GET /1` lists everything.
        .route("/1", get(all::handler))
        // `GET /2` pages with `find` and `countDocuments`.
        .route("/2", get(find::handler))
        // `GET /3` pages with a single `$facet` aggregation.
        .route("/3", get(aggregate::handler))
        // `GET /4` pages projected users with the pagination helper.
        .route("/4", get(paginate::handler))
        // `POST /` creates a user.
        .route("/", post(create::handler))
}
