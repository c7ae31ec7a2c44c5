//! Filtered page built with `find` and `countDocuments`.

use axum::Json;
use axum::extract::State;

use crate::error::Result;
use crate::query::{ListParams, ListQuery, Page};
use crate::router::Params;
use crate::router::users::UserResponse;
use crate::user::UserRepository;

pub async fn handler(
    State(users): State<UserRepository>,
    Params(params): Params<ListParams>,
) -> Result<Json<Page<UserResponse>>> {
    let query = ListQuery::from(&params);
    tracing::debug!(filter = ?query.filter, sort = ?query.sort, page = ?query.page, "find users");

    let page = users.find_page(&query).await?;
    Ok(Json(page.map(UserResponse::from)))
}
