//! List every user.

use axum::Json;
use axum::extract::State;

use crate::error::Result;
use crate::router::users::UserResponse;
use crate::user::UserRepository;

pub async fn handler(State(users): State<UserRepository>) -> Result<Json<Vec<UserResponse>>> {
    let users = users.find_all().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}
