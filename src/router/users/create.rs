//! Create a user.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ServerError;
use crate::router::Valid;
use crate::router::users::UserResponse;
use crate::user::{Gender, Status, User, UserRepository};

#[derive(Debug, Default, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    #[serde(default)]
    #[validate(length(min = 1, message = "Name is required."))]
    pub name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Email is required."))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Phone is required."))]
    pub phone: String,
    pub gender: Option<Gender>,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default)]
    pub is_blocked: bool,
    pub status: Option<Status>,
}

impl From<Body> for User {
    fn from(body: Body) -> Self {
        // BSON dates keep milliseconds only.
        let now = bson::DateTime::now().to_chrono();
        User {
            id: None,
            name: body.name,
            email: body.email,
            phone: body.phone,
            gender: body.gender,
            is_email_verified: body.is_email_verified,
            is_blocked: body.is_blocked,
            status: body.status,
            created_at: now,
            updated_at: now,
        }
    }
}

pub async fn handler(
    State(users): State<UserRepository>,
    Valid(body): Valid<Body>,
) -> Result<Json<UserResponse>, ServerError> {
    let user = users.insert(User::from(body)).await?;
    tracing::info!(id = ?user.id, "user created");

    Ok(Json(UserResponse::from(user)))
}
