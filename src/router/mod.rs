pub mod status;
pub mod users;

use axum::Form;
use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::header;
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::ServerError;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Validated body, read as a URL-encoded form when the request says so and
/// as JSON otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct Valid<T>(pub T);

impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with(FORM_CONTENT_TYPE));

        let value = if is_form {
            let Form(value) = Form::<T>::from_request(req, state).await?;
            value
        } else {
            let Json(value) = Json::<T>::from_request(req, state).await?;
            value
        };

        value.validate()?;
        Ok(Valid(value))
    }
}

/// Query string whose rejection answers with the JSON error body.
#[derive(Debug, Clone, Default)]
pub struct Params<T>(pub T);

impl<T, S> FromRequestParts<S> for Params<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Params(value))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use mongodb::Client;

    use crate::config::Configuration;
    use crate::database::Database;
    use crate::user::User;
    use crate::*;

    /// State whose client never connects. Only for routes that fail or
    /// answer before touching MongoDB.
    pub async fn lazy_state() -> AppState {
        let config = Configuration::default();
        let client = Client::with_uri_str("mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=100")
            .await
            .expect("cannot parse MongoDB URI");
        let mongodb = client.database(&config.mongodb.database);
        let users = mongodb.collection::<User>(&config.mongodb.collection);

        AppState {
            config: Arc::new(config),
            db: Database {
                client,
                mongodb,
                users,
            },
            metrics: None,
        }
    }

    /// State on a fresh database of the server named by `MONGODB_URI`.
    ///
    /// Tests calling it are `#[ignore]`d and run with `cargo test -- --ignored`.
    pub async fn state() -> AppState {
        let uri = std::env::var("MONGODB_URI")
            .ok()
            .filter(|uri| !uri.is_empty())
            .expect("missing `MONGODB_URI` environment variable");

        let mut config = Configuration::default();
        config.mongodb.uri = uri;
        config.mongodb.database = format!("userpages_test_{}", bson::oid::ObjectId::new());

        let db = Database::new(&config.mongodb)
            .await
            .expect("cannot reach MongoDB");

        AppState {
            config: Arc::new(config),
            db,
            metrics: None,
        }
    }

    /// Drop the database created by [`state`].
    pub async fn cleanup(state: AppState) {
        state.db.mongodb.drop().await.expect("cannot drop test database");
    }
}
