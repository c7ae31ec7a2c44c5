//! Handle database requests.

use axum::extract::FromRef;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::Collection;

use crate::AppState;
use crate::database::{PaginateOptions, aggregate_paginate};
use crate::error::{Result, ServerError};
use crate::query::{FacetPage, ListQuery, Page, collation, facet_stages};
use crate::user::{PUBLIC_FIELDS, User};

#[derive(Clone)]
pub struct UserRepository {
    users: Collection<User>,
}

impl UserRepository {
    /// Create a new [`UserRepository`].
    pub fn new(users: Collection<User>) -> Self {
        Self { users }
    }

    /// Insert [`User`] into database and return it with its new id.
    pub async fn insert(&self, mut user: User) -> Result<User> {
        let result = self.users.insert_one(&user).await?;

        match result.inserted_id {
            Bson::ObjectId(id) => user.id = Some(id),
            other => {
                return Err(ServerError::Internal {
                    details: format!("unexpected inserted id {other}"),
                });
            },
        }

        Ok(user)
    }

    /// Every stored user, in natural order.
    pub async fn find_all(&self) -> Result<Vec<User>> {
        Ok(self.users.find(doc! {}).await?.try_collect().await?)
    }

    /// Filtered page using `find` plus a separate `countDocuments`.
    pub async fn find_page(&self, query: &ListQuery) -> Result<Page<User>> {
        let filter = query.filter.to_document();

        let data = self
            .users
            .find(filter.clone())
            .collation(collation())
            .sort(query.sort.to_document())
            .skip(query.page.skip())
            .limit(i64::try_from(query.page.limit).unwrap_or(i64::MAX))
            .await?
            .try_collect::<Vec<User>>()
            .await?;
        let total = self
            .users
            .count_documents(filter)
            .collation(collation())
            .await?;

        Ok(Page::new(data, total, query.page))
    }

    /// Filtered page computed by one `$facet` aggregation.
    pub async fn aggregate_page(&self, query: &ListQuery) -> Result<Page<User>> {
        let mut pipeline = Vec::from_iter(query.filter.to_match_stage());
        pipeline.extend(facet_stages(&query.sort, query.page));

        let document = self
            .users
            .aggregate(pipeline)
            .collation(collation())
            .await?
            .try_next()
            .await?
            .ok_or(ServerError::NotFound)?;

        let facet: FacetPage<User> = bson::from_document(document)?;
        Ok(facet.into_page(query.page))
    }

    /// Filtered page of projected users through [`aggregate_paginate`].
    pub async fn aggregate_paginate(&self, query: &ListQuery) -> Result<Page<User>> {
        let mut pipeline = Vec::from_iter(query.filter.to_match_stage());
        pipeline.push(projection());

        aggregate_paginate(
            &self.users,
            pipeline,
            PaginateOptions {
                page: query.page,
                sort: query.sort,
            },
        )
        .await
    }
}

impl FromRef<AppState> for UserRepository {
    fn from_ref(state: &AppState) -> UserRepository {
        UserRepository::new(state.db.users.clone())
    }
}

fn projection() -> Document {
    let fields = PUBLIC_FIELDS
        .iter()
        .map(|field| (field.to_string(), Bson::Int32(1)))
        .collect::<Document>();
    doc! { "$project": fields }
}
