//! Pagination helper for aggregation pipelines.
//!
//! Given a base pipeline, counts its output and fetches one sorted slice of
//! it with two concurrent aggregations.

use bson::{Document, doc};
use futures::TryStreamExt;
use mongodb::Collection;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::query::{Page, PageRequest, SortSpec, collation};

/// Paging options for [`aggregate_paginate`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PaginateOptions {
    pub page: PageRequest,
    pub sort: SortSpec,
}

/// Pipeline counting the output of `pipeline`.
pub fn count_pipeline(pipeline: &[Document]) -> Vec<Document> {
    let mut stages = pipeline.to_vec();
    stages.push(doc! { "$count": "totalCount" });
    stages
}

/// Pipeline returning the requested sorted slice of `pipeline`.
pub fn page_pipeline(pipeline: &[Document], options: &PaginateOptions) -> Vec<Document> {
    let mut stages = pipeline.to_vec();
    stages.push(options.sort.to_stage());
    stages.extend(options.page.to_stages());
    stages
}

/// Run `pipeline` against `collection` and return one page of its output.
pub async fn aggregate_paginate<C, T>(
    collection: &Collection<C>,
    pipeline: Vec<Document>,
    options: PaginateOptions,
) -> Result<Page<T>>
where
    C: Send + Sync,
    T: DeserializeOwned,
{
    let count = async {
        let mut cursor = collection
            .aggregate(count_pipeline(&pipeline))
            .collation(collation())
            .await?;
        let total = match cursor.try_next().await? {
            Some(document) => total_count(&document),
            None => 0,
        };
        Ok::<_, mongodb::error::Error>(total)
    };

    let data = async {
        collection
            .aggregate(page_pipeline(&pipeline, &options))
            .collation(collation())
            .await?
            .try_collect::<Vec<Document>>()
            .await
    };

    let (total, documents) = tokio::try_join!(count, data)?;
    let data = documents
        .into_iter()
        .map(bson::from_document)
        .collect::<std::result::Result<Vec<T>, _>>()?;

    Ok(Page::new(data, total, options.page))
}

/// Read the `$count` output, whatever integer width the server picked.
fn total_count(document: &Document) -> u64 {
    document
        .get_i64("totalCount")
        .or_else(|_| document.get_i32("totalCount").map(i64::from))
        .map(|total| total.max(0).unsigned_abs())
        .unwrap_or_default()
}
