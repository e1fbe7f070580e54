use crate::jobs::{IndexListing, IndexOp};
use crate::ports::SearchIndexer;
use async_trait::async_trait;
use rentora_jobs::{JobContext, JobResult, PayloadHandler};
use std::sync::Arc;

pub struct IndexListingHandler {
    indexer: Arc<dyn SearchIndexer>,
}

impl IndexListingHandler {
    pub fn new(indexer: Arc<dyn SearchIndexer>) -> Self {
        Self { indexer }
    }
}

#[async_trait]
impl PayloadHandler<IndexListing> for IndexListingHandler {
    async fn handle(&self, payload: IndexListing, _ctx: &JobContext) -> JobResult<()> {
        match payload.op {
            IndexOp::Upsert => self.indexer.upsert_listing(payload.listing_id).await?,
            IndexOp::Delete => self.indexer.remove_listing(payload.listing_id).await?,
        }
        Ok(())
    }
}
