//! Read-only knowledge-base lookup: the table is read-only from the
//! pipeline's perspective.

use crate::domain::KbArticle;
use crate::error::RepositoryError;
use async_trait::async_trait;

#[async_trait]
pub trait KbRepository: Send + Sync {
    /// Articles matching any of `tags`, best matches first, capped at
    /// `limit`.
    async fn search_by_tags(
        &self,
        tags: &[String],
        limit: usize,
    ) -> Result<Vec<KbArticle>, RepositoryError>;
}
