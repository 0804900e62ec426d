//! Post sources

mod danbooru;

pub use danbooru::Danbooru;

use crate::record::Record;

/// Maximum number of posts a source returns for a single page
pub const PAGE_SIZE: usize = 100;

/// Paginated post listing
#[async_trait::async_trait]
pub trait PostSource: Sync + Send {
    /// Get page `page` (1-based) of posts matching `tags`, at most `limit` posts per page
    async fn list_posts(&self, tags: &str, limit: usize, page: usize)
    -> anyhow::Result<Vec<Record>>;
}
