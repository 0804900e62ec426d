//! Danbooru post source

use std::sync::Arc;

use anyhow::Context as _;
use reqwest::Url;

use crate::{
    http::BooruClient,
    record::Record,
    source::{PAGE_SIZE, PostSource},
};

/// Danbooru (or compatible site) post source
pub struct Danbooru {
    /// Post search endpoint
    posts_url: Url,
    /// HTTP client
    http: Arc<BooruClient>,
}

impl Danbooru {
    /// Create a source for site at `site_url`
    pub fn new(site_url: &Url, http: Arc<BooruClient>) -> anyhow::Result<Self> {
        let posts_url = site_url
            .join("posts.json")
            .with_context(|| format!("Invalid site URL {:?}", site_url.as_str()))?;
        Ok(Self { posts_url, http })
    }
}

#[async_trait::async_trait]
impl PostSource for Danbooru {
    async fn list_posts(
        &self,
        tags: &str,
        limit: usize,
        page: usize,
    ) -> anyhow::Result<Vec<Record>> {
        anyhow::ensure!(
            (1..=PAGE_SIZE).contains(&limit),
            "Invalid page size {limit}"
        );
        anyhow::ensure!(page >= 1, "Invalid page number {page}");

        let mut url = self.posts_url.clone();
        url.query_pairs_mut()
            .append_pair("tags", tags)
            .append_pair("limit", &limit.to_string())
            .append_pair("page", &page.to_string())
            .append_pair("random", "false");

        self.http.get_json(url).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path, query_param},
    };

    use super::*;

    fn source(server: &MockServer, auth: Option<(&str, &str)>) -> Danbooru {
        let http =
            BooruClient::new(Duration::from_secs(5), Duration::from_secs(5), auth).unwrap();
        let site_url: Url = format!("{}/", server.uri()).parse().unwrap();
        Danbooru::new(&site_url, Arc::new(http)).unwrap()
    }

    #[tokio::test]
    async fn list_posts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts.json"))
            .and(query_param("tags", "hatsune_miku rating:g order:score"))
            .and(query_param("limit", "2"))
            .and(query_param("page", "3"))
            .and(query_param("random", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": 1,
                    "file_url": "https://cdn.donmai.us/original/aa/bb/aabb.jpg",
                    "tag_string_character": "hatsune_miku",
                    "tag_string_general": "blue_hair",
                },
                {"id": 2},
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let posts = source(&server, None)
            .list_posts("hatsune_miku rating:g order:score", 2, 3)
            .await
            .unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(
            posts[0].file_url(),
            Some("https://cdn.donmai.us/original/aa/bb/aabb.jpg")
        );
        assert_eq!(posts[0].tag_line(), "hatsune_miku, blue_hair");
        assert_eq!(posts[1].file_url(), None);
    }

    #[tokio::test]
    async fn list_posts_sends_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts.json"))
            .and(header("authorization", "Basic bWlrdTpzZWNyZXQ="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let posts = source(&server, Some(("miku", "secret")))
            .list_posts("q", 100, 1)
            .await
            .unwrap();
        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn list_posts_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts.json"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "success": false,
                "message": "You cannot search for more than 2 tags at a time."
            })))
            .mount(&server)
            .await;

        let err = source(&server, None)
            .list_posts("a b c", 100, 1)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("422"));
    }

    #[tokio::test]
    async fn list_posts_unexpected_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        assert!(
            source(&server, None)
                .list_posts("q", 100, 1)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn list_posts_invalid_args() {
        let server = MockServer::start().await;
        let source = source(&server, None);
        assert!(source.list_posts("q", 0, 1).await.is_err());
        assert!(source.list_posts("q", 101, 1).await.is_err());
        assert!(source.list_posts("q", 10, 0).await.is_err());
        assert!(
            server
                .received_requests()
                .await
                .is_none_or(|r| r.is_empty())
        );
    }
}
