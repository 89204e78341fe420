//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/posts`:
//! - Post search, CRUD, likes and images (`posts`)
//! - Comments nested under their post (`comments`)

pub mod comments;
pub mod common;
pub mod middleware;
pub mod posts;
pub mod responses;

use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState};

/// Build the API router
pub fn build_api_router(state: &AppState) -> Router<AppState> {
    Router::new().nest(
        "/posts",
        posts::router(state).merge(comments::router()),
    )
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allow_origin(cors_origin))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .nest("/api", build_api_router(&state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn allow_origin(origin: &str) -> AllowOrigin {
    if origin == "*" {
        return AllowOrigin::any();
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => AllowOrigin::exact(value),
        Err(e) => {
            tracing::warn!(origin, error = %e, "Invalid CORS origin, cross-origin requests disabled");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{SqlxCommentRepository, SqlxPostRepository, SqlxSearchRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::services::{CommentService, ImageStorage, PostService};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const MAX_IMAGE: u64 = 1024;

    async fn setup_router() -> (Router, TempDir) {
        let pool = create_test_pool()
            .await
            .expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let dir = TempDir::new().expect("Failed to create temp dir");
        let cache = Arc::new(MemoryCache::new());
        let post_repo = SqlxPostRepository::boxed(pool.clone());

        let state = AppState {
            post_service: Arc::new(PostService::new(
                post_repo.clone(),
                SqlxSearchRepository::boxed(pool.clone()),
                cache.clone(),
                Arc::new(ImageStorage::new(dir.path(), MAX_IMAGE)),
            )),
            comment_service: Arc::new(CommentService::new(
                SqlxCommentRepository::boxed(pool),
                post_repo,
                cache,
            )),
            max_image_size: MAX_IMAGE,
        };

        (build_router(state, "http://localhost:3000"), dir)
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create(app: &Router, title: &str, tags: &[&str]) -> i64 {
        let response = send(
            app,
            json_request(
                "POST",
                "/api/posts",
                json!({"title": title, "text": format!("text of {}", title), "tags": tags}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["id"].as_i64().unwrap()
    }

    fn multipart_request(uri: &str, field: &str, file_name: &str, data: &[u8]) -> Request<Body> {
        let boundary = "tagpress-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        Request::builder()
            .method("PUT")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_search_scenario() {
        let (app, _dir) = setup_router().await;
        create(&app, "test title1", &["test_tag1", "test_tag2"]).await;
        create(&app, "test title2", &["test_tag1"]).await;
        create(&app, "test title3", &["test_tag3"]).await;

        let response = send(
            &app,
            empty_request("GET", "/api/posts?search=%23test_tag1&page_number=1&page_size=3"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_json(response).await;
        assert_eq!(page["posts"].as_array().unwrap().len(), 2);
        assert_eq!(page["posts"][0]["title"], "test title1");
        assert_eq!(page["posts"][0]["tags"], json!(["test_tag1", "test_tag2"]));
        assert_eq!(page["last_page_index"], 0);
        assert_eq!(page["page_number"], 1);
        assert_eq!(page["has_next"], false);

        let response = send(
            &app,
            empty_request("GET", "/api/posts?search=test+t&page_number=2&page_size=2"),
        )
        .await;
        let page = body_json(response).await;
        assert_eq!(page["posts"].as_array().unwrap().len(), 1);
        assert_eq!(page["total"], 3);
        assert_eq!(page["page_number"], 2);
        assert_eq!(page["has_previous"], true);
        assert_eq!(page["has_next"], false);
    }

    #[tokio::test]
    async fn test_search_validation() {
        let (app, _dir) = setup_router().await;

        for uri in [
            "/api/posts?search=",
            "/api/posts",
            "/api/posts?search=a&page_number=0",
            "/api/posts?search=a&page_size=0",
            "/api/posts?search=a&page_size=101",
        ] {
            let response = send(&app, empty_request("GET", uri)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        }

        let response = send(&app, empty_request("GET", "/api/posts?search=")).await;
        assert_eq!(body_json(response).await["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_post_crud() {
        let (app, _dir) = setup_router().await;
        let id = create(&app, "first", &["a"]).await;

        let response = send(&app, empty_request("GET", &format!("/api/posts/{}", id))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["title"], "first");

        let response = send(
            &app,
            json_request(
                "PUT",
                &format!("/api/posts/{}", id),
                json!({"id": id, "title": "renamed", "text": "new", "tags": ["b"]}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let post = body_json(response).await;
        assert_eq!(post["title"], "renamed");
        assert_eq!(post["tags"], json!(["b"]));

        let response = send(&app, empty_request("POST", &format!("/api/posts/{}/likes", id))).await;
        assert_eq!(body_json(response).await, json!(1));

        let response = send(&app, empty_request("DELETE", &format!("/api/posts/{}", id))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, empty_request("GET", &format!("/api/posts/{}", id))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_update_id_mismatch_and_conflict() {
        let (app, _dir) = setup_router().await;
        let a = create(&app, "a", &[]).await;
        create(&app, "b", &[]).await;

        let response = send(
            &app,
            json_request(
                "PUT",
                &format!("/api/posts/{}", a),
                json!({"id": a + 100, "title": "x", "text": "y"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app,
            json_request(
                "PUT",
                &format!("/api/posts/{}", a),
                json!({"title": "b", "text": "y"}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = send(
            &app,
            json_request("POST", "/api/posts", json!({"title": "a", "text": "dup"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_image_upload_and_download() {
        let (app, _dir) = setup_router().await;
        let id = create(&app, "pic", &[]).await;
        let uri = format!("/api/posts/{}/image", id);

        let response = send(&app, empty_request("GET", &uri)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, multipart_request(&uri, "image", "cat.png", b"png-bytes")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, empty_request("GET", &uri)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["cache-control"], "no-store");
        assert_eq!(response.headers()["content-type"], "image/png");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"png-bytes");
    }

    #[tokio::test]
    async fn test_image_upload_rejections() {
        let (app, _dir) = setup_router().await;
        let id = create(&app, "pic", &[]).await;
        let uri = format!("/api/posts/{}/image", id);

        let response = send(&app, multipart_request(&uri, "file", "cat.png", b"data")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let big = vec![0u8; (MAX_IMAGE + 1) as usize];
        let response = send(&app, multipart_request(&uri, "image", "big.png", &big)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(
            &app,
            multipart_request("/api/posts/999/image", "image", "cat.png", b"data"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_comment_routes() {
        let (app, _dir) = setup_router().await;
        let id = create(&app, "post", &[]).await;
        let base = format!("/api/posts/{}/comments", id);

        let response = send(&app, json_request("POST", &base, json!({"text": "hello"}))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let comment_id = body_json(response).await["id"].as_i64().unwrap();

        let response = send(&app, empty_request("GET", &base)).await;
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);

        let response = send(&app, empty_request("GET", &format!("/api/posts/{}", id))).await;
        assert_eq!(body_json(response).await["comments_count"], 1);

        let item = format!("{}/{}", base, comment_id);
        let response = send(
            &app,
            json_request("PUT", &item, json!({"id": comment_id, "post_id": id, "text": "edited"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["text"], "edited");

        let response = send(
            &app,
            json_request("PUT", &item, json!({"post_id": id + 1, "text": "moved"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = send(&app, empty_request("DELETE", &item)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, empty_request("GET", &item)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, empty_request("GET", "/api/posts/999/comments")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
