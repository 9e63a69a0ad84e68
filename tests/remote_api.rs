//! API behavior tests against a mocked Paprika cloud.

use std::sync::Arc;
use std::time::Duration;

use paprika_sync::{
    CachedFields, Config, MemoryCache, PaprikaError, RecipeCache, Remote, RemoteRecipe,
    RetryPolicy,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server: &MockServer) -> Config {
    let mut config = Config::new("cook@example.com", "hunter2");
    config.domain = server.uri();
    config.timeout_secs = 5;
    config.user_agent = Some("paprika-sync-tests".into());
    config
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        backoff_base: Duration::from_millis(1),
        ..RetryPolicy::default()
    }
}

fn remote(server: &MockServer) -> Remote {
    Remote::new(test_config(server))
        .unwrap()
        .with_retry_policy(fast_retry())
}

fn remote_with_cache(server: &MockServer, cache: Arc<dyn RecipeCache>) -> Remote {
    Remote::with_cache(test_config(server), cache)
        .unwrap()
        .with_retry_policy(fast_retry())
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v2/account/login/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": {"token": "tok-1"}})),
        )
        .named("login")
        .mount(server)
        .await;
}

fn fields(value: serde_json::Value) -> CachedFields {
    value.as_object().unwrap().clone()
}

// ── Authentication ──────────────────────────────────────────────

#[tokio::test]
async fn login_sends_credentials_and_token_is_reused() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/account/login/"))
        .and(body_string_contains("email=cook%40example.com"))
        .and(body_string_contains("password=hunter2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": {"token": "tok-1"}})),
        )
        .expect(1)
        .named("login")
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipes/"))
        .and(header("Authorization", "Bearer tok-1"))
        .and(header("User-Agent", "paprika-sync-tests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                {"uid": "a", "hash": "h1"},
                {"uid": "b", "hash": "h2"},
            ]
        })))
        .expect(2)
        .named("listing")
        .mount(&server)
        .await;

    let remote = remote(&server);

    // Two operations, one login.
    assert_eq!(remote.count().await.unwrap(), 2);
    assert_eq!(remote.count().await.unwrap(), 2);
}

#[tokio::test]
async fn login_without_token_field_is_an_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/account/login/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
        .mount(&server)
        .await;

    // Nothing may be attempted without a token.
    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipes/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .expect(0)
        .named("listing")
        .mount(&server)
        .await;

    let err = remote(&server).count().await.unwrap_err();
    assert!(matches!(err, PaprikaError::Auth(_)), "got {err:?}");
}

#[tokio::test]
async fn login_http_failure_is_wrapped_with_context() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/account/login/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = remote(&server).count().await.unwrap_err();
    match err {
        PaprikaError::Auth(detail) => assert!(detail.contains("unexpected status")),
        other => panic!("expected Auth, got {other:?}"),
    }
}

// ── Listing and enumeration ─────────────────────────────────────

#[tokio::test]
async fn enumerate_yields_records_in_listing_order() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipes/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                {"uid": "a", "hash": "h1"},
                {"uid": "b", "hash": "h2"},
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipe/a/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"uid": "a", "name": "Alpha Soup", "hash": "h1"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipe/b/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"uid": "b", "name": "Beta Salad", "hash": "h2"}
        })))
        .mount(&server)
        .await;

    let remote = remote(&server);
    let recipes = remote.recipes().try_collect().await.unwrap();

    assert_eq!(recipes.len(), 2);
    assert_eq!(recipes[0].name, "Alpha Soup");
    assert_eq!(recipes[1].name, "Beta Salad");
}

#[tokio::test]
async fn enumeration_stops_at_the_failing_record() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipes/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                {"uid": "a", "hash": "h1"},
                {"uid": "b", "hash": "h2"},
                {"uid": "c", "hash": "h3"},
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipe/a/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"uid": "a", "name": "Alpha Soup", "hash": "h1"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipe/b/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipe/c/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"uid": "c", "name": "Gamma Stew", "hash": "h3"}
        })))
        .expect(0)
        .named("recipe c, never reached")
        .mount(&server)
        .await;

    let remote = remote(&server);
    let mut recipes = remote.recipes();

    assert_eq!(recipes.next().await.unwrap().unwrap().name, "Alpha Soup");
    assert!(recipes.next().await.unwrap().is_err());
    assert!(recipes.next().await.is_none());
}

// ── Resolution and caching ──────────────────────────────────────

#[tokio::test]
async fn cached_pair_resolves_with_zero_network_calls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/account/login/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": {"token": "tok-1"}})),
        )
        .expect(0)
        .named("login, not needed for a cache hit")
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipe/a/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"uid": "a", "name": "Network Copy", "hash": "h1"}
        })))
        .expect(0)
        .named("recipe fetch, must not happen")
        .mount(&server)
        .await;

    let cache = Arc::new(MemoryCache::new());
    cache
        .write(
            "a",
            "h1",
            &fields(json!({"uid": "a", "name": "Cached Copy", "hash": "h1"})),
        )
        .unwrap();

    let remote = remote_with_cache(&server, cache);
    let recipe = remote.get_by_id("a", "h1").await.unwrap();
    assert_eq!(recipe.name, "Cached Copy");
}

#[tokio::test]
async fn repeated_resolution_is_idempotent_and_fetches_once() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipe/a/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"uid": "a", "name": "Alpha Soup", "rating": 5, "hash": "h1"}
        })))
        .expect(1)
        .named("recipe fetch")
        .mount(&server)
        .await;

    let remote = remote_with_cache(&server, Arc::new(MemoryCache::new()));

    let first = remote.get_by_id("a", "h1").await.unwrap();
    let second = remote.get_by_id("a", "h1").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(second.rating, 5);
}

#[tokio::test]
async fn disabled_cache_fetches_every_time() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipe/a/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {"uid": "a", "name": "Alpha Soup", "hash": "h1"}
        })))
        .expect(2)
        .named("recipe fetch")
        .mount(&server)
        .await;

    // Default config: caching disabled.
    let remote = remote(&server);
    remote.get_by_id("a", "h1").await.unwrap();
    remote.get_by_id("a", "h1").await.unwrap();
}

#[tokio::test]
async fn unknown_response_fields_are_dropped() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipe/a/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "uid": "a",
                "name": "Alpha Soup",
                "hash": "h1",
                "photo_data": "giant-base64-blob",
                "some_future_field": {"nested": true},
            }
        })))
        .mount(&server)
        .await;

    let recipe = remote(&server).get_by_id("a", "h1").await.unwrap();
    assert_eq!(recipe.name, "Alpha Soup");
    assert_eq!(recipe.rating, 0);
}

#[tokio::test]
async fn missing_result_object_is_an_unexpected_response() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipe/a/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "fine"})))
        .mount(&server)
        .await;

    let err = remote(&server).get_by_id("a", "h1").await.unwrap_err();
    assert!(matches!(err, PaprikaError::UnexpectedResponse { .. }));
}

// ── Upload ──────────────────────────────────────────────────────

#[tokio::test]
async fn upload_then_read_is_a_cache_hit() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    let recipe = RemoteRecipe {
        uid: "a".into(),
        name: "Miso Soup".into(),
        ingredients: "miso paste\ndashi".into(),
        ..Default::default()
    };
    let mut staged = recipe.clone();
    staged.update_hash().unwrap();
    let new_hash = staged.hash.clone();

    Mock::given(method("POST"))
        .and(path("/api/v2/sync/recipe/a/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
        .expect(1)
        .named("upload")
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipe/a/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": serde_json::to_value(&staged).unwrap()})),
        )
        .expect(1)
        .named("read-through after upload")
        .mount(&server)
        .await;

    let remote = remote_with_cache(&server, Arc::new(MemoryCache::new()));

    let uploaded = remote.upload(&recipe).await.unwrap();
    assert_eq!(uploaded.hash, new_hash);
    assert_eq!(uploaded.name, "Miso Soup");

    // The upload's read-through populated the cache; this hits locally,
    // and the GET mock stays at one recorded call.
    let again = remote.get_by_id("a", &new_hash).await.unwrap();
    assert_eq!(again, uploaded);
}

// ── Application errors and retries ──────────────────────────────

#[tokio::test]
async fn http_200_with_error_body_is_a_request_error() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipes/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"code": 17, "message": "account locked"}
        })))
        .mount(&server)
        .await;

    let err = remote(&server).count().await.unwrap_err();
    match err {
        PaprikaError::Request(request) => {
            assert!(request.detail.contains("account locked"));
            assert_eq!(request.path, "/api/v2/sync/recipes/");
        }
        other => panic!("expected Request, got {other:?}"),
    }
}

#[tokio::test]
async fn transient_statuses_are_retried_until_success() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipes/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .named("transient failures")
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipes/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": [{"uid": "a", "hash": "h1"}]})),
        )
        .expect(1)
        .named("recovery")
        .mount(&server)
        .await;

    assert_eq!(remote(&server).count().await.unwrap(), 1);
}

#[tokio::test]
async fn non_transient_status_fails_without_retry() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/v2/sync/recipe/a/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .named("missing recipe")
        .mount(&server)
        .await;

    let err = remote(&server).get_by_id("a", "h1").await.unwrap_err();
    assert!(matches!(err, PaprikaError::Http(_)));
}

// ── Notify ──────────────────────────────────────────────────────

#[tokio::test]
async fn notify_posts_and_ignores_the_body() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/v2/sync/notify/"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
        .expect(1)
        .named("notify")
        .mount(&server)
        .await;

    remote(&server).notify().await.unwrap();
}
