use mediashrink_common::config::LookupConfig;
use mediashrink_common::error::ShrinkError;
use mediashrink_lookup::{LinkLookup, TikwmLookup};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LINK: &str = "https://www.tiktok.com/@someone/video/7301";

async fn lookup_against(server: &MockServer) -> TikwmLookup {
    TikwmLookup::new(&LookupConfig {
        endpoint: format!("{}/api/", server.uri()),
        timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn successful_lookup_returns_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/"))
        .and(query_param("url", LINK))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "success",
            "data": {
                "title": "cat video",
                "cover": "https://cdn.example/cover.jpg",
                "author": { "nickname": "someone", "avatar": "https://cdn.example/a.jpg" },
                "play": "https://cdn.example/play.mp4",
                "music": "https://cdn.example/music.mp3",
                "duration": 12
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let meta = lookup_against(&server).await.lookup(LINK).await.unwrap();
    assert_eq!(meta.title, "cat video");
    assert_eq!(meta.author.nickname, "someone");
    assert_eq!(meta.play, "https://cdn.example/play.mp4");
    assert_eq!(meta.music, "https://cdn.example/music.mp3");
}

#[tokio::test]
async fn link_with_its_own_query_is_sent_intact() {
    let link = "https://vm.tiktok.com/ZMabc/?is_from_webapp=1&sender_device=pc";
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/"))
        .and(query_param("url", link))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": { "title": "shared clip" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let meta = lookup_against(&server).await.lookup(link).await.unwrap();
    assert_eq!(meta.title, "shared clip");
}

#[tokio::test]
async fn nonzero_code_is_a_lookup_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": -1,
            "msg": "Url parsing is failed!"
        })))
        .mount(&server)
        .await;

    let err = lookup_against(&server).await.lookup(LINK).await.unwrap_err();
    assert!(matches!(err, ShrinkError::Lookup { .. }));
    assert!(err.to_string().contains("Url parsing is failed!"));
}

#[tokio::test]
async fn http_failure_is_a_lookup_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = lookup_against(&server).await.lookup(LINK).await.unwrap_err();
    assert!(matches!(err, ShrinkError::Lookup { .. }));
}

#[tokio::test]
async fn foreign_links_never_reach_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = lookup_against(&server)
        .await
        .lookup("https://example.com/video/1")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("tiktok.com"));
}
