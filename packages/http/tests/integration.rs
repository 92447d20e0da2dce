use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rabj_core::{Method, Params};
use rabj_http::{Client, ClientConfig};

fn envelope(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"status": {"code": 200}, "result": result}))
}

fn client(uri: &str) -> Client {
    Client::new(
        ClientConfig::new(uri)
            .with_access_key("k")
            .with_user_agent("rabj-tests")
            .with_timeout(Duration::from_secs(5)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_get_resolves_addressable_container() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rabj/store/queues/q1"))
        .and(query_param("access_key", "k"))
        .and(header("user-agent", "rabj-tests"))
        .and(header("accept", "application/json"))
        .respond_with(envelope(json!({"id": "/rabj/store/queues/q1", "name": "x"})))
        .mount(&server)
        .await;

    let uri = server.uri();
    let expected = format!("{}/rabj/store/queues/q1/judgments", uri);

    let (name, judgments) = tokio::task::spawn_blocking(move || {
        let client = client(&uri);
        let response = client
            .locator("/rabj/store/")
            .unwrap()
            .extend(["queues", "q1"])
            .unwrap()
            .get(Params::new())
            .unwrap();
        let map = response.into_result().into_map().unwrap();
        let name = map.get_local("name").cloned();
        let judgments = map.get("judgments").unwrap().locator().unwrap().url();
        (name, judgments)
    })
    .await
    .unwrap();

    assert_eq!(name, Some(json!("x")));
    assert_eq!(judgments, expected);
}

#[tokio::test]
async fn test_get_repeats_list_params() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rabj/store/queues/tags"))
        .and(query_param("tag", "/en/a"))
        .and(query_param("tag", "/en/b"))
        .respond_with(envelope(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let len = tokio::task::spawn_blocking(move || {
        client(&uri)
            .locator("rabj/store/queues/tags")
            .unwrap()
            .get(Params::new().with("tag", vec!["/en/a", "/en/b"]))
            .unwrap()
            .result()
            .as_seq()
            .map(|seq| seq.len())
    })
    .await
    .unwrap();

    assert_eq!(len, Some(0));
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rabj/store/queues"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"access_key": "k", "queue": {"name": "x"}})))
        .respond_with(envelope(json!({"id": "/rabj/store/queues/new"})))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    let id = tokio::task::spawn_blocking(move || {
        let response = client(&uri)
            .locator("rabj/store/queues")
            .unwrap()
            .call(Method::POST, Params::new().with("queue", json!({"name": "x"})))
            .unwrap();
        let id = response
            .result()
            .as_map()
            .and_then(|m| m.id().map(String::from));
        id
    })
    .await
    .unwrap();

    assert_eq!(id.as_deref(), Some("/rabj/store/queues/new"));
}

#[tokio::test]
async fn test_application_error_envelope() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rabj/store/queues/missing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {"code": 404},
            "error": {
                "code": 404,
                "class": "not_found",
                "detail": {"msg": "no such queue", "alternatives": ["q1"]}
            }
        })))
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = tokio::task::spawn_blocking(move || {
        client(&uri)
            .locator("rabj/store/queues/missing")
            .unwrap()
            .delete(Params::new())
            .unwrap_err()
    })
    .await
    .unwrap();

    let detail = err.application().unwrap();
    assert_eq!(detail.code, 404);
    assert_eq!(detail.class, "not_found");
    assert_eq!(detail.alternatives, Some(vec!["q1".to_string()]));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_non_json_response_is_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rabj/store"))
        .respond_with(ResponseTemplate::new(502).set_body_raw("<html>bad gateway</html>", "text/html"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = tokio::task::spawn_blocking(move || {
        client(&uri)
            .locator("rabj/store")
            .unwrap()
            .get(Params::new())
            .unwrap_err()
    })
    .await
    .unwrap();

    assert!(err.is_transport());
    assert_eq!(err.status(), Some(502));
    match err {
        rabj_core::Error::Transport { body, .. } => {
            assert_eq!(body.as_deref(), Some("<html>bad gateway</html>"));
        }
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_json_is_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rabj/store"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{\"status\":", "application/json"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = tokio::task::spawn_blocking(move || {
        client(&uri)
            .locator("rabj/store")
            .unwrap()
            .get(Params::new())
            .unwrap_err()
    })
    .await
    .unwrap();

    assert!(err.is_decode());
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(envelope(json!(null)).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = tokio::task::spawn_blocking(move || {
        let client = Client::new(
            ClientConfig::new(&uri).with_timeout(Duration::from_millis(200)),
        )
        .unwrap();
        client
            .locator("slow")
            .unwrap()
            .get(Params::new())
            .unwrap_err()
    })
    .await
    .unwrap();

    assert!(err.is_transport());
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn test_pool_runs_batch_over_http() {
    let server = MockServer::start().await;

    for i in 0..8u64 {
        Mock::given(method("GET"))
            .and(path(format!("/rabj/store/questions/{}", i)))
            .respond_with(
                envelope(json!({"id": format!("/rabj/store/questions/{}", i), "n": i}))
                    .set_delay(Duration::from_millis((8 - i) * 20)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/rabj/store/questions/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_raw("oops", "text/plain"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let results = tokio::task::spawn_blocking(move || {
        let client = Client::new(ClientConfig::new(&uri).with_workers(3)).unwrap();
        let questions = client.locator("rabj/store/questions").unwrap();
        let mut descriptors: Vec<_> = (0..8)
            .map(|i| {
                questions
                    .child(&i.to_string())
                    .unwrap()
                    .descriptor(Method::GET, Params::new())
            })
            .collect();
        descriptors.insert(4, questions.child("broken").unwrap().descriptor(Method::GET, Params::new()));
        client.pool().submit_batch(descriptors)
    })
    .await
    .unwrap();

    assert_eq!(results.len(), 9);
    for (slot, result) in results.iter().enumerate() {
        if slot == 4 {
            let err = result.as_ref().unwrap_err();
            assert!(err.is_transport());
            assert_eq!(err.status(), Some(500));
            continue;
        }
        let n = if slot < 4 { slot } else { slot - 1 };
        let map = result.as_ref().unwrap().result().as_map().unwrap();
        assert_eq!(map.get_local("n"), Some(&json!(n)));
    }
}
