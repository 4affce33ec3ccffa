//! The full chain against a real HTTP server, using the default transport.

use std::sync::Arc;

use http::HeaderName;
use http::HeaderValue;
use http::Uri;
use serde_json::json;
use serde_json_bytes::json as bjson;
use test_log::test;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

use apollo_client_core::interceptors::HeaderInterceptor;
use apollo_client_core::test_harness::drain;
use apollo_client_core::test_harness::MockStore;
use apollo_client_core::FetchBehavior;
use apollo_client_core::ReqwestTransport;
use apollo_client_core::Request;
use apollo_client_core::RequestChain;
use apollo_client_core::RequestError;
use apollo_client_core::Source;

fn endpoint_of(server: &MockServer) -> Uri {
    format!("{}/graphql", server.uri())
        .parse()
        .expect("the mock server uri is valid")
}

#[test(tokio::test)]
async fn round_trips_a_json_response_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("content-type", "application/json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "me": { "id": "1" } } })),
        )
        .mount(&server)
        .await;

    let store = Arc::new(MockStore::new());
    let chain = RequestChain::builder(store.clone(), Arc::new(ReqwestTransport::new())).build();
    let request = Request::builder()
        .query("{ me { id } }")
        .endpoint(endpoint_of(&server))
        .fetch_behavior(FetchBehavior::NETWORK_ONLY)
        .build()
        .unwrap();

    let (responses, error) = drain(chain.kickoff(request.clone())).await;
    assert!(error.is_none());
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].source, Source::Server);
    assert_eq!(
        responses[0].body.data,
        Some(bjson!({ "me": { "id": "1" } })),
    );
    // The emission was persisted on its way out.
    assert_eq!(store.write_count(), 1);
    assert!(store.written(&request).is_some());
}

#[test(tokio::test)]
async fn http_interceptors_shape_what_the_server_receives() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("x-api-key", "letmein"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let chain = RequestChain::builder(
        Arc::new(MockStore::new()),
        Arc::new(ReqwestTransport::new()),
    )
    .http_interceptor(Arc::new(HeaderInterceptor::new().insert(
        HeaderName::from_static("x-api-key"),
        HeaderValue::from_static("letmein"),
    )))
    .build();
    let request = Request::builder()
        .query("{ me { id } }")
        .endpoint(endpoint_of(&server))
        .fetch_behavior(FetchBehavior::NETWORK_ONLY)
        .build()
        .unwrap();

    let (responses, error) = drain(chain.kickoff(request)).await;
    assert!(error.is_none());
    assert_eq!(responses.len(), 1);
}

#[test(tokio::test)]
async fn non_graphql_error_statuses_surface_as_transport_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let chain = RequestChain::builder(
        Arc::new(MockStore::new()),
        Arc::new(ReqwestTransport::new()),
    )
    .build();
    let request = Request::builder()
        .query("{ me { id } }")
        .endpoint(endpoint_of(&server))
        .fetch_behavior(FetchBehavior::NETWORK_ONLY)
        .build()
        .unwrap();

    let (responses, error) = drain(chain.kickoff(request)).await;
    assert!(responses.is_empty());
    assert!(matches!(
        error,
        Some(RequestError::Transport {
            status: Some(500),
            ..
        }),
    ));
}

#[test(tokio::test)]
async fn graphql_bodies_on_error_statuses_are_still_emissions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{ "message": "PersistedQueryNotFound" }],
        })))
        .mount(&server)
        .await;

    let chain = RequestChain::builder(
        Arc::new(MockStore::new()),
        Arc::new(ReqwestTransport::new()),
    )
    .build();
    let request = Request::builder()
        .query("{ me { id } }")
        .endpoint(endpoint_of(&server))
        .fetch_behavior(FetchBehavior::NETWORK_ONLY)
        .build()
        .unwrap();

    let (responses, error) = drain(chain.kickoff(request)).await;
    assert!(error.is_none());
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].body.errors[0].message, "PersistedQueryNotFound");
}

#[test(tokio::test)]
async fn an_unreachable_endpoint_is_a_transport_error_without_a_status() {
    let chain = RequestChain::builder(
        Arc::new(MockStore::new()),
        Arc::new(ReqwestTransport::new()),
    )
    .build();
    // Nothing listens on this port.
    let request = Request::builder()
        .query("{ me { id } }")
        .endpoint(Uri::from_static("http://127.0.0.1:9/graphql"))
        .fetch_behavior(FetchBehavior::NETWORK_ONLY)
        .build()
        .unwrap();

    let (responses, error) = drain(chain.kickoff(request)).await;
    assert!(responses.is_empty());
    assert!(matches!(
        error,
        Some(RequestError::Transport { status: None, .. }),
    ));
}
