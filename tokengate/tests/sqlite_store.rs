//! Durable store shared by several processes

#![cfg(feature = "sqlite")]

mod common;

use std::sync::Arc;

use axum::http::{header, HeaderValue};
use common::{harness_with_store, host, GOOD_CODE};
use tokengate::config::StoreSettings;
use tokengate::secrets::{RetryPolicy, SecretCache};
use tokengate::store::{self, Store};

fn settings(dir: &tempfile::TempDir) -> StoreSettings {
    let path = dir.path().join("tokengate.db");
    StoreSettings {
        database_url: format!("sqlite://{}", path.display()),
        max_attempts: 5,
        ..StoreSettings::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_separate_connections_agree_on_one_secret() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&dir);

    let mut stores: Vec<Arc<dyn Store>> = Vec::new();
    for _ in 0..3 {
        stores.push(store::open(&settings).await.unwrap());
    }

    let handles: Vec<_> = stores
        .into_iter()
        .map(|store| {
            let retry = RetryPolicy::from(&settings);
            tokio::spawn(async move {
                SecretCache::new(store, retry)
                    .token_secret()
                    .await
                    .map(|secret| *secret.as_bytes())
            })
        })
        .collect();

    let mut secrets = Vec::new();
    for handle in handles {
        secrets.push(handle.await.unwrap().unwrap());
    }
    assert!(secrets.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn test_token_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(&dir);

    let first = harness_with_store(store::open(&settings).await.unwrap()).await;
    let (name, value) = host();
    let callback = first
        .server
        .get("/Auth/OAuth2Callback")
        .add_header(name.clone(), value.clone())
        .add_query_param("code", GOOD_CODE)
        .add_query_param("state", "/games")
        .await;
    let location = callback.header(header::LOCATION);
    let location = url::Url::parse(location.to_str().unwrap()).unwrap();
    let token = location
        .query_pairs()
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .unwrap();
    drop(first);

    let second = harness_with_store(store::open(&settings).await.unwrap()).await;
    let response = second
        .server
        .get("/Auth/Me")
        .add_header(name, value)
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        )
        .await;
    response.assert_status_ok();

    let stored = tokengate::identity::Identity::load(second.state.store(), "108")
        .await
        .unwrap();
    assert!(stored.is_some());
}
