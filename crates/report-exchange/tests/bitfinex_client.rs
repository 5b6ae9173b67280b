//! Bitfinex 커넥터 HTTP 통합 테스트 (mockito).

use mockito::Matcher;
use report_core::{Credential, FetchParams, SyncMethod};
use report_exchange::{BitfinexClient, BitfinexConfig, RemoteDataSource, RemoteError};
use serde_json::json;

fn client_for(server: &mockito::ServerGuard) -> BitfinexClient {
    BitfinexClient::new(BitfinexConfig {
        rest_url: server.url(),
        timeout_secs: 5,
    })
    .expect("client")
}

fn params() -> FetchParams {
    FetchParams {
        start: 0,
        end: 1_600_000_000_000,
        limit: Some(2),
    }
}

#[tokio::test]
async fn test_ledgers_are_signed_and_transformed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v2/auth/r/ledgers/hist")
        .match_header("bfx-apikey", "key")
        .match_header("bfx-nonce", Matcher::Regex(r"^\d+$".to_string()))
        .match_header("bfx-signature", Matcher::Regex(r"^[0-9a-f]{96}$".to_string()))
        .match_body(Matcher::Json(json!({"start": 0, "end": 1_600_000_000_000i64, "limit": 2})))
        .with_status(200)
        .with_body(
            json!([
                [2, "USD", "exchange", 1_500_000_000_002i64, null, 5.0, 10.0, null, "Deposit"],
                [1, "BTC", "exchange", 1_500_000_000_001i64, null, 1.0, 1.0, null, "Trade"]
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let rows = client_for(&server)
        .fetch(SyncMethod::Ledgers, &Credential::new("key", "secret"), &params())
        .await
        .expect("ledgers");

    mock.assert_async().await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["mts"], json!(1_500_000_000_002i64));
    assert_eq!(rows[1]["currency"], json!("BTC"));
}

#[tokio::test]
async fn test_http_429_is_rate_limit() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v2/auth/r/trades/hist")
        .with_status(429)
        .with_body("[\"error\",11010,\"ratelimit: error\"]")
        .create_async()
        .await;

    let err = client_for(&server)
        .fetch(SyncMethod::Trades, &Credential::new("key", "secret"), &params())
        .await
        .unwrap_err();

    assert!(err.is_rate_limit());
}

#[tokio::test]
async fn test_error_payload_is_classified() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v2/auth/r/orders/hist")
        .with_status(500)
        .with_body("[\"error\",10114,\"nonce: small\"]")
        .create_async()
        .await;
    server
        .mock("POST", "/v2/auth/r/movements/hist")
        .with_status(500)
        .with_body("[\"error\",10100,\"apikey: invalid\"]")
        .create_async()
        .await;

    let client = client_for(&server);
    let auth = Credential::new("key", "secret");

    let err = client.fetch(SyncMethod::Orders, &auth, &params()).await.unwrap_err();
    assert!(err.is_nonce_too_small());

    let err = client.fetch(SyncMethod::Movements, &auth, &params()).await.unwrap_err();
    assert!(matches!(err, RemoteError::Unauthorized(_)));
}

#[tokio::test]
async fn test_public_symbols_and_currencies() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v2/conf/pub:list:pair:exchange")
        .with_status(200)
        .with_body("[[\"BTCUSD\",\"ETHUSD\"]]")
        .create_async()
        .await;
    server
        .mock("GET", "/v2/conf/pub:map:currency:label")
        .with_status(200)
        .with_body("[[[\"BTC\",\"Bitcoin\"],[\"ETH\",\"Ethereum\"]]]")
        .create_async()
        .await;

    let client = client_for(&server);
    let auth = Credential::new("", "");

    let symbols = client.fetch(SyncMethod::Symbols, &auth, &params()).await.unwrap();
    assert_eq!(symbols, vec![json!("BTCUSD"), json!("ETHUSD")]);

    let currencies = client.fetch(SyncMethod::Currencies, &auth, &params()).await.unwrap();
    assert_eq!(currencies[1], json!({"id": "ETH", "name": "Ethereum"}));
}
