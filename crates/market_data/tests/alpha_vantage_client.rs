use common::errors::FeedError;
use common::models::{Interval, OutputSize};
use market_data::PriceProvider;
use market_data::remote::AlphaVantageClient;
use mockito::{Matcher, Server};

const INTRADAY_BODY: &str = r#"{
    "Meta Data": { "2. Symbol": "AAPL", "4. Interval": "1min" },
    "Time Series (1min)": {
        "2024-05-17 19:59:00": {
            "1. open": "189.9850", "2. high": "190.1200", "3. low": "189.7100",
            "4. close": "189.8700", "5. volume": "2417"
        }
    }
}"#;

const DAILY_BODY: &str = r#"{
    "Meta Data": { "2. Symbol": "VZ" },
    "Time Series (Daily)": {
        "2024-05-15": {
            "1. open": "39.6000", "2. high": "39.9900", "3. low": "39.4500",
            "4. close": "39.8800", "5. volume": "15338402"
        },
        "2024-05-16": {
            "1. open": "39.9000", "2. high": "40.1700", "3. low": "39.7500",
            "4. close": "40.0200", "5. volume": "14220391"
        }
    }
}"#;

#[tokio::test]
async fn intraday_request_carries_interval_and_key() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/query")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("function".into(), "TIME_SERIES_INTRADAY".into()),
            Matcher::UrlEncoded("symbol".into(), "AAPL".into()),
            Matcher::UrlEncoded("interval".into(), "1min".into()),
            Matcher::UrlEncoded("outputsize".into(), "full".into()),
            Matcher::UrlEncoded("apikey".into(), "demo".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(INTRADAY_BODY)
        .create_async()
        .await;

    let client = AlphaVantageClient::new("demo", server.url()).unwrap();
    let rows = client
        .get_intraday("AAPL", Interval::OneMinute, OutputSize::Full)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].close.to_string(), "189.8700");
}

#[tokio::test]
async fn daily_request_returns_ascending_bars() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/query")
        .match_query(Matcher::UrlEncoded("function".into(), "TIME_SERIES_DAILY".into()))
        .with_status(200)
        .with_body(DAILY_BODY)
        .create_async()
        .await;

    let client = AlphaVantageClient::new("demo", server.url()).unwrap();
    let rows = client.get_daily("VZ", OutputSize::Compact).await.unwrap();

    assert_eq!(rows.len(), 2);
    assert!(rows[0].date_id < rows[1].date_id);
    assert!(rows.iter().all(|row| row.symbol == "VZ"));
}

#[tokio::test]
async fn rate_limit_status_is_transient() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/query")
        .match_query(Matcher::Any)
        .with_status(429)
        .create_async()
        .await;

    let client = AlphaVantageClient::new("demo", server.url()).unwrap();
    let err = client.get_daily("AAPL", OutputSize::Full).await.unwrap_err();

    assert!(err.is_transient());
}

#[tokio::test]
async fn rejected_key_is_a_configuration_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/query")
        .match_query(Matcher::Any)
        .with_status(403)
        .create_async()
        .await;

    let client = AlphaVantageClient::new("revoked", server.url()).unwrap();
    let err = client.get_daily("AAPL", OutputSize::Full).await.unwrap_err();

    assert!(matches!(err, FeedError::Configuration(_)));
}

#[tokio::test]
async fn error_message_body_flags_the_symbol() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/query")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"Error Message": "Invalid API call."}"#)
        .create_async()
        .await;

    let client = AlphaVantageClient::new("demo", server.url()).unwrap();
    let err = client
        .get_intraday("AABA", Interval::OneMinute, OutputSize::Full)
        .await
        .unwrap_err();

    assert!(err.is_symbol_scoped());
}

#[tokio::test]
async fn non_json_body_is_a_decode_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/query")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>maintenance</html>")
        .create_async()
        .await;

    let client = AlphaVantageClient::new("demo", server.url()).unwrap();
    let err = client.get_daily("C", OutputSize::Full).await.unwrap_err();

    assert!(matches!(err, FeedError::Decode { .. }));
}
