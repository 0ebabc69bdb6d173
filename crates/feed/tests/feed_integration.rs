use chrono::Utc;
use keiho_core::account::entity::BrokerCredential;
use keiho_core::market::error::MarketError;
use keiho_core::market::port::PriceSource;
use keiho_core::test_utils::MemAccountStore;
use keiho_feed::broker::BrokerProvider;
use keiho_feed::yahoo::YahooProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

fn install_crypto() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        // 已由同一测试进程中的其他用例安装
    }
}

/// # Summary
/// 启动只应答一次的本地 HTTP 服务，返回根地址与收到的原始请求。
async fn serve_once(status_line: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 4096];
        let n = socket.read(&mut buf).await.unwrap();
        let request = String::from_utf8_lossy(&buf[..n]).to_string();

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        tx.send(request).unwrap();
    });

    (format!("http://{}", addr), rx)
}

fn accounts_with_token(user_id: &str, token: &str) -> Arc<MemAccountStore> {
    let accounts = Arc::new(MemAccountStore::new());
    accounts.put_credential(BrokerCredential {
        user_id: user_id.to_string(),
        access_token: token.to_string(),
        account_id: "ACC-1".to_string(),
        updated_at: Utc::now(),
    });
    accounts
}

/// # Summary
/// 验证券商价格源携带 Bearer 令牌并正确解析报价。
#[tokio::test]
async fn test_broker_fetch_sends_bearer_token() {
    install_crypto();
    let (base, request_rx) = serve_once(
        "200 OK",
        r#"{"quotes":{"quote":{"symbol":"MNQ","last":12345.5,"high":12350.0,"low":12300.0}}}"#,
    )
    .await;

    let provider =
        BrokerProvider::new(&base, accounts_with_token("u1", "tok-123"), Duration::from_secs(5)).unwrap();
    let snap = provider.fetch("MNQ", "u1").await.unwrap();

    assert_eq!(snap.ticker, "MNQ");
    assert_eq!(snap.user_id, "u1");
    assert_eq!(snap.last, 12345.5);

    let request = request_rx.await.unwrap();
    assert!(request.starts_with("GET /v1/markets/quotes?symbols=MNQ"));
    assert!(request.to_lowercase().contains("authorization: bearer tok-123"));
}

/// # Summary
/// 验证 401 响应映射为凭证错误。
#[tokio::test]
async fn test_broker_unauthorized_maps_to_credential_error() {
    install_crypto();
    let (base, _rx) = serve_once("401 Unauthorized", r#"{"fault":"invalid token"}"#).await;

    let provider =
        BrokerProvider::new(&base, accounts_with_token("u1", "expired"), Duration::from_secs(5)).unwrap();
    let result = provider.fetch("MNQ", "u1").await;

    assert!(matches!(result, Err(MarketError::Credential(_))), "{:?}", result);
}

/// # Summary
/// 验证用户缺少凭证时不发起请求，直接返回凭证错误。
#[tokio::test]
async fn test_broker_missing_credential() {
    install_crypto();
    let accounts = Arc::new(MemAccountStore::new());
    let provider =
        BrokerProvider::new("http://127.0.0.1:9", accounts, Duration::from_secs(1)).unwrap();

    let result = provider.fetch("MNQ", "nobody").await;
    assert!(matches!(result, Err(MarketError::Credential(_))));
}

/// # Summary
/// 雅虎财经实时价格抓取的集成测试。
///
/// # Logic
/// 1. 初始化 YahooProvider。
/// 2. 抓取 AAPL 当前价格。
/// 3. 断言价格为正且最高价不低于最低价。
#[tokio::test]
#[ignore] // 依赖外网，手动运行
async fn test_yahoo_real_fetch() {
    install_crypto();
    if dotenvy::dotenv().is_err() {
        // 没有 .env 也可以运行
    }
    let provider = YahooProvider::new(Duration::from_secs(10)).unwrap();

    let result = provider.fetch("AAPL", "anonymous").await;
    assert!(
        result.is_ok(),
        "Failed to fetch real data from Yahoo: {:?}",
        result.err()
    );
    let snap = result.unwrap();
    println!("AAPL last = {}, high = {}, low = {}", snap.last, snap.high, snap.low);
    assert!(snap.last > 0.0);
    assert!(snap.high >= snap.low);
}
