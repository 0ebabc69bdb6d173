use keiho_core::config::{EmailConfig, SmsConfig};
use keiho_core::notify::error::NotifyError;
use keiho_core::notify::port::{Channel, Notifier};
use keiho_notify::email::EmailNotifier;
use keiho_notify::sms::SmsNotifier;
use std::env;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

fn install_crypto() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        // 已安装
    }
}

/// # Summary
/// 本地单次应答的短信网关，读到完整请求体后回写固定响应。
async fn fake_gateway(status_line: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_string();
            if let Some(split) = text.find("\r\n\r\n") {
                let length = text[..split]
                    .lines()
                    .find_map(|l| {
                        l.to_lowercase()
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if request.len() >= split + 4 + length {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
            status_line
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        tx.send(String::from_utf8_lossy(&request).to_string()).unwrap();
    });

    (format!("http://{}/send", addr), rx)
}

fn sms_config(url: String) -> SmsConfig {
    SmsConfig {
        gateway_url: url,
        api_key: "key-1".into(),
        sender: "+15550000000".into(),
    }
}

/// # Summary
/// 验证短信通知器的请求格式：Bearer 鉴权与 `{to, from, message}` 请求体。
#[tokio::test]
async fn test_sms_notifier_posts_payload() {
    install_crypto();
    let (url, request_rx) = fake_gateway("200 OK").await;
    let notifier = SmsNotifier::new(&sms_config(url), Duration::from_secs(5)).unwrap();
    assert_eq!(notifier.channel(), Channel::Sms);

    notifier
        .notify("+15551234567", "ignored subject", "MNQ above 12345 @ 12345.5")
        .await
        .unwrap();

    let request = request_rx.await.unwrap();
    assert!(request.starts_with("POST /send"));
    assert!(request.to_lowercase().contains("authorization: bearer key-1"));
    let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(json["to"], "+15551234567");
    assert_eq!(json["from"], "+15550000000");
    assert_eq!(json["message"], "MNQ above 12345 @ 12345.5");
}

/// # Summary
/// 验证网关返回 5xx 时映射为平台错误。
#[tokio::test]
async fn test_sms_notifier_gateway_error() {
    install_crypto();
    let (url, _rx) = fake_gateway("503 Service Unavailable").await;
    let notifier = SmsNotifier::new(&sms_config(url), Duration::from_secs(5)).unwrap();

    let result = notifier.notify("+15551234567", "", "hello").await;
    assert!(matches!(result, Err(NotifyError::Platform(_))), "{:?}", result);
}

#[test]
fn test_sms_notifier_rejects_empty_gateway() {
    let result = SmsNotifier::new(&sms_config(String::new()), Duration::from_secs(1));
    assert!(matches!(result, Err(NotifyError::Config(_))));
}

/// # Summary
/// 集成测试：验证 Email 通知发送功能。
///
/// # Logic
/// 1. 加载 .env 环境变量。
/// 2. 从环境变量获取 SMTP 服务器配置。
/// 3. 初始化 EmailNotifier。
/// 4. 发送测试邮件并断言结果。
#[tokio::test]
#[ignore] // 默认忽略，仅在手动测试时通过环境变量开启
async fn test_email_notification() {
    install_crypto();
    if dotenvy::dotenv().is_err() {
        // 允许直接使用进程环境变量
    }
    let config = EmailConfig {
        host: env::var("KEIHO_EMAIL_HOST").expect("KEIHO_EMAIL_HOST must be set"),
        user: env::var("KEIHO_EMAIL_USER").expect("KEIHO_EMAIL_USER must be set"),
        pass: env::var("KEIHO_EMAIL_PASS").expect("KEIHO_EMAIL_PASS must be set"),
        from: env::var("KEIHO_EMAIL_FROM").expect("KEIHO_EMAIL_FROM must be set"),
    };
    let to = env::var("KEIHO_EMAIL_TO").expect("KEIHO_EMAIL_TO must be set");

    let notifier = EmailNotifier::new(&config).unwrap();
    let result = notifier
        .notify(&to, "[keiho] 测试", "这是一条来自 Email 集成测试的消息")
        .await;

    assert!(result.is_ok(), "Email notification failed: {:?}", result);
}
