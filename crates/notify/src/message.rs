use chrono::SecondsFormat;
use keiho_core::alert::entity::Alert;
use keiho_core::trigger::entity::TriggerRecord;

/// # Summary
/// 一次触发对应的通知文本。
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    // 邮件主题
    pub subject: String,
    // 邮件正文（多行纯文本）
    pub body: String,
    // 单行短信文本
    pub sms: String,
}

/// # Summary
/// 根据预警与已落库的触发记录生成通知文本。
///
/// # Logic
/// 1. 主题：`[keiho] {ticker} {direction} {threshold}`。
/// 2. 正文逐行列出标的、方向、阈值、触发价、周期、触发时间（UTC，RFC 3339），
///    分类标签与备注仅在存在时输出。
/// 3. 短信为紧凑单行形式，带上标签。
///
/// # Arguments
/// * `alert` - 预警定义。
/// * `trigger_price` - 触发价格。
/// * `record` - 触发记录，提供触发时间。
pub fn render(alert: &Alert, trigger_price: f64, record: &TriggerRecord) -> RenderedMessage {
    let at = record
        .triggered_at
        .to_rfc3339_opts(SecondsFormat::Secs, true);

    let subject = format!(
        "[keiho] {} {} {}",
        alert.ticker, alert.direction, alert.threshold
    );

    let mut lines = vec![
        format!("Ticker: {}", alert.ticker),
        format!("Condition: price {} {}", alert.direction, alert.threshold),
        format!("Trigger price: {}", trigger_price),
        format!("Timeframe: {}", alert.timeframe),
        format!("Triggered at: {}", at),
    ];
    if let Some(tag) = &alert.tag {
        lines.push(format!("Band: {}", tag));
    }
    if let Some(note) = &alert.note {
        lines.push(format!("Note: {}", note));
    }
    let body = lines.join("\n");

    let mut sms = format!(
        "{} {} {} @ {} ({}, {})",
        alert.ticker, alert.direction, alert.threshold, trigger_price, alert.timeframe, at
    );
    if let Some(tag) = &alert.tag {
        sms.push_str(" [");
        sms.push_str(tag);
        sms.push(']');
    }

    RenderedMessage { subject, body, sms }
}
