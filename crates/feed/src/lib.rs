//! # `keiho-feed` - 价格源适配器
//!
//! `PriceSource` 端口的 HTTP 实现：
//! - [`broker::BrokerProvider`]：券商报价接口，按用户凭证鉴权。
//! - [`yahoo::YahooProvider`]：Yahoo 公共图表接口，无需凭证。

pub mod broker;
pub mod yahoo;

/// 将非有限值视为缺失
pub(crate) fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}
