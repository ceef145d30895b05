use crate::config::AlipayConfig;
use crate::error::{AppError, AppResult};
use crate::utils::cents_to_yuan;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{Duration, Utc};
use reqwest::Client;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::collections::BTreeMap;

pub const METHOD_PAGE_PAY: &str = "alipay.trade.page.pay";
pub const METHOD_TRADE_QUERY: &str = "alipay.trade.query";
/// 未支付订单在支付宝侧的关闭时间
pub const PAY_TIMEOUT_MINUTES: i64 = 30;

/// 支付宝交易状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeStatus {
    WaitBuyerPay,
    TradeSuccess,
    TradeFinished,
    TradeClosed,
    Unknown(String),
}

impl TradeStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "WAIT_BUYER_PAY" => TradeStatus::WaitBuyerPay,
            "TRADE_SUCCESS" => TradeStatus::TradeSuccess,
            "TRADE_FINISHED" => TradeStatus::TradeFinished,
            "TRADE_CLOSED" => TradeStatus::TradeClosed,
            other => TradeStatus::Unknown(other.to_string()),
        }
    }

    /// 买家已付款（TRADE_FINISHED 为不可退款的完结状态，同样视为已支付）
    pub fn is_paid(&self) -> bool {
        matches!(self, TradeStatus::TradeSuccess | TradeStatus::TradeFinished)
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeStatus::WaitBuyerPay => write!(f, "WAIT_BUYER_PAY"),
            TradeStatus::TradeSuccess => write!(f, "TRADE_SUCCESS"),
            TradeStatus::TradeFinished => write!(f, "TRADE_FINISHED"),
            TradeStatus::TradeClosed => write!(f, "TRADE_CLOSED"),
            TradeStatus::Unknown(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PagePayRequest {
    pub out_trade_no: String,
    pub amount_cents: i64,
    pub subject: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeQueryResult {
    /// 买家尚未扫码或登录，支付宝侧还没有这笔交易
    NotExist,
    Found {
        trade_no: Option<String>,
        trade_status: TradeStatus,
        total_amount: Option<String>,
    },
}

/// 支付网关抽象，便于在测试中替换支付宝实现
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// 商户应用 ID，异步通知中的 app_id 必须与之一致
    fn app_id(&self) -> &str;

    /// 生成电脑网站支付的跳转地址
    fn page_pay_url(&self, req: &PagePayRequest) -> AppResult<String>;

    /// 校验异步通知签名
    fn verify_notify(&self, params: &BTreeMap<String, String>) -> bool;

    /// 主动查询交易状态
    async fn query_trade(&self, out_trade_no: &str) -> AppResult<TradeQueryResult>;
}

#[derive(Debug, Deserialize)]
struct TradeQueryEnvelope {
    alipay_trade_query_response: TradeQueryResponse,
}

#[derive(Debug, Deserialize)]
struct TradeQueryResponse {
    code: String,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    sub_code: Option<String>,
    #[serde(default)]
    sub_msg: Option<String>,
    #[serde(default)]
    trade_no: Option<String>,
    #[serde(default)]
    trade_status: Option<String>,
    #[serde(default)]
    total_amount: Option<String>,
}

#[derive(Clone)]
pub struct AlipayClient {
    client: Client,
    config: AlipayConfig,
    private_key: RsaPrivateKey,
    alipay_public_key: RsaPublicKey,
}

impl AlipayClient {
    pub fn new(config: AlipayConfig) -> AppResult<Self> {
        if config.app_id.is_empty() {
            return Err(AppError::ConfigError("alipay.app_id is empty".to_string()));
        }
        let private_key = parse_private_key(&config.private_key)?;
        let alipay_public_key = parse_public_key(&config.alipay_public_key)?;
        Ok(Self {
            client: Client::new(),
            config,
            private_key,
            alipay_public_key,
        })
    }

    /// RSA2 (SHA256withRSA) 签名，结果为 base64
    pub fn sign(&self, content: &str) -> String {
        let signing_key = SigningKey::<Sha256>::new(self.private_key.clone());
        let signature = signing_key.sign(content.as_bytes());
        STANDARD.encode(signature.to_bytes())
    }

    fn verify(&self, content: &str, sign_b64: &str) -> bool {
        let Ok(raw) = STANDARD.decode(sign_b64.trim()) else {
            return false;
        };
        let Ok(signature) = Signature::try_from(raw.as_slice()) else {
            return false;
        };
        let verifying_key = VerifyingKey::<Sha256>::new(self.alipay_public_key.clone());
        verifying_key.verify(content.as_bytes(), &signature).is_ok()
    }

    /// 公共请求参数 + biz_content，并附上签名
    fn signed_params(
        &self,
        method: &str,
        biz_content: serde_json::Value,
        with_urls: bool,
    ) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("app_id".to_string(), self.config.app_id.clone());
        params.insert("method".to_string(), method.to_string());
        params.insert("format".to_string(), "JSON".to_string());
        params.insert("charset".to_string(), "utf-8".to_string());
        params.insert("sign_type".to_string(), "RSA2".to_string());
        params.insert("timestamp".to_string(), beijing_timestamp());
        params.insert("version".to_string(), "1.0".to_string());
        if with_urls {
            params.insert("notify_url".to_string(), self.config.notify_url.clone());
            if let Some(return_url) = &self.config.return_url {
                params.insert("return_url".to_string(), return_url.clone());
            }
        }
        params.insert("biz_content".to_string(), biz_content.to_string());

        let sign = self.sign(&sign_content(&params, &["sign"]));
        params.insert("sign".to_string(), sign);
        params
    }
}

#[async_trait]
impl PaymentGateway for AlipayClient {
    fn app_id(&self) -> &str {
        &self.config.app_id
    }

    fn page_pay_url(&self, req: &PagePayRequest) -> AppResult<String> {
        let mut biz = json!({
            "out_trade_no": req.out_trade_no,
            "product_code": "FAST_INSTANT_TRADE_PAY",
            "total_amount": cents_to_yuan(req.amount_cents),
            "subject": req.subject,
            "timeout_express": format!("{PAY_TIMEOUT_MINUTES}m"),
        });
        if let Some(body) = &req.body {
            biz["body"] = json!(body);
        }

        let params = self.signed_params(METHOD_PAGE_PAY, biz, true);
        let url = url::Url::parse_with_params(&self.config.gateway, params.iter())
            .map_err(|e| AppError::ConfigError(format!("invalid alipay gateway: {e}")))?;
        Ok(url.to_string())
    }

    fn verify_notify(&self, params: &BTreeMap<String, String>) -> bool {
        let Some(sign) = params.get("sign") else {
            return false;
        };
        self.verify(&sign_content(params, &["sign", "sign_type"]), sign)
    }

    async fn query_trade(&self, out_trade_no: &str) -> AppResult<TradeQueryResult> {
        let params = self.signed_params(
            METHOD_TRADE_QUERY,
            json!({ "out_trade_no": out_trade_no }),
            false,
        );

        let response = self
            .client
            .post(&self.config.gateway)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "未知错误".to_string());
            return Err(AppError::ExternalApiError(format!(
                "查询支付宝交易失败: {error_text}"
            )));
        }

        let envelope: TradeQueryEnvelope = response.json().await?;
        interpret_trade_query(envelope.alipay_trade_query_response)
    }
}

fn interpret_trade_query(resp: TradeQueryResponse) -> AppResult<TradeQueryResult> {
    match resp.code.as_str() {
        "10000" => Ok(TradeQueryResult::Found {
            trade_no: resp.trade_no,
            trade_status: TradeStatus::parse(resp.trade_status.as_deref().unwrap_or("")),
            total_amount: resp.total_amount,
        }),
        "40004" if resp.sub_code.as_deref() == Some("ACQ.TRADE_NOT_EXIST") => {
            Ok(TradeQueryResult::NotExist)
        }
        code => Err(AppError::ExternalApiError(format!(
            "支付宝返回错误 {code}: {}",
            resp.sub_msg.or(resp.msg).unwrap_or_default()
        ))),
    }
}

/// 待签名字符串：按 key 字典序拼接 key=value，跳过空值与 excluded 中的 key
pub fn sign_content(params: &BTreeMap<String, String>, excluded: &[&str]) -> String {
    params
        .iter()
        .filter(|(k, v)| !v.is_empty() && !excluded.contains(&k.as_str()))
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn beijing_timestamp() -> String {
    (Utc::now() + Duration::hours(8))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// 支付宝开放平台下载的密钥常为去掉 PEM 头尾的单行 base64
fn strip_pem(raw: &str) -> AppResult<Vec<u8>> {
    let body: String = raw
        .lines()
        .filter(|l| !l.starts_with("-----"))
        .collect::<String>()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    STANDARD
        .decode(body)
        .map_err(|e| AppError::ConfigError(format!("invalid key encoding: {e}")))
}

fn parse_private_key(raw: &str) -> AppResult<RsaPrivateKey> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::ConfigError("alipay.private_key is empty".to_string()));
    }
    let der = strip_pem(raw)?;
    RsaPrivateKey::from_pkcs8_der(&der)
        .or_else(|_| RsaPrivateKey::from_pkcs1_der(&der))
        .map_err(|e| AppError::ConfigError(format!("invalid alipay private key: {e}")))
}

fn parse_public_key(raw: &str) -> AppResult<RsaPublicKey> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::ConfigError(
            "alipay.alipay_public_key is empty".to_string(),
        ));
    }
    let der = strip_pem(raw)?;
    RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| AppError::ConfigError(format!("invalid alipay public key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

    static TEST_KEYS: std::sync::OnceLock<(String, String)> = std::sync::OnceLock::new();

    /// 用同一对密钥充当应用私钥与支付宝公钥，便于自签自验
    fn test_config() -> AlipayConfig {
        let (private_pem, public_pem) = TEST_KEYS.get_or_init(|| {
            let mut rng = rand::thread_rng();
            let private_key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
            let public_key = RsaPublicKey::from(&private_key);
            (
                private_key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string(),
                public_key.to_public_key_pem(LineEnding::LF).unwrap(),
            )
        });
        AlipayConfig {
            app_id: "2021000000000001".to_string(),
            private_key: private_pem.clone(),
            alipay_public_key: public_pem.clone(),
            gateway: "https://openapi-sandbox.dl.alipaydev.com/gateway.do".to_string(),
            notify_url: "https://aifans.example.com/api/payments/alipay/notify".to_string(),
            return_url: Some("https://aifans.example.com/membership/result".to_string()),
        }
    }

    fn signed_notify(client: &AlipayClient, trade_status: &str) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("notify_id".to_string(), "n-1".to_string());
        params.insert("out_trade_no".to_string(), "AF20261019120000000001".to_string());
        params.insert("trade_no".to_string(), "2026101922001".to_string());
        params.insert("trade_status".to_string(), trade_status.to_string());
        params.insert("total_amount".to_string(), "30.00".to_string());
        params.insert("sign_type".to_string(), "RSA2".to_string());
        let sign = client.sign(&sign_content(&params, &["sign", "sign_type"]));
        params.insert("sign".to_string(), sign);
        params
    }

    #[test]
    fn test_sign_content_sorted_and_filtered() {
        let mut params = BTreeMap::new();
        params.insert("b".to_string(), "2".to_string());
        params.insert("a".to_string(), "1".to_string());
        params.insert("empty".to_string(), String::new());
        params.insert("sign".to_string(), "xxx".to_string());
        params.insert("sign_type".to_string(), "RSA2".to_string());
        assert_eq!(sign_content(&params, &["sign"]), "a=1&b=2&sign_type=RSA2");
        assert_eq!(sign_content(&params, &["sign", "sign_type"]), "a=1&b=2");
    }

    #[test]
    fn test_trade_status_parse() {
        assert!(TradeStatus::parse("TRADE_SUCCESS").is_paid());
        assert!(TradeStatus::parse("TRADE_FINISHED").is_paid());
        assert!(!TradeStatus::parse("TRADE_CLOSED").is_paid());
        assert_eq!(
            TradeStatus::parse("SOMETHING"),
            TradeStatus::Unknown("SOMETHING".to_string())
        );
    }

    #[test]
    fn test_verify_notify() {
        let client = AlipayClient::new(test_config()).unwrap();
        let params = signed_notify(&client, "TRADE_SUCCESS");
        assert!(client.verify_notify(&params));

        let mut tampered = params.clone();
        tampered.insert("total_amount".to_string(), "0.01".to_string());
        assert!(!client.verify_notify(&tampered));

        let mut unsigned = params;
        unsigned.remove("sign");
        assert!(!client.verify_notify(&unsigned));
    }

    #[test]
    fn test_page_pay_url_is_signed() {
        let client = AlipayClient::new(test_config()).unwrap();
        let url = client
            .page_pay_url(&PagePayRequest {
                out_trade_no: "AF20261019120000000001".to_string(),
                amount_cents: 3000,
                subject: "月度会员".to_string(),
                body: None,
            })
            .unwrap();
        assert!(url.starts_with("https://openapi-sandbox.dl.alipaydev.com/gateway.do?"));

        let parsed = url::Url::parse(&url).unwrap();
        let params: BTreeMap<String, String> = parsed.query_pairs().into_owned().collect();
        assert_eq!(params["method"], METHOD_PAGE_PAY);
        assert_eq!(params["sign_type"], "RSA2");
        let biz: serde_json::Value = serde_json::from_str(&params["biz_content"]).unwrap();
        assert_eq!(biz["total_amount"], "30.00");
        assert_eq!(biz["product_code"], "FAST_INSTANT_TRADE_PAY");

        // 请求签名覆盖 sign_type，只排除 sign
        let content = sign_content(&params, &["sign"]);
        assert!(client.verify(&content, &params["sign"]));
    }

    #[test]
    fn test_bare_base64_keys_accepted() {
        let mut config = test_config();
        config.private_key = config
            .private_key
            .lines()
            .filter(|l| !l.starts_with("-----"))
            .collect::<String>();
        assert!(AlipayClient::new(config).is_ok());
    }

    #[test]
    fn test_missing_keys_rejected() {
        let mut config = test_config();
        config.alipay_public_key = String::new();
        assert!(matches!(
            AlipayClient::new(config),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn test_interpret_trade_query() {
        let found = interpret_trade_query(TradeQueryResponse {
            code: "10000".to_string(),
            msg: Some("Success".to_string()),
            sub_code: None,
            sub_msg: None,
            trade_no: Some("2026".to_string()),
            trade_status: Some("TRADE_SUCCESS".to_string()),
            total_amount: Some("30.00".to_string()),
        })
        .unwrap();
        assert!(matches!(
            found,
            TradeQueryResult::Found { trade_status: TradeStatus::TradeSuccess, .. }
        ));

        let missing = interpret_trade_query(TradeQueryResponse {
            code: "40004".to_string(),
            msg: Some("Business Failed".to_string()),
            sub_code: Some("ACQ.TRADE_NOT_EXIST".to_string()),
            sub_msg: Some("交易不存在".to_string()),
            trade_no: None,
            trade_status: None,
            total_amount: None,
        })
        .unwrap();
        assert_eq!(missing, TradeQueryResult::NotExist);

        let err = interpret_trade_query(TradeQueryResponse {
            code: "20001".to_string(),
            msg: Some("Insufficient Token Permissions".to_string()),
            sub_code: None,
            sub_msg: None,
            trade_no: None,
            trade_status: None,
            total_amount: None,
        });
        assert!(matches!(err, Err(AppError::ExternalApiError(_))));
    }
}
