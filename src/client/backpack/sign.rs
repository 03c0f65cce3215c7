//! Backpack 请求签名
//!
//! 签名原文为 `instruction=<指令>&<按键名字节序排列的参数>&timestamp=<毫秒>&window=<毫秒>`，
//! 使用 ed25519 私钥签名后 base64 编码。服务端用相同规则重算原文，任何顺序或格式差异都会导致验签失败。

use crate::Timestamp;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD_ENGINE};
use bytestring::ByteString;
use ed25519_dalek::{
    PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH, Signer, SigningKey, VerifyingKey,
};
use eyre::{Result, WrapErr, bail, eyre};
use itertools::Itertools;
use serde::{Serialize, Serializer};
use std::{collections::BTreeMap, fmt, iter};

/// 参数值。签名原文、查询字符串和请求体都从同一个值渲染，保证三者一致。
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(ByteString),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(value) => f.write_str(value),
            ParamValue::Int(value) => f.write_str(itoa::Buffer::new().format(*value)),
            // f64 的 Display 是最短的十进制表示：20.33 -> "20.33"，100.0 -> "100"
            ParamValue::Float(value) => write!(f, "{value}"),
            ParamValue::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ParamValue::Str(value) => serializer.serialize_str(value),
            ParamValue::Int(value) => serializer.serialize_i64(*value),
            // 小数以字符串提交，和签名原文使用同一文本
            ParamValue::Float(_) => serializer.collect_str(self),
            ParamValue::Bool(value) => serializer.serialize_bool(*value),
        }
    }
}

impl From<&'static str> for ParamValue {
    fn from(value: &'static str) -> Self {
        ParamValue::Str(ByteString::from_static(value))
    }
}

impl From<ByteString> for ParamValue {
    fn from(value: ByteString) -> Self {
        ParamValue::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

/// 请求参数，按键名的字节序排列
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<&'static str, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &'static str, value: impl Into<ParamValue>) -> Self {
        self.0.insert(key, value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ParamValue)> {
        self.0.iter().map(|(key, value)| (*key, value))
    }
}

/// 构造待签名的原文
pub fn canonical_string(
    instruction: &str,
    params: &Params,
    timestamp: Timestamp,
    window: u64,
) -> String {
    iter::once(format!("instruction={instruction}"))
        .chain(params.iter().map(|(key, value)| format!("{key}={value}")))
        .chain([format!("timestamp={timestamp}"), format!("window={window}")])
        .join("&")
}

/// API 凭证。`api_key` 是 base64 编码的 ed25519 公钥，`api_secret` 是 base64 编码的 32 字节种子。
#[derive(Clone)]
pub struct Credentials {
    api_key: ByteString,
    signing_key: SigningKey,
}

impl Credentials {
    /// 解码并校验凭证：长度必须正确，且公钥必须与种子推导出的公钥一致。
    pub fn from_base64(api_key: &str, api_secret: &str) -> Result<Self> {
        let api_key = api_key.trim();

        let seed = BASE64_STANDARD_ENGINE
            .decode(api_secret.trim())
            .wrap_err("api_secret is not valid base64")?;
        let public_key = BASE64_STANDARD_ENGINE
            .decode(api_key)
            .wrap_err("api_key is not valid base64")?;

        let seed: [u8; SECRET_KEY_LENGTH] = seed.as_slice().try_into().map_err(|_| {
            eyre!(
                "api_secret must decode to {SECRET_KEY_LENGTH} bytes, got {}",
                seed.len()
            )
        })?;
        let public_key: [u8; PUBLIC_KEY_LENGTH] =
            public_key.as_slice().try_into().map_err(|_| {
                eyre!(
                    "api_key must decode to {PUBLIC_KEY_LENGTH} bytes, got {}",
                    public_key.len()
                )
            })?;

        let signing_key = SigningKey::from_bytes(&seed);
        if signing_key.verifying_key().to_bytes() != public_key {
            bail!("api_key does not match the public key derived from api_secret");
        }

        Ok(Self {
            api_key: ByteString::from(api_key),
            signing_key,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// 签名任意原文，返回 base64 编码的签名
    pub fn sign(&self, message: &str) -> String {
        let signature = self.signing_key.sign(message.as_bytes());

        BASE64_STANDARD_ENGINE.encode(signature.to_bytes())
    }

    pub fn sign_request(
        &self,
        instruction: &str,
        params: &Params,
        timestamp: Timestamp,
        window: u64,
    ) -> String {
        self.sign(&canonical_string(instruction, params, timestamp, window))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("signing_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};

    pub(crate) fn test_credentials() -> Credentials {
        let seed = [7_u8; SECRET_KEY_LENGTH];
        let public_key = SigningKey::from_bytes(&seed).verifying_key();

        Credentials::from_base64(
            &BASE64_STANDARD_ENGINE.encode(public_key.to_bytes()),
            &BASE64_STANDARD_ENGINE.encode(seed),
        )
        .unwrap()
    }

    #[test]
    fn canonical_string_without_params() {
        let s = canonical_string("balanceQuery", &Params::new(), 1_700_000_000_000, 500_000);

        assert_eq!(
            s,
            "instruction=balanceQuery&timestamp=1700000000000&window=500000"
        );
    }

    #[test]
    fn canonical_string_sorts_keys() {
        let params = Params::new()
            .with("symbol", "SOL_USDC")
            .with("clientId", ParamValue::Str("5".into()));

        let s = canonical_string("orderQuery", &params, 1, 2);

        assert_eq!(
            s,
            "instruction=orderQuery&clientId=5&symbol=SOL_USDC&timestamp=1&window=2"
        );
    }

    #[test]
    fn canonical_values_render_in_exchange_form() {
        let params = Params::new()
            .with("clientId", 42_u32)
            .with("postOnly", true)
            .with("price", 20.33)
            .with("quantity", 100.0)
            .with("side", "Bid");

        let s = canonical_string("orderExecute", &params, 1, 2);

        assert_eq!(
            s,
            "instruction=orderExecute&clientId=42&postOnly=true&price=20.33&quantity=100&side=Bid&timestamp=1&window=2"
        );
    }

    #[test]
    fn body_uses_the_same_text_as_signature() {
        let params = Params::new()
            .with("clientId", 3_u32)
            .with("postOnly", false)
            .with("price", 19.98)
            .with("symbol", "SOL_USDC");

        let body = simd_json::serde::to_string(&params).unwrap();

        assert_eq!(
            body,
            r#"{"clientId":3,"postOnly":false,"price":"19.98","symbol":"SOL_USDC"}"#
        );
    }

    #[test]
    fn signature_is_deterministic_and_verifies() {
        let credentials = test_credentials();
        let params = Params::new().with("symbol", "SOL_USDC");

        let first = credentials.sign_request("orderCancelAll", &params, 1_700_000_000_000, 5000);
        let second = credentials.sign_request("orderCancelAll", &params, 1_700_000_000_000, 5000);
        assert_eq!(first, second);

        let bytes: [u8; 64] = BASE64_STANDARD_ENGINE
            .decode(&first)
            .unwrap()
            .try_into()
            .unwrap();
        let message = canonical_string("orderCancelAll", &params, 1_700_000_000_000, 5000);
        credentials
            .verifying_key()
            .verify(message.as_bytes(), &Signature::from_bytes(&bytes))
            .unwrap();

        let other = credentials.sign_request("orderCancelAll", &params, 1_700_000_000_001, 5000);
        assert_ne!(first, other);
    }

    #[test]
    fn rejects_malformed_credentials() {
        let seed = BASE64_STANDARD_ENGINE.encode([7_u8; 32]);
        let other_public = BASE64_STANDARD_ENGINE.encode(
            SigningKey::from_bytes(&[8_u8; 32])
                .verifying_key()
                .to_bytes(),
        );

        assert!(Credentials::from_base64("not base64!", &seed).is_err());
        assert!(Credentials::from_base64(&other_public, "not base64!").is_err());
        assert!(
            Credentials::from_base64(&other_public, &BASE64_STANDARD_ENGINE.encode([7_u8; 16]))
                .is_err()
        );
        assert!(Credentials::from_base64(&other_public, &seed).is_err());
    }

    #[test]
    fn debug_redacts_signing_key() {
        let debug = format!("{:?}", test_credentials());

        assert!(debug.contains("[REDACTED]"));
    }
}
