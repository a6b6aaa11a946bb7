use crate::domain::ports::AccountEncryptor;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("account-etl/", env!("CARGO_PKG_VERSION"));

/// Request body expected by the encryption service.
#[derive(Debug, Clone, Serialize)]
pub struct EncryptEnvelope<'a> {
    #[serde(rename = "DFHCOMMAREA")]
    pub commarea: RequestArea<'a>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RequestArea<'a> {
    pub ws_client_id: &'a str,
    pub ws_inp_env: &'a str,
    pub ws_enc_fields: RequestFields<'a>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RequestFields<'a> {
    pub ws_enc_acct: &'a str,
    pub ws_inp: &'a str,
    pub ws_inp2: &'a str,
    pub ws_inp3: &'a str,
    pub ws_inp4: &'a str,
}

impl<'a> EncryptEnvelope<'a> {
    pub fn new(account: &'a str, client_code: &'a str) -> Self {
        Self {
            commarea: RequestArea {
                ws_client_id: client_code,
                ws_inp_env: "",
                ws_enc_fields: RequestFields {
                    ws_enc_acct: account,
                    ws_inp: "",
                    ws_inp2: "",
                    ws_inp3: "",
                    ws_inp4: "",
                },
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncryptReply {
    #[serde(rename = "DFHCOMMAREA", default)]
    pub commarea: Option<ReplyArea>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct ReplyArea {
    pub ws_enc_fields: Option<ReplyFields>,
    /// Some hosts send status fields as numbers, others as padded strings.
    pub ws_ret_code: Option<Value>,
    pub ws_error_msg: Option<Value>,
}

/// Trimmed text of a status field; `null` and blanks count as absent.
fn status_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct ReplyFields {
    pub ws_enc_acct: Option<String>,
}

impl EncryptReply {
    /// Extracts the encrypted account, treating an embedded error status or a
    /// blank value as a rejection.
    pub fn into_encrypted_account(self) -> Result<String> {
        let area = self.commarea.ok_or_else(|| EtlError::ApiRejectedError {
            message: "response has no DFHCOMMAREA".to_string(),
        })?;

        if let Some(message) = status_text(area.ws_error_msg.as_ref()) {
            return Err(EtlError::ApiRejectedError { message });
        }

        if let Some(code) = status_text(area.ws_ret_code.as_ref()) {
            if !code.chars().all(|c| c == '0') {
                return Err(EtlError::ApiRejectedError {
                    message: format!("return code {}", code),
                });
            }
        }

        match area.ws_enc_fields.and_then(|f| f.ws_enc_acct) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(EtlError::ApiRejectedError {
                message: "response has no encrypted account".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpEncryptorSettings {
    pub endpoint: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub headers: HashMap<String, String>,
}

impl HttpEncryptorSettings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: HashMap::new(),
        }
    }
}

/// Calls the remote encryption endpoint once per account.
pub struct HttpEncryptor {
    client: Client,
    endpoint: String,
}

impl HttpEncryptor {
    pub fn new(settings: &HttpEncryptorSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(USER_AGENT, header_value("user_agent", &settings.user_agent)?);

        for (key, value) in &settings.headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                EtlError::InvalidConfigValueError {
                    field: "api.headers".to_string(),
                    value: key.clone(),
                    reason: e.to_string(),
                }
            })?;
            headers.insert(name, header_value(key, value)?);
        }

        let client = Client::builder()
            .timeout(settings.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn header_value(field: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| EtlError::InvalidConfigValueError {
        field: format!("api.headers.{}", field),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl AccountEncryptor for HttpEncryptor {
    async fn encrypt(&self, account: &str, client_code: &str) -> Result<String> {
        let envelope = EncryptEnvelope::new(account, client_code);

        tracing::debug!("POST {} for account {}", self.endpoint, account);
        let response = self.client.post(&self.endpoint).json(&envelope).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::ApiStatusError {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let reply: EncryptReply = response.json().await?;
        reply.into_encrypted_account()
    }
}
