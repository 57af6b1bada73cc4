//! API credential resolution.
//!
//! The Pinecone API key is looked up once per process and then handed to
//! the client explicitly:
//!
//! 1. the environment variable named by `pinecone.api_key_env`
//!    (default `PINECONE_API_KEY`), if set and non-empty;
//! 2. otherwise, when a `[secrets]` section is configured, AWS Secrets
//!    Manager `GetSecretValue`.
//!
//! Secrets Manager calls use the JSON 1.1 protocol signed with AWS
//! Signature Version 4 (`hmac` + `sha2`), with credentials read from
//! `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and optionally
//! `AWS_SESSION_TOKEN`. If the secret string is a JSON object, the value
//! under `secrets.json_key` (or the api key variable name) is used.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

use crate::config::{Config, SecretsConfig};

type HmacSha256 = Hmac<Sha256>;

/// A resolved API key. `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Resolve the API key from the process environment or the secrets store.
pub async fn resolve_api_key(config: &Config) -> Result<ApiKey> {
    resolve_api_key_with(config, |name| std::env::var(name).ok()).await
}

/// Like [`resolve_api_key`], reading environment variables through `lookup`.
pub async fn resolve_api_key_with<F>(config: &Config, lookup: F) -> Result<ApiKey>
where
    F: Fn(&str) -> Option<String>,
{
    let var = &config.pinecone.api_key_env;
    if let Some(key) = lookup(var).filter(|k| !k.trim().is_empty()) {
        return Ok(ApiKey::new(key.trim()));
    }

    let Some(secrets) = &config.secrets else {
        bail!(
            "{} environment variable not set and no [secrets] store configured",
            var
        );
    };

    let creds = AwsCredentials::from_lookup(&lookup)?;
    let secret = get_secret_value(secrets, &creds, config.pinecone.timeout_secs).await?;
    let key = extract_key(&secret, secrets.json_key.as_deref().unwrap_or(var))?;
    tracing::info!(secret_id = %secrets.secret_id, "resolved API key from secrets store");
    Ok(ApiKey::new(key))
}

/// Pull the key out of a secret string: either the raw string, or one
/// field of a JSON object.
fn extract_key(secret: &str, json_key: &str) -> Result<String> {
    let trimmed = secret.trim();
    if trimmed.starts_with('{') {
        let obj: serde_json::Value =
            serde_json::from_str(trimmed).context("secret string is not valid JSON")?;
        let key = obj
            .get(json_key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("secret has no string field '{}'", json_key))?;
        if key.trim().is_empty() {
            bail!("secret field '{}' is empty", json_key);
        }
        return Ok(key.trim().to_string());
    }
    if trimmed.is_empty() {
        bail!("secret string is empty");
    }
    Ok(trimmed.to_string())
}

// ============ AWS Credentials ============

struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_key_id = lookup("AWS_ACCESS_KEY_ID")
            .context("AWS_ACCESS_KEY_ID environment variable not set")?;
        let secret_access_key = lookup("AWS_SECRET_ACCESS_KEY")
            .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
        let session_token = lookup("AWS_SESSION_TOKEN");

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

// ============ GetSecretValue ============

async fn get_secret_value(
    secrets: &SecretsConfig,
    creds: &AwsCredentials,
    timeout_secs: u64,
) -> Result<String> {
    let (scheme, host) = secrets_endpoint(secrets);
    let body = serde_json::json!({ "SecretId": secrets.secret_id }).to_string();
    let target = "secretsmanager.GetSecretValue";
    let content_type = "application/x-amz-json-1.1";

    let signed = sign_request(
        creds,
        &SignInput {
            method: "POST",
            host: &host,
            region: &secrets.region,
            service: "secretsmanager",
            content_type,
            target,
            payload: body.as_bytes(),
            now: Utc::now(),
        },
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;

    let mut req = client
        .post(format!("{}://{}/", scheme, host))
        .header("Authorization", &signed.authorization)
        .header("Content-Type", content_type)
        .header("X-Amz-Target", target)
        .header("x-amz-date", &signed.amz_date)
        .body(body);
    if let Some(ref token) = creds.session_token {
        req = req.header("x-amz-security-token", token);
    }

    let resp = req
        .send()
        .await
        .with_context(|| format!("Failed to reach Secrets Manager at {}", host))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        bail!(
            "Secrets Manager GetSecretValue failed (HTTP {}): {}",
            status,
            text.chars().take(500).collect::<String>()
        );
    }

    let json: serde_json::Value = resp.json().await?;
    json.get("SecretString")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("secret '{}' has no SecretString", secrets.secret_id))
}

/// Scheme and host for the Secrets Manager endpoint.
fn secrets_endpoint(secrets: &SecretsConfig) -> (String, String) {
    match secrets.endpoint_url {
        Some(ref endpoint) => {
            let scheme = if endpoint.starts_with("http://") {
                "http"
            } else {
                "https"
            };
            let host = endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/')
                .to_string();
            (scheme.to_string(), host)
        }
        None => (
            "https".to_string(),
            format!("secretsmanager.{}.amazonaws.com", secrets.region),
        ),
    }
}

// ============ AWS SigV4 ============

struct SignInput<'a> {
    method: &'a str,
    host: &'a str,
    region: &'a str,
    service: &'a str,
    content_type: &'a str,
    target: &'a str,
    payload: &'a [u8],
    now: DateTime<Utc>,
}

struct SignedHeaders {
    authorization: String,
    amz_date: String,
}

/// Sign a `POST /` JSON-protocol request.
fn sign_request(creds: &AwsCredentials, input: &SignInput<'_>) -> SignedHeaders {
    let date_stamp = input.now.format("%Y%m%d").to_string();
    let amz_date = input.now.format("%Y%m%dT%H%M%SZ").to_string();
    let payload_hash = hex_sha256(input.payload);

    let mut headers = vec![
        ("content-type".to_string(), input.content_type.to_string()),
        ("host".to_string(), input.host.to_string()),
        ("x-amz-date".to_string(), amz_date.clone()),
        ("x-amz-target".to_string(), input.target.to_string()),
    ];
    if let Some(ref token) = creds.session_token {
        headers.push(("x-amz-security-token".to_string(), token.clone()));
    }
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let signed_headers: String = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v.trim()))
        .collect();

    let canonical_request = format!(
        "{}\n/\n\n{}\n{}\n{}",
        input.method, canonical_headers, signed_headers, payload_hash
    );

    let credential_scope = format!(
        "{}/{}/{}/aws4_request",
        date_stamp, input.region, input.service
    );
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(
        &creds.secret_access_key,
        &date_stamp,
        input.region,
        input.service,
    );
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

    SignedHeaders {
        authorization: format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            creds.access_key_id, credential_scope, signed_headers, signature
        ),
        amz_date,
    }
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn signing_key_matches_aws_reference() {
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        );
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn empty_payload_hash() {
        assert_eq!(
            hex_sha256(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn authorization_header_shape() {
        let creds = AwsCredentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "secret".into(),
            session_token: Some("tok".into()),
        };
        let signed = sign_request(
            &creds,
            &SignInput {
                method: "POST",
                host: "secretsmanager.us-east-1.amazonaws.com",
                region: "us-east-1",
                service: "secretsmanager",
                content_type: "application/x-amz-json-1.1",
                target: "secretsmanager.GetSecretValue",
                payload: b"{}",
                now: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            },
        );
        assert_eq!(signed.amz_date, "20240301T120000Z");
        assert!(signed.authorization.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240301/us-east-1/secretsmanager/aws4_request, "
        ));
        assert!(signed.authorization.contains(
            "SignedHeaders=content-type;host;x-amz-date;x-amz-security-token;x-amz-target, "
        ));
        let sig = signed.authorization.rsplit("Signature=").next().unwrap();
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn extract_key_from_plain_and_json_secrets() {
        assert_eq!(extract_key("  pc-123 \n", "PINECONE_API_KEY").unwrap(), "pc-123");
        assert_eq!(
            extract_key(r#"{"PINECONE_API_KEY": "pc-456"}"#, "PINECONE_API_KEY").unwrap(),
            "pc-456"
        );
        assert!(extract_key(r#"{"other": "x"}"#, "PINECONE_API_KEY").is_err());
        assert!(extract_key("   ", "PINECONE_API_KEY").is_err());
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("pc-secret");
        assert_eq!(format!("{:?}", key), "ApiKey(***)");
    }

    #[tokio::test]
    async fn env_key_wins() {
        let cfg = Config::default();
        let key = resolve_api_key_with(&cfg, env(&[("PINECONE_API_KEY", " pc-env ")]))
            .await
            .unwrap();
        assert_eq!(key.expose(), "pc-env");
    }

    #[tokio::test]
    async fn missing_key_without_store_is_an_error() {
        let cfg = Config::default();
        let err = resolve_api_key_with(&cfg, env(&[])).await.unwrap_err();
        assert!(err.to_string().contains("PINECONE_API_KEY"));
    }

    #[tokio::test]
    async fn store_requires_aws_credentials() {
        let mut cfg = Config::default();
        cfg.secrets = Some(SecretsConfig {
            secret_id: "prod/pinecone".into(),
            region: "us-east-1".into(),
            json_key: None,
            endpoint_url: Some("http://127.0.0.1:9".into()),
        });
        let err = resolve_api_key_with(&cfg, env(&[])).await.unwrap_err();
        assert!(err.to_string().contains("AWS_ACCESS_KEY_ID"));
    }
}
