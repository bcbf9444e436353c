//! Shared-access-signature tokens for Service Bus style resources
//! (notification hubs).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use ring::hmac;

/// Build `SharedAccessSignature sr=..&sig=..&se=..&skn=..` for `resource_uri`.
///
/// The signature is HMAC-SHA256 over the URL-encoded, lower-cased resource
/// URI and the expiry (epoch seconds), separated by a newline.
pub fn build_sas_token(
    resource_uri: &str,
    key_name: &str,
    key_value: &str,
    ttl_seconds: i64,
    now: DateTime<Utc>,
) -> String {
    let expiry = (now.timestamp() + ttl_seconds).to_string();
    let encoded_uri = urlencoding::encode(&resource_uri.to_lowercase()).into_owned();

    let key = hmac::Key::new(hmac::HMAC_SHA256, key_value.as_bytes());
    let to_sign = format!("{encoded_uri}\n{expiry}");
    let signature = hmac::sign(&key, to_sign.as_bytes());
    let encoded_signature = urlencoding::encode(&STANDARD.encode(signature.as_ref())).into_owned();

    format!("SharedAccessSignature sr={encoded_uri}&sig={encoded_signature}&se={expiry}&skn={key_name}")
}
