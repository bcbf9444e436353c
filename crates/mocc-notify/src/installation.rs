//! Notification Hubs device installations.

use std::collections::BTreeMap;

use ring::digest;
use serde::Serialize;
use serde_json::json;

pub const FCM_V1: &str = "fcmV1";
pub const APNS: &str = "apns";

/// Name of the single template registered for every installation.
pub const GENERIC_TEMPLATE: &str = "genericTemplate";

/// Map a client-reported platform onto the Notification Hubs platform name.
///
/// Unknown platforms are passed through unchanged.
pub fn nh_platform(platform: Option<&str>) -> String {
    let Some(platform) = platform.filter(|p| !p.is_empty()) else {
        return FCM_V1.to_string();
    };
    match platform.to_lowercase().as_str() {
        "android" | "fcm" | "gcm" | "fcmv1" => FCM_V1.to_string(),
        "ios" | "apns" => APNS.to_string(),
        _ => platform.to_string(),
    }
}

/// Default installation id: lowercase hex SHA-256 of the push handle.
pub fn installation_id_for(handle: &str) -> String {
    hex::encode(digest::digest(&digest::SHA256, handle.as_bytes()))
}

/// Tag addressing every installation of one user.
pub fn user_tag(user_id: &str) -> String {
    format!("userId:{user_id}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Installation {
    pub installation_id: String,
    pub platform: String,
    pub push_channel: String,
    pub tags: Vec<String>,
    pub templates: BTreeMap<String, Template>,
}

impl Installation {
    /// An installation tagged for `user_id` with a template whose body carries
    /// the `$(message)` placeholder in the platform's payload shape.
    pub fn new(installation_id: &str, platform: &str, handle: &str, user_id: &str) -> Self {
        let body = if platform == FCM_V1 {
            json!({"message": {"notification": {"title": "MOCC", "body": "$(message)"}}})
        } else {
            json!({"aps": {"alert": {"title": "MOCC", "body": "$(message)"}}})
        };

        let mut templates = BTreeMap::new();
        templates.insert(
            GENERIC_TEMPLATE.to_string(),
            Template {
                body: body.to_string(),
            },
        );

        Self {
            installation_id: installation_id.to_string(),
            platform: platform.to_string(),
            push_channel: handle.to_string(),
            tags: vec![user_tag(user_id)],
            templates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn platform_mapping() {
        assert_eq!(nh_platform(None), "fcmV1");
        assert_eq!(nh_platform(Some("")), "fcmV1");
        assert_eq!(nh_platform(Some("Android")), "fcmV1");
        assert_eq!(nh_platform(Some("GCM")), "fcmV1");
        assert_eq!(nh_platform(Some("ios")), "apns");
        assert_eq!(nh_platform(Some("APNS")), "apns");
        assert_eq!(nh_platform(Some("wns")), "wns");
        assert_eq!(nh_platform(Some("Baidu")), "Baidu");
    }

    #[test]
    fn installation_id_is_sha256_hex() {
        assert_eq!(
            installation_id_for("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn fcm_installation_payload() {
        let installation = Installation::new("inst-1", "fcmV1", "token-xyz", "u1");
        let json = serde_json::to_value(&installation).unwrap();

        assert_eq!(json["installationId"], "inst-1");
        assert_eq!(json["pushChannel"], "token-xyz");
        assert_eq!(json["tags"], serde_json::json!(["userId:u1"]));

        let body: Value =
            serde_json::from_str(json["templates"]["genericTemplate"]["body"].as_str().unwrap())
                .unwrap();
        assert_eq!(body["message"]["notification"]["body"], "$(message)");
    }

    #[test]
    fn non_fcm_platforms_use_apns_template() {
        let installation = Installation::new("inst-2", "wns", "h", "u2");
        let body: Value =
            serde_json::from_str(&installation.templates[GENERIC_TEMPLATE].body).unwrap();
        assert_eq!(body["aps"]["alert"]["title"], "MOCC");
    }
}
