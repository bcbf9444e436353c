//! Device registration for push notifications and realtime negotiation.

use mocc_notify::{
    ConnectionInfo, Installation, installation_id_for, nh_platform, send_best_effort, user_tag,
};
use serde_json::Value;
use tracing::info;

use crate::{AppContext, HostError};

pub const PROMO_MESSAGE: &str = "MOCC ti aiuterà a realizzare i tuoi pasti";

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRegistration {
    pub user_id: String,
    pub handle: String,
    pub platform: Option<String>,
    pub installation_id: Option<String>,
}

fn non_empty<'a>(parent: Option<&'a Value>, key: &str) -> Option<&'a str> {
    parent
        .and_then(|p| p.get(key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

impl DeviceRegistration {
    /// Read a registration request body.
    ///
    /// `handle` and `platform` may sit under `variables` or at the top level,
    /// `variables` winning; `installationId` prefers the top level. The user
    /// id comes from the header when present. `None` when the user id or the
    /// handle is missing.
    pub fn from_request(header_user_id: Option<&str>, body: &Value) -> Option<Self> {
        let variables = body.get("variables");
        let nested = |key: &str| non_empty(variables, key);
        let top = |key: &str| non_empty(Some(body), key);

        let user_id = header_user_id
            .filter(|s| !s.is_empty())
            .or_else(|| top("userId"))?;
        let handle = nested("handle").or_else(|| top("handle"))?;

        Some(Self {
            user_id: user_id.to_string(),
            handle: handle.to_string(),
            platform: nested("platform").or_else(|| top("platform")).map(str::to_string),
            installation_id: top("installationId")
                .or_else(|| nested("installationId"))
                .map(str::to_string),
        })
    }
}

/// Register the device and send the welcome notification. Returns the
/// installation id used.
pub async fn register_device(
    ctx: &AppContext,
    registration: &DeviceRegistration,
) -> Result<String, HostError> {
    let platform = nh_platform(registration.platform.as_deref());
    let installation_id = registration
        .installation_id
        .clone()
        .unwrap_or_else(|| installation_id_for(&registration.handle));

    let installation = Installation::new(
        &installation_id,
        &platform,
        &registration.handle,
        &registration.user_id,
    );
    ctx.push.register(&installation).await?;
    info!(user_id = %registration.user_id, platform = %platform, "device registered");

    send_best_effort(
        ctx.push.as_ref(),
        PROMO_MESSAGE,
        Some(&user_tag(&registration.user_id)),
    )
    .await;
    Ok(installation_id)
}

/// Connection details for a realtime client acting as `user_id`.
pub fn negotiate(ctx: &AppContext, user_id: &str) -> Result<ConnectionInfo, HostError> {
    Ok(ctx.realtime.negotiate(user_id)?)
}
