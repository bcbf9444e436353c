//! Outbound notifications: Notification Hubs push (device installations and
//! template sends) and SignalR per-user refresh broadcasts.

mod error;
pub use error::NotifyError;

pub mod fake;
pub mod hub;
pub mod installation;
pub mod realtime;

pub use fake::{RecordingBroadcaster, RecordingNotifier, SentNotification};
pub use hub::{NotificationHubClient, PushNotifier, send_best_effort};
pub use installation::{Installation, installation_id_for, nh_platform, user_tag};
pub use realtime::{
    ConnectionInfo, RealtimeBroadcaster, SignalRClient, SignalRConnectionString, refresh_best_effort,
};

pub(crate) async fn check(resp: reqwest::Response) -> Result<reqwest::Response, NotifyError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(NotifyError::Server {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}
