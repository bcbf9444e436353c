//! Recording stand-ins for the notification services.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::NotifyError;
use crate::hub::PushNotifier;
use crate::installation::Installation;
use crate::realtime::{ConnectionInfo, RealtimeBroadcaster};

fn unavailable(service: &str) -> NotifyError {
    NotifyError::Server {
        status: 503,
        body: format!("{service} unavailable"),
    }
}

/// A sent template notification.
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub message: String,
    pub tag: Option<String>,
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    fail_registration: bool,
    fail_sends: bool,
    registrations: Mutex<Vec<Installation>>,
    sent: Mutex<Vec<SentNotification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_registration(mut self) -> Self {
        self.fail_registration = true;
        self
    }

    pub fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    pub async fn registrations(&self) -> Vec<Installation> {
        self.registrations.lock().await.clone()
    }

    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl PushNotifier for RecordingNotifier {
    async fn register(&self, installation: &Installation) -> Result<(), NotifyError> {
        if self.fail_registration {
            return Err(unavailable("notification hub"));
        }
        self.registrations.lock().await.push(installation.clone());
        Ok(())
    }

    async fn send_template(&self, message: &str, tag: Option<&str>) -> Result<(), NotifyError> {
        if self.fail_sends {
            return Err(unavailable("notification hub"));
        }
        self.sent.lock().await.push(SentNotification {
            message: message.to_string(),
            tag: tag.map(str::to_string),
        });
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    fail: bool,
    negotiate_url: Option<String>,
    refreshed: Mutex<Vec<String>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Answer negotiation with `url` and a token naming the user.
    pub fn with_negotiate_url(mut self, url: &str) -> Self {
        self.negotiate_url = Some(url.to_string());
        self
    }

    pub async fn refreshed(&self) -> Vec<String> {
        self.refreshed.lock().await.clone()
    }
}

#[async_trait]
impl RealtimeBroadcaster for RecordingBroadcaster {
    async fn refresh(&self, user_id: &str) -> Result<(), NotifyError> {
        if self.fail {
            return Err(unavailable("signalr"));
        }
        self.refreshed.lock().await.push(user_id.to_string());
        Ok(())
    }

    fn negotiate(&self, user_id: &str) -> Result<ConnectionInfo, NotifyError> {
        let url = self
            .negotiate_url
            .clone()
            .ok_or_else(|| NotifyError::Config("no SignalR access key configured".to_string()))?;
        Ok(ConnectionInfo {
            url,
            access_token: format!("token-for-{user_id}"),
        })
    }
}
