//! Daily expiry scan: one push notification per user with items expiring today.

use chrono::NaiveDate;
use mocc_core::Fridge;
use mocc_core::expiry::{expiring_today, expiry_message};
use mocc_notify::{send_best_effort, user_tag};
use mocc_store::{containers, query_as};
use tracing::{error, info};

use super::{fridges_of, list_user_ids};
use crate::{AppContext, HostError};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryScanReport {
    pub users: usize,
    pub notified: usize,
    pub failed: usize,
}

/// Scan every user's inventory for items expiring on `today`.
///
/// A failure for one user is logged and the scan moves on.
pub async fn run_expiry_scan(ctx: &AppContext, today: NaiveDate) -> Result<ExpiryScanReport, HostError> {
    let user_ids = list_user_ids(ctx).await?;
    let mut report = ExpiryScanReport {
        users: user_ids.len(),
        ..Default::default()
    };

    for user_id in &user_ids {
        match check_user(ctx, user_id, today).await {
            Ok(true) => report.notified += 1,
            Ok(false) => {}
            Err(e) => {
                error!(error = %e, user_id = %user_id, "expiry check failed");
                report.failed += 1;
            }
        }
    }

    info!(
        users = report.users,
        notified = report.notified,
        failed = report.failed,
        "expiry scan complete"
    );
    Ok(report)
}

/// Returns whether a notification was due for `user_id`.
pub async fn check_user(ctx: &AppContext, user_id: &str, today: NaiveDate) -> Result<bool, HostError> {
    let fridges: Vec<Fridge> =
        query_as(ctx.store.as_ref(), containers::INVENTORY, &fridges_of(user_id)).await?;
    let names = expiring_today(&fridges, today);
    let Some(message) = expiry_message(&names) else {
        return Ok(false);
    };

    send_best_effort(ctx.push.as_ref(), &message, Some(&user_tag(user_id))).await;
    info!(user_id, items = names.len(), "expiry notification sent");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::Harness;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    #[tokio::test]
    async fn notifies_users_with_items_expiring_today() {
        let harness = Harness::new();
        harness.store.insert("Users", "u1", json!({"id": "u1"})).await;
        harness.store.insert("Users", "u2", json!({"id": "u2"})).await;
        harness
            .store
            .insert(
                "Inventory",
                "u1",
                json!({"id": "u1", "items": [
                    {"name": "Latte", "expiryDate": "2026-03-14T00:00:00Z"},
                    {"expiryDate": "2026-03-14"},
                    {"name": "Yogurt", "expiryDate": "2026-03-15"}
                ]}),
            )
            .await;
        harness
            .store
            .insert("Inventory", "u2", json!({"id": "u2", "items": [{"name": "Pane"}]}))
            .await;

        let report = run_expiry_scan(&harness.context(), today()).await.unwrap();
        assert_eq!(
            report,
            ExpiryScanReport {
                users: 2,
                notified: 1,
                failed: 0
            }
        );

        let sent = harness.push.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].message,
            "Attenzione! Hai 2 prodotti in scadenza oggi: Latte, Articolo"
        );
        assert_eq!(sent[0].tag.as_deref(), Some("userId:u1"));
    }

    #[tokio::test]
    async fn malformed_inventory_does_not_stop_the_scan() {
        let harness = Harness::new();
        harness.store.insert("Users", "bad", json!({"id": "bad"})).await;
        harness.store.insert("Users", "good", json!({"id": "good"})).await;
        harness
            .store
            .insert("Inventory", "bad", json!({"id": "bad", "items": "not a list"}))
            .await;
        harness
            .store
            .insert(
                "Inventory",
                "good",
                json!({"id": "good", "items": [{"name": "Uova", "expiryDate": "2026-03-14"}]}),
            )
            .await;

        let report = run_expiry_scan(&harness.context(), today()).await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.notified, 1);
    }

    #[tokio::test]
    async fn push_failures_are_not_user_failures() {
        let mut harness = Harness::new();
        harness.push = std::sync::Arc::new(mocc_notify::RecordingNotifier::new().failing_sends());
        harness.store.insert("Users", "u1", json!({"id": "u1"})).await;
        harness
            .store
            .insert(
                "Inventory",
                "u1",
                json!({"id": "u1", "items": [{"name": "Uova", "expiryDate": "2026-03-14"}]}),
            )
            .await;

        let report = run_expiry_scan(&harness.context(), today()).await.unwrap();
        assert_eq!(report.failed, 0);
    }
}
