//! Daily expiry scan over a user's inventory.

use chrono::NaiveDate;

use crate::model::Fridge;

/// Name used for inventory items stored without one.
pub const UNNAMED_ITEM: &str = "Articolo";

/// How many item names are spelled out in the notification.
const LISTED_ITEMS: usize = 3;

/// Names of the items whose expiry date falls on `today`, in storage order.
pub fn expiring_today(fridges: &[Fridge], today: NaiveDate) -> Vec<String> {
    let prefix = today.format("%Y-%m-%d").to_string();
    fridges
        .iter()
        .flat_map(|f| f.items.iter())
        .filter(|item| {
            item.expiry_date
                .as_deref()
                .is_some_and(|d| !d.is_empty() && d.starts_with(&prefix))
        })
        .map(|item| item.name.clone().unwrap_or_else(|| UNNAMED_ITEM.to_string()))
        .collect()
}

/// Notification text for the expiring items, or `None` when there are none.
pub fn expiry_message(names: &[String]) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    let listed = names
        .iter()
        .take(LISTED_ITEMS)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let mut msg = format!(
        "Attenzione! Hai {} prodotti in scadenza oggi: {listed}",
        names.len()
    );
    if names.len() > LISTED_ITEMS {
        msg.push_str("...");
    }
    Some(msg)
}
