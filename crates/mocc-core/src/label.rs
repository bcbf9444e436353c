//! Product-label enrichment of staged line items.

use serde::Deserialize;

use crate::model::StagedRecord;
use crate::reply::lenient_string;

/// Confidence assigned to an item once its label has been read.
pub const LABEL_CONFIDENCE: f64 = 0.95;

pub const LABEL_SYSTEM_PROMPT: &str = "Sei un assistente per l'inventario.";

pub const LABEL_PROMPT: &str = "Analizza questa etichetta di prodotto. Estrai: \
1. Nome prodotto (es. 'Pasta di Grano Duro') \
2. Marca (es. 'Barilla') \
3. Quantità totale (es. 500g, 1L). Se incerto, stima o lascia vuoto. \
Restituisci JSON: { \"name\": \"...\", \"brand\": \"...\", \"quantity\": \"500g\", \"category\": \"...\" }";

/// Fields read off a product label by the chat model.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LabelFields {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub brand: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub quantity: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
}

impl LabelFields {
    /// `brand name quantity`, skipping empty parts.
    pub fn display_name(&self) -> String {
        [&self.brand, &self.name, &self.quantity]
            .into_iter()
            .filter_map(non_empty)
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The item was found and updated; the record must be persisted.
    Updated,
    /// No item with the given id; the record is untouched.
    ItemNotFound,
}

/// Merge label fields into the item `item_id` of `record`.
///
/// Name, brand and category are only touched when the label carried a name.
/// Confidence is raised to [`LABEL_CONFIDENCE`] whenever the item exists.
pub fn merge_label(record: &mut StagedRecord, item_id: &str, fields: &LabelFields) -> MergeOutcome {
    let Some(item) = record.items_snapshot.iter_mut().find(|i| i.id == item_id) else {
        return MergeOutcome::ItemNotFound;
    };

    if non_empty(&fields.name).is_some() {
        let full_name = fields.display_name();
        if !full_name.is_empty() {
            item.name = full_name;
        }
        if let Some(brand) = non_empty(&fields.brand) {
            item.brand = Some(brand.to_string());
        }
        if let Some(category) = non_empty(&fields.category) {
            item.category = Some(category.to_string());
        }
    }
    item.confidence = LABEL_CONFIDENCE;

    MergeOutcome::Updated
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LineItem;
    use crate::reply::parse_reply;
    use chrono::Utc;

    fn record() -> StagedRecord {
        let mut first = LineItem::from_receipt("PASTA BAR".into(), 1.2, 1.0);
        first.id = "item-1".into();
        let mut second = LineItem::from_receipt("LATTE".into(), 1.5, 2.0);
        second.id = "item-2".into();
        second.confidence = 0.4;
        StagedRecord::new("u1", "Coop".into(), 4.2, vec![first, second], "https://x", Utc::now())
    }

    fn fields(name: &str, brand: &str, quantity: &str, category: &str) -> LabelFields {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        LabelFields {
            name: opt(name),
            brand: opt(brand),
            quantity: opt(quantity),
            category: opt(category),
        }
    }

    #[test]
    fn merge_builds_composite_name() {
        let mut rec = record();
        let outcome = merge_label(
            &mut rec,
            "item-1",
            &fields("Spaghetti n.5", "Barilla", "500g", "Pasta"),
        );

        assert_eq!(outcome, MergeOutcome::Updated);
        let item = &rec.items_snapshot[0];
        assert_eq!(item.name, "Barilla Spaghetti n.5 500g");
        assert_eq!(item.brand.as_deref(), Some("Barilla"));
        assert_eq!(item.category.as_deref(), Some("Pasta"));
        assert_eq!(item.confidence, LABEL_CONFIDENCE);
    }

    #[test]
    fn merge_raises_confidence_regardless_of_prior_value() {
        let mut rec = record();
        merge_label(&mut rec, "item-2", &fields("Latte intero", "", "", ""));

        let item = &rec.items_snapshot[1];
        assert_eq!(item.name, "Latte intero");
        assert_eq!(item.confidence, 0.95);
        assert!(item.brand.is_none());
        // The other item is left alone.
        assert_eq!(rec.items_snapshot[0].name, "PASTA BAR");
    }

    #[test]
    fn merge_without_name_only_raises_confidence() {
        let mut rec = record();
        let outcome = merge_label(&mut rec, "item-2", &fields("", "Granarolo", "1L", "Latticini"));

        assert_eq!(outcome, MergeOutcome::Updated);
        let item = &rec.items_snapshot[1];
        assert_eq!(item.name, "LATTE");
        assert!(item.brand.is_none());
        assert!(item.category.is_none());
        assert_eq!(item.confidence, 0.95);
    }

    #[test]
    fn merge_unknown_item_leaves_record_untouched() {
        let mut rec = record();
        let before = rec.items_snapshot.clone();

        let outcome = merge_label(&mut rec, "missing", &fields("Pane", "Mulino", "", ""));

        assert_eq!(outcome, MergeOutcome::ItemNotFound);
        assert_eq!(rec.items_snapshot, before);
    }

    #[test]
    fn merge_is_idempotent_for_identical_input() {
        let label = fields("Spaghetti", "Barilla", "500g", "Pasta");
        let mut once = record();
        merge_label(&mut once, "item-1", &label);
        let mut twice = once.clone();
        merge_label(&mut twice, "item-1", &label);

        assert_eq!(once.items_snapshot, twice.items_snapshot);
    }

    #[test]
    fn label_reply_accepts_numeric_quantity() {
        let parsed: LabelFields =
            parse_reply("```json\n{\"name\": \"Riso\", \"brand\": null, \"quantity\": 1}\n```").unwrap();
        assert_eq!(parsed.name.as_deref(), Some("Riso"));
        assert_eq!(parsed.brand, None);
        assert_eq!(parsed.quantity.as_deref(), Some("1"));
        assert_eq!(parsed.display_name(), "Riso 1");
    }
}
