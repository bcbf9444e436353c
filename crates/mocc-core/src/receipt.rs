//! Receipt extraction and total reconciliation.
//!
//! Reads the fields of a `prebuilt-receipt` document-analysis result and turns
//! them into line items plus a detected total. The detected total is the
//! service-reported total unless that is exactly zero, in which case the sum
//! of `price * quantity` over the items is used instead.

use std::collections::HashMap;

use serde::Deserialize;

use crate::model::LineItem;

pub const UNKNOWN_STORE: &str = "Unknown Store";
pub const UNKNOWN_ITEM: &str = "Unknown Item";

/// The `analyzeResult` object of a document-analysis operation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    #[serde(default)]
    pub documents: Vec<AnalyzedDocument>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzedDocument {
    #[serde(default)]
    pub fields: HashMap<String, DocumentField>,
}

/// A typed field value. Only the members used by receipts are modelled.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentField {
    #[serde(default)]
    pub value_string: Option<String>,
    #[serde(default)]
    pub value_number: Option<f64>,
    #[serde(default)]
    pub value_currency: Option<CurrencyValue>,
    #[serde(default)]
    pub value_array: Option<Vec<DocumentField>>,
    #[serde(default)]
    pub value_object: Option<HashMap<String, DocumentField>>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyValue {
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency_code: Option<String>,
}

impl DocumentField {
    /// Monetary value: currency amount first, then the raw number, else zero.
    pub fn financial_value(&self) -> f64 {
        if let Some(amount) = self.value_currency.as_ref().and_then(|c| c.amount) {
            return amount;
        }
        self.value_number.unwrap_or(0.0)
    }
}

/// Fields pulled out of one analyzed receipt.
#[derive(Debug, Clone)]
pub struct ReceiptExtraction {
    pub store_name: String,
    pub reported_total: f64,
    pub items: Vec<LineItem>,
}

impl ReceiptExtraction {
    /// Total to persist on the staged record.
    pub fn detected_total(&self) -> f64 {
        reconcile_total(self.reported_total, &self.items)
    }
}

/// Extract store name, reported total and ordered line items from the first
/// document of `result`.
pub fn extract_receipt(result: &AnalyzeResult) -> ReceiptExtraction {
    let mut extraction = ReceiptExtraction {
        store_name: UNKNOWN_STORE.to_string(),
        reported_total: 0.0,
        items: Vec::new(),
    };

    let Some(doc) = result.documents.first() else {
        tracing::warn!("no documents found in analysis result");
        return extraction;
    };

    if let Some(name) = doc
        .fields
        .get("MerchantName")
        .and_then(|f| f.value_string.clone())
    {
        extraction.store_name = name;
    }
    if let Some(total) = doc.fields.get("Total") {
        extraction.reported_total = total.financial_value();
    }
    if let Some(items) = doc.fields.get("Items").and_then(|f| f.value_array.as_ref()) {
        extraction.items = items
            .iter()
            .filter_map(|f| f.value_object.as_ref())
            .map(parse_item)
            .collect();
    }

    extraction
}

fn parse_item(fields: &HashMap<String, DocumentField>) -> LineItem {
    let name = fields
        .get("Description")
        .and_then(|f| f.value_string.clone().or_else(|| f.content.clone()))
        .unwrap_or_else(|| UNKNOWN_ITEM.to_string());
    let price = fields
        .get("TotalPrice")
        .map(DocumentField::financial_value)
        .unwrap_or(0.0);
    // Quantities are whole pieces; a zero or missing count means one.
    let quantity = match fields.get("Quantity").and_then(|f| f.value_number) {
        Some(n) if n != 0.0 => n.trunc(),
        _ => 1.0,
    };
    LineItem::from_receipt(name, price, quantity)
}

/// Reported total when nonzero, otherwise the computed item sum if positive.
pub fn reconcile_total(reported_total: f64, items: &[LineItem]) -> f64 {
    let computed: f64 = items.iter().map(LineItem::line_total).sum();
    if reported_total == 0.0 && computed > 0.0 {
        computed
    } else {
        reported_total
    }
}
