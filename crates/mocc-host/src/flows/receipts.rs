//! Receipt photos become staged purchase records.

use chrono::Utc;
use mocc_core::{BlobLocation, ReceiptRef, StagedRecord, extract_receipt};
use mocc_notify::refresh_best_effort;
use mocc_store::{containers, upsert_as};
use tracing::info;

use crate::{AppContext, HostError};

/// Analyze the receipt at `url` and stage its line items for `receipt.user_id`.
pub async fn process_receipt(
    ctx: &AppContext,
    url: &str,
    receipt: &ReceiptRef,
) -> Result<StagedRecord, HostError> {
    let location = BlobLocation::parse(url)?;
    info!(user_id = %receipt.user_id, blob = %location.blob_name, "processing receipt");

    let bytes = ctx.blobs.download(&location).await?;
    let analysis = ctx.receipts.analyze_receipt(&bytes).await?;
    let extraction = extract_receipt(&analysis);
    let total = extraction.detected_total();

    let record = StagedRecord::new(
        &receipt.user_id,
        extraction.store_name,
        total,
        extraction.items,
        url,
        Utc::now(),
    );
    upsert_as(ctx.store.as_ref(), containers::HISTORY, &receipt.user_id, &record).await?;
    info!(
        user_id = %receipt.user_id,
        record_id = %record.id,
        items = record.items_snapshot.len(),
        total,
        "receipt staged"
    );

    refresh_best_effort(ctx.realtime.as_ref(), &receipt.user_id).await;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::Harness;
    use mocc_ai::FakeReceiptAnalyzer;
    use mocc_core::AnalyzeResult;
    use serde_json::json;
    use std::sync::Arc;

    const URL: &str = "https://moccstorage.blob.core.windows.net/receipts/u1/scan.jpg";

    fn analysis(total: f64) -> AnalyzeResult {
        serde_json::from_value(json!({
            "documents": [{
                "fields": {
                    "MerchantName": {"valueString": "Coop"},
                    "Total": {"valueCurrency": {"amount": total, "currencyCode": "EUR"}},
                    "Items": {"valueArray": [
                        {"valueObject": {
                            "Description": {"valueString": "Latte"},
                            "TotalPrice": {"valueNumber": 1.5},
                            "Quantity": {"valueNumber": 2.0}
                        }},
                        {"valueObject": {
                            "Description": {"content": "Pane"},
                            "TotalPrice": {"valueCurrency": {"amount": 2.0}}
                        }}
                    ]}
                }
            }]
        }))
        .unwrap()
    }

    async fn harness_with(result: AnalyzeResult) -> Harness {
        let mut harness = Harness::new();
        harness.receipts = Arc::new(FakeReceiptAnalyzer::returning(result));
        harness.blobs.put("receipts", "u1/scan.jpg", vec![0xff, 0xd8]).await;
        harness
    }

    #[tokio::test]
    async fn stages_record_with_reported_total() {
        let harness = harness_with(analysis(12.3)).await;
        let receipt = ReceiptRef::parse(URL).unwrap();

        let record = process_receipt(&harness.context(), URL, &receipt).await.unwrap();
        assert_eq!(record.store_name, "Coop");
        assert_eq!(record.total_amount, 12.3);

        let stored = harness.store.get("History", &record.id, "u1").await.unwrap();
        assert_eq!(stored["authorId"], "u1");
        assert_eq!(stored["status"], "IN_STAGING");
        assert_eq!(stored["receiptImageUrl"], URL);
        assert_eq!(stored["itemsSnapshot"][0]["name"], "Latte");
        assert_eq!(stored["itemsSnapshot"][1]["name"], "Pane");
        assert_eq!(harness.realtime.refreshed().await, vec!["u1".to_string()]);
    }

    #[tokio::test]
    async fn zero_total_falls_back_to_item_sum() {
        let harness = harness_with(analysis(0.0)).await;
        let receipt = ReceiptRef::parse(URL).unwrap();

        let record = process_receipt(&harness.context(), URL, &receipt).await.unwrap();
        // 1.5 * 2 + 2.0 * 1
        assert!((record.total_amount - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn analysis_failure_writes_nothing() {
        let harness = Harness::new();
        harness.blobs.put("receipts", "u1/scan.jpg", vec![1]).await;
        let receipt = ReceiptRef::parse(URL).unwrap();

        let err = process_receipt(&harness.context(), URL, &receipt)
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Ai(_)));
        assert_eq!(harness.store.write_count().await, 0);
        assert!(harness.realtime.refreshed().await.is_empty());
    }
}
