//! Checkout command.
//!
//! Orders are appended to an `orders.jsonl` journal next to the cart file.
//! The journal stands in for the hosted order tables: one JSON object per
//! placed order, numbered sequentially.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use curio_cart::{
    CartConfig, CheckoutError, OrderDraft, OrderReceipt, OrderSubmitter, ShippingDetails,
    SubmitError, place_order,
};
use curio_core::OrderId;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

const JOURNAL_FILE: &str = "orders.jsonl";

/// Shipping fields supplied on the command line.
pub struct CheckoutArgs {
    pub name: String,
    pub email: String,
    pub address: String,
    pub city: String,
    pub zip: String,
}

#[derive(Serialize)]
struct JournalEntry<'a> {
    order_id: OrderId,
    placed_at: DateTime<Utc>,
    #[serde(flatten)]
    order: &'a OrderDraft,
}

/// Order backend that appends orders to a JSON Lines file.
pub struct JournalSubmitter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JournalSubmitter {
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(JOURNAL_FILE),
            lock: Mutex::new(()),
        }
    }

    async fn next_order_id(&self) -> Result<OrderId, SubmitError> {
        let placed = match tokio::fs::read_to_string(&self.path).await {
            Ok(journal) => journal.lines().filter(|line| !line.trim().is_empty()).count(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(SubmitError::Unavailable(e.to_string())),
        };
        i32::try_from(placed + 1)
            .map(OrderId::new)
            .map_err(|_| SubmitError::Rejected("order journal is full".to_string()))
    }
}

#[async_trait]
impl OrderSubmitter for JournalSubmitter {
    async fn submit(&self, draft: &OrderDraft) -> Result<OrderReceipt, SubmitError> {
        let _guard = self.lock.lock().await;

        let receipt = OrderReceipt {
            order_id: self.next_order_id().await?,
            placed_at: Utc::now(),
        };
        let entry = JournalEntry {
            order_id: receipt.order_id,
            placed_at: receipt.placed_at,
            order: draft,
        };
        let mut line =
            serde_json::to_string(&entry).map_err(|e| SubmitError::Rejected(e.to_string()))?;
        line.push('\n');

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| SubmitError::Unavailable(e.to_string()))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| SubmitError::Unavailable(e.to_string()))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| SubmitError::Unavailable(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| SubmitError::Unavailable(e.to_string()))?;

        Ok(receipt)
    }
}

/// Place an order for the current cart.
///
/// # Errors
///
/// Returns `CheckoutError` for invalid shipping details, an empty cart, or a
/// failed journal write. The cart is only cleared on success.
pub async fn run(config: &CartConfig, args: CheckoutArgs) -> Result<OrderReceipt, CheckoutError> {
    let shipping =
        ShippingDetails::new(&args.name, &args.email, &args.address, &args.city, &args.zip)?;
    let submitter = JournalSubmitter::new(&config.storage_dir);

    let cart = curio_cart::open(config).await;
    super::cart::log_summary(&cart.snapshot());
    let result = place_order(&cart, &submitter, shipping).await;
    cart.shutdown().await;

    let receipt = result?;
    info!(
        "Order #{} placed at {}",
        receipt.order_id,
        receipt.placed_at.to_rfc3339()
    );
    Ok(receipt)
}
