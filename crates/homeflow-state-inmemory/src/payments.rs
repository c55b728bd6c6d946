use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use homeflow_core::{OperationError, PaymentConfirmation, PaymentGateway, PaymentIntent, PaymentStatus};

use crate::faults::Faults;

/// A payment the gateway captured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPayment {
    /// Provider payment id
    pub payment_id: String,
    /// Amount in cents
    pub amount_cents: u64,
    /// Metadata passed with the intent
    pub metadata: BTreeMap<String, String>,
    /// Capture time
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Intent {
    amount_cents: u64,
    metadata: BTreeMap<String, String>,
    confirmed: bool,
}

#[derive(Debug, Default)]
struct GatewayState {
    intents: HashMap<String, Intent>,
    captured: Vec<CapturedPayment>,
    scripted_statuses: VecDeque<PaymentStatus>,
}

/// In-memory payment gateway.
///
/// Confirmations succeed unless a status was scripted with
/// [`decline_next`](Self::decline_next) or
/// [`script_status`](Self::script_status).
#[derive(Debug, Default)]
pub struct InMemoryPaymentGateway {
    state: RwLock<GatewayState>,
    faults: Faults,
}

impl InMemoryPaymentGateway {
    /// Create an empty gateway
    pub fn new() -> Self {
        Self::default()
    }

    /// Failure and latency injection
    pub fn faults(&self) -> &Faults {
        &self.faults
    }

    /// Make the next confirmation report `Failed`
    pub async fn decline_next(&self) {
        self.script_status(PaymentStatus::Failed).await;
    }

    /// Status reported by the next confirmation
    pub async fn script_status(&self, status: PaymentStatus) {
        self.state.write().await.scripted_statuses.push_back(status);
    }

    /// Payments captured so far, oldest first
    pub async fn captured(&self) -> Vec<CapturedPayment> {
        self.state.read().await.captured.clone()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_payment_intent(
        &self,
        amount_cents: u64,
        metadata: BTreeMap<String, String>,
    ) -> Result<PaymentIntent, OperationError> {
        self.faults.check().await?;

        if amount_cents == 0 {
            return Err(OperationError::Validation("Amount must be positive".to_string()));
        }

        let client_secret = format!("pi_{}_secret", Uuid::new_v4().simple());
        self.state.write().await.intents.insert(
            client_secret.clone(),
            Intent {
                amount_cents,
                metadata,
                confirmed: false,
            },
        );

        debug!(amount_cents, "Payment intent created");
        Ok(PaymentIntent { client_secret })
    }

    async fn confirm_payment(&self, client_secret: &str) -> Result<PaymentConfirmation, OperationError> {
        self.faults.check().await?;

        let mut guard = self.state.write().await;
        let state = &mut *guard;

        // Scripted statuses are only spent on confirmable intents
        let intent = state
            .intents
            .get_mut(client_secret)
            .ok_or_else(|| OperationError::NotFound("Unknown payment intent".to_string()))?;
        if intent.confirmed {
            return Err(OperationError::Validation("Payment intent already confirmed".to_string()));
        }
        let status = state
            .scripted_statuses
            .pop_front()
            .unwrap_or(PaymentStatus::Succeeded);

        let payment_id = format!("pay_{}", Uuid::new_v4().simple());
        if status == PaymentStatus::Succeeded {
            intent.confirmed = true;
            let captured = CapturedPayment {
                payment_id: payment_id.clone(),
                amount_cents: intent.amount_cents,
                metadata: intent.metadata.clone(),
                captured_at: Utc::now(),
            };
            info!(payment_id = %payment_id, amount_cents = captured.amount_cents, "Payment captured");
            state.captured.push(captured);
        } else {
            debug!(?status, "Payment not captured");
        }

        Ok(PaymentConfirmation { payment_id, status })
    }
}
