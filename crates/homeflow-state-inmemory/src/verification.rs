use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use homeflow_core::{CodeCheck, CodeDispatch, OperationError, VerificationService};

use crate::faults::Faults;

/// Default number of codes one contact may request
pub const DEFAULT_MAX_SENDS_PER_CONTACT: u32 = 5;

/// Default number of wrong guesses before a request is locked
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
struct IssuedCode {
    contact: String,
    code: String,
    attempts: u32,
    consumed: bool,
}

#[derive(Debug, Default)]
struct VerificationState {
    issued: HashMap<String, IssuedCode>,
    sends: HashMap<String, u32>,
    last_request: HashMap<String, String>,
}

/// In-memory one-time-code service.
///
/// Codes come from a seeded generator so tests can predict them, and are
/// also recorded for inspection via [`last_code_for`](Self::last_code_for).
#[derive(Debug)]
pub struct InMemoryVerificationService {
    state: RwLock<VerificationState>,
    rng: Mutex<StdRng>,
    max_sends_per_contact: u32,
    max_attempts: u32,
    faults: Faults,
}

impl InMemoryVerificationService {
    /// Create a service whose codes are derived from `seed`
    pub fn new(seed: u64) -> Self {
        Self {
            state: RwLock::new(VerificationState::default()),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            max_sends_per_contact: DEFAULT_MAX_SENDS_PER_CONTACT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            faults: Faults::new(),
        }
    }

    /// Limit the number of codes a contact may request
    pub fn with_max_sends(mut self, max_sends_per_contact: u32) -> Self {
        self.max_sends_per_contact = max_sends_per_contact;
        self
    }

    /// Limit wrong guesses per request
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Failure and latency injection
    pub fn faults(&self) -> &Faults {
        &self.faults
    }

    /// Code most recently issued to `contact`
    pub async fn last_code_for(&self, contact: &str) -> Option<String> {
        let state = self.state.read().await;
        state
            .last_request
            .get(contact)
            .and_then(|request_id| state.issued.get(request_id))
            .map(|issued| issued.code.clone())
    }

    /// Number of codes issued to `contact`
    pub async fn sends_to(&self, contact: &str) -> u32 {
        self.state.read().await.sends.get(contact).copied().unwrap_or(0)
    }
}

impl Default for InMemoryVerificationService {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl VerificationService for InMemoryVerificationService {
    async fn send_verification_code(&self, contact: &str) -> Result<CodeDispatch, OperationError> {
        self.faults.check().await?;

        let contact = contact.trim();
        if contact.is_empty() {
            return Err(OperationError::Validation("Contact is required".to_string()));
        }

        let mut state = self.state.write().await;
        let sends = state.sends.get(contact).copied().unwrap_or(0);
        if sends >= self.max_sends_per_contact {
            warn!(contact, sends, "Verification code rate limit reached");
            return Err(OperationError::RateLimited(format!(
                "Too many codes requested for {}",
                contact
            )));
        }

        let code = format!("{:06}", self.rng.lock().await.gen_range(0..1_000_000u32));
        let request_id = Uuid::new_v4().to_string();

        state.issued.insert(
            request_id.clone(),
            IssuedCode {
                contact: contact.to_string(),
                code,
                attempts: 0,
                consumed: false,
            },
        );
        state.sends.insert(contact.to_string(), sends + 1);
        state
            .last_request
            .insert(contact.to_string(), request_id.clone());

        debug!(contact, request_id = %request_id, "Verification code issued");
        Ok(CodeDispatch { request_id })
    }

    async fn verify_code(&self, request_id: &str, code: &str) -> Result<CodeCheck, OperationError> {
        self.faults.check().await?;

        let mut state = self.state.write().await;
        let max_attempts = self.max_attempts;
        let issued = state
            .issued
            .get_mut(request_id)
            .ok_or_else(|| OperationError::NotFound(format!("Verification request {}", request_id)))?;

        if issued.consumed {
            return Err(OperationError::Validation("Code already used".to_string()));
        }
        if issued.attempts >= max_attempts {
            return Err(OperationError::RateLimited(format!(
                "Too many attempts for {}",
                issued.contact
            )));
        }

        if issued.code == code.trim() {
            issued.consumed = true;
            debug!(request_id, "Verification code accepted");
            Ok(CodeCheck { verified: true })
        } else {
            issued.attempts += 1;
            debug!(request_id, attempts = issued.attempts, "Verification code rejected");
            Ok(CodeCheck { verified: false })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_codes_are_reproducible() {
        let a = InMemoryVerificationService::new(7);
        let b = InMemoryVerificationService::new(7);
        a.send_verification_code("x@example.com").await.unwrap();
        b.send_verification_code("x@example.com").await.unwrap();

        let code = a.last_code_for("x@example.com").await.unwrap();
        assert_eq!(code.len(), 6);
        assert_eq!(Some(code), b.last_code_for("x@example.com").await);
    }

    #[tokio::test]
    async fn test_verify_flow() {
        let service = InMemoryVerificationService::new(1);
        let dispatch = service.send_verification_code("y@example.com").await.unwrap();
        let code = service.last_code_for("y@example.com").await.unwrap();

        let wrong = if code == "000000" { "111111" } else { "000000" };
        assert!(!service.verify_code(&dispatch.request_id, wrong).await.unwrap().verified);
        assert!(service.verify_code(&dispatch.request_id, &code).await.unwrap().verified);
        assert!(matches!(
            service.verify_code(&dispatch.request_id, &code).await,
            Err(OperationError::Validation(_))
        ));
        assert!(matches!(
            service.verify_code("unknown", &code).await,
            Err(OperationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_per_contact() {
        let service = InMemoryVerificationService::new(2).with_max_sends(2);
        service.send_verification_code("z@example.com").await.unwrap();
        service.send_verification_code("z@example.com").await.unwrap();

        assert!(matches!(
            service.send_verification_code("z@example.com").await,
            Err(OperationError::RateLimited(_))
        ));
        assert_eq!(service.sends_to("z@example.com").await, 2);
        // Other contacts are unaffected
        assert!(service.send_verification_code("w@example.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_attempts_are_limited() {
        let service = InMemoryVerificationService::new(3).with_max_attempts(1);
        let dispatch = service.send_verification_code("v@example.com").await.unwrap();
        let code = service.last_code_for("v@example.com").await.unwrap();
        let wrong = if code == "999999" { "888888" } else { "999999" };

        service.verify_code(&dispatch.request_id, wrong).await.unwrap();
        assert!(matches!(
            service.verify_code(&dispatch.request_id, &code).await,
            Err(OperationError::RateLimited(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let service = InMemoryVerificationService::default();
        service
            .faults()
            .fail_next(OperationError::Network("smtp down".into()))
            .await;

        assert!(service.send_verification_code("u@example.com").await.is_err());
        assert_eq!(service.sends_to("u@example.com").await, 0);
        assert!(service.send_verification_code("u@example.com").await.is_ok());
    }
}
