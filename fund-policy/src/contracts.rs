//! Funding request and evaluation context contracts.

use chrono::{DateTime, Utc};
use fund_primitives::{RecipientAddress, RequestId, SessionId, UsdcAmount};
use serde::{Deserialize, Serialize};

/// A request for USDC funding raised inside a chat session.
///
/// The recipient address is kept as raw text until the engine validates it, so
/// a malformed address can be reported back instead of silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingRequest {
    #[serde(default)]
    id: RequestId,
    session_id: SessionId,
    requester: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    recipient_address: Option<String>,
    amount: UsdcAmount,
    purpose: String,
    #[serde(default)]
    exchange_count: u32,
}

impl FundingRequest {
    /// Creates a request on the first explicit ask, with no address and an
    /// exchange count of zero.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        requester: impl Into<String>,
        amount: UsdcAmount,
        purpose: impl Into<String>,
    ) -> Self {
        Self {
            id: RequestId::random(),
            session_id,
            requester: requester.into(),
            recipient_address: None,
            amount,
            purpose: purpose.into(),
            exchange_count: 0,
        }
    }

    /// Sets the recipient address as supplied by the requester.
    #[must_use]
    pub fn with_recipient_address(mut self, address: impl Into<String>) -> Self {
        self.confirm_address(address);
        self
    }

    /// Sets the exchange count, e.g. when rebuilding a request from storage.
    #[must_use]
    pub fn with_exchange_count(mut self, exchange_count: u32) -> Self {
        self.exchange_count = exchange_count;
        self
    }

    /// Records the address the requester supplied in conversation.
    ///
    /// Blank input clears the address.
    pub fn confirm_address(&mut self, address: impl Into<String>) {
        let address = address.into();
        self.recipient_address = if address.trim().is_empty() {
            None
        } else {
            Some(address)
        };
    }

    /// Counts one more request/response turn against the decision window.
    pub fn record_exchange(&mut self) -> u32 {
        self.exchange_count = self.exchange_count.saturating_add(1);
        self.exchange_count
    }

    /// Returns the request identifier.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Returns the originating session.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Returns the requester handle.
    #[must_use]
    pub fn requester(&self) -> &str {
        &self.requester
    }

    /// Returns the raw recipient address, if one was supplied.
    #[must_use]
    pub fn recipient_address(&self) -> Option<&str> {
        self.recipient_address.as_deref()
    }

    /// Parses the recipient address.
    ///
    /// Returns `None` when unset and `Some(Err(_))` when malformed.
    #[must_use]
    pub fn parsed_address(&self) -> Option<fund_primitives::Result<RecipientAddress>> {
        self.recipient_address.as_deref().map(RecipientAddress::parse)
    }

    /// Returns the requested amount.
    #[must_use]
    pub fn amount(&self) -> UsdcAmount {
        self.amount
    }

    /// Returns the stated purpose.
    #[must_use]
    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    /// Returns the number of exchanges since the originating message.
    #[must_use]
    pub fn exchange_count(&self) -> u32 {
        self.exchange_count
    }
}

/// Context supplied alongside a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationContext {
    evaluated_at: DateTime<Utc>,
}

impl EvaluationContext {
    /// Context stamped with the current time.
    #[must_use]
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Context stamped with a fixed time.
    #[must_use]
    pub const fn at(evaluated_at: DateTime<Utc>) -> Self {
        Self { evaluated_at }
    }

    /// Returns the timestamp decisions made under this context carry.
    #[must_use]
    pub const fn evaluated_at(&self) -> DateTime<Utc> {
        self.evaluated_at
    }
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionId {
        SessionId::new("chat-1").unwrap()
    }

    #[test]
    fn new_request_starts_without_address() {
        let request = FundingRequest::new(
            session(),
            "@alice",
            UsdcAmount::from_whole(50).unwrap(),
            "docs",
        );
        assert_eq!(request.exchange_count(), 0);
        assert!(request.recipient_address().is_none());
        assert!(request.parsed_address().is_none());
    }

    #[test]
    fn blank_address_clears_previous_value() {
        let mut request = FundingRequest::new(session(), "@bob", UsdcAmount::ZERO, "x")
            .with_recipient_address("0xabc");
        assert!(matches!(request.parsed_address(), Some(Err(_))));

        request.confirm_address("  ");
        assert!(request.recipient_address().is_none());
    }

    #[test]
    fn record_exchange_increments() {
        let mut request = FundingRequest::new(session(), "@carol", UsdcAmount::ZERO, "x");
        assert_eq!(request.record_exchange(), 1);
        assert_eq!(request.record_exchange(), 2);
    }

    #[test]
    fn deserializes_minimal_json() {
        let request: FundingRequest = serde_json::from_str(
            r#"{"session_id":"42","requester":"@dave","amount":"12.5","purpose":"workshop"}"#,
        )
        .unwrap();
        assert_eq!(request.exchange_count(), 0);
        assert_eq!(request.amount().to_string(), "12.5");
        assert!(request.recipient_address().is_none());
    }
}
