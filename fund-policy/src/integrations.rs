//! Hand-off to the external USDC transfer executor.

use async_trait::async_trait;
use fund_primitives::{RecipientAddress, RequestId, UsdcAmount};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::contracts::FundingRequest;
use crate::engine::{PolicyError, PolicyResult};

/// Authorization record consumed by the Base-network transaction signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    /// Confirmed recipient.
    pub recipient_address: RecipientAddress,
    /// Amount to transfer.
    pub amount: UsdcAmount,
    /// Request the transfer settles.
    pub request_id: RequestId,
}

impl Authorization {
    /// Builds the authorization for an approved request.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidRequest`] when the request has no valid
    /// recipient address.
    pub fn for_request(request: &FundingRequest) -> PolicyResult<Self> {
        match request.parsed_address() {
            Some(Ok(recipient_address)) => Ok(Self {
                recipient_address,
                amount: request.amount(),
                request_id: request.id(),
            }),
            _ => Err(PolicyError::InvalidRequest(
                "authorization requires a confirmed recipient address",
            )),
        }
    }
}

/// Trait implemented by transfer executors.
///
/// Implementations sign and broadcast elsewhere; this crate never holds keys.
#[async_trait]
pub trait TransferExecutor: Send + Sync {
    /// Hands an authorization to the executor.
    async fn submit(&self, authorization: &Authorization) -> PolicyResult<()>;
}

/// Executor that forwards authorizations over a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelExecutor {
    sender: mpsc::Sender<Authorization>,
}

impl ChannelExecutor {
    /// Creates the executor and the receiving end the signer drains.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Authorization>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl TransferExecutor for ChannelExecutor {
    async fn submit(&self, authorization: &Authorization) -> PolicyResult<()> {
        self.sender
            .send(authorization.clone())
            .await
            .map_err(|_| PolicyError::backend("transfer executor channel closed"))
    }
}
