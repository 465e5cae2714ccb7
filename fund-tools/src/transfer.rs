//! Typed `send_usdc` arguments.

use fund_policy::{LedgerResult, SessionLedger};
use fund_primitives::{RecipientAddress, SessionId, UsdcAmount};
use serde::Deserialize;
use tracing::info;

use crate::catalog::{FunctionCall, SEND_USDC};
use crate::{ToolError, ToolResult};

/// Validated recipient and amount from a `send_usdc` call.
///
/// Holding one of these authorizes nothing; the address is handed to the
/// session ledger and the request still goes through the gate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferArguments {
    /// Recipient the model asked to pay.
    pub to_address: RecipientAddress,
    /// Requested amount.
    pub amount: UsdcAmount,
}

impl TransferArguments {
    /// Extracts transfer arguments from a parsed call.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] when the call is not
    /// `send_usdc`, the address is malformed, or the amount is not a
    /// positive USDC value.
    pub fn from_call(call: &FunctionCall) -> ToolResult<Self> {
        if call.name != SEND_USDC {
            return Err(ToolError::invalid_arguments(
                &call.name,
                format!("expected a `{SEND_USDC}` call"),
            ));
        }
        let arguments = Self::deserialize(&call.arguments)
            .map_err(|err| ToolError::invalid_arguments(SEND_USDC, err.to_string()))?;
        if arguments.amount.is_zero() {
            return Err(ToolError::invalid_arguments(SEND_USDC, "amount must be positive"));
        }
        Ok(arguments)
    }

    /// Records the recipient as the session's confirmed address.
    ///
    /// # Errors
    ///
    /// Propagates ledger errors such as a missing open request.
    pub fn confirm_on(&self, ledger: &SessionLedger, session_id: &SessionId) -> LedgerResult<()> {
        ledger.confirm_address(session_id, self.to_address.as_str())?;
        info!(
            session_id = %session_id,
            recipient = %self.to_address,
            "recipient address taken from function call"
        );
        Ok(())
    }
}
