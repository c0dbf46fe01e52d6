use std::time::Duration;

use eyre::{eyre, Result};
use reqwest::Client;
use serde_json::json;

use crate::arb::rank::Opportunity;
use crate::guard::ExecutionReceipt;

/// Posts messages to Slack through `chat.postMessage`.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    /// The Slack OAuth token
    token: String,
    /// HTTP client with a request timeout
    client: Client,
    /// Channel for opportunities and receipts
    channel: String,
    /// Channel for faults
    error_channel: String,
}

impl SlackNotifier {
    /// Notifier posting with `token`.
    ///
    /// # Errors
    ///
    /// The HTTP client cannot be built.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            token: token.into(),
            client,
            channel: "#flashroute".to_string(),
            error_channel: "#flashroute-errors".to_string(),
        })
    }

    /// Notifier using `SLACK_OAUTH_TOKEN`.
    ///
    /// # Errors
    ///
    /// The variable is not set.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("SLACK_OAUTH_TOKEN").map_err(|_| eyre!("SLACK_OAUTH_TOKEN not set"))?;
        Self::new(token)
    }

    /// Send a message to a specific channel
    ///
    /// # Errors
    ///
    /// The request fails or Slack answers `ok: false`.
    pub async fn send_to(&self, msg: &str, channel: &str) -> Result<()> {
        let payload = json!({
            "channel": channel,
            "text": msg,
            "username": "flashroute",
            "icon_emoji": ":zap:"
        });

        let response = self
            .client
            .post("https://slack.com/api/chat.postMessage")
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?;

        if !response["ok"].as_bool().unwrap_or(false) {
            return Err(eyre!(
                "Slack API error: {}",
                response["error"].as_str().unwrap_or("unknown error")
            ));
        }
        Ok(())
    }

    /// Send a message to the default channel
    ///
    /// # Errors
    ///
    /// As [`Self::send_to`].
    pub async fn send(&self, msg: &str) -> Result<()> {
        self.send_to(msg, &self.channel).await
    }

    /// Send an error message to the error channel
    ///
    /// # Errors
    ///
    /// As [`Self::send_to`].
    pub async fn send_error(&self, error: &str) -> Result<()> {
        self.send_to(&format!(":warning: Error: {error}"), &self.error_channel)
            .await
    }

    /// Posts the best opportunities of a cycle.
    ///
    /// # Errors
    ///
    /// As [`Self::send_to`].
    pub async fn send_opportunities(&self, opportunities: &[Opportunity]) -> Result<()> {
        if opportunities.is_empty() {
            return Ok(());
        }
        self.send(&opportunities_message(opportunities)).await
    }

    /// Posts an execution receipt.
    ///
    /// # Errors
    ///
    /// As [`Self::send_to`].
    pub async fn send_receipt(&self, receipt: &ExecutionReceipt) -> Result<()> {
        self.send(&receipt_message(receipt)).await
    }
}

/// Shown per message; the feed has the rest
const MAX_LISTED: usize = 5;

fn opportunities_message(opportunities: &[Opportunity]) -> String {
    let mut lines = vec![format!(
        ":mag: {} opportunities at block {}",
        opportunities.len(),
        opportunities[0].block_number
    )];
    lines.extend(opportunities.iter().take(MAX_LISTED).map(|o| {
        format!(
            "• {} | {} bps | in {} | {} | gas {}",
            o.symbols.join(" → "),
            o.profit_bps,
            o.amount_in,
            o.strategy,
            o.gas_estimate
        )
    }));
    if opportunities.len() > MAX_LISTED {
        lines.push(format!("…and {} more", opportunities.len() - MAX_LISTED));
    }
    lines.join("\n")
}

fn receipt_message(receipt: &ExecutionReceipt) -> String {
    let trail = receipt
        .trail
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" → ");
    match &receipt.revert_reason {
        None => format!(
            ":white_check_mark: settled {} profit {} gas {} ({trail})",
            receipt.route, receipt.actual_profit, receipt.gas_used
        ),
        Some(reason) => format!(
            ":x: reverted {}: {reason} gas {} ({trail})",
            receipt.route, receipt.gas_used
        ),
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;

    use super::*;
    use crate::arb::rank::Strategy;
    use crate::guard::{GuardState, RevertReason};

    #[test]
    fn test_receipt_message() {
        let receipt = ExecutionReceipt {
            route: "P1 0>1,P2 1>0".to_string(),
            strategy: Strategy::FlashLoan,
            amount_in: U256::from(20),
            actual_profit: U256::ZERO,
            gas_used: 120_000,
            gas_fee_wei: U256::ZERO,
            final_state: GuardState::Reverted,
            revert_reason: Some(RevertReason::GasPriceTooHigh {
                gas_price_wei: 2,
                max_gas_price_wei: 1,
            }),
            trail: vec![GuardState::Idle, GuardState::Reverted],
            hops: Vec::new(),
        };
        assert_eq!(
            receipt_message(&receipt),
            ":x: reverted P1 0>1,P2 1>0: gas price 2 above max 1 gas 120000 (Idle → Reverted)"
        );
    }
}
