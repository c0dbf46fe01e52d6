//! Append-only JSON Lines output: one record per opportunity found and per
//! execution attempted.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

use crate::arb::rank::{Opportunity, Strategy};
use crate::arb::route_quote::HopQuote;
use crate::guard::{ExecutionReceipt, GuardState};

/// One line of the opportunity feed. Amounts are decimal strings in raw
/// base-token units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunityRecord {
    /// Block of the snapshot the opportunity was found in
    pub block_number: u64,
    /// Token symbols, base first and last
    pub route: Vec<String>,
    /// Swap ids, for matching receipts
    pub route_key: String,
    /// Profit at the chosen input
    pub profit_bps: i64,
    /// Chosen input
    pub input_amount: String,
    /// Expected output
    pub expected_amount_out: String,
    /// Expected output minus input
    pub expected_profit: String,
    /// How the input is funded
    pub strategy: Strategy,
    /// Gas units
    pub gas_estimate: u64,
    /// Profit minus gas, USD WAD
    pub efficiency_score: String,
}

impl From<&Opportunity> for OpportunityRecord {
    fn from(opportunity: &Opportunity) -> Self {
        Self {
            block_number: opportunity.block_number,
            route: opportunity.symbols.clone(),
            route_key: opportunity.route.key(),
            profit_bps: opportunity.profit_bps,
            input_amount: opportunity.amount_in.to_string(),
            expected_amount_out: opportunity.expected_amount_out.to_string(),
            expected_profit: opportunity.expected_profit.to_string(),
            strategy: opportunity.strategy,
            gas_estimate: opportunity.gas_estimate,
            efficiency_score: opportunity.efficiency_score.to_string(),
        }
    }
}

/// One line of the receipt log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    /// Swap ids of the executed route
    pub route: String,
    /// How the input was funded
    pub strategy: Strategy,
    /// Input
    pub amount_in: String,
    /// Sent to the treasury
    pub actual_profit: String,
    /// Gas units charged
    pub gas_used: u64,
    /// Gas cost in wei
    pub gas_fee_wei: String,
    /// `settled` or `reverted`
    pub final_state: GuardState,
    /// Why it reverted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
    /// States entered, in order
    pub trail: Vec<GuardState>,
    /// Amounts swapped per hop
    #[serde(default)]
    pub hops: Vec<HopRecord>,
}

/// One executed hop of a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopRecord {
    /// Pool swapped against
    pub pool: String,
    /// Token sold
    pub token_in: String,
    /// Token bought
    pub token_out: String,
    /// Amount sold
    pub amount_in: String,
    /// Amount bought
    pub amount_out: String,
}

impl From<&HopQuote> for HopRecord {
    fn from(hop: &HopQuote) -> Self {
        Self {
            pool: hop.swap.pool_id().to_string(),
            token_in: hop.swap.token_in().to_string(),
            token_out: hop.swap.token_out().to_string(),
            amount_in: hop.amount_in.to_string(),
            amount_out: hop.amount_out.to_string(),
        }
    }
}

impl From<&ExecutionReceipt> for ReceiptRecord {
    fn from(receipt: &ExecutionReceipt) -> Self {
        Self {
            route: receipt.route.clone(),
            strategy: receipt.strategy,
            amount_in: receipt.amount_in.to_string(),
            actual_profit: receipt.actual_profit.to_string(),
            gas_used: receipt.gas_used,
            gas_fee_wei: receipt.gas_fee_wei.to_string(),
            final_state: receipt.final_state,
            revert_reason: receipt.revert_reason.as_ref().map(ToString::to_string),
            trail: receipt.trail.clone(),
            hops: receipt.hops.iter().map(HopRecord::from).collect(),
        }
    }
}

/// Appends serialized records to a file, one per line.
#[derive(Debug)]
pub struct JsonlWriter {
    path: PathBuf,
    file: File,
}

impl JsonlWriter {
    /// Opens `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// The file cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .wrap_err_with(|| format!("opening feed {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Writes one record as a line.
    ///
    /// # Errors
    ///
    /// Serialization or the write fails.
    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .wrap_err_with(|| format!("writing to {}", self.path.display()))
    }

    /// Writes every record.
    ///
    /// # Errors
    ///
    /// As [`Self::append`]. Records before the failing one stay written.
    pub fn append_all<'a, T: Serialize + 'a>(&mut self, records: impl IntoIterator<Item = &'a T>) -> Result<usize> {
        let mut written = 0;
        for record in records {
            self.append(record)?;
            written += 1;
        }
        Ok(written)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use alloy::primitives::{I256, U256};

    use super::*;
    use crate::arb::route_quote::RouteQuote;
    use crate::arb::test_helpers::*;
    use crate::guard::RevertReason;

    #[test]
    fn test_records_append_as_lines() {
        let market = snapshot(&[("P1", "A", "B", 100, 200), ("P2", "B", "A", 300, 100)]);
        let opportunity = Opportunity {
            route: route(&market, &["P1", "P2"], "A"),
            symbols: vec!["A".to_string(), "B".to_string(), "A".to_string()],
            block_number: 9,
            profit_bps: 3_500,
            amount_in: U256::from(20),
            expected_amount_out: U256::from(27),
            expected_profit: U256::from(7),
            strategy: Strategy::FlashLoan,
            gas_estimate: 360_000,
            efficiency_score: I256::try_from(-5i64).unwrap(),
        };
        let receipt = ExecutionReceipt {
            route: opportunity.route.key(),
            strategy: Strategy::FlashLoan,
            amount_in: U256::from(20),
            actual_profit: U256::ZERO,
            gas_used: 120_000,
            gas_fee_wei: U256::from(1_200_000),
            final_state: GuardState::Reverted,
            revert_reason: Some(RevertReason::NotInitialized),
            trail: vec![GuardState::Idle, GuardState::Reverted],
            hops: RouteQuote::new(&opportunity.route, &market, U256::from(20))
                .unwrap()
                .hops()
                .to_vec(),
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.jsonl");
        let mut writer = JsonlWriter::open(&path).unwrap();
        writer.append(&OpportunityRecord::from(&opportunity)).unwrap();
        writer.append(&ReceiptRecord::from(&receipt)).unwrap();
        drop(writer);

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);

        let record: OpportunityRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record.input_amount, "20");
        assert_eq!(record.efficiency_score, "-5");
        assert_eq!(record.strategy, Strategy::FlashLoan);

        let json: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(json["final_state"], "reverted");
        assert_eq!(json["revert_reason"], "not initialized");
        assert_eq!(json["trail"], serde_json::json!(["idle", "reverted"]));
        let record: ReceiptRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(record.hops.len(), 2);
        assert_eq!(record.hops[0].pool, pool_id("P1").to_string());
        assert_eq!(record.hops[0].amount_out, "31");
        assert_eq!(record.hops[1].amount_in, "31");
        assert_eq!(record.hops[1].amount_out, "9");
    }

    #[test]
    fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.jsonl");
        for n in 0..2 {
            JsonlWriter::open(&path)
                .unwrap()
                .append(&serde_json::json!({ "n": n }))
                .unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
    }
}
