use anyhow::Result;
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;

use crate::execution::types::TxSummary;

#[derive(Debug, Clone)]
pub struct CsvLogger {
    log_path: String,
}

impl CsvLogger {
    pub fn new(log_path: String) -> Result<Self> {
        // Create CSV file with headers if it doesn't exist
        if !std::path::Path::new(&log_path).exists() {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .open(&log_path)?;

            writeln!(file, "timestamp,action,market_id,target,amount_eth,tx_hash,block,dry_run")?;
        }

        Ok(Self { log_path })
    }

    /// Log a submitted (or dry-run) transaction
    pub fn log_tx(&self, tx: &TxSummary, amount_eth: Option<&str>) -> Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.log_path)?;

        writeln!(
            file,
            "{},{},{},{:#x},{},{},{},{}",
            tx.submitted_at.to_rfc3339(),
            tx.action,
            tx.market_id.map(|id| id.to_string()).unwrap_or_default(),
            tx.target,
            amount_eth.unwrap_or(""),
            tx.tx_hash_hex().unwrap_or_default(),
            tx.block.map(|b| b.to_string()).unwrap_or_default(),
            tx.dry_run
        )?;

        Ok(())
    }

    /// Log a free-form event
    pub fn log_event(&self, event: &str) -> Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.log_path)?;

        // commas would shift columns
        writeln!(file, "{},EVENT,,,,{},,", Utc::now().to_rfc3339(), event.replace(',', ";"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::Side;
    use crate::execution::types::TxAction;
    use ethers::types::{Address, H256};

    fn temp_path(name: &str) -> String {
        let path = std::env::temp_dir().join(format!("plotpredict-{}-{}.csv", name, std::process::id()));
        let _ = std::fs::remove_file(&path);
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_header_written_once_and_rows_appended() {
        let path = temp_path("bets");
        let logger = CsvLogger::new(path.clone()).unwrap();
        let tx = TxSummary {
            action: TxAction::PlaceBet(Side::Yes),
            market_id: Some(3),
            target: Address::repeat_byte(0xab),
            tx_hash: Some(H256::repeat_byte(0x01)),
            block: Some(42),
            dry_run: false,
            submitted_at: Utc::now(),
        };
        logger.log_tx(&tx, Some("0.5")).unwrap();

        // reopening must not rewrite the header
        let logger = CsvLogger::new(path.clone()).unwrap();
        logger.log_event("watch started, 3 markets").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,action"));
        assert!(lines[1].contains(",placeYes,3,0xabab"));
        assert!(lines[1].ends_with(",42,false"));
        assert!(lines[2].contains("watch started; 3 markets"));

        let _ = std::fs::remove_file(&path);
    }
}
