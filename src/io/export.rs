use anyhow::Result;
use std::io::Write;

use crate::application::AccountService;
use crate::domain::AccountId;

/// Exporter for converting ledger data to CSV
pub struct Exporter<'a> {
    service: &'a AccountService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a AccountService) -> Self {
        Self { service }
    }

    /// Export account balances to CSV format
    pub async fn export_balances_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let accounts = self.service.accounts(None).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        // Write header
        csv_writer.write_record(["account_id", "customer", "balance_cents"])?;

        let mut count = 0;
        for account in &accounts {
            let customer = self.service.customer(account.customer_id).await?;
            csv_writer.write_record(&[
                account.id.to_string(),
                customer.name,
                account.balance.to_string(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export the ledger entries of one account to CSV format
    pub async fn export_history_csv<W: Write>(
        &self,
        account_id: AccountId,
        writer: W,
    ) -> Result<usize> {
        // Surface an unknown account instead of writing an empty file.
        self.service.account(account_id).await?;

        let entries = self.service.history(account_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        // Write header
        csv_writer.write_record(["entry_id", "account_id", "amount_cents", "kind", "created_at"])?;

        let mut count = 0;
        for entry in &entries {
            csv_writer.write_record(&[
                entry.id.to_string(),
                entry.account_id.to_string(),
                entry.amount.to_string(),
                entry.kind.to_string(),
                entry.created_at.to_rfc3339(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }
}
