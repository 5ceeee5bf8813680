use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use crate::application::{AccountService, SourceSelection};
use crate::domain::{format_cents, parse_cents, AccountId, CustomerId};

/// Contabile - Ledger-backed account service
#[derive(Parser)]
#[command(name = "contabile")]
#[command(about = "A ledger-backed account service with an atomic transfer engine")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "contabile.db")]
    pub database: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Customer management commands
    #[command(subcommand)]
    Customer(CustomerCommands),

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Move money between two accounts
    Transfer {
        /// Amount to transfer (e.g., "50.00" or "50")
        amount: String,

        /// Destination account id
        #[arg(long)]
        to: AccountId,

        /// Source account id
        #[arg(long, conflicts_with = "customer")]
        from: Option<AccountId>,

        /// Pick the source among this customer's accounts instead of naming one
        #[arg(long)]
        customer: Option<CustomerId>,

        /// Source selection policy for --customer transfers
        #[arg(long, value_enum, default_value_t = PolicyArg::First, requires = "customer")]
        policy: PolicyArg,
    },

    /// Show the balance of an account
    Balance {
        /// Account id
        account: AccountId,
    },

    /// Show the ledger history of an account
    History {
        /// Account id
        account: AccountId,

        /// Output as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Verify ledger integrity
    Check,

    /// Export data to CSV
    #[command(subcommand)]
    Export(ExportCommands),
}

#[derive(Subcommand)]
pub enum CustomerCommands {
    /// Register a new customer
    Add {
        /// Customer name
        name: String,
    },

    /// List all customers
    List,
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account for a customer
    Open {
        /// Owning customer id
        #[arg(long)]
        customer: CustomerId,

        /// Initial deposit (e.g., "100.00", defaults to zero)
        #[arg(long, default_value = "0")]
        deposit: String,
    },

    /// List accounts
    List {
        /// Restrict to one customer
        #[arg(long)]
        customer: Option<CustomerId>,
    },

    /// Show detailed account information
    Show {
        /// Account id
        account: AccountId,
    },
}

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Export all account balances
    Balances {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Export the ledger history of one account
    History {
        /// Account id
        account: AccountId,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    /// First owned account with a sufficient balance
    First,
    /// Owned account with the largest balance
    Largest,
}

impl From<PolicyArg> for SourceSelection {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::First => SourceSelection::FirstSufficient,
            PolicyArg::Largest => SourceSelection::LargestBalance,
        }
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Init => {
                AccountService::init(&self.database).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Customer(customer_cmd) => {
                let service = AccountService::connect(&self.database).await?;
                run_customer_command(&service, customer_cmd).await?;
            }

            Commands::Account(account_cmd) => {
                let service = AccountService::connect(&self.database).await?;
                run_account_command(&service, account_cmd).await?;
            }

            Commands::Transfer {
                amount,
                to,
                from,
                customer,
                policy,
            } => {
                let service = AccountService::connect(&self.database)
                    .await?
                    .with_selection(policy.into());
                let amount_cents =
                    parse_cents(&amount).context("Invalid amount format. Use '50.00' or '50'")?;

                let receipt = match (from, customer) {
                    (Some(from_id), _) => service.transfer(from_id, to, amount_cents).await?,
                    (None, Some(customer_id)) => {
                        service
                            .transfer_between_owned(customer_id, to, amount_cents)
                            .await?
                    }
                    (None, None) => {
                        anyhow::bail!("Specify a source with --from <account> or --customer <id>");
                    }
                };

                println!(
                    "Transferred {} from account {} to account {}",
                    format_cents(-receipt.debit.amount),
                    receipt.debit.account_id,
                    receipt.credit.account_id
                );
            }

            Commands::Balance { account } => {
                let service = AccountService::connect(&self.database).await?;
                let balance = service.balance(account).await?;
                println!("Account {}: {}", account, format_cents(balance));
            }

            Commands::History { account, json } => {
                let service = AccountService::connect(&self.database).await?;
                run_history_command(&service, account, json).await?;
            }

            Commands::Check => {
                let service = AccountService::connect(&self.database).await?;
                run_check_command(&service).await?;
            }

            Commands::Export(export_cmd) => {
                let service = AccountService::connect(&self.database).await?;
                run_export_command(&service, export_cmd).await?;
            }
        }

        Ok(())
    }
}

async fn run_customer_command(service: &AccountService, cmd: CustomerCommands) -> Result<()> {
    match cmd {
        CustomerCommands::Add { name } => {
            let customer = service.create_customer(&name).await?;
            println!("Created customer: {} (id {})", customer.name, customer.id);
        }

        CustomerCommands::List => {
            let customers = service.customers().await?;
            if customers.is_empty() {
                println!("No customers found.");
            } else {
                println!("{:<6} {:<24} {:<12}", "ID", "NAME", "SINCE");
                println!("{}", "-".repeat(44));
                for customer in customers {
                    println!(
                        "{:<6} {:<24} {:<12}",
                        customer.id,
                        customer.name,
                        customer.created_at.format("%Y-%m-%d")
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_account_command(service: &AccountService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Open { customer, deposit } => {
            let deposit_cents =
                parse_cents(&deposit).context("Invalid deposit format. Use '100.00' or '100'")?;

            let account = service.create_account(customer, deposit_cents).await?;
            println!(
                "Opened account {} for customer {} with {}",
                account.id,
                account.customer_id,
                format_cents(account.balance)
            );
        }

        AccountCommands::List { customer } => {
            let accounts = service.accounts(customer).await?;
            if accounts.is_empty() {
                println!("No accounts found.");
            } else {
                println!("{:<6} {:<10} {:>12}", "ID", "CUSTOMER", "BALANCE");
                println!("{}", "-".repeat(30));
                for account in accounts {
                    println!(
                        "{:<6} {:<10} {:>12}",
                        account.id,
                        account.customer_id,
                        format_cents(account.balance)
                    );
                }
            }
        }

        AccountCommands::Show { account } => {
            let info = service.account_info(account).await?;

            println!("Account: {}", info.account.id);
            println!("  Owner:         {} (id {})", info.customer.name, info.customer.id);
            println!("  Balance:       {}", format_cents(info.account.balance));
            println!("  Entries:       {}", info.entry_count);
            println!(
                "  Opened:        {}",
                info.account.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            if let Some(last) = info.last_activity {
                println!("  Last activity: {}", last.format("%Y-%m-%d %H:%M:%S"));
            }
        }
    }
    Ok(())
}

async fn run_history_command(service: &AccountService, account: AccountId, json: bool) -> Result<()> {
    // Surface unknown accounts here; the history query itself treats them as empty.
    service.account(account).await?;
    let entries = service.history(account).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No entries found.");
    } else {
        println!("{:<6} {:<20} {:<10} {:>12}", "ID", "DATE", "KIND", "AMOUNT");
        println!("{}", "-".repeat(52));
        for entry in entries {
            println!(
                "{:<6} {:<20} {:<10} {:>12}",
                entry.id,
                entry.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                entry.kind,
                format_cents(entry.amount)
            );
        }
    }
    Ok(())
}

async fn run_check_command(service: &AccountService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Customers: {}", report.customer_count);
    println!("Accounts:  {}", report.account_count);
    println!("Entries:   {}", report.entry_count);
    println!();

    if report.is_clean() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in report.issues() {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

async fn run_export_command(service: &AccountService, cmd: ExportCommands) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(service);

    let open_writer = |output: &Option<String>| -> Result<Box<dyn Write>> {
        match output {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create output file: {}", path))?;
                Ok(Box::new(file))
            }
            None => Ok(Box::new(stdout())),
        }
    };

    match cmd {
        ExportCommands::Balances { output } => {
            let writer = open_writer(&output)?;
            let count = exporter.export_balances_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} balances", count);
            }
        }

        ExportCommands::History { account, output } => {
            let writer = open_writer(&output)?;
            let count = exporter.export_history_csv(account, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} entries", count);
            }
        }
    }

    Ok(())
}
