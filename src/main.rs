use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zenith::application::ledger::Ledger;
use zenith::config::{Config, StorageConfig};
use zenith::domain::debt::{DebtChanges, DebtId, DebtState, NewDebt};
use zenith::domain::exchange::RateTable;
use zenith::domain::income::{IncomeCategory, NewIncome};
use zenith::domain::money::{Amount, Currency, format_money};
use zenith::domain::payment::{NewPayment, PaymentChanges, PaymentFilter, PaymentId};
use zenith::domain::ports::RepositoryBox;
use zenith::domain::user::{Credentials, UserId};
use zenith::error::{Result, ZenithError};
use zenith::infrastructure::http::{ApiClient, DEFAULT_API_URL, HttpRepository};
use zenith::infrastructure::in_memory::InMemoryStore;
use zenith::infrastructure::json_file::JsonFileStore;
use zenith::infrastructure::session::SessionFile;
use zenith::interfaces::csv::payment_reader::PaymentReader;
use zenith::interfaces::csv::report_writer::ReportWriter;

#[derive(Parser)]
#[command(author, version, about = "Track debts, payments and income", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./zenith.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keep data in this JSON file
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Keep data in a RocksDB directory (requires the storage-rocksdb feature)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Use the REST backend at this URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log into the REST backend and remember the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account on the REST backend and log into it
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Manage debts
    Debts {
        #[command(subcommand)]
        action: DebtCommand,
    },
    /// Manage payments made against debts
    Payments {
        #[command(subcommand)]
        action: PaymentCommand,
    },
    /// Manage income (local storage only)
    Incomes {
        #[command(subcommand)]
        action: IncomeCommand,
    },
    /// Totals across all debts, or the debts falling due soon
    Dashboard {
        #[arg(long)]
        upcoming: bool,
        /// Days ahead to look for due dates
        #[arg(long)]
        days: Option<u32>,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Reference exchange rates, or convert an amount between currencies
    Rates {
        #[arg(long, requires_all = ["from", "to"])]
        amount: Option<Decimal>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
}

#[derive(Subcommand)]
enum DebtCommand {
    List {
        /// Only debts whose description or creditor contains this text
        #[arg(long)]
        search: Option<String>,
        /// pending, in_progress, paid or overdue
        #[arg(long)]
        state: Option<String>,
    },
    Show {
        id: DebtId,
    },
    Add(NewDebtArgs),
    Edit(EditDebtArgs),
    Delete {
        id: DebtId,
    },
}

#[derive(Args)]
struct NewDebtArgs {
    #[arg(long)]
    description: String,
    #[arg(long, default_value = "")]
    creditor: String,
    #[arg(long)]
    amount: Decimal,
    #[arg(long, default_value = "USD")]
    currency: String,
    /// Target payment date (YYYY-MM-DD)
    #[arg(long)]
    due: NaiveDate,
    /// Interest rate in percent
    #[arg(long)]
    interest: Option<Decimal>,
    #[arg(long)]
    reminder: bool,
}

#[derive(Args)]
struct EditDebtArgs {
    id: DebtId,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    creditor: Option<String>,
    #[arg(long)]
    amount: Option<Decimal>,
    #[arg(long)]
    currency: Option<String>,
    #[arg(long)]
    due: Option<NaiveDate>,
    #[arg(long, conflicts_with = "no_interest")]
    interest: Option<Decimal>,
    /// Stop applying interest
    #[arg(long)]
    no_interest: bool,
    #[arg(long)]
    reminder: Option<bool>,
}

#[derive(Subcommand)]
enum PaymentCommand {
    List {
        #[arg(long)]
        debt: Option<DebtId>,
        /// Only payments whose note contains this text
        #[arg(long)]
        search: Option<String>,
        /// Print totals per currency instead of the payments
        #[arg(long)]
        stats: bool,
    },
    Add {
        debt: DebtId,
        #[arg(long)]
        amount: Decimal,
        /// Defaults to the debt's currency
        #[arg(long)]
        currency: Option<String>,
        /// Units of the debt's currency per unit of the payment currency
        #[arg(long)]
        rate: Option<Decimal>,
        #[arg(long)]
        note: Option<String>,
    },
    Edit {
        id: PaymentId,
        #[arg(long)]
        amount: Option<Decimal>,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        rate: Option<Decimal>,
        #[arg(long)]
        note: Option<String>,
    },
    Delete {
        id: PaymentId,
    },
    /// Record every payment in a CSV file with columns debt,amount,currency,rate,note
    Import {
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum IncomeCommand {
    List,
    Add {
        #[arg(long)]
        description: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, default_value = "USD")]
        currency: String,
        #[arg(long, default_value = "Salario")]
        category: String,
        /// Defaults to today (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Summary,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).into_diagnostic()?;
    apply_overrides(&mut config, &cli);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    run(cli.command, config).await.into_diagnostic()
}

/// Storage flags on the command line win over the configuration.
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(path) = &cli.data {
        config.storage = StorageConfig::File { path: path.clone() };
    }
    if let Some(path) = &cli.db_path {
        config.storage = StorageConfig::RocksDb { path: path.clone() };
    }
    if let Some(api_url) = &cli.api_url {
        let timeout_secs = match config.storage {
            StorageConfig::Remote { timeout_secs, .. } => timeout_secs,
            _ => 10,
        };
        config.storage = StorageConfig::Remote {
            api_url: api_url.clone(),
            timeout_secs,
        };
    }
}

fn api_client(config: &Config) -> Result<ApiClient> {
    match &config.storage {
        StorageConfig::Remote {
            api_url,
            timeout_secs,
        } => ApiClient::new(api_url, Duration::from_secs(*timeout_secs)),
        _ => ApiClient::new(DEFAULT_API_URL, Duration::from_secs(10)),
    }
}

/// Builds the repository selected by the configuration and returns it with
/// the user whose records it serves.
async fn open_repository(config: &Config) -> Result<(RepositoryBox, UserId)> {
    let user = config.local_user_id;
    let repository: RepositoryBox = match &config.storage {
        StorageConfig::Memory => Box::new(InMemoryStore::new()),
        StorageConfig::File { path } => Box::new(JsonFileStore::open(path).await?),
        StorageConfig::RocksDb { path } => open_rocksdb(path).await?,
        StorageConfig::Remote { .. } => {
            let session = SessionFile::new(&config.session_file)
                .load()
                .await?
                .ok_or(ZenithError::Unauthenticated)?;
            let user = session.user.id;
            let repository: RepositoryBox =
                Box::new(HttpRepository::new(api_client(config)?, session));
            return Ok((repository, user));
        }
    };
    Ok((repository, user))
}

#[cfg(feature = "storage-rocksdb")]
async fn open_rocksdb(path: &Path) -> Result<RepositoryBox> {
    Ok(Box::new(zenith::infrastructure::rocksdb::RocksDbStore::open(path)?))
}

#[cfg(not(feature = "storage-rocksdb"))]
async fn open_rocksdb(path: &Path) -> Result<RepositoryBox> {
    let fallback = path.join("zenith.json");
    tracing::warn!(
        "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to the JSON file store at {}",
        fallback.display()
    );
    Ok(Box::new(JsonFileStore::open(fallback).await?))
}

async fn run(command: Command, config: Config) -> Result<()> {
    let session_file = SessionFile::new(&config.session_file);

    match command {
        Command::Login { email, password } => {
            let session = api_client(&config)?
                .login(&Credentials { email, password })
                .await?;
            session_file.save(&session).await?;
            println!("Logged in as {} <{}>", session.user.name, session.user.email);
            Ok(())
        }
        Command::Register {
            name,
            email,
            password,
        } => {
            let session = api_client(&config)?
                .register(&name, &Credentials { email, password })
                .await?;
            session_file.save(&session).await?;
            println!("Registered and logged in as {}", session.user.name);
            Ok(())
        }
        Command::Logout => {
            session_file.clear().await?;
            println!("Logged out");
            Ok(())
        }
        Command::Rates { amount, from, to } => rates(amount, from, to),
        command => manage(command, &config).await,
    }
}

/// Runs a command that reads or changes the user's records.
async fn manage(command: Command, config: &Config) -> Result<()> {
    let today = Local::now().date_naive();
    let (repository, user) = open_repository(config).await?;
    let ledger = Ledger::new(repository);
    let mut report = ReportWriter::new(io::stdout());

    match command {
        Command::Debts { action } => match action {
            DebtCommand::List { search, state } => {
                let state = state.as_deref().map(str::parse::<DebtState>).transpose()?;
                let views = ledger
                    .search_debts(user, search.as_deref(), state, today)
                    .await?;
                report.write_debts(&views)?;
            }
            DebtCommand::Show { id } => {
                let view = ledger.debt(id, today).await?;
                let payments = ledger.payments(PaymentFilter::for_debt(id)).await?;
                report.write_debts(std::slice::from_ref(&view))?;
                println!();
                ReportWriter::new(io::stdout()).write_payments(&payments)?;
            }
            DebtCommand::Add(args) => {
                let debt = ledger
                    .add_debt(NewDebt {
                        user_id: user,
                        description: args.description,
                        creditor: args.creditor,
                        principal: args.amount,
                        currency: Currency::new(&args.currency)?,
                        due_on: args.due,
                        reminder: args.reminder,
                        interest_rate: args.interest,
                    })
                    .await?;
                let view = ledger.debt(debt.id, today).await?;
                report.write_debts(&[view])?;
            }
            DebtCommand::Edit(args) => {
                let interest_rate = if args.no_interest {
                    Some(None)
                } else {
                    args.interest.map(Some)
                };
                let changes = DebtChanges {
                    description: args.description,
                    creditor: args.creditor,
                    principal: args.amount,
                    currency: args.currency.as_deref().map(Currency::new).transpose()?,
                    due_on: args.due,
                    reminder: args.reminder,
                    interest_rate,
                };
                let debt = ledger.edit_debt(args.id, changes).await?;
                let view = ledger.debt(debt.id, today).await?;
                report.write_debts(&[view])?;
            }
            DebtCommand::Delete { id } => {
                ledger.remove_debt(id).await?;
                println!("Debt {} deleted", id);
            }
        },
        Command::Payments { action } => match action {
            PaymentCommand::List {
                debt,
                search,
                stats,
            } => {
                if stats {
                    report.write_payment_stats(&ledger.payment_stats(user).await?)?;
                } else {
                    let payments = ledger
                        .search_payments(user, search.as_deref(), debt)
                        .await?;
                    report.write_payments(&payments)?;
                }
            }
            PaymentCommand::Add {
                debt,
                amount,
                currency,
                rate,
                note,
            } => {
                let currency = match currency {
                    Some(code) => Currency::new(&code)?,
                    None => ledger.debt(debt, today).await?.debt.currency,
                };
                let mut payment = NewPayment::new(debt, Amount::new(amount)?, currency);
                payment.exchange_rate = rate;
                payment.note = note;

                let receipt = ledger.record_payment(payment).await?;
                let view = ledger.debt(debt, today).await?;
                println!(
                    "Payment {} recorded. Remaining: {} ({})",
                    receipt.payment.id,
                    format_money(receipt.new_balance, &view.debt.currency),
                    receipt.debt_state
                );
            }
            PaymentCommand::Edit {
                id,
                amount,
                currency,
                rate,
                note,
            } => {
                let changes = PaymentChanges {
                    amount: amount.map(Amount::new).transpose()?,
                    currency: currency.as_deref().map(Currency::new).transpose()?,
                    exchange_rate: rate,
                    note,
                };
                let receipt = ledger.edit_payment(user, id, changes).await?;
                let view = ledger.debt(receipt.payment.debt_id, today).await?;
                println!(
                    "Payment {} updated. Remaining: {} ({})",
                    id,
                    format_money(receipt.new_balance, &view.debt.currency),
                    receipt.debt_state
                );
            }
            PaymentCommand::Delete { id } => {
                ledger.remove_payment(id).await?;
                println!("Payment {} deleted", id);
            }
            PaymentCommand::Import { file } => {
                let reader = PaymentReader::new(File::open(file)?);
                let mut imported = Vec::new();
                for row in reader.payments() {
                    match row {
                        Ok(payment) => match ledger.record_payment(payment).await {
                            Ok(receipt) => imported.push(receipt.payment),
                            Err(e) => eprintln!("Error recording payment: {}", e),
                        },
                        Err(e) => eprintln!("Error reading payment: {}", e),
                    }
                }
                report.write_payments(&imported)?;
            }
        },
        Command::Incomes { action } => match action {
            IncomeCommand::List => report.write_incomes(&ledger.incomes(user).await?)?,
            IncomeCommand::Add {
                description,
                amount,
                currency,
                category,
                date,
            } => {
                let income = ledger
                    .add_income(NewIncome {
                        user_id: user,
                        description,
                        amount: Amount::new(amount)?,
                        currency: Currency::new(&currency)?,
                        category: category.parse::<IncomeCategory>()?,
                        received_on: date,
                    })
                    .await?;
                report.write_incomes(&[income])?;
            }
            IncomeCommand::Summary => {
                report.write_income_summary(&ledger.income_summary(user).await?)?
            }
        },
        Command::Dashboard {
            upcoming,
            days,
            limit,
        } => {
            if upcoming {
                let window = days.unwrap_or(config.upcoming_window_days);
                let views = ledger.upcoming_due(user, today, window, limit).await?;
                report.write_debts(&views)?;
            } else {
                report.write_dashboard(&ledger.dashboard(user).await?)?;
            }
        }
        Command::Login { .. }
        | Command::Register { .. }
        | Command::Logout
        | Command::Rates { .. } => {}
    }

    Ok(())
}

fn rates(amount: Option<Decimal>, from: Option<String>, to: Option<String>) -> Result<()> {
    let table = RateTable::simulated();
    match (amount, from, to) {
        (Some(amount), Some(from), Some(to)) => {
            let from = Currency::new(&from)?;
            let to = Currency::new(&to)?;
            let converted = table.convert(amount, &from, &to)?;
            println!(
                "{} = {}",
                format_money(amount, &from),
                format_money(converted, &to)
            );
        }
        _ => {
            ReportWriter::new(io::stdout()).write_quotes(table.quotes())?;
        }
    }
    Ok(())
}
