use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use crate::application::{AppError, LoanService};
use crate::domain::{format_cents, parse_cents, Application, Cents, Judgement, Repayment};
use crate::io::DocumentStore;

/// Mutuo - loan-origination back office
#[derive(Parser)]
#[command(name = "mutuo")]
#[command(about = "A loan back office: judgement, disbursement and a compensating repayment ledger")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "mutuo.db")]
    pub database: String,

    /// Document storage directory
    #[arg(long, default_value = "documents", global = true)]
    pub document_root: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Application management commands
    #[command(subcommand)]
    Application(ApplicationCommands),

    /// Credit judgement commands
    #[command(subcommand)]
    Judgement(JudgementCommands),

    /// Record a disbursement entry and open the ledger for an application
    Entry {
        /// Application id
        application_id: i64,

        /// Disbursed amount (e.g. "500.00" or "500")
        amount: String,
    },

    /// Repayment commands
    #[command(subcommand)]
    Repayment(RepaymentCommands),

    /// Show the outstanding balance for an application
    Balance {
        /// Application id
        application_id: i64,
    },

    /// Verify ledger integrity
    Check,

    /// Application paperwork commands
    #[command(subcommand)]
    Document(DocumentCommands),
}

#[derive(Subcommand)]
pub enum ApplicationCommands {
    /// File a new loan application
    Create {
        /// Applicant name
        name: String,
    },

    /// Show an application
    Show {
        /// Application id
        id: i64,
    },

    /// Mark an application as contracted
    Contract {
        /// Application id
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum JudgementCommands {
    /// Record a credit judgement for an application
    Create {
        /// Application id
        application_id: i64,

        /// Judging officer name
        name: String,

        /// Approved amount
        amount: String,
    },

    /// Show a judgement
    Show {
        /// Judgement id
        id: i64,
    },

    /// Show the live judgement of an application
    OfApplication {
        /// Application id
        application_id: i64,
    },

    /// Overwrite a judgement's officer name and approved amount
    Update {
        /// Judgement id
        id: i64,

        /// Judging officer name
        name: String,

        /// Approved amount
        amount: String,
    },

    /// Soft-delete a judgement
    Delete {
        /// Judgement id
        id: i64,
    },

    /// Grant the judgement's approved amount to its application
    Grant {
        /// Judgement id
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum RepaymentCommands {
    /// Record a repayment against an application's balance
    Create {
        /// Application id
        application_id: i64,

        /// Repaid amount
        amount: String,
    },

    /// List repayments for an application
    List {
        /// Application id
        application_id: i64,

        /// Include tombstoned repayments (full audit trail)
        #[arg(long)]
        include_deleted: bool,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Correct a repayment amount (compensates the ledger)
    Update {
        /// Repayment id
        id: i64,

        /// Corrected amount
        amount: String,
    },

    /// Delete a repayment (restores its amount to the ledger)
    Delete {
        /// Repayment id
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum DocumentCommands {
    /// Store a document from a local file
    Save {
        /// Path of the file to store
        path: String,
    },

    /// Print a stored document to stdout
    Load {
        /// Document name
        name: String,
    },

    /// List stored documents
    List,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        self.execute()
            .await
            .map_err(|e| anyhow!("[{}] {}", e.result_type(), e))
    }

    async fn execute(self) -> Result<(), AppError> {
        match self.command {
            Commands::Init => {
                LoanService::init(&self.database).await?;
                println!("Initialized database at {}", self.database);
                Ok(())
            }
            Commands::Application(command) => {
                let service = LoanService::connect(&self.database).await?;
                run_application_command(&service, command).await
            }
            Commands::Judgement(command) => {
                let service = LoanService::connect(&self.database).await?;
                run_judgement_command(&service, command).await
            }
            Commands::Entry {
                application_id,
                amount,
            } => {
                let service = LoanService::connect(&self.database).await?;
                let amount = parse_amount(&amount)?;
                let result = service.create_entry(application_id, amount).await?;
                println!(
                    "Disbursed {} to application #{} (entry #{}), balance {}",
                    format_cents(result.entry.entry_amount),
                    application_id,
                    result.entry.id,
                    format_cents(result.balance)
                );
                Ok(())
            }
            Commands::Repayment(command) => {
                let service = LoanService::connect(&self.database).await?;
                run_repayment_command(&service, command).await
            }
            Commands::Balance { application_id } => {
                let service = LoanService::connect(&self.database).await?;
                let balance = service.get_balance(application_id).await?;
                println!(
                    "Application #{}: outstanding {}",
                    application_id,
                    format_cents(balance.balance)
                );
                Ok(())
            }
            Commands::Check => {
                let service = LoanService::connect(&self.database).await?;
                let report = service.check_integrity().await?;
                if report.is_clean() {
                    println!("Ledger OK ({} balances checked)", report.ledger_count);
                } else {
                    println!(
                        "Ledger has {} issue(s) across {} balances:",
                        report.issues.len(),
                        report.ledger_count
                    );
                    let json = serde_json::to_string_pretty(&report.issues)
                        .context("Failed to serialize integrity issues")?;
                    println!("{}", json);
                }
                Ok(())
            }
            Commands::Document(command) => {
                let store = DocumentStore::open(&self.document_root)?;
                run_document_command(&store, command)
            }
        }
    }
}

async fn run_application_command(
    service: &LoanService,
    command: ApplicationCommands,
) -> Result<(), AppError> {
    match command {
        ApplicationCommands::Create { name } => {
            let application = service.create_application(&name).await?;
            println!("Filed application #{} for {}", application.id, application.name);
        }
        ApplicationCommands::Show { id } => {
            let application = service.get_application(id).await?;
            print_application(&application);
        }
        ApplicationCommands::Contract { id } => {
            let application = service.contract_application(id).await?;
            println!(
                "Application #{} contracted at {}",
                application.id,
                application
                    .contracted_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default()
            );
        }
    }
    Ok(())
}

async fn run_judgement_command(
    service: &LoanService,
    command: JudgementCommands,
) -> Result<(), AppError> {
    match command {
        JudgementCommands::Create {
            application_id,
            name,
            amount,
        } => {
            let amount = parse_amount(&amount)?;
            let judgement = service.create_judgement(application_id, &name, amount).await?;
            println!(
                "Recorded judgement #{} for application #{}",
                judgement.id, judgement.application_id
            );
        }
        JudgementCommands::Show { id } => {
            let judgement = service.get_judgement(id).await?;
            print_judgement(&judgement);
        }
        JudgementCommands::OfApplication { application_id } => {
            let judgement = service.judgement_of_application(application_id).await?;
            print_judgement(&judgement);
        }
        JudgementCommands::Update { id, name, amount } => {
            let amount = parse_amount(&amount)?;
            let judgement = service.update_judgement(id, &name, amount).await?;
            print_judgement(&judgement);
        }
        JudgementCommands::Delete { id } => {
            service.delete_judgement(id).await?;
            println!("Deleted judgement #{}", id);
        }
        JudgementCommands::Grant { id } => {
            let granted = service.grant(id).await?;
            println!(
                "Granted {} to application #{}",
                format_cents(granted.approval_amount),
                granted.application_id
            );
        }
    }
    Ok(())
}

async fn run_repayment_command(
    service: &LoanService,
    command: RepaymentCommands,
) -> Result<(), AppError> {
    match command {
        RepaymentCommands::Create {
            application_id,
            amount,
        } => {
            let amount = parse_amount(&amount)?;
            let result = service.create_repayment(application_id, amount).await?;
            println!(
                "Repayment #{} of {} recorded, balance {}",
                result.repayment.id,
                format_cents(result.repayment.repayment_amount),
                format_cents(result.balance)
            );
        }
        RepaymentCommands::List {
            application_id,
            include_deleted,
            json,
        } => {
            let repayments = service.list_repayments(application_id, include_deleted).await?;
            if json {
                let out = serde_json::to_string_pretty(&repayments)
                    .context("Failed to serialize repayments")?;
                println!("{}", out);
            } else {
                for repayment in &repayments {
                    print_repayment(repayment);
                }
                println!("{} repayment(s)", repayments.len());
            }
        }
        RepaymentCommands::Update { id, amount } => {
            let amount = parse_amount(&amount)?;
            let result = service.update_repayment(id, amount).await?;
            println!(
                "Repayment #{} corrected {} -> {}, balance {}",
                id,
                format_cents(result.before_repayment_amount),
                format_cents(result.after_repayment_amount),
                format_cents(result.balance)
            );
        }
        RepaymentCommands::Delete { id } => {
            let balance = service.delete_repayment(id).await?;
            println!("Deleted repayment #{}, balance restored to {}", id, format_cents(balance));
        }
    }
    Ok(())
}

fn run_document_command(store: &DocumentStore, command: DocumentCommands) -> Result<(), AppError> {
    match command {
        DocumentCommands::Save { path } => {
            let contents = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path))?;
            let name = std::path::Path::new(&path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| AppError::DocumentNotFound(path.clone()))?;
            let stored = store.save(&name, &contents)?;
            println!("Stored {}", stored.display());
        }
        DocumentCommands::Load { name } => {
            let contents = store.load(&name)?;
            let mut stdout = std::io::stdout();
            std::io::Write::write_all(&mut stdout, &contents)
                .context("Failed to write document to stdout")?;
        }
        DocumentCommands::List => {
            let names = store.list()?;
            for name in &names {
                println!("{}", name);
            }
            println!("{} document(s)", names.len());
        }
    }
    Ok(())
}

fn parse_amount(input: &str) -> Result<Cents, AppError> {
    parse_cents(input).map_err(|e| AppError::InvalidAmount(format!("{}: {}", input, e)))
}

fn print_application(application: &Application) {
    println!(
        "Application #{}: {} | approval: {} | contracted: {}",
        application.id,
        application.name,
        application
            .approval_amount
            .map(format_cents)
            .unwrap_or_else(|| "-".to_string()),
        application
            .contracted_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "no".to_string())
    );
}

fn print_judgement(judgement: &Judgement) {
    println!(
        "Judgement #{}: application #{} | {} | approved {}{}",
        judgement.id,
        judgement.application_id,
        judgement.name,
        format_cents(judgement.approval_amount),
        if judgement.is_deleted { " (deleted)" } else { "" }
    );
}

fn print_repayment(repayment: &Repayment) {
    println!(
        "Repayment #{}: {}{} ({})",
        repayment.id,
        format_cents(repayment.repayment_amount),
        if repayment.is_deleted { " (deleted)" } else { "" },
        repayment.created_at.to_rfc3339()
    );
}
