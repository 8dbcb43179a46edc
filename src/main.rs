use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use milemark::{
    config, Actor, ActorRole, CachedDirectory, CompanyId, Contract, ContractDraft,
    ContractEngine, ContractId, Engagement, EngineerId, InvoiceId, JobId, JsonFileStore,
    MilestoneId, PaymentTerms, Period, StaticDirectory, TimesheetId, TracingEmitter,
};

#[derive(Parser)]
#[command(name = "milemark")]
#[command(about = "Contract lifecycle and milestone-escrow engine")]
#[command(
    long_about = "Milemark drives a contract from an unsigned draft to a funded, delivered, \
                  and invoiced engagement. Milestone-based contracts move through \
                  fund -> submit -> approve -> invoice; day-rate contracts bill per \
                  submitted timesheet."
)]
struct Cli {
    /// Role the acting user holds
    #[arg(long, value_enum, global = true, default_value_t = CliRole::Company)]
    role: CliRole,
    /// Id of the acting user
    #[arg(long, global = true)]
    actor: Option<Uuid>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliRole {
    Engineer,
    Company,
    Admin,
}

impl std::fmt::Display for CliRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CliRole::Engineer => "engineer",
            CliRole::Company => "company",
            CliRole::Admin => "admin",
        };
        f.write_str(name)
    }
}

impl From<CliRole> for ActorRole {
    fn from(role: CliRole) -> Self {
        match role {
            CliRole::Engineer => ActorRole::Engineer,
            CliRole::Company => ActorRole::Company,
            CliRole::Admin => ActorRole::Admin,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Register known job/company/engineer ids in the local directory
    Register {
        #[arg(long)]
        job: Option<JobId>,
        #[arg(long)]
        company: Option<CompanyId>,
        #[arg(long)]
        engineer: Option<EngineerId>,
    },
    /// Create a contract in DRAFT from a TOML draft file
    Create {
        /// Path to a TOML file describing the contract draft
        draft: PathBuf,
    },
    /// Record a signature on a contract (engineer first, then company)
    Sign {
        contract: ContractId,
        /// Name to stamp on the signature
        #[arg(long)]
        name: String,
    },
    /// Commit escrow for a pending milestone
    Fund {
        contract: ContractId,
        milestone: MilestoneId,
    },
    /// Submit a funded milestone for approval (engineer)
    Submit {
        contract: ContractId,
        milestone: MilestoneId,
    },
    /// Approve a submitted milestone (company/admin)
    Approve {
        contract: ContractId,
        milestone: MilestoneId,
    },
    /// Day-rate timesheet operations
    #[command(subcommand)]
    Timesheet(TimesheetCommands),
    /// Invoice operations
    #[command(subcommand)]
    Invoice(InvoiceCommands),
    /// Complete an active contract once everything is settled
    Complete { contract: ContractId },
    /// Show one contract with its milestones or timesheets
    Show { contract: ContractId },
    /// List all contracts with their statuses
    Status,
}

#[derive(Subcommand)]
enum TimesheetCommands {
    /// Report a worked period (engineer)
    Submit {
        contract: ContractId,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        /// Days (or hours) worked in the period
        #[arg(long)]
        units: Decimal,
    },
    /// Settle a submitted timesheet (company/admin)
    Approve {
        contract: ContractId,
        timesheet: TimesheetId,
    },
}

#[derive(Subcommand)]
enum InvoiceCommands {
    /// Aggregate approved milestones into a SENT invoice
    Generate {
        contract: ContractId,
        /// Net payment terms in days (defaults from configuration)
        #[arg(long)]
        net: Option<u32>,
    },
    /// Record settlement of an invoice
    Paid { invoice: InvoiceId },
    /// Move SENT invoices past their due date to OVERDUE
    Sweep,
    /// List invoices for a contract
    List { contract: ContractId },
}

/// Local registry backing the read-only directory the engine consults
/// at contract creation.
#[derive(Debug, Default, Serialize, Deserialize)]
struct DirectoryRegistry {
    jobs: Vec<JobId>,
    companies: Vec<CompanyId>,
    engineers: Vec<EngineerId>,
}

impl DirectoryRegistry {
    fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading directory registry {}", path.display()))?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn into_directory(self) -> StaticDirectory {
        let mut directory = StaticDirectory::new();
        for job in self.jobs {
            directory = directory.with_job(job);
        }
        for company in self.companies {
            directory = directory.with_company(company);
        }
        for engineer in self.engineers {
            directory = directory.with_engineer(engineer);
        }
        directory
    }
}

fn build_engine() -> Result<ContractEngine<JsonFileStore>> {
    let cfg = config()?;
    let store = JsonFileStore::new(&cfg.storage.state_path);
    let registry = DirectoryRegistry::load(Path::new(&cfg.directory.registry_path))?;
    let directory = CachedDirectory::new(
        Arc::new(registry.into_directory()),
        Duration::from_secs(cfg.directory.cache_ttl_seconds),
        cfg.directory.cache_capacity,
    );
    Ok(ContractEngine::new(
        store,
        Arc::new(directory),
        Arc::new(TracingEmitter),
    ))
}

fn actor_from_cli(cli_role: CliRole, actor_id: Option<Uuid>) -> Actor {
    // Admin operations are not tied to a party id; generate one when
    // the caller gave none.
    Actor::new(actor_id.unwrap_or_else(Uuid::new_v4), cli_role.into())
}

fn print_contract(contract: &Contract) {
    println!("contract   {}", contract.id);
    println!("  status   {}", contract.status);
    println!("  currency {}", contract.currency);
    println!("  company  {}", contract.company_id);
    println!("  engineer {}", contract.engineer_id);
    match &contract.engagement {
        Engagement::MilestoneBased {
            agreed_total,
            milestones,
        } => {
            println!("  type     milestone-based, agreed total {agreed_total}");
            for m in milestones {
                println!("  milestone {}  {:<28} {:>10}  {}", m.id, m.description, m.amount, m.status);
            }
        }
        Engagement::DayRate {
            day_rate,
            timesheets,
        } => {
            println!("  type     day-rate at {day_rate}/day");
            for t in timesheets {
                println!(
                    "  timesheet {}  {}  {} units  {}",
                    t.id, t.period, t.units_worked, t.status
                );
            }
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let actor = actor_from_cli(cli.role, cli.actor);

    match cli.command {
        Commands::Register {
            job,
            company,
            engineer,
        } => {
            let cfg = config()?;
            let path = PathBuf::from(&cfg.directory.registry_path);
            let mut registry = DirectoryRegistry::load(&path)?;
            if let Some(job) = job {
                registry.jobs.push(job);
                println!("registered job {job}");
            }
            if let Some(company) = company {
                registry.companies.push(company);
                println!("registered company {company}");
            }
            if let Some(engineer) = engineer {
                registry.engineers.push(engineer);
                println!("registered engineer {engineer}");
            }
            registry.save(&path)?;
        }
        Commands::Create { draft } => {
            let engine = build_engine()?;
            let contents = std::fs::read_to_string(&draft)
                .with_context(|| format!("reading draft {}", draft.display()))?;
            let draft: ContractDraft = toml::from_str(&contents)?;
            let contract = engine.create_contract(draft, &actor).await?;
            println!("created contract {} in {}", contract.id, contract.status);
            print_contract(&contract);
        }
        Commands::Sign { contract, name } => {
            let engine = build_engine()?;
            let contract = engine.sign_contract(contract, &actor, &name).await?;
            println!("signed; contract is now {}", contract.status);
        }
        Commands::Fund {
            contract,
            milestone,
        } => {
            let engine = build_engine()?;
            let milestone = engine.fund_milestone(contract, milestone, &actor).await?;
            println!("milestone {} is now {}", milestone.id, milestone.status);
        }
        Commands::Submit {
            contract,
            milestone,
        } => {
            let engine = build_engine()?;
            let milestone = engine
                .submit_milestone_for_approval(contract, milestone, &actor)
                .await?;
            println!("milestone {} is now {}", milestone.id, milestone.status);
        }
        Commands::Approve {
            contract,
            milestone,
        } => {
            let engine = build_engine()?;
            let milestone = engine
                .approve_milestone(contract, milestone, &actor)
                .await?;
            println!("milestone {} is now {}", milestone.id, milestone.status);
        }
        Commands::Timesheet(cmd) => match cmd {
            TimesheetCommands::Submit {
                contract,
                start,
                end,
                units,
            } => {
                let engine = build_engine()?;
                let timesheet = engine
                    .submit_timesheet(contract, Period { start, end }, units, &actor)
                    .await?;
                println!("timesheet {} submitted for {}", timesheet.id, timesheet.period);
            }
            TimesheetCommands::Approve {
                contract,
                timesheet,
            } => {
                let engine = build_engine()?;
                let timesheet = engine.approve_timesheet(contract, timesheet, &actor).await?;
                println!("timesheet {} is now {}", timesheet.id, timesheet.status);
            }
        },
        Commands::Invoice(cmd) => match cmd {
            InvoiceCommands::Generate { contract, net } => {
                let engine = build_engine()?;
                let net = net.unwrap_or(config()?.invoicing.default_net_days);
                let invoice = engine
                    .generate_invoice(contract, PaymentTerms::from(net), &actor)
                    .await?;
                println!(
                    "invoice {}: {} item(s), total {}, due {}",
                    invoice.id,
                    invoice.items.len(),
                    invoice.total,
                    invoice.due_date
                );
            }
            InvoiceCommands::Paid { invoice } => {
                let engine = build_engine()?;
                let invoice = engine.mark_invoice_paid(invoice, &actor).await?;
                println!("invoice {} is now {}", invoice.id, invoice.status);
            }
            InvoiceCommands::Sweep => {
                let engine = build_engine()?;
                let swept = engine
                    .mark_overdue_invoices(chrono::Utc::now().date_naive())
                    .await?;
                println!("{} invoice(s) marked overdue", swept.len());
            }
            InvoiceCommands::List { contract } => {
                let engine = build_engine()?;
                for invoice in engine.invoices_for_contract(contract).await? {
                    println!(
                        "invoice {}  {:>10}  issued {}  due {}  {}",
                        invoice.id, invoice.total, invoice.issue_date, invoice.due_date, invoice.status
                    );
                }
            }
        },
        Commands::Complete { contract } => {
            let engine = build_engine()?;
            let contract = engine.complete_contract(contract, &actor).await?;
            println!("contract {} is now {}", contract.id, contract.status);
        }
        Commands::Show { contract } => {
            let engine = build_engine()?;
            let contract = engine.contract(contract).await?;
            print_contract(&contract);
        }
        Commands::Status => {
            let engine = build_engine()?;
            let contracts = engine.list_contracts().await?;
            if contracts.is_empty() {
                println!("no contracts yet; start with 'milemark create <draft.toml>'");
            }
            for contract in contracts {
                println!(
                    "{}  {:<17}  {}  {}",
                    contract.id,
                    contract.status.to_string(),
                    contract.engagement.kind(),
                    contract.currency
                );
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    milemark::init_config()?;
    if config()?.observability.tracing_enabled {
        milemark::init_telemetry()?;
    }

    let result = tokio::runtime::Runtime::new()?.block_on(run(cli));
    milemark::shutdown_telemetry();
    result
}
