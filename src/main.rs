//! FuelTrack kiosk - fuel station session controller and admin dashboard.
//!
//! Architecture:
//! - `state` module: I/O-free kiosk state machine with business logic (testable)
//! - `app` module: Bridges the state machine to async operations and the view
//! - `auth` module: Credential verification against reference data
//! - `countdown` module: Confirmation countdown timer
//! - `api` module: HTTP client for the FuelTrack backend
//! - `dashboard` module: Date ranges, filters and paging for the admin views
//! - `ui` module: Terminal kiosk view and dashboard tables

use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

mod api;
mod app;
mod auth;
mod config;
mod countdown;
mod dashboard;
mod state;
mod ui;

use api::types::TransactionStatus;
use api::{ApiClient, ApiError, ReferenceDataSource};
use app::AppContext;
use auth::SelectionVerifier;
use dashboard::{
    parse_pager_command, DashboardSection, DateRange, PagerCommand, TransactionFilter,
    TransactionPager,
};
use ui::{tables, ConsoleView};

#[derive(Parser)]
#[command(name = "fueltrack-kiosk", version, about = "FuelTrack fuel kiosk and dashboard")]
struct Cli {
    /// Backend API base URL (defaults to $FUELTRACK_API_BASE or http://localhost:5000/api/)
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the interactive fuel kiosk (default)
    Kiosk,
    /// Show summary metrics for a date range
    Summary(RangeArgs),
    /// List transactions
    Transactions(TransactionArgs),
    /// Show one transaction with its readings and fuel events
    Transaction { id: String },
    /// List vehicles with fuel levels
    Vehicles,
    /// List bowsers with fuel levels
    Bowsers,
    /// List drivers
    Drivers,
    /// Ask the backend to refresh its data
    Refresh {
        /// Section to reload after a successful refresh
        #[arg(long, value_enum, default_value = "summary")]
        section: DashboardSection,
    },
    /// Simulate a complete fuel transaction
    Simulate,
    /// Show backend status
    Status,
}

#[derive(Args)]
struct RangeArgs {
    /// First day, YYYY-MM-DD
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Last day, YYYY-MM-DD
    #[arg(long)]
    end: Option<NaiveDate>,
}

impl RangeArgs {
    fn resolve(&self) -> Option<DateRange> {
        DateRange::from_bounds(self.start, self.end)
    }
}

#[derive(Args)]
struct TransactionArgs {
    #[command(flatten)]
    range: RangeArgs,
    #[arg(long)]
    vehicle: Option<String>,
    #[arg(long)]
    driver: Option<String>,
    #[arg(long)]
    bowser: Option<String>,
    #[arg(long, value_enum)]
    status: Option<TransactionStatus>,
    /// 1-based page number
    #[arg(long, default_value_t = 1)]
    page: u32,
    /// Walk every page from the requested one onwards
    #[arg(long, conflicts_with = "interactive")]
    all: bool,
    /// Browse pages from the terminal: next, prev, filter key=value..., quit
    #[arg(long, short)]
    interactive: bool,
}

impl TransactionArgs {
    fn filter(&self) -> TransactionFilter {
        TransactionFilter {
            range: self.range.resolve(),
            vehicle_id: self.vehicle.clone(),
            driver_id: self.driver.clone(),
            bowser_id: self.bowser.clone(),
            status: self.status,
            ..TransactionFilter::default()
        }
    }
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Create tokio runtime for async operations
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to create tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ApiError> {
    let api = match &cli.api_base {
        Some(base) => ApiClient::with_base_url(base)?,
        None => ApiClient::new()?,
    };
    log::debug!("Using API at {}", api.base_url());

    run_command(api, cli.command.unwrap_or(Command::Kiosk)).await
}

async fn run_kiosk(api: ApiClient) {
    log::info!("Starting FuelTrack kiosk");

    let source: Arc<dyn ReferenceDataSource> = Arc::new(api);
    let verifier = Arc::new(SelectionVerifier::new(source.clone()));
    let (ctx, rx) = AppContext::new(source, verifier, Box::new(ConsoleView::stdout()));

    println!("{}", ui::console::HELP);
    tokio::spawn(ui::console::read_commands(ctx.sender()));
    ctx.run(rx).await;

    log::info!("FuelTrack kiosk shutting down");
}

async fn run_command(api: ApiClient, command: Command) -> Result<(), ApiError> {
    let api = &api;
    match command {
        Command::Kiosk => run_kiosk(api.clone()).await,
        Command::Summary(args) => {
            let range = args.resolve().unwrap_or_else(DateRange::last_week);
            show_section(api, DashboardSection::Summary, Some(range)).await?;
        }
        Command::Transactions(args) => {
            let mut pager = TransactionPager::new(args.filter());
            pager.go_to(args.page);
            if args.interactive {
                return browse_transactions(api, pager).await;
            }
            loop {
                let page = api.transactions(&pager.query()).await?;
                pager.record(&page);
                println!("{}", tables::render_transactions(&page, &pager.info()));
                if !args.all || !pager.next() {
                    break;
                }
                println!();
            }
        }
        Command::Transaction { id } => {
            let detail = api.transaction(&id).await?;
            println!("{}", tables::render_transaction_detail(&detail));
        }
        Command::Vehicles => show_section(api, DashboardSection::Vehicles, None).await?,
        Command::Bowsers => show_section(api, DashboardSection::Bowsers, None).await?,
        Command::Drivers => show_section(api, DashboardSection::Drivers, None).await?,
        Command::Refresh { section } => {
            let outcome = api.refresh_data().await?;
            match outcome.success {
                Some(true) => {
                    println!("{}", outcome.message.as_deref().unwrap_or("Data refreshed"));
                    show_section(api, section, None).await?;
                }
                Some(false) => {
                    return Err(ApiError::Server(
                        outcome
                            .message
                            .unwrap_or_else(|| "refresh failed".to_string()),
                    ));
                }
                None => println!("Refresh is still processing, check back shortly"),
            }
        }
        Command::Simulate => {
            let outcome = api.simulate_transaction().await?;
            match (outcome.success, outcome.transaction) {
                (true, Some(tx)) => println!(
                    "Simulated {}: {} received {}",
                    tx.transaction_id,
                    tx.vehicle,
                    tables::format_quantity(tx.received_amount, "L")
                ),
                _ => {
                    return Err(ApiError::Server(
                        outcome
                            .error
                            .unwrap_or_else(|| "simulation failed".to_string()),
                    ));
                }
            }
        }
        Command::Status => {
            let status = api.status().await?;
            println!("{}", tables::render_status(&status));
        }
    }
    Ok(())
}

const BROWSE_HELP: &str =
    "[n]ext, [p]rev, filter vehicle=.. driver=.. bowser=.. status=.. start=.. end=.., [q]uit";

/// Page through transactions with commands typed on stdin
async fn browse_transactions(api: &ApiClient, mut pager: TransactionPager) -> Result<(), ApiError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let page = api.transactions(&pager.query()).await?;
        pager.record(&page);
        println!("{}", tables::render_transactions(&page, &pager.info()));
        println!(
            "Page {} ({} transactions). {}",
            pager.page(),
            pager.total(),
            BROWSE_HELP
        );

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(()),
                Err(e) => {
                    log::error!("Failed to read input: {}", e);
                    return Ok(());
                }
            };

            match parse_pager_command(&line, &pager.query()) {
                Ok(PagerCommand::Next) if pager.next() => break,
                Ok(PagerCommand::Next) => println!("Already on the last page"),
                Ok(PagerCommand::Prev) if pager.prev() => break,
                Ok(PagerCommand::Prev) => println!("Already on the first page"),
                Ok(PagerCommand::Filter(filter)) => {
                    pager.apply_filters(filter);
                    break;
                }
                Ok(PagerCommand::Quit) => return Ok(()),
                Err(message) => println!("{}", message),
            }
        }
        println!();
    }
}

/// Load and print one dashboard section
async fn show_section(
    api: &ApiClient,
    section: DashboardSection,
    range: Option<DateRange>,
) -> Result<(), ApiError> {
    match section {
        DashboardSection::Summary => {
            let range = range.unwrap_or_else(DateRange::last_week);
            let summary = api.dashboard_summary(&range).await?;
            println!("{}", tables::render_summary(&summary, &range));
        }
        DashboardSection::Transactions => {
            let filter = TransactionFilter {
                range,
                ..TransactionFilter::default()
            };
            let mut pager = TransactionPager::new(filter);
            let page = api.transactions(&pager.query()).await?;
            pager.record(&page);
            println!("{}", tables::render_transactions(&page, &pager.info()));
        }
        DashboardSection::Vehicles => {
            println!("{}", tables::render_vehicles(&api.vehicles().await?));
        }
        DashboardSection::Bowsers => {
            println!("{}", tables::render_bowsers(&api.bowsers().await?));
        }
        DashboardSection::Drivers => {
            println!("{}", tables::render_drivers(&api.drivers().await?));
        }
    }
    Ok(())
}
