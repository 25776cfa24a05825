use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, ClientEvent, FetchOutcome, Filter, FilterSet, GateDecision, ListController,
    ListItem, LoginForm, ProposalDraft, Route, ToastLevel, VendorClient,
};
use shared::domain::{OrderId, OrderStatus, QuoteId};
use storage::{normalize_database_url, Storage};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "vendor_console", about = "Vendor dashboard from the terminal")]
struct Cli {
    /// Overrides `api_base_url` from settings.
    #[arg(long)]
    api_base_url: Option<String>,
    /// Overrides `database_url` from settings.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Whoami,
    Orders {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        search: Option<String>,
    },
    OrderStatus {
        order_id: String,
        status: String,
    },
    Products {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Quotes {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        project_type: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    SubmitProposal {
        quote_id: String,
        #[arg(long)]
        amount: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        completion_date: Option<NaiveDate>,
    },
    Subscriptions,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(url) = cli.api_base_url {
        settings.api_base_url = url;
    }
    if let Some(url) = cli.database_url {
        settings.database_url = url;
    }

    let storage = Storage::new(&normalize_database_url(&settings.database_url)).await?;
    let client = VendorClient::new(settings, Arc::new(storage))?;
    let mut events = client.subscribe_events();
    client.initialize().await;

    let result = run(&client, cli.command).await;
    print_toasts(&mut events);
    result
}

async fn run(client: &VendorClient, command: Command) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let session = client.sign_in(&LoginForm::new(email, password)).await?;
            if let Some(vendor) = session.vendor {
                println!("signed in as {} <{}>", vendor.name, vendor.email);
            }
        }
        Command::Logout => client.sign_out().await,
        Command::Whoami => {
            require(client, Route::Settings).await?;
            let vendor = client.refresh_vendor().await?;
            println!("vendor_id={}", vendor.id);
            println!("name={}", vendor.name);
            println!("email={}", vendor.email);
            if let Some(business) = vendor.business_name {
                println!("business={business}");
            }
        }
        Command::Orders {
            page,
            status,
            search,
        } => {
            require(client, Route::Orders).await?;
            let mut filters = FilterSet::new();
            filters.set(Filter::Status, status.unwrap_or_default());
            filters.set(Filter::Search, search.unwrap_or_default());
            show(client.orders(), filters, page, |order| {
                format!(
                    "{}  {}  {:>10.2}  {}",
                    order.id,
                    order.date.format("%Y-%m-%d"),
                    order.amount,
                    order.status.as_str()
                )
            })
            .await?;
        }
        Command::OrderStatus { order_id, status } => {
            require(client, Route::Orders).await?;
            let status = OrderStatus::parse(&status)
                .ok_or_else(|| anyhow!("unknown order status: {status}"))?;
            client
                .update_order_status(&OrderId::new(order_id), status)
                .await?;
        }
        Command::Products { page } => {
            require(client, Route::Products).await?;
            show(client.products(), FilterSet::new(), page, |product| {
                format!(
                    "{}  {}  {:>10.2}  stock={}  {}",
                    product.id,
                    product.name_en,
                    product.price,
                    product.stock_quantity,
                    if product.is_active { "active" } else { "inactive" }
                )
            })
            .await?;
        }
        Command::Quotes {
            page,
            status,
            project_type,
            search,
            from,
            to,
        } => {
            require(client, Route::DemandQuotes).await?;
            let mut filters = FilterSet::new();
            filters.set(Filter::Status, status.unwrap_or_default());
            filters.set(Filter::ProjectType, project_type.unwrap_or_default());
            filters.set(Filter::Search, search.unwrap_or_default());
            filters.set_date(Filter::StartDate, from);
            filters.set_date(Filter::EndDate, to);
            show(client.quotes(), filters, page, |quote| {
                format!(
                    "{}  {}  {}{}",
                    quote.id,
                    quote.status.as_str(),
                    quote.project_name.as_deref().unwrap_or("-"),
                    if quote.accepts_proposals() { "" } else { "  (closed to proposals)" }
                )
            })
            .await?;
        }
        Command::SubmitProposal {
            quote_id,
            amount,
            description,
            completion_date,
        } => {
            require(client, Route::DemandQuotes).await?;
            let draft = ProposalDraft::new(amount, description, completion_date);
            client
                .submit_proposal(&QuoteId::new(quote_id), draft)
                .await?;
        }
        Command::Subscriptions => {
            require(client, Route::Subscriptions).await?;
            let overview = client.subscriptions().await?;
            let current = overview.current_plan();
            for plan in &overview.plans {
                let marker = if current.is_some_and(|current| current.id == plan.id) {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {}  {}", plan.id, plan.name);
            }
            if let Some(plan) = current {
                println!("current plan: {} ({:.2})", plan.name, plan.price);
            }
        }
    }
    Ok(())
}

async fn require(client: &VendorClient, route: Route) -> Result<()> {
    match client.open(route.clone()).await {
        GateDecision::Render(_) => Ok(()),
        GateDecision::Redirect(_) | GateDecision::Placeholder => {
            bail!("{route} requires a signed-in vendor; run `vendor_console login` first")
        }
    }
}

async fn show<R>(
    list: &Arc<ListController<R>>,
    filters: FilterSet,
    page: u32,
    line: impl Fn(&R) -> String,
) -> Result<()>
where
    R: ListItem + Clone + Send + Sync + 'static,
{
    match list.apply(filters, page).await {
        FetchOutcome::Applied => {}
        FetchOutcome::Failed(message) => bail!(message),
        FetchOutcome::Superseded => return Ok(()),
    }

    let state = list.snapshot().await;
    for item in &state.page.items {
        println!("{}", line(item));
    }
    println!(
        "page {}/{} ({} total)",
        state.page.page, state.page.total_pages, state.page.total_count
    );
    Ok(())
}

fn print_toasts(events: &mut broadcast::Receiver<ClientEvent>) {
    loop {
        match events.try_recv() {
            Ok(ClientEvent::Toast(toast)) => {
                let label = match toast.level {
                    ToastLevel::Success => "ok",
                    ToastLevel::Info => "info",
                    ToastLevel::Error => "error",
                };
                eprintln!("[{label}] {}", toast.message);
            }
            Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
}
