use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;

use tirelire::{
    format_money, parse_value, AppConfig, CashType, DepositRequest, MoneyBoxService, SqliteStore,
    WealthView,
};

const USAGE: &str = "Usage: tirelire <command> [args]

Commands:
  create <name>                          Create a money box
  list                                   List money boxes, newest first
  show <id>                              Show basic money box data
  shake <id>                             Show what is inside a money box
  save <id> <type>:<value>:<amount>...   Save cashes, e.g. save 1 coin:2:3 bill:10:1
  break <id>                             Break a money box and empty it
  catalog                                List accepted bills and coins";

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tirelire::init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = AppConfig::from_env()?;
    let seed = config.seed_catalog()?;
    let store = SqliteStore::open(&config.db_path, &seed)
        .with_context(|| format!("Failed to open database {:?}", config.db_path))?;
    let mut service = MoneyBoxService::new(store)?;

    match command.as_str() {
        "create" => {
            let name = args[1..].join(" ");
            let summary = service.create(&name)?;
            println!("✓ Created money box #{} \"{}\"", summary.id, summary.name);
        }
        "list" => {
            let boxes = service.list()?;
            if boxes.is_empty() {
                println!("No money boxes yet. Create one with: tirelire create <name>");
            }
            for summary in boxes {
                println!(
                    "#{:<5} {:<30} {}  {}",
                    summary.id,
                    summary.name,
                    summary.created_at.format("%Y-%m-%d %H:%M"),
                    if summary.broken { "💥 broken" } else { "🐷 active" }
                );
            }
        }
        "show" => {
            let summary = service.get(parse_id(&args)?)?;
            println!("Money box #{}", summary.id);
            println!("  Name:    {}", summary.name);
            println!("  Created: {}", summary.created_at.to_rfc3339());
            println!("  Updated: {}", summary.updated_at.to_rfc3339());
            println!("  Broken:  {}", summary.broken);
        }
        "shake" => {
            let view = service.shake(parse_id(&args)?)?;
            print_view("🐷 Shaking...", &view);
        }
        "save" => {
            let id = parse_id(&args)?;
            let requests = args[2..]
                .iter()
                .map(|arg| parse_cash_arg(arg))
                .collect::<Result<Vec<_>>>()?;
            if requests.is_empty() {
                bail!("Nothing to save.\n\n{}", USAGE);
            }
            let view = service.deposit(id, &requests)?;
            print_view("✓ Saved", &view);
        }
        "break" => {
            let view = service.break_box(parse_id(&args)?)?;
            print_view("💥 Money box broken! It contained", &view);
        }
        "catalog" => {
            for denomination in service.catalog().all() {
                println!(
                    "{:<5} {:>7} {}",
                    denomination.cash_type,
                    format_money(denomination.value),
                    denomination.currency.symbol()
                );
            }
        }
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }

    Ok(())
}

fn parse_id(args: &[String]) -> Result<i64> {
    let raw = args.get(1).context("Missing money box id")?;
    raw.parse()
        .with_context(|| format!("Invalid money box id: {}", raw))
}

/// Parse `<type>:<value>:<amount>`, e.g. `coin:0.20:5`
fn parse_cash_arg(arg: &str) -> Result<DepositRequest> {
    let parts: Vec<&str> = arg.split(':').collect();
    let [cash_type, value, amount] = parts.as_slice() else {
        bail!("Expected <type>:<value>:<amount>, got {:?}", arg);
    };

    let cash_type = CashType::from_str(cash_type).map_err(anyhow::Error::msg)?;
    let value = parse_value(value)?;
    let amount = tirelire::deposit::parse_amount(
        amount
            .parse()
            .with_context(|| format!("Invalid amount in {:?}", arg))?,
    )?;

    Ok(DepositRequest::new(cash_type, value, amount))
}

fn print_view(title: &str, view: &WealthView) {
    println!("{}", title);
    if view.is_empty() {
        println!("  (empty)");
    }
    for line in &view.cashes {
        println!(
            "  {:>4} × {} {} {}",
            line.amount,
            line.cash_type,
            format_money(line.value),
            line.currency.symbol()
        );
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "  Wealth: {} € in {} pieces",
        view.formatted_wealth(),
        view.piece_count()
    );
}
