//! # Seed Data Generator
//!
//! Populates the document store with sample tenders for development.
//!
//! ## Usage
//! ```bash
//! # Generate 100 tenders (default)
//! cargo run -p tender-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p tender-db --bin seed -- --count 1000
//!
//! # Specify database path or settings file
//! cargo run -p tender-db --bin seed -- --db ./data/tenders.db
//! cargo run -p tender-db --bin seed -- --settings ./settings.toml
//! ```
//!
//! Every tender goes through the same validated save as production writes,
//! so each one gets a tenderID, a first revision and a dateModified.

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};
use serde_json::json;
use tender_core::time::{days, format_iso, Clock, SystemClock};
use tender_core::Tender;
use tender_db::{Database, SaveContext, Settings};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// CPV codes with descriptions, one item per tender.
const ITEMS: &[(&str, &str)] = &[
    ("44617100-9", "Картонні коробки"),
    ("30192000-1", "Офісне приладдя"),
    ("09310000-5", "Електрична енергія"),
    ("33600000-6", "Фармацевтична продукція"),
    ("45453000-7", "Капітальний ремонт і реставрація"),
    ("90910000-9", "Послуги з прибирання"),
    ("15810000-9", "Хлібопродукти"),
    ("34110000-1", "Легкові автомобілі"),
];

const PROCURING_ENTITIES: &[(&str, &str)] = &[
    ("00037256", "Державне управління справами"),
    ("21725150", "Міська клінічна лікарня №1"),
    ("38727358", "Управління освіти міської ради"),
];

/// Amounts in hryvnias.
const AMOUNTS: &[i64] = &[500, 12_000, 48_500, 250_000, 1_200_000];

struct Args {
    count: usize,
    db: Option<PathBuf>,
    settings: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Option<Args>> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args {
        count: 100,
        db: None,
        settings: None,
    };

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--count" | "-c" => {
                let raw = value.context("--count needs a value")?;
                parsed.count = raw.parse().with_context(|| format!("invalid --count {}", raw))?;
                i += 1;
            }
            "--db" | "-d" => {
                parsed.db = Some(PathBuf::from(value.context("--db needs a value")?));
                i += 1;
            }
            "--settings" | "-s" => {
                parsed.settings = Some(PathBuf::from(value.context("--settings needs a value")?));
                i += 1;
            }
            "--help" | "-h" => {
                println!("Tender Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>        Number of tenders to generate (default: 100)");
                println!("  -d, --db <PATH>        Database file path (overrides settings)");
                println!("  -s, --settings <PATH>  Settings file (default: platform config dir)");
                println!("  -h, --help             Show this help message");
                return Ok(None);
            }
            other => bail!("unknown argument {}", other),
        }
        i += 1;
    }
    Ok(Some(parsed))
}

fn sample_tender(index: usize, clock: &dyn Clock) -> anyhow::Result<Tender> {
    let now = clock.now();
    let (cpv, description) = ITEMS[index % ITEMS.len()];
    let (edrpou, entity) = PROCURING_ENTITIES[index % PROCURING_ENTITIES.len()];
    let amount = AMOUNTS[index % AMOUNTS.len()];
    let enquiry_days = 3 + (index % 5) as i64;

    let data = json!({
        "title": format!("{} (лот {})", description, index + 1),
        "procuringEntity": {
            "name": entity,
            "kind": "general",
            "identifier": {"scheme": "UA-EDR", "id": edrpou, "legalName": entity},
            "address": {"countryName": "Україна", "locality": "м. Київ"},
            "contactPoint": {"name": entity, "telephone": "0440000000"}
        },
        "value": {"amount": amount, "currency": "UAH"},
        "minimalStep": {"amount": (amount / 100).max(1), "currency": "UAH"},
        "items": [{
            "description": description,
            "classification": {"scheme": "ДК021", "id": cpv, "description": description},
            "quantity": 1 + index % 10
        }],
        "enquiryPeriod": {"endDate": format_iso(&(now + days(enquiry_days)))},
        "tenderPeriod": {"endDate": format_iso(&(now + days(enquiry_days + 7)))}
    });

    let mut tender: Tender = serde_json::from_value(data).context("sample tender")?;
    tender.initialize(now);
    Ok(tender)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("install tracing subscriber")?;

    let Some(args) = parse_args()? else {
        return Ok(());
    };

    let mut settings = Settings::load(args.settings.as_deref())?;
    if let Some(db) = args.db {
        settings.database.path = db;
    }

    println!("Tender Seed Data Generator");
    println!("==========================");
    println!("Database: {}", settings.database.path.display());
    println!("Tenders:  {}", args.count);
    println!();

    let db = Database::new(settings.db_config()).await?;
    let repo = db.tenders(settings.core.server_id.as_deref());
    let clock = SystemClock;

    let start = std::time::Instant::now();
    for index in 0..args.count {
        let mut tender = sample_tender(index, &clock)?;
        let ctx = SaveContext {
            author: "seed",
            now: clock.now(),
            config: &settings.core,
        };
        repo.save_tender(&mut tender, None, &ctx)
            .await
            .with_context(|| format!("saving sample tender {}", index + 1))?;

        if (index + 1) % 50 == 0 {
            info!(saved = index + 1, "Seeding progress");
        }
    }

    println!(
        "Generated {} tenders in {:.2?}",
        args.count,
        start.elapsed()
    );

    db.close().await;
    Ok(())
}
