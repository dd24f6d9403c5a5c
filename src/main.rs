// Facility Intelligence - CLI
// Loads the dataset once and prints one query result as JSON

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use facility_intel::{init_tracing, Config, FacilityStore, GeoQuery};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "facility-intel")]
#[command(about = "Healthcare facility reconciliation and gap analysis", long_about = None)]
struct Args {
    /// Facility CSV export (overrides FACILITY_CSV_PATH)
    #[arg(long, global = true)]
    csv: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "facility_intel=trace" (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Data quality and medical desert summary
    Summary,

    /// Full desert matrix with recommendations
    Deserts,

    /// Facilities with anomaly flags
    Anomalies,

    /// One facility by id
    Facility { id: String },

    /// Free-text geospatial query, e.g. "surgery within 50km of Tamale"
    Geo {
        message: String,

        #[arg(long, requires = "lng", allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lng: Option<f64>,

        #[arg(long)]
        radius_km: Option<f64>,

        #[arg(long)]
        hours: Option<f64>,

        #[arg(long)]
        facility_type: Option<String>,

        /// Capability category name, e.g. "Surgery"
        #[arg(long)]
        capability: Option<String>,
    },

    /// Semantic search (needs OPENAI_API_KEY)
    Search {
        query: String,

        #[arg(long, default_value_t = 10)]
        top_k: usize,
    },
}

#[derive(Serialize)]
struct Summary {
    snapshot: facility_intel::store::SnapshotInfo,
    data_quality: facility_intel::DataQualityStats,
    desert_regions: Vec<String>,
    facilities_with_anomalies: usize,
    total_anomalies: usize,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.log_level.as_deref())?;

    let mut config = Config::from_env()?;
    if let Some(csv) = args.csv {
        config.csv_path = csv;
    }

    let needs_index = matches!(args.command, Command::Search { .. });
    if needs_index && config.openai_api_key.is_none() {
        bail!("search needs OPENAI_API_KEY");
    }
    if !needs_index {
        // Skip the embedding round-trips for commands that never search
        config.openai_api_key = None;
    }

    info!("facility-intel v{}", facility_intel::VERSION);
    let store = FacilityStore::from_config(&config)?;
    let snapshot = store.load_path(&config.csv_path).await?;

    match args.command {
        Command::Summary => {
            let report = snapshot.anomaly_report();
            print_json(&Summary {
                snapshot: snapshot.info(),
                data_quality: snapshot.data_quality.clone(),
                desert_regions: snapshot.medical_deserts().summary.critical_regions,
                facilities_with_anomalies: report.total_facilities_with_anomalies,
                total_anomalies: report.total_anomaly_count,
            })?;
        }
        Command::Deserts => print_json(&snapshot.medical_deserts())?,
        Command::Anomalies => print_json(&snapshot.anomaly_report())?,
        Command::Facility { id } => print_json(snapshot.get_facility(&id)?)?,
        Command::Geo {
            message,
            lat,
            lng,
            radius_km,
            hours,
            facility_type,
            capability,
        } => {
            let query = GeoQuery {
                message: Some(message),
                center: lat.zip(lng),
                radius_km,
                hours,
                facility_type,
                capability_category: capability,
                ..GeoQuery::default()
            };
            print_json(&snapshot.geospatial(&query)?)?;
        }
        Command::Search { query, top_k } => print_json(&store.search(&query, top_k).await?)?,
    }

    Ok(())
}
