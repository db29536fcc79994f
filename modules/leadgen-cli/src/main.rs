//! `leadgen`: operator CLI over the dedup and route-planning core.
//!
//! Every command prints JSON on stdout; logs go to stderr.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use leadgen_common::{Config, IdentityKey, LeadGenError, LeadId};
use leadgen_dedup::{MergeEngine, SeenEntityCache};
use leadgen_route::{MapLinkBuilder, NominatimGeocoder, RoutePlanRequest, RoutePlanner};
use leadgen_store::PgStore;

#[derive(Parser)]
#[command(name = "leadgen", about = "Lead dedup and route planning")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or update the database schema
    Migrate,

    /// Check whether an entity has been seen before
    #[command(subcommand)]
    Seen(EntityArg),

    /// Record an entity as seen
    #[command(subcommand)]
    Mark(EntityArg),

    /// Entity counts and seen-marker cache size
    Stats,

    /// Delete lapsed seen-markers and any that have no expiry
    Sweep,

    /// List groups of leads sharing a company and contact
    Duplicates,

    /// Merge secondary leads into a primary lead
    Merge {
        primary: LeadId,

        #[arg(required = true)]
        secondaries: Vec<LeadId>,
    },

    /// Order leads into a visiting route
    PlanRoute {
        #[arg(required = true)]
        lead_ids: Vec<LeadId>,

        /// Address the route starts from
        #[arg(long)]
        start: Option<String>,

        /// Keep the given lead order instead of optimizing
        #[arg(long)]
        no_optimize: bool,
    },
}

#[derive(Subcommand)]
enum EntityArg {
    /// Company by domain or website URL
    Company { domain: String },
    /// Job posting by board and board-assigned id
    Job { source: String, external_id: String },
    /// Contact by email
    Contact { email: String },
}

impl EntityArg {
    fn identity_key(&self) -> Result<IdentityKey, LeadGenError> {
        let key = match self {
            Self::Company { domain } => IdentityKey::company(domain),
            Self::Job {
                source,
                external_id,
            } => IdentityKey::job(source, external_id),
            Self::Contact { email } => IdentityKey::contact(email),
        };
        key.ok_or_else(|| LeadGenError::Validation("entity has no usable identity key".into()))
    }
}

#[derive(Serialize)]
struct SeenOutput<'a> {
    key: &'a IdentityKey,
    seen: bool,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("leadgen=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    config.log_redacted();

    let store = PgStore::connect(&config.database_url).await?;

    match cli.command {
        Command::Migrate => {
            store.migrate().await?;
        }
        Command::Seen(entity) => {
            let key = entity.identity_key()?;
            let seen = seen_cache(&config, &store).seen(&key).await?;
            print_json(&SeenOutput { key: &key, seen })?;
        }
        Command::Mark(entity) => {
            let key = entity.identity_key()?;
            seen_cache(&config, &store).mark(&key).await;
            info!(key = %key, "Marked as seen");
        }
        Command::Stats => {
            let stats = seen_cache(&config, &store).stats().await?;
            print_json(&stats)?;
        }
        Command::Sweep => {
            let report = seen_cache(&config, &store).sweep().await?;
            print_json(&report)?;
        }
        Command::Duplicates => {
            let groups = MergeEngine::new(Arc::new(store)).find_duplicate_groups().await?;
            print_json(&groups)?;
        }
        Command::Merge {
            primary,
            secondaries,
        } => {
            let report = MergeEngine::new(Arc::new(store)).merge(primary, &secondaries).await?;
            print_json(&report)?;
        }
        Command::PlanRoute {
            lead_ids,
            start,
            no_optimize,
        } => {
            let client = reqwest::Client::builder()
                .timeout(config.geocode_timeout())
                .build()?;
            let geocoder = NominatimGeocoder::new(client, &config.geocoder_url, &config.geocoder_user_agent);
            let planner = RoutePlanner::new(
                Arc::new(store),
                Arc::new(geocoder),
                MapLinkBuilder::new(config.google_maps_api_key.clone()),
                config.geocode_timeout(),
            );

            let request = RoutePlanRequest {
                lead_ids,
                start_location: start,
                optimize: !no_optimize,
            };
            let plan = planner.plan(&request).await?;
            print_json(&plan)?;
        }
    }

    Ok(())
}

/// Markers live in the database next to the entities, so a `mark` in one
/// run is visible to `seen`, `stats` and `sweep` in the next.
fn seen_cache(config: &Config, store: &PgStore) -> SeenEntityCache {
    SeenEntityCache::new(
        Arc::new(store.marker_cache()),
        Arc::new(store.clone()),
        config.dedup_ttl(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn merge_requires_a_secondary() {
        assert!(Cli::try_parse_from(["leadgen", "merge", "1"]).is_err());
        let cli = Cli::try_parse_from(["leadgen", "merge", "1", "2", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Merge { primary: 1, ref secondaries } if secondaries == &vec![2, 3]
        ));
    }

    #[test]
    fn plan_route_optimizes_by_default() {
        let cli = Cli::try_parse_from(["leadgen", "plan-route", "4", "5", "--start", "Depot"]).unwrap();
        let Command::PlanRoute { lead_ids, start, no_optimize } = cli.command else {
            panic!("expected plan-route");
        };
        assert_eq!(lead_ids, vec![4, 5]);
        assert_eq!(start.as_deref(), Some("Depot"));
        assert!(!no_optimize);
    }

    #[test]
    fn entity_args_normalize_into_identity_keys() {
        let company = EntityArg::Company {
            domain: "https://www.Acme.com/jobs".into(),
        };
        assert_eq!(company.identity_key().unwrap(), IdentityKey::company("acme.com").unwrap());

        let blank = EntityArg::Contact { email: "  ".into() };
        assert!(matches!(blank.identity_key(), Err(LeadGenError::Validation(_))));
    }
}
