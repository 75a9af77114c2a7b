use anyhow::{bail, Context};
use dotenv::dotenv;
use forefy_provisioning::analytics::{question_evolution, QUESTION_EVOLUTION};
use forefy_provisioning::provisioning::{student_details, InviteOutcome, InviteRequest, TestUser};
use forefy_provisioning::{AppState, DataStore, Settings};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const USAGE: &str = "usage: forefy-provisioning <health | repair-profiles | assign-exams <email> | seed-test-users | verify-db | student-details <uuid> | question-evolution | invite-student <manager-token> <cpf> <email> <name>>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = Settings::new().context("failed to load configuration")?;
    info!(environment = %config.environment, backend = %config.backend.url, "configuration loaded");

    let state = AppState::new(config).context("failed to wire backend clients")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["health"] => {
            let health = state.health_check().await;
            println!("{}", serde_json::to_string_pretty(&health)?);
            if health["status"] != "healthy" {
                bail!("backend unreachable");
            }
        }
        ["repair-profiles"] => {
            let report = state.profiles.repair_profiles().await?;
            println!(
                "scanned {} accounts: {} created, {} already present, {} without email, {} failed",
                report.scanned,
                report.created,
                report.existing,
                report.skipped,
                report.failed.len()
            );
        }
        ["assign-exams", email] => {
            if !state.enrollment.manual_assign_exams(email).await {
                bail!("could not assign exams to {}", email);
            }
            println!("exams assigned to {}", email);
        }
        ["seed-test-users"] => {
            let report = state.profiles.seed_test_users(&TestUser::demo_set()).await?;
            println!("{:#?}", report);
            if !report.failed.is_empty() {
                bail!("{} test users failed", report.failed.len());
            }
        }
        ["verify-db"] => {
            let report = state.maintenance.verify_database().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        ["student-details", id] => {
            let id = Uuid::parse_str(id).with_context(|| format!("invalid student id: {}", id))?;
            match student_details(state.store.as_ref(), Some(id)).await? {
                Some(details) => println!("{}", serde_json::to_string_pretty(&details)?),
                None => println!("no student found for {}", id),
            }
        }
        ["question-evolution"] => {
            let created = state.store.active_question_dates().await?;
            let points = question_evolution(&created, QUESTION_EVOLUTION.max_items);
            println!("{}", serde_json::to_string_pretty(&points)?);
        }
        ["invite-student", token, cpf, email, name] => {
            let request = InviteRequest {
                cpf: cpf.to_string(),
                email: email.to_string(),
                name: name.to_string(),
            };
            match state.invites.invite_student(token, &request).await? {
                InviteOutcome::AlreadyAssociated { profile_id } => {
                    println!("{} ({}) is already in the organization as {}", name, email, profile_id)
                }
                InviteOutcome::Associated { profile_id } => {
                    println!("{} ({}) added to the organization as {}", name, email, profile_id)
                }
                InviteOutcome::Invited { user_id } => {
                    println!("invitation sent to {} ({}), account {}", name, email, user_id)
                }
            }
        }
        _ => bail!(USAGE),
    }

    Ok(())
}
