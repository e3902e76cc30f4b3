use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::json;
use wayfarer_core::collaborators::ConversationStore;
use wayfarer_core::config::LoadOptions;
use wayfarer_core::domain::session::SessionId;
use wayfarer_core::domain::trip::{NewTrip, TripId, TripPatch, TripStatus};
use wayfarer_db::{
    DbPool, RepositoryError, SqlConversationStore, SqlTripRepository, TripFilter, TripRepository,
};

use crate::commands::{
    async_runtime, load_config, open_database, to_value, CommandResult, EXIT_INVALID_INPUT,
    EXIT_NOT_FOUND, EXIT_UNAVAILABLE,
};

#[derive(Debug, Clone)]
pub enum TripAction {
    List { status: Option<TripStatus>, limit: u32 },
    Show { id: String },
    Save { conversation: String },
    Update { id: String, patch: TripPatch },
    Delete { id: String },
}

impl TripAction {
    fn name(&self) -> &'static str {
        match self {
            Self::List { .. } => "trips.list",
            Self::Show { .. } => "trips.show",
            Self::Save { .. } => "trips.save",
            Self::Update { .. } => "trips.update",
            Self::Delete { .. } => "trips.delete",
        }
    }
}

/// Builds a patch from optional edits; `None` when nothing would change.
pub fn patch_from_edits(
    title: Option<String>,
    destination: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    budget: Option<Decimal>,
    travelers: Option<u32>,
    status: Option<TripStatus>,
) -> Option<TripPatch> {
    let patch = TripPatch {
        title,
        destination,
        start_date,
        end_date,
        budget,
        travelers,
        status,
        itinerary: None,
    };
    (patch != TripPatch::default()).then_some(patch)
}

pub fn parse_status(raw: &str) -> Result<TripStatus, String> {
    TripStatus::parse(raw)
        .ok_or_else(|| format!("unknown trip status `{raw}` (expected draft, confirmed or completed)"))
}

pub fn run(options: &LoadOptions, action: TripAction) -> CommandResult {
    let command = action.name();
    let config = match load_config(command, options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match async_runtime(command) {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let pool = match open_database(command, &config).await {
            Ok(pool) => pool,
            Err(failure) => return failure,
        };
        let result = execute(command, &pool, action).await;
        pool.close().await;
        result.unwrap_or_else(|failure| failure)
    })
}

async fn execute(
    command: &str,
    pool: &DbPool,
    action: TripAction,
) -> Result<CommandResult, CommandResult> {
    let trips = SqlTripRepository::new(pool.clone());
    let repository_failure = |error: RepositoryError| match error {
        RepositoryError::Invalid(error) => {
            CommandResult::failure(command, "invalid_input", error.to_string(), EXIT_INVALID_INPUT)
        }
        other => CommandResult::failure(command, "persistence", other.to_string(), EXIT_UNAVAILABLE),
    };
    let not_found =
        |id: &str| CommandResult::failure(command, "not_found", format!("trip `{id}` was not found"), EXIT_NOT_FOUND);

    match action {
        TripAction::List { status, limit } => {
            let listed =
                trips.list(TripFilter { status, limit }).await.map_err(repository_failure)?;
            Ok(CommandResult::success_with_data(
                command,
                format!("{} trips", listed.len()),
                to_value(command, &listed)?,
            ))
        }
        TripAction::Show { id } => {
            let trip = trips
                .find_by_id(&TripId(id.clone()))
                .await
                .map_err(repository_failure)?
                .ok_or_else(|| not_found(&id))?;
            Ok(CommandResult::success_with_data(command, trip.title.clone(), to_value(command, &trip)?))
        }
        TripAction::Save { conversation } => {
            let store = SqlConversationStore::new(pool.clone());
            let session = store
                .get(&SessionId(conversation.clone()))
                .await
                .map_err(|error| {
                    CommandResult::failure(command, "persistence", error.to_string(), EXIT_UNAVAILABLE)
                })?
                .ok_or_else(|| {
                    CommandResult::failure(
                        command,
                        "not_found",
                        format!("conversation `{conversation}` was not found"),
                        EXIT_NOT_FOUND,
                    )
                })?;
            let draft = NewTrip::from_session(&session).ok_or_else(|| {
                CommandResult::failure(
                    command,
                    "invalid_input",
                    format!("conversation `{conversation}` has not produced an itinerary yet"),
                    EXIT_INVALID_INPUT,
                )
            })?;
            let saved = trips.create(draft).await.map_err(repository_failure)?;
            Ok(CommandResult::success_with_data(
                command,
                format!("saved trip {}", saved.id.0),
                to_value(command, &saved)?,
            ))
        }
        TripAction::Update { id, patch } => {
            let updated = trips
                .update(&TripId(id.clone()), patch)
                .await
                .map_err(repository_failure)?
                .ok_or_else(|| not_found(&id))?;
            Ok(CommandResult::success_with_data(
                command,
                format!("updated trip {}", updated.id.0),
                to_value(command, &updated)?,
            ))
        }
        TripAction::Delete { id } => {
            if !trips.delete(&TripId(id.clone())).await.map_err(repository_failure)? {
                return Err(not_found(&id));
            }
            Ok(CommandResult::success_with_data(
                command,
                format!("deleted trip {id}"),
                json!({ "id": id, "deleted": true }),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use wayfarer_core::domain::trip::TripStatus;

    use super::{parse_status, patch_from_edits};

    #[test]
    fn empty_edits_produce_no_patch() {
        assert!(patch_from_edits(None, None, None, None, None, None, None).is_none());

        let patch = patch_from_edits(
            None,
            None,
            None,
            NaiveDate::from_ymd_opt(2026, 3, 4),
            None,
            None,
            Some(TripStatus::Confirmed),
        )
        .expect("patch");
        assert_eq!(patch.status, Some(TripStatus::Confirmed));
        assert!(patch.itinerary.is_none());
    }

    #[test]
    fn status_parsing_is_case_insensitive_and_reports_choices() {
        assert_eq!(parse_status(" Completed "), Ok(TripStatus::Completed));
        let error = parse_status("archived").expect_err("unknown status");
        assert!(error.contains("draft, confirmed or completed"));
    }
}
