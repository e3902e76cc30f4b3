use serde_json::json;
use wayfarer_core::config::LoadOptions;
use wayfarer_db::migrations;

use crate::commands::{async_runtime, load_config, open_database, CommandResult, EXIT_DATABASE};

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("migrate", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match async_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let pool = match open_database("migrate", &config).await {
            Ok(pool) => pool,
            Err(failure) => return failure,
        };
        let applied = migrations::applied_versions(&pool).await;
        pool.close().await;

        match applied {
            Ok(versions) => CommandResult::success_with_data(
                "migrate",
                "applied pending migrations",
                json!({ "applied_versions": versions }),
            ),
            Err(error) => {
                CommandResult::failure("migrate", "db_connectivity", error.to_string(), EXIT_DATABASE)
            }
        }
    })
}
