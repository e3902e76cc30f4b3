use serde::Serialize;
use wayfarer_core::config::{AppConfig, LoadOptions};
use wayfarer_db::{connect_with_config, migrations};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 4] =
    ["llm_credentials", "search_credentials", "provider_catalog", "database_connectivity"];

/// Returns the rendered report and whether every check passed.
pub fn run(options: &LoadOptions, json_output: bool) -> (String, bool) {
    let report = build_report(options);
    let passed = report.overall_status == CheckStatus::Pass;

    if json_output {
        let rendered = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return (rendered, passed);
    }

    (render_human(&report), passed)
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.push(check_llm_credentials(&config));
            checks.push(check_search_credentials(&config));
            checks.push(check_provider_catalog(&config));
            checks.push(check_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            checks.extend(DEPENDENT_CHECKS.into_iter().map(DoctorCheck::skipped));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    match config.llm.credential() {
        Ok(Some(_)) => DoctorCheck::pass(
            "llm_credentials",
            format!("{} key present for model `{}`", config.llm.provider.as_str(), config.llm.model),
        ),
        Ok(None) => DoctorCheck::pass(
            "llm_credentials",
            format!("ollama at {} needs no key", config.llm.effective_base_url()),
        ),
        Err(error) => DoctorCheck::fail("llm_credentials", error.to_string()),
    }
}

fn check_search_credentials(config: &AppConfig) -> DoctorCheck {
    match config.search.credential() {
        Ok(_) => DoctorCheck::pass(
            "search_credentials",
            format!("search key present for {}", config.search.base_url),
        ),
        Err(error) => DoctorCheck::fail("search_credentials", error.to_string()),
    }
}

fn check_provider_catalog(config: &AppConfig) -> DoctorCheck {
    match config.search.load_catalog() {
        Ok(catalog) => {
            let source = config
                .search
                .catalog_path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "built-in".to_string());
            DoctorCheck::pass(
                "provider_catalog",
                format!("{} trusted domains from {source}", catalog.provider_domains().len()),
            )
        }
        Err(error) => DoctorCheck::fail("provider_catalog", error.to_string()),
    }
}

fn check_database(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck::fail(
                "database_connectivity",
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;
        let applied = migrations::applied_versions(&pool)
            .await
            .map_err(|error| format!("failed to read migration history: {error}"))?;
        pool.close().await;
        Ok::<usize, String>(applied.len())
    });

    let known = migrations::known_versions().len();
    match result {
        Ok(applied) if applied >= known => DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`; schema up to date", config.database.url),
        ),
        Ok(applied) => DoctorCheck::fail(
            "database_connectivity",
            format!(
                "connected using `{}` but {} of {known} migrations are applied; run `wayfarer migrate`",
                config.database.url, applied
            ),
        ),
        Err(error) => DoctorCheck::fail("database_connectivity", error),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
