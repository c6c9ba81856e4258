use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "sqlguard", version, about = "SQL guardrails: validate, bound and run role-scoped queries")]
struct Cli {
    /// Guardrail configuration file. Without one, the built-in boardroom
    /// policies are used.
    #[arg(long, short, global = true, env = "SQLGUARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the configured role policies.
    Roles,

    /// Validate SQL for a role and show the bounded query.
    Check {
        #[arg(long)]
        role: String,

        /// SQL text. Read from --file when omitted.
        sql: Option<String>,

        #[arg(long, conflicts_with = "sql")]
        file: Option<PathBuf>,

        /// Strip markdown code fences (model output) before validating.
        #[arg(long, default_value_t = false)]
        strip_fences: bool,

        /// Print the verdict as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the SQL as it would be dispatched for a role.
    Rewrite {
        #[arg(long)]
        role: String,

        sql: String,
    },

    /// Run SQL through the guardrailed Postgres connection.
    Exec {
        #[arg(long)]
        role: String,

        sql: String,

        /// Overrides the configured upstream connection (`DATABASE_URL` by default).
        #[arg(long)]
        database_url: Option<String>,

        /// Positional bind parameter as JSON (`42`, `"2025-01-01"`). Repeatable.
        #[arg(long = "param")]
        params: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.cmd {
        Command::Roles => commands::roles::run_roles(&config)?,

        Command::Check {
            role,
            sql,
            file,
            strip_fences,
            json,
        } => {
            let sql = commands::read_sql(sql, file.as_deref())?;
            let allowed = commands::check::run_check(&config, &role, &sql, strip_fences, json)?;
            if !allowed {
                return Ok(ExitCode::FAILURE);
            }
        }

        Command::Rewrite { role, sql } => commands::check::run_rewrite(&config, &role, &sql)?,

        Command::Exec {
            role,
            sql,
            database_url,
            params,
        } => commands::exec::run_exec(config, &role, &sql, database_url, &params).await?,
    }

    Ok(ExitCode::SUCCESS)
}
