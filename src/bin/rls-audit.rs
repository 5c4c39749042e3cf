use clap::Parser;
use rls_audit::cli::Cli;
use rls_audit::config::AuditConfig;
use rls_audit::error::AuditError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so SUPABASE_DB_URL / DATABASE_URL are picked up
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AuditConfig::from_env();

    if let Err(e) = rls_audit::cli::run(cli, &config).await {
        let tag = e.downcast_ref::<AuditError>().map(AuditError::tag).unwrap_or("error");
        match std::env::var("CLI_VERBOSE").as_deref() {
            Ok("true") | Ok("1") => eprintln!("[rls-audit:{tag}] {e:?}"),
            _ => eprintln!("[rls-audit:{tag}] {e}"),
        }
        std::process::exit(1);
    }

    Ok(())
}
