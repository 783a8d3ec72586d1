// SysGestion module manager
// Main entry point for the sysgestion binary

use clap::Parser;
use sdk::errors::{ModuleError, ModuleErrorExt};
use sysgestion_engine::cli::{Cli, Command, ConfigAction, ModuleAction};
use sysgestion_engine::config::Config;
use sysgestion_engine::context::AppContext;
use sysgestion_engine::handlers::{
    handle_check, handle_config_show, handle_config_validate, handle_info, handle_install,
    handle_list, handle_set_permission, handle_toggle, handle_uninstall, OutputFormat,
};
use sysgestion_engine::session::Session;
use sysgestion_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() {
    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {:#}", e);
        if let Some(module_error) = e.downcast_ref::<ModuleError>() {
            eprintln!("Hint: {}", module_error.user_hint());
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config file; RUST_LOG wins over both
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("SysGestion v{} ({} - {})", version, commit, timestamp);

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Command::Modules { action } => {
            tracing::info!("Module management: {:?}", action);
            let session = Session::resolve(cli.role, &config)?;
            let mut ctx = AppContext::open(config, session)?;

            match action {
                ModuleAction::Install { path } => handle_install(&mut ctx, &path, format).await,
                ModuleAction::List => handle_list(&ctx, format).await,
                ModuleAction::Info { id } => handle_info(&ctx, &id, format).await,
                ModuleAction::Toggle { id } => handle_toggle(&mut ctx, &id, format).await,
                ModuleAction::Grant { id, action, role } => {
                    handle_set_permission(&mut ctx, &id, action, role, true, format).await
                }
                ModuleAction::Revoke { id, action, role } => {
                    handle_set_permission(&mut ctx, &id, action, role, false, format).await
                }
                ModuleAction::Check { id, action } => handle_check(&ctx, &id, action, format).await,
                ModuleAction::Uninstall { id } => handle_uninstall(&mut ctx, &id, format).await,
            }
        }

        Command::Config { action } => {
            tracing::info!("Config management: {:?}", action);
            match action {
                ConfigAction::Show => handle_config_show(&config, format).await,
                ConfigAction::Validate => {
                    let path = match cli.config {
                        Some(path) => path,
                        None => Config::default_config_path()?,
                    };
                    handle_config_validate(&path, format).await
                }
            }
        }
    }
}
