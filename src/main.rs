use anyhow::Context;
use clap::Parser;
use workshop::config::cli::Command;
use workshop::utils::error::ErrorCategory;
use workshop::utils::logger;
use workshop::{CliConfig, GetOptions, Requirement, Workshop, WorkshopError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }
    tracing::debug!("CLI config: {:?}", config);

    let workshop = match Workshop::open(&config.root) {
        Ok(workshop) => workshop,
        Err(e) => exit_with(e),
    };

    match run(&workshop, config.command).await {
        Ok(()) => Ok(()),
        Err(e) => match e.downcast::<WorkshopError>() {
            Ok(e) => exit_with(e),
            Err(other) => Err(other),
        },
    }
}

async fn run(workshop: &Workshop, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Get {
            address,
            alias,
            latest,
            no_fetch,
        } => {
            let options = GetOptions {
                force_latest: latest,
                skip_fetch: no_fetch,
            };
            let requirement = workshop.get(&address, alias.as_deref(), options).await?;
            println!("✅ {}", describe(&requirement));
        }
        Command::Remove { key } => {
            for requirement in workshop.remove(&key).await? {
                println!("🗑️  {}", requirement.url);
            }
        }
        Command::List { json } => {
            let require = workshop.require().await;
            if json {
                let rows: Vec<serde_json::Value> = require
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "url": r.url,
                            "name": r.name,
                            "alias": r.alias,
                            "version": r.version.to_string(),
                            "rel": r.rel,
                            "replaced": r.replaced,
                            "downloaded": r.downloaded,
                            "state": r.state,
                            "location": r.location,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&rows).context("Failed to render requirements")?
                );
            } else if require.is_empty() {
                println!("No requirements declared in {}", workshop.root().display());
            } else {
                for requirement in &require {
                    println!("{}", describe(requirement));
                }
            }
        }
        Command::Download => {
            let outcomes = workshop.download().await;
            let mut failed = 0;
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(path) => println!("📦 {} -> {}", outcome.module, path.display()),
                    Err(e) => {
                        failed += 1;
                        eprintln!("❌ {}: {}", outcome.module, e);
                    }
                }
            }
            println!("Downloaded {}/{}", outcomes.len() - failed, outcomes.len());
            if failed > 0 {
                anyhow::bail!("{} requirement(s) failed to download", failed);
            }
        }
        Command::Replace { key, location } => {
            workshop.replace(&key, &location).await?;
            println!("🔀 {} => {}", key, location);
        }
        Command::Unreplace { key } => {
            workshop.unreplace(&key).await?;
            println!("🔀 {} restored", key);
        }
    }
    Ok(())
}

fn describe(requirement: &Requirement) -> String {
    let status = if requirement.replaced {
        "replaced"
    } else if requirement.downloaded {
        "downloaded"
    } else {
        "declared"
    };
    format!(
        "{:<24} {:<48} {:<24} [{}]",
        requirement.alias,
        requirement.module(),
        requirement.version,
        status
    )
}

fn exit_with(e: WorkshopError) -> ! {
    tracing::error!("❌ {} (Category: {:?})", e, e.category());
    eprintln!("❌ {}", e);
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    // 依錯誤類別決定退出碼
    let exit_code = match e.category() {
        ErrorCategory::Input => 1,
        ErrorCategory::Configuration => 1,
        ErrorCategory::Resolution => 2,
        ErrorCategory::Network => 2,
        ErrorCategory::Storage => 3,
    };
    std::process::exit(exit_code);
}
