//! `chatrelay doctor` — Diagnose configuration and provider reachability.

use chatrelay_config::{AppConfig, ConfigError};
use chatrelay_core::Provider;
use chatrelay_core::persona::Persona;
use chatrelay_memory::KnowledgeStore;

/// Print the diagnostics and fail when any check did not pass, so scripts
/// can gate on the exit status.
pub async fn run(loaded: Result<AppConfig, ConfigError>) -> Result<(), Box<dyn std::error::Error>> {
    println!("chatrelay doctor — system diagnostics");
    println!("=====================================\n");

    match diagnose(loaded).await {
        0 => {
            println!("  🎉 All checks passed!");
            Ok(())
        }
        issues => {
            println!("  ⚠️  {issues} issue(s) found. See above for details.");
            Err(format!("doctor found {issues} issue(s)").into())
        }
    }
}

/// Run every check and return the number of issues found.
async fn diagnose(loaded: Result<AppConfig, ConfigError>) -> usize {
    let mut issues = 0;

    let config = match loaded {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!();
            return 1;
        }
    };

    let has_key = config.require_api_key().is_ok();
    if has_key {
        println!("  ✅ API key configured");
    } else {
        println!("  ❌ No API key — set OPENAI_API_KEY in the environment or .env");
        issues += 1;
    }

    let persona = Persona::load(config.persona.text.as_deref(), config.persona.path.as_deref());
    match (&config.persona.path, &persona.source) {
        (Some(path), chatrelay_core::PersonaSource::Fallback) => {
            println!("  ⚠️  Persona file {} unusable, built-in persona in use", path.display());
            issues += 1;
        }
        _ => println!("  ✅ Persona: {:?}", persona.source),
    }
    if !persona.has_placeholder() {
        println!("  ℹ️  Persona has no {{{{knowledge}}}} placeholder; knowledge is appended");
    }

    match config.knowledge.path.as_deref() {
        None => println!("  ℹ️  No knowledge corpus configured"),
        Some(path) => match KnowledgeStore::try_load(path, config.knowledge.chunk_size) {
            Ok(store) => println!("  ✅ Knowledge corpus: {} fragments", store.len()),
            Err(e) => {
                println!("  ⚠️  Knowledge corpus unavailable: {e}");
                issues += 1;
            }
        },
    }

    if has_key {
        match chatrelay_providers::build_from_config(&config) {
            Ok(provider) => match provider.health_check().await {
                Ok(true) => println!("  ✅ Provider reachable at {}", provider.base_url()),
                Ok(false) => {
                    println!("  ❌ Provider at {} rejected the request", provider.base_url());
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Provider unreachable: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Provider setup failed: {e}");
                issues += 1;
            }
        }
    }

    println!();
    issues
}
