//! `chatrelay init` — Print or write the default configuration.

use std::path::PathBuf;

use chatrelay_config::AppConfig;

pub fn run(output: Option<PathBuf>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let toml = AppConfig::default_toml();

    let Some(path) = output else {
        print!("{toml}");
        return Ok(());
    };

    if path.exists() && !force {
        return Err(format!(
            "{} already exists; pass --force to overwrite",
            path.display()
        )
        .into());
    }

    std::fs::write(&path, &toml)?;
    println!("Created {}", path.display());
    println!("\nNext steps:");
    println!("  1. Put OPENAI_API_KEY=sk-... in .env or the environment");
    println!("  2. Point [persona] and [knowledge] at your files");
    println!("  3. Run: chatrelay serve");
    Ok(())
}
