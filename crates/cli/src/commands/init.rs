use std::path::Path;

use es4c_core::config::Es4cConfig;
use tracing::info;

use super::open_repository;

/// Run the `init` command: write a default configuration and create the database.
pub async fn run(config_path: &str, database: Option<&str>, force: bool) -> anyhow::Result<()> {
    let path = Path::new(config_path);
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }

    let mut config = Es4cConfig::generate_default();
    if let Some(database) = database {
        config.es4c.database.path = database.to_string();
    }

    let toml_str = toml::to_string_pretty(&config)?;
    std::fs::write(path, &toml_str)?;
    info!(path = %path.display(), "wrote configuration");

    open_repository(&config).await?;

    println!("ES4C initialized successfully!");
    println!("  Configuration: {}", path.display());
    println!("  Database:      {}", config.es4c.database.path);
    println!();
    println!("Next steps:");
    println!(
        "  1. Edit {} (host_fqdn, allowed_email_domains, directory base_dn)",
        path.display()
    );
    println!("  2. Export the broker and directory secrets (ES4C_BROKER_*, ES4C_DIRECTORY_ADMIN_PASSWORD)");
    println!("  3. Run `es4c test-directory` to check the directory bind");
    println!("  4. Run `es4c create-superuser` to add the first administrator");
    println!("  5. Start `es4c worker` and `es4c serve`");

    Ok(())
}
