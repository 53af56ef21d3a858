use es4c_directory::{DirectoryClient, LdapDirectory};

use super::load_config;

/// Run the `test-directory` command: bind with the configured credentials.
pub async fn run(config_path: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    config.validate_directory()?;

    let directory = LdapDirectory::new(&config.directory);
    println!(
        "Binding to {} as {} (realm {})",
        config.directory.server,
        config.directory.bind_dn,
        directory.realm()
    );
    let result = directory.test_connection().await;
    let _ = directory.close().await;
    result?;

    println!("Directory connection OK");
    Ok(())
}
