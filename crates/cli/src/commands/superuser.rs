use es4c_core::db::repository::AccountRepository;
use es4c_core::db::sqlite::SqliteRepository;
use es4c_core::models::account::{Account, NewAccount};
use es4c_core::models::job::SyncJob;
use es4c_core::tokens::generate_verification_token;
use es4c_core::validation::{
    validate_first_name, validate_last_name, validate_password, validate_username, FieldErrors,
};
use es4c_queue::JobPublisher;
use es4c_web::auth::hash_password;
use tracing::info;

use super::{connect_queue, load_config, open_repository};

pub struct SuperuserArgs {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    /// Also publish `create_user` and `enable_account` for the directory.
    pub sync: bool,
}

/// Run the `create-superuser` command.
pub async fn run(config_path: &str, args: SuperuserArgs) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let repo = open_repository(&config).await?;
    let account = create(&repo, &args).await?;

    println!("Superuser {} created (id {})", account.username, account.id);

    if args.sync {
        let queue = connect_queue(&config).await?;
        let created = queue
            .enqueue(SyncJob::create_user(
                &account.username,
                &args.password,
                &account.first_name,
                &account.last_name,
            ))
            .await?;
        let enabled = queue
            .enqueue(SyncJob::EnableAccount {
                username: account.username.clone(),
            })
            .await?;
        println!("Directory jobs queued: {created} (create), {enabled} (enable)");
    }
    Ok(())
}

/// Validate and insert the superuser account.
///
/// The email is only checked for shape; the registration domain allow-list
/// does not apply to operators.
pub async fn create(repo: &SqliteRepository, args: &SuperuserArgs) -> anyhow::Result<Account> {
    let mut errors = FieldErrors::new();
    errors.check("username", validate_username(&args.username));
    errors.check(
        "email",
        es4c_core::validation::validate_email(&args.email, &[email_domain(&args.email)]),
    );
    errors.check("first_name", validate_first_name(&args.first_name));
    errors.check("last_name", validate_last_name(&args.last_name));
    errors.check("password", validate_password(&args.password, &args.email));
    for field in ["username", "email", "first_name", "last_name", "password"] {
        if let Some(message) = errors.get(field) {
            anyhow::bail!("{field}: {message}");
        }
    }

    if repo.get_account_by_username(&args.username).await?.is_some() {
        anyhow::bail!("username {} is already taken", args.username);
    }

    let account = repo
        .create_account(&NewAccount {
            username: args.username.clone(),
            email: args.email.clone(),
            first_name: args.first_name.clone(),
            last_name: args.last_name.clone(),
            password_hash: hash_password(&args.password)?,
            verification_token: generate_verification_token(),
            is_verified: true,
            is_staff: true,
            is_superuser: true,
        })
        .await?;
    info!(username = %account.username, "superuser created");
    Ok(account)
}

fn email_domain(email: &str) -> String {
    email.rsplit_once('@').map(|(_, d)| d).unwrap_or("").to_string()
}
