use clap::Parser;
use es4c_core::models::job::SyncJob;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(
    name = "es4c",
    about = "Self-service accounts mirrored into an Active Directory domain",
    version
)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "es4c.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Write a default configuration file and create the database
    Init {
        /// Database file to use instead of the default location
        #[arg(long)]
        database: Option<String>,
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
    /// Start the web front end
    Serve {
        /// Port to listen on (defaults to web.port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run the directory worker
    Worker {
        /// Partitions to consume, comma separated (defaults to worker.partitions, or all)
        #[arg(long, value_delimiter = ',')]
        partitions: Vec<u32>,
    },
    /// Create a verified staff superuser account
    CreateSuperuser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "Site")]
        first_name: String,
        #[arg(long, default_value = "Administrator")]
        last_name: String,
        #[arg(long, env = "ES4C_SUPERUSER_PASSWORD", hide_env_values = true)]
        password: String,
        /// Also create and enable the account in the directory
        #[arg(long)]
        sync: bool,
    },
    /// Publish a directory job by hand
    Enqueue {
        #[command(subcommand)]
        job: JobCommand,
    },
    /// Show the recorded outcome of a job
    JobStatus {
        id: Uuid,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Bind to the directory with the configured credentials
    TestDirectory,
}

#[derive(clap::Subcommand)]
enum JobCommand {
    /// Create a (disabled) directory user
    CreateUser {
        username: String,
        #[arg(long, env = "ES4C_JOB_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
    },
    /// Enable a directory user
    EnableAccount { username: String },
    /// Replace directory attributes (`--set givenName=Mary`)
    UpdateUser {
        username: String,
        #[arg(long = "set", value_parser = commands::enqueue::parse_attribute, required = true)]
        attributes: Vec<(String, String)>,
    },
    /// Set a directory user's password
    SetPassword {
        username: String,
        #[arg(long, env = "ES4C_JOB_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Delete a directory user
    DeleteUser { username: String },
}

impl JobCommand {
    fn into_job(self) -> SyncJob {
        match self {
            JobCommand::CreateUser {
                username,
                password,
                first_name,
                last_name,
            } => SyncJob::create_user(&username, &password, &first_name, &last_name),
            JobCommand::EnableAccount { username } => SyncJob::EnableAccount { username },
            JobCommand::UpdateUser {
                username,
                attributes,
            } => SyncJob::UpdateUserAttributes {
                username,
                attributes: commands::enqueue::attribute_map(attributes),
            },
            JobCommand::SetPassword { username, password } => {
                SyncJob::UpdateUserPassword { username, password }
            }
            JobCommand::DeleteUser { username } => SyncJob::DeleteUser { username },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { database, force } => {
            commands::init::run(&cli.config, database.as_deref(), force).await?;
        }
        Commands::Serve { port } => {
            commands::serve::run(&cli.config, port).await?;
        }
        Commands::Worker { partitions } => {
            commands::worker::run(&cli.config, partitions).await?;
        }
        Commands::CreateSuperuser {
            username,
            email,
            first_name,
            last_name,
            password,
            sync,
        } => {
            let args = commands::superuser::SuperuserArgs {
                username,
                email,
                first_name,
                last_name,
                password,
                sync,
            };
            commands::superuser::run(&cli.config, args).await?;
        }
        Commands::Enqueue { job } => {
            commands::enqueue::run(&cli.config, job.into_job()).await?;
        }
        Commands::JobStatus { id, json } => {
            commands::job_status::run(&cli.config, id, json).await?;
        }
        Commands::TestDirectory => {
            commands::test_directory::run(&cli.config).await?;
        }
    }

    Ok(())
}
