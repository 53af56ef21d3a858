use es4c_queue::JobPublisher;
use uuid::Uuid;

use super::{connect_queue, load_config};

/// Run the `job-status` command: print the recorded outcome of a job.
pub async fn run(config_path: &str, id: Uuid, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let queue = connect_queue(&config).await?;

    match queue.fetch_result(id).await? {
        Some(outcome) if json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        Some(outcome) => {
            let status = if outcome.is_error() { "failed" } else { "done" };
            println!("{id}: {status}: {outcome}");
        }
        None => {
            println!(
                "{id}: no result (still queued, unknown, or expired after {}s)",
                config.broker.result_ttl_secs
            );
        }
    }
    Ok(())
}
