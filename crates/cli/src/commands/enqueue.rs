use es4c_core::models::job::{AttributeMap, SyncJob};
use es4c_queue::JobPublisher;

use super::{connect_queue, load_config};

/// Run the `enqueue` command: publish one directory job by hand.
pub async fn run(config_path: &str, job: SyncJob) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let queue = connect_queue(&config).await?;
    let task = job.kind();
    let username = job.username().to_string();
    let id = queue.enqueue(job).await?;
    println!("{task} for {username} queued as {id}");
    Ok(())
}

/// Parse a `name=value` attribute assignment. An empty value clears the attribute.
pub fn parse_attribute(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got `{s}`")),
    }
}

pub fn attribute_map(pairs: Vec<(String, String)>) -> AttributeMap {
    pairs.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assignments() {
        assert_eq!(
            parse_attribute("givenName=Mary Ann"),
            Ok(("givenName".to_string(), "Mary Ann".to_string()))
        );
        assert_eq!(
            parse_attribute("sn="),
            Ok(("sn".to_string(), String::new()))
        );
        assert!(parse_attribute("novalue").is_err());
        assert!(parse_attribute("=x").is_err());
    }

    #[test]
    fn later_assignments_win() {
        let map = attribute_map(vec![
            ("sn".into(), "Major".into()),
            ("sn".into(), "Minor".into()),
        ]);
        assert_eq!(map.get("sn").map(String::as_str), Some("Minor"));
    }
}
