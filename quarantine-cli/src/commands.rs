//! Subcommand handlers.

use anyhow::Context;
use quarantine_core::{
    InvocationResponse, LogPublisher, NotificationPublisher, Responder, ResponsePolicy,
    SimulatedCompute, WebhookPublisher,
};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

use crate::Commands;

pub async fn handle_command(command: Commands, config: Option<&Path>) -> anyhow::Result<()> {
    let policy = ResponsePolicy::load(config)?;
    match command {
        Commands::Respond {
            event,
            inventory,
            webhook_url,
        } => {
            let response =
                respond(&policy, &event, inventory.as_deref(), webhook_url.as_deref()).await?;
            println!("{}", serde_json::to_string(&response)?);
            Ok(())
        }
        Commands::Policy => {
            print!("{}", toml::to_string_pretty(&policy)?);
            Ok(())
        }
    }
}

async fn respond(
    policy: &ResponsePolicy,
    event_path: &Path,
    inventory: Option<&Path>,
    webhook_url: Option<&str>,
) -> anyhow::Result<InvocationResponse> {
    let event = read_event(event_path).await?;

    let compute = match inventory {
        Some(path) => SimulatedCompute::from_inventory_file(path)?,
        None => SimulatedCompute::new(),
    };
    let publisher: Arc<dyn NotificationPublisher> = match webhook_url {
        Some(url) => Arc::new(WebhookPublisher::new(url)),
        None => Arc::new(LogPublisher),
    };

    tracing::debug!(
        "Responding with policy: group={:?} target={:?} min_severity={} dry_run={}",
        policy.quarantine_group_id,
        policy.notification_target,
        policy.min_severity,
        policy.dry_run
    );
    let responder = Responder::new(policy.clone(), Arc::new(compute), publisher);
    Ok(responder.handle(&event).await)
}

async fn read_event(path: &Path) -> anyhow::Result<serde_json::Value> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("failed to read event from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read event file {}", path.display()))?
    };
    serde_json::from_str(&content).context("event is not valid JSON")
}
