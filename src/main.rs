use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rabbit_session::env::Config;
use rabbit_session::rabbitmq::{RabbitSession, ReadOutcome, TimeoutBudget};

// Publishes one message, reads it back, acks it and tears everything down again.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load()?;
    let queue = config.queue.as_str();

    let mut session = RabbitSession::lapin(config.session.clone())?;
    session.connect(&config.amqp_addr).await?;
    session.create_queue(queue).await?;
    session.publish(queue, b"hello").await?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    match session.read_message(queue, TimeoutBudget::Slices(5), &cancel).await? {
        ReadOutcome::Delivered(delivery) => {
            info!(
                delivery_tag = delivery.delivery_tag.value(),
                "Received '{}'",
                delivery.body_text()
            );
            session.ack(delivery.delivery_tag).await?;
        }
        ReadOutcome::TimedOut => warn!(queue, "Nothing arrived"),
        ReadOutcome::Cancelled => warn!(queue, "Interrupted"),
    }

    session.destroy_queue(queue).await?;
    session.close().await?;
    Ok(())
}
