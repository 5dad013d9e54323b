use std::time::Duration;

use mongodb::{Client, Database, bson::doc};
use tokio::time::sleep;
use tracing::{info, warn};

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

const FIRST_PING_BACKOFF: Duration = Duration::from_millis(250);
const MAX_PING_BACKOFF: Duration = Duration::from_secs(5);

/// Build a client for `config` and wait until the deployment answers a ping.
pub async fn establish_connection(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut backoff = FIRST_PING_BACKOFF;
    for attempt in 1..=config.connect_attempts {
        let err = match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => {
                if attempt > 1 {
                    info!(attempt, database = %config.database_name, "MongoDB reachable after retry");
                }
                return Ok((client, database));
            }
            Err(err) => err,
        };

        if attempt == config.connect_attempts {
            return Err(MongoDaoError::InitialPing {
                attempts: attempt,
                source: err,
            });
        }
        warn!(
            attempt,
            wait_ms = backoff.as_millis(),
            error = %err,
            "MongoDB ping failed; retrying"
        );
        sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_PING_BACKOFF);
    }

    Err(MongoDaoError::NoConnectAttempts)
}
