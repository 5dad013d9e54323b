use std::env;

use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DB: &str = "picks_ledger";
const APP_NAME: &str = "picks-ledger-back";
const DEFAULT_CONNECT_ATTEMPTS: u32 = 10;

/// Connection settings for the MongoDB backend.
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed client options.
    pub options: ClientOptions,
    /// Database holding every collection.
    pub database_name: String,
    /// Pings tried before a connection attempt is reported as failed.
    pub connect_attempts: u32,
}

impl MongoConfig {
    /// Parse `uri`, tagging the client with the service name unless the URI names one.
    pub async fn from_uri(uri: &str, database_name: Option<&str>) -> MongoResult<Self> {
        let mut options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;
        options.app_name.get_or_insert_with(|| APP_NAME.to_owned());

        Ok(Self {
            options,
            database_name: database_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(DEFAULT_DB)
                .to_owned(),
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
        })
    }

    /// `MONGO_URI` is required; `MONGO_DB` and `MONGO_CONNECT_ATTEMPTS` are optional.
    pub async fn from_env() -> MongoResult<Self> {
        let uri =
            env::var("MONGO_URI").map_err(|_| MongoDaoError::MissingEnvVar { var: "MONGO_URI" })?;
        let database_name = env::var("MONGO_DB").ok();
        let mut config = Self::from_uri(&uri, database_name.as_deref()).await?;

        if let Some(attempts) = env::var("MONGO_CONNECT_ATTEMPTS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|attempts| *attempts > 0)
        {
            config.connect_attempts = attempts;
        }
        Ok(config)
    }
}
