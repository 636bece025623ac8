// src/sink/mongo.rs
use anyhow::{Context, Result};
use mongodb::bson::Document;
use mongodb::Client;

use super::ObservationSink;
use crate::city::City;
use crate::observation::Observation;

/// One document per observation, one collection per city.
/// Every call opens and closes its own client.
#[derive(Clone)]
pub struct MongoSink {
    uri: String,
    database: String,
}

impl MongoSink {
    pub fn new(uri: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
        }
    }
}

#[async_trait::async_trait]
impl ObservationSink for MongoSink {
    async fn persist(&self, city: City, obs: &Observation) -> Result<()> {
        let client = Client::with_uri_str(&self.uri)
            .await
            .context("connect to mongo")?;
        let res = client
            .database(&self.database)
            .collection::<Document>(city.collection())
            .insert_one(obs.to_document())
            .await
            .with_context(|| format!("insert into {}.{}", self.database, city.collection()));
        client.shutdown().await;
        let inserted = res?;
        tracing::debug!(target: "sink", %city, id = %inserted.inserted_id, "observation stored");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mongo"
    }
}
