use crate::utils::config::MongoConfig;
use log::{error, info};
use mongodb::bson::doc;
use mongodb::{Client, options::ClientOptions};
use std::error::Error;

pub struct Database {
    pub client: Client,
}

impl Database {
    pub async fn init(config: &MongoConfig) -> Result<Self, Box<dyn Error>> {
        let mut client_options = ClientOptions::parse(&config.uri).await?;
        client_options.app_name = Some(config.app_name.clone());
        if let Some(size) = config.max_pool_size {
            client_options.max_pool_size = Some(size);
        }

        let client = Client::with_options(client_options)?;

        // Ping the server to see if you can connect to the cluster
        client
            .database(&config.database)
            .run_command(doc! {"ping": 1})
            .await?;

        info!("Connected successfully to MongoDB database '{}'", config.database);

        Ok(Self { client })
    }
}

// This function is a convenience wrapper around Database::init()
pub async fn connect_to_mongo(config: &MongoConfig) -> Result<Client, Box<dyn Error>> {
    let database = Database::init(config).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        e
    })?;
    Ok(database.client)
}
