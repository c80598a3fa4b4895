// Sneaker-data provider - bridges SneaksClient with the SneakerProvider trait
use async_trait::async_trait;
use sneakervault_api::SneaksClient;
use std::time::Duration;

use crate::{
    models::{Sneaker, SneakerDetail},
    providers::SneakerProvider,
    Result,
};

pub struct SneaksProvider {
    client: SneaksClient,
}

impl SneaksProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = SneaksClient::with_timeout(base_url, timeout)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SneakerProvider for SneaksProvider {
    async fn search(&self, query: &str) -> Result<Vec<Sneaker>> {
        Ok(self.client.search(query).await?)
    }

    async fn get_sneaker(&self, style_id: &str) -> Result<SneakerDetail> {
        Ok(self.client.get_sneaker(style_id).await?)
    }
}
