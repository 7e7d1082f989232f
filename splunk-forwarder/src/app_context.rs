use std::time::Duration;

use common_kafka::kafka_producer::{create_kafka_producer, KafkaContext};
use health::{HealthHandle, HealthRegistry};
use rdkafka::producer::FutureProducer;

use crate::config::Config;
use crate::error::SetupError;
use crate::hec::HecClient;

pub struct AppContext {
    pub config: Config,
    pub liveness: HealthRegistry,
    pub worker_liveness: HealthHandle,
    pub kafka_producer: FutureProducer<KafkaContext>,
    pub hec: HecClient,
}

impl AppContext {
    pub async fn new(config: Config) -> Result<Self, SetupError> {
        let liveness = HealthRegistry::new("liveness");
        let worker_liveness = liveness
            .register("worker", time::Duration::seconds(60))
            .await;
        let producer_liveness = liveness
            .register("rdkafka", time::Duration::seconds(30))
            .await;

        let kafka_producer = create_kafka_producer(&config.kafka, producer_liveness).await?;
        let hec = HecClient::new(Duration::from_millis(config.request_timeout_ms))?;

        Ok(Self {
            config,
            liveness,
            worker_liveness,
            kafka_producer,
            hec,
        })
    }
}
