use std::sync::Arc;

use common_kafka::kafka_consumer::{RecvErr, SingleTopicConsumer};
use common_metrics::{serve, setup_metrics_routes};
use splunk_forwarder::{
    api,
    app_context::AppContext,
    config::Config,
    forwarder::{claimed_by_connector, process_event, report_outcome, Disposition},
    metrics_consts::{
        EMPTY_PAYLOADS, MESSAGES_RECEIVED, OUTCOMES_PRODUCED, OUTCOME_PRODUCE_FAILURES,
        SKIPPED_CONNECTOR_MESSAGES,
    },
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

common_alloc::used!();

fn setup_tracing() {
    let log_layer: tracing_subscriber::filter::Filtered<
        tracing_subscriber::fmt::Layer<tracing_subscriber::Registry>,
        EnvFilter,
        tracing_subscriber::Registry,
    > = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();
}

fn start_server(config: &Config, context: Arc<AppContext>) -> JoinHandle<()> {
    let bind = format!("{}:{}", config.host, config.port);
    let router = setup_metrics_routes(api::router(context));
    tokio::task::spawn(async move {
        serve(router, &bind)
            .await
            .expect("failed to start serving metrics");
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_tracing();
    info!("Starting up...");

    let config = Config::init_with_defaults()?;

    let consumer = SingleTopicConsumer::new(config.kafka.clone(), config.consumer.clone())?;

    let context = Arc::new(AppContext::new(config.clone()).await?);

    info!(
        "Subscribed to topic: {}",
        config.consumer.kafka_consumer_topic
    );

    start_server(&config, context.clone());

    loop {
        context.worker_liveness.report_healthy().await;

        let (message, offset) = match consumer.recv().await {
            Ok(r) => r,
            Err(RecvErr::Empty) => {
                warn!("Received empty payload");
                metrics::counter!(EMPTY_PAYLOADS).increment(1);
                continue;
            }
            Err(RecvErr::Kafka(e)) => {
                panic!("Kafka error: {:?}", e); // We just panic if we fail to recv from kafka, if it's down, we're down
            }
        };

        metrics::counter!(MESSAGES_RECEIVED).increment(1);

        if claimed_by_connector(&message.headers) {
            info!("Kafka message ignored because it is marked to be processed by the connector");
            metrics::counter!(SKIPPED_CONNECTOR_MESSAGES).increment(1);
            offset.store().expect("Failed to store offset");
            continue;
        }

        if config.log_inbound_payloads {
            debug!("Received {}", String::from_utf8_lossy(&message.payload));
        }

        match process_event(&context, &message.payload, Some(&config.accepted_event_type)).await {
            Disposition::Completed(history) => match report_outcome(&context, &history).await {
                Ok(()) => {
                    metrics::counter!(OUTCOMES_PRODUCED).increment(1);
                }
                Err(e) => {
                    error!("Failed to report outcome: {}", e);
                    metrics::counter!(OUTCOME_PRODUCE_FAILURES).increment(1);
                }
            },
            Disposition::Rejected(err) => {
                error!("Dropping event: {}", err);
            }
            Disposition::Skipped | Disposition::NoEvents => {}
        }

        // Panicking on offset store failure, same reasoning as the panic above - if kafka's down, we're down
        debug!("Handled message at offset {}", offset.get_value());
        offset.store().expect("Failed to store offset");
    }
}
