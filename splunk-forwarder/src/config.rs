use common_kafka::config::{ConsumerConfig, KafkaConfig};
use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "::")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3305")]
    pub port: u16,

    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,

    #[envconfig(nested = true)]
    pub consumer: ConsumerConfig,

    // Topic delivery outcomes are reported back on
    #[envconfig(default = "platform.notifications.fromcamel")]
    pub return_topic: String,

    // Envelopes of any other type are left for the other connectors sharing
    // the ingress topic
    #[envconfig(default = "com.redhat.console.notification.toCamel.splunk")]
    pub accepted_event_type: String,

    // `source` stamped on outcome envelopes
    #[envconfig(default = "splunk")]
    pub component_name: String,

    #[envconfig(default = "10000")]
    pub request_timeout_ms: u64,

    // Inbound payloads can carry customer data, so echoing them to the logs
    // is opt-in
    #[envconfig(default = "false")]
    pub log_inbound_payloads: bool,
}

impl Config {
    pub fn init_with_defaults() -> Result<Self, envconfig::Error> {
        ConsumerConfig::set_defaults("splunk-forwarder", "platform.notifications.tocamel", true);
        Self::init_from_env()
    }
}
