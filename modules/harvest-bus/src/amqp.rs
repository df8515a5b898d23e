use amqprs::channel::{
    BasicAckArguments, BasicConsumeArguments, BasicPublishArguments, BasicQosArguments, Channel,
    ExchangeDeclareArguments, QueueBindArguments, QueueDeclareArguments,
};
use amqprs::connection::{Connection, OpenConnectionArguments};
use amqprs::consumer::AsyncConsumer;
use amqprs::{BasicProperties, Deliver};
use async_trait::async_trait;
use harvest_common::BrokerConfig;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bus::{MessageBus, QueueBinding};
use crate::delivery::Delivery;
use crate::error::{BusError, Result};

/// Forwards each acked delivery into an mpsc channel for `AmqpBus::recv` to
/// hand to the consumer runtime. Acking happens here, synchronously with
/// receipt, before the body ever reaches application code.
struct ForwardingConsumer {
    tx: mpsc::Sender<Delivery>,
}

#[async_trait]
impl AsyncConsumer for ForwardingConsumer {
    async fn consume(
        &mut self,
        channel: &Channel,
        deliver: Deliver,
        _basic_properties: BasicProperties,
        content: Vec<u8>,
    ) {
        let delivery_tag = deliver.delivery_tag();
        let routing_key = deliver.routing_key().to_string();

        if let Err(e) = channel
            .basic_ack(BasicAckArguments::new(delivery_tag, false))
            .await
        {
            warn!(error = %e, routing_key, "failed to ack delivery");
            return;
        }

        if self
            .tx
            .send(Delivery {
                routing_key,
                body: content,
            })
            .await
            .is_err()
        {
            debug!("delivery receiver dropped, discarding message");
        }
    }
}

/// Real broker-backed [`MessageBus`]. Holds two separate channels: one
/// throttled to a single outstanding delivery (prefetch = 1) for consuming,
/// one unthrottled for publishing — a consumer limited to one in-flight
/// message must never also be asked to publish on the same channel.
pub struct AmqpBus {
    exchange: String,
    #[allow(dead_code)]
    connection: Connection,
    consumer_channel: Channel,
    producer_channel: Channel,
    delivery_rx: tokio::sync::Mutex<mpsc::Receiver<Delivery>>,
    delivery_tx: mpsc::Sender<Delivery>,
}

impl AmqpBus {
    pub async fn connect(config: &BrokerConfig) -> Result<Self> {
        let args = OpenConnectionArguments::new(
            &config.host,
            config.port,
            &config.username,
            &config.password,
        );
        let connection = Connection::open(&args).await.map_err(|e| BusError::Connect {
            host: config.host.clone(),
            port: config.port,
            source: e.into(),
        })?;

        let consumer_channel = connection
            .open_channel(None)
            .await
            .map_err(|e| BusError::Connect {
                host: config.host.clone(),
                port: config.port,
                source: e.into(),
            })?;
        let producer_channel = connection
            .open_channel(None)
            .await
            .map_err(|e| BusError::Connect {
                host: config.host.clone(),
                port: config.port,
                source: e.into(),
            })?;

        consumer_channel
            .basic_qos(BasicQosArguments::new(0, 1, false))
            .await
            .map_err(|e| BusError::Connect {
                host: config.host.clone(),
                port: config.port,
                source: e.into(),
            })?;

        let exchange = config.exchange.clone();
        let exchange_args = ExchangeDeclareArguments::new(&exchange, "topic")
            .durable(true)
            .finish();
        consumer_channel
            .exchange_declare(exchange_args)
            .await
            .map_err(|e| BusError::DeclareExchange {
                exchange: exchange.clone(),
                source: e.into(),
            })?;

        let (delivery_tx, delivery_rx) = mpsc::channel(1);

        info!(host = %config.host, port = config.port, exchange, "connected to message bus");

        Ok(Self {
            exchange,
            connection,
            consumer_channel,
            producer_channel,
            delivery_rx: tokio::sync::Mutex::new(delivery_rx),
            delivery_tx,
        })
    }
}

#[async_trait]
impl MessageBus for AmqpBus {
    async fn declare_queues(&self, bindings: &[QueueBinding]) -> Result<()> {
        for binding in bindings {
            let queue_args = QueueDeclareArguments::new(&binding.queue)
                .durable(true)
                .finish();
            self.consumer_channel
                .queue_declare(queue_args)
                .await
                .map_err(|e| BusError::DeclareQueue {
                    queue: binding.queue.clone(),
                    source: e.into(),
                })?;

            for pattern in &binding.routing_patterns {
                let bind_args =
                    QueueBindArguments::new(&binding.queue, &self.exchange, pattern);
                self.consumer_channel
                    .queue_bind(bind_args)
                    .await
                    .map_err(|e| BusError::DeclareQueue {
                        queue: binding.queue.clone(),
                        source: e.into(),
                    })?;
            }

            let consume_args = BasicConsumeArguments::new(&binding.queue, "")
                .manual_ack(true)
                .finish();
            self.consumer_channel
                .basic_consume(
                    ForwardingConsumer {
                        tx: self.delivery_tx.clone(),
                    },
                    consume_args,
                )
                .await
                .map_err(|e| BusError::DeclareQueue {
                    queue: binding.queue.clone(),
                    source: e.into(),
                })?;
        }
        Ok(())
    }

    async fn publish(&self, routing_key: &str, body: Vec<u8>) -> Result<()> {
        let args = BasicPublishArguments::new(&self.exchange, routing_key);
        self.producer_channel
            .basic_publish(BasicProperties::default(), body, args)
            .await
            .map_err(|e| BusError::Publish {
                routing_key: routing_key.to_string(),
                source: e.into(),
            })
    }

    async fn recv(&self) -> Result<Option<Delivery>> {
        let mut rx = self.delivery_rx.lock().await;
        Ok(rx.recv().await)
    }

    async fn close(&self) -> Result<()> {
        self.consumer_channel
            .close()
            .await
            .map_err(|e| BusError::Other(e.into()))?;
        self.producer_channel
            .close()
            .await
            .map_err(|e| BusError::Other(e.into()))?;
        Ok(())
    }
}
