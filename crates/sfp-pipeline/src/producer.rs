//! Event Producer
//!
//! Synthesizes sale-line events in increasing timestamp order and sends
//! them to the Kafka topic at a controlled pace. Each send is fire and
//! forget: a delivery failure is logged and the next event is produced
//! anyway. Ordering within a partition comes from the channel, not from
//! this side.

use chrono::{Duration as ChronoDuration, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use serde_json::{json, Value};
use sfp_common::config::{KafkaConfig, ProducerConfig};
use sfp_common::types::{SaleLineEvent, INVOICE_DATE_FORMAT};
use sfp_common::{PipelineError, Result};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Origin timestamp of the synthetic stream.
const STREAM_START: &str = "09/12/2011 00:00";

/// Minutes between consecutive synthetic invoices.
const MINUTES_PER_EVENT: i64 = 3;

/// First synthetic invoice number.
const FIRST_INVOICE_NO: u64 = 600_000;

/// Description pool; the null entry simulates sale lines without one.
const DESCRIPTIONS: [Option<&str>; 6] = [
    Some("WHITE HANGING HEART T-LIGHT HOLDER"),
    Some("WHITE METAL LANTERN"),
    Some("CREAM CUPID HEARTS COAT HANGER"),
    Some("RED POLKA DOT BOWL"),
    Some("GLASS STAR FROSTED T-LIGHT HOLDER"),
    None,
];

const COUNTRIES: [&str; 6] = [
    "United Kingdom",
    "Germany",
    "France",
    "Australia",
    "Spain",
    "Norway",
];

/// Deterministic-shape synthetic event source: invoice numbers and
/// timestamps increase monotonically, everything else is randomized from
/// fixed pools.
pub struct EventGenerator {
    next_index: u64,
    start: NaiveDateTime,
    stock_codes: Vec<String>,
    customers: Vec<String>,
    rng: StdRng,
}

impl EventGenerator {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Seeded constructor for reproducible tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(mut rng: StdRng) -> Self {
        let stock_codes = (0..50)
            .map(|_| rng.gen_range(10_000..=99_999).to_string())
            .collect();
        let customers = (0..10)
            .map(|_| rng.gen_range(12_345..=54_321).to_string())
            .collect();
        Self {
            next_index: 0,
            // The format constant is valid for this literal by construction.
            start: NaiveDateTime::parse_from_str(STREAM_START, INVOICE_DATE_FORMAT)
                .unwrap_or_default(),
            stock_codes,
            customers,
            rng,
        }
    }

    /// Produce the next event, three minutes after the previous one.
    pub fn next_event(&mut self) -> SaleLineEvent {
        let index = self.next_index;
        self.next_index += 1;

        let invoice_time = self.start + ChronoDuration::minutes(MINUTES_PER_EVENT * index as i64);
        let description = match DESCRIPTIONS[self.rng.gen_range(0..DESCRIPTIONS.len())] {
            Some(text) => Value::String(text.to_string()),
            None => Value::Null,
        };
        let stock_code = self.stock_codes[self.rng.gen_range(0..self.stock_codes.len())].clone();
        let customer_id = self.customers[self.rng.gen_range(0..self.customers.len())].clone();
        let country = COUNTRIES[self.rng.gen_range(0..COUNTRIES.len())];
        let unit_price = (self.rng.gen_range(1.0..20.0_f64) * 100.0).round() / 100.0;

        SaleLineEvent {
            invoice_no: Some(json!(FIRST_INVOICE_NO + index)),
            stock_code: Some(json!(stock_code)),
            description: Some(description),
            quantity: Some(json!(self.rng.gen_range(1..=10))),
            invoice_date: Some(json!(invoice_time.format(INVOICE_DATE_FORMAT).to_string())),
            unit_price: Some(json!(unit_price)),
            customer_id: Some(json!(customer_id)),
            country: Some(json!(country)),
        }
    }
}

impl Default for EventGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Produces synthetic sale-line events onto the configured topic.
pub struct SalesProducer {
    producer: FutureProducer,
    kafka: KafkaConfig,
    settings: ProducerConfig,
}

impl SalesProducer {
    pub fn new(kafka: KafkaConfig, settings: ProducerConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &kafka.brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| PipelineError::Transport(e.to_string()))?;

        Ok(Self {
            producer,
            kafka,
            settings,
        })
    }

    /// Emit the configured number of events, pausing between sends.
    pub async fn run(self) -> Result<()> {
        info!(
            topic = %self.kafka.topic,
            events = self.settings.event_count,
            "Producer started"
        );

        let mut generator = EventGenerator::new();
        let pause = Duration::from_millis(self.settings.send_interval_ms);
        let mut sent: u64 = 0;

        for _ in 0..self.settings.event_count {
            let event = generator.next_event();
            let payload = serde_json::to_string(&event)?;

            let record = FutureRecord::<(), String>::to(&self.kafka.topic).payload(&payload);
            match self.producer.send(record, Duration::from_secs(5)).await {
                Ok((partition, offset)) => {
                    sent += 1;
                    debug!(partition, offset, "Produced event");
                }
                Err((e, _)) => {
                    // Independent failures: log and keep producing.
                    warn!(error = %e, "Failed to send event; continuing");
                }
            }

            tokio::time::sleep(pause).await;
        }

        info!(sent, "Producer finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::cast_event;

    #[test]
    fn test_events_have_increasing_timestamps() {
        let mut generator = EventGenerator::with_seed(7);
        let first = cast_event(&generator.next_event()).unwrap();
        let second = cast_event(&generator.next_event()).unwrap();

        assert!(second.invoice_date > first.invoice_date);
        assert_eq!(
            second.invoice_date - first.invoice_date,
            ChronoDuration::minutes(MINUTES_PER_EVENT)
        );
    }

    #[test]
    fn test_events_cast_cleanly() {
        let mut generator = EventGenerator::with_seed(42);
        for _ in 0..100 {
            let event = generator.next_event();
            let record = cast_event(&event).expect("synthetic event must cast");
            assert!(record.quantity >= 1 && record.quantity <= 10);
            assert!(record.unit_price >= 1.0 && record.unit_price <= 20.0);
        }
    }

    #[test]
    fn test_invoice_numbers_are_sequential() {
        let mut generator = EventGenerator::with_seed(1);
        let first = generator.next_event();
        let second = generator.next_event();
        assert_eq!(first.invoice_no, Some(json!(600_000)));
        assert_eq!(second.invoice_no, Some(json!(600_001)));
    }

    #[test]
    fn test_events_round_trip_through_json() {
        let mut generator = EventGenerator::with_seed(3);
        let event = generator.next_event();
        let payload = serde_json::to_string(&event).unwrap();
        let decoded: SaleLineEvent = serde_json::from_str(&payload).unwrap();
        assert_eq!(decoded.invoice_no, event.invoice_no);
        assert_eq!(decoded.invoice_date, event.invoice_date);
    }
}
