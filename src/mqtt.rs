// mqtt.rs

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::task::JoinHandle;

use crate::*;

pub const DEFAULT_MQTT_PORT: u16 = 1883;

const RECONNECT_DELAY: u64 = 10;
const MIN_KEEP_ALIVE: u64 = 5;
const CLOSE_TIMEOUT: u64 = 5;
const REQUEST_CAP: usize = 10;

/// Keep a publish delay within `MIN_DELAY..=MAX_DELAY` seconds.
pub fn clamp_delay(delay: u64) -> u64 {
    delay.clamp(MIN_DELAY, MAX_DELAY)
}

/// Split `mqtt://host[:port]` into host and port.
pub fn broker_addr(url: &str) -> SensorResult<(String, u16)> {
    let rest = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .ok_or_else(|| {
            SensorError::InvalidAttribute(format!("MQTT url {url:?} must start with mqtt://"))
        })?
        .trim_end_matches('/');

    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|e| {
                SensorError::InvalidAttribute(format!("MQTT url {url:?} has a bad port: {e}"))
            })?;
            (host, port)
        }
        None => (rest, DEFAULT_MQTT_PORT),
    };
    if host.is_empty() {
        return Err(SensorError::InvalidAttribute(format!("MQTT url {url:?} has no host")));
    }
    Ok((host.to_string(), port))
}

fn mqtt_options(cfg: &MqttSection, id_suffix: &str) -> SensorResult<MqttOptions> {
    let (host, port) = broker_addr(&cfg.url)?;
    let mut opts = MqttOptions::new(format!("{}{id_suffix}", cfg.client_id), host, port);
    opts.set_keep_alive(Duration::from_secs(cfg.keep_alive.max(MIN_KEEP_ALIVE)));
    Ok(opts)
}

/// Where measurements get published.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> anyhow::Result<()>;
}

/// `rumqttc` client with its event loop running in a background task.
pub struct MqttSink {
    client: AsyncClient,
    task: JoinHandle<()>,
}

impl MqttSink {
    pub fn connect(cfg: &MqttSection) -> SensorResult<Self> {
        let opts = mqtt_options(cfg, "")?;
        info!("MQTT connecting to {}...", cfg.url);
        let (client, conn) = AsyncClient::new(opts, REQUEST_CAP);
        let task = tokio::spawn(event_loop(conn));
        Ok(MqttSink { client, task })
    }

    /// Disconnect after queued messages are sent.
    pub async fn close(self) {
        if let Err(e) = self.client.try_disconnect() {
            error!("MQTT disconnect error: {e}");
            self.task.abort();
            return;
        }
        let mut task = self.task;
        if tokio::time::timeout(Duration::from_secs(CLOSE_TIMEOUT), &mut task)
            .await
            .is_err()
        {
            warn!("MQTT event loop did not finish in time.");
            task.abort();
        }
    }
}

#[async_trait]
impl MessageSink for MqttSink {
    /// Queue a message for the event loop. Fails right away when the
    /// queue is full, e.g. while the broker is unreachable.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> anyhow::Result<()> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload)?;
        Ok(())
    }
}

async fn event_loop(mut conn: EventLoop) {
    loop {
        match conn.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => info!("MQTT connected."),
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                info!("MQTT disconnected.");
                break;
            }
            Ok(ev) => trace!("MQTT event: {ev:?}"),
            Err(e) => {
                error!("MQTT connection error: {e}");
                sleep(Duration::from_secs(RECONNECT_DELAY)).await;
            }
        }
    }
}

async fn publish_measurements(
    sink: &dyn MessageSink,
    sensors: &Sensors,
    base_topic: &str,
    measurements: &[Measurement],
) -> u64 {
    let mut published = 0;
    for m in measurements {
        let topic = sensors.topic_for(m.kind.section(), base_topic);
        let payload = match serde_json::to_vec(m) {
            Ok(p) => p,
            Err(e) => {
                error!("Cannot encode {m:?}: {e}");
                continue;
            }
        };
        match sink.publish(&topic, payload).await {
            Ok(()) => {
                info!("MQTT published {topic}: {} {}", m.value, m.unit);
                published += 1;
            }
            Err(e) => error!("MQTT send error: {e}"),
        }
    }
    published
}

/// The smart sensor loop: collect, publish, wait. `iter_max == 0` runs
/// forever. Returns the number of messages published.
pub async fn publish_data(
    sink: &dyn MessageSink,
    sensors: &Sensors,
    names: &[String],
    base_topic: &str,
    delay: u64,
    iter_max: u64,
    retry: RetryPolicy,
) -> anyhow::Result<u64> {
    let delay = Duration::from_secs(clamp_delay(delay));
    let mut cntr: u64 = 0;
    let mut published: u64 = 0;

    loop {
        if iter_max > 0 {
            cntr += 1;
        }

        let measurements = sensors
            .collect_data(Some(names), retry)
            .await?
            .iter()
            .filter_map(|r| {
                if !r.is_ok() {
                    warn!("Skipping {r}");
                }
                r.measurement()
            })
            .collect::<Vec<_>>();
        published += publish_measurements(sink, sensors, base_topic, &measurements).await;

        if iter_max > 0 && cntr >= iter_max {
            break;
        }
        sleep(delay).await;
    }
    Ok(published)
}

/// Publish the polled values from the shared state whenever they change.
pub async fn run_mqtt(state: Arc<MyState>) -> anyhow::Result<()> {
    if !state.config.mqtt.enable {
        info!("MQTT is disabled.");
        // we cannot return, otherwise tokio::select in main() will exit
        loop {
            sleep(Duration::from_secs(3600)).await;
        }
    }

    let sink = MqttSink::connect(&state.config.mqtt)?;
    data_sender(state, &sink).await
}

async fn data_sender(state: Arc<MyState>, sink: &dyn MessageSink) -> anyhow::Result<()> {
    let delay = Duration::from_secs(clamp_delay(state.config.mqtt.delay));
    let topic = state.config.mqtt.topic.clone();

    loop {
        sleep(delay).await;
        {
            let mut updated = state.data_updated.write().await;
            if !*updated {
                continue;
            }
            // cleared before reading, a poll landing in between is sent next round
            *updated = false;
        }
        let measurements = state.data.read().await.measurements.clone();
        publish_measurements(sink, &state.sensors, &topic, &measurements).await;
    }
}

/// Turn an MQTT message into a point. Payloads are either a JSON
/// measurement or a bare number.
pub fn message_to_point(topic: &str, payload: &[u8], measurement: &str) -> Option<Point> {
    let text = match std::str::from_utf8(payload) {
        Ok(t) => t.trim(),
        Err(_) => {
            warn!("MQTT {topic}: payload is not utf-8, dropped");
            return None;
        }
    };

    if let Ok(m) = serde_json::from_str::<Measurement>(text) {
        return Some(Point::from_measurement(measurement, &m).tag("topic", topic));
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(Point::new(measurement, v).tag("topic", topic)),
        _ => {
            warn!("MQTT {topic}: cannot use payload {text:?}, dropped");
            None
        }
    }
}

/// Subscribe to `<topic>/#` and forward everything to `writer`.
pub async fn consume(
    cfg: &MqttSection,
    measurement: &str,
    writer: &dyn PointWriter,
) -> anyhow::Result<()> {
    let opts = mqtt_options(cfg, "-consumer")?;
    let (client, mut conn) = AsyncClient::new(opts, REQUEST_CAP);
    let filter = format!("{}/#", cfg.topic);
    info!("MQTT consumer connecting to {}...", cfg.url);

    loop {
        match conn.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("MQTT connected, subscribing to {filter}");
                if let Err(e) = client.try_subscribe(filter.as_str(), QoS::AtLeastOnce) {
                    error!("MQTT subscribe error: {e}");
                }
            }
            Ok(Event::Incoming(Packet::Publish(p))) => {
                debug!("MQTT received {}: {:?}", p.topic, p.payload);
                if let Some(point) = message_to_point(&p.topic, &p.payload, measurement) {
                    if let Err(e) = writer.write(&[point]).await {
                        error!("Cannot store message from {}: {e}", p.topic);
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT connection error: {e}");
                sleep(Duration::from_secs(RECONNECT_DELAY)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockSink {
        sent: Mutex<Vec<(String, Vec<u8>)>>,
        fail: bool,
    }

    #[async_trait]
    impl MessageSink for MockSink {
        async fn publish(&self, topic: &str, payload: Vec<u8>) -> anyhow::Result<()> {
            if self.fail {
                bail!("broker unavailable");
            }
            self.sent.lock().unwrap().push((topic.to_string(), payload));
            Ok(())
        }
    }

    fn hub() -> Sensors {
        let cfg = MyConfig::from_toml_str(
            "[f451_temperature]\nmin = 12\nmax = 12\n[f451_rain]\nmin = 1\nmax = 1\nmqtt_topic = \"garden/rain\"\n",
        )
        .unwrap();
        Sensors::new(&cfg).unwrap()
    }

    #[test]
    fn test_broker_addr() {
        assert_eq!(
            broker_addr("mqtt://mqtt.local:1884").unwrap(),
            ("mqtt.local".to_string(), 1884)
        );
        assert_eq!(
            broker_addr("mqtt://mqtt.eclipseprojects.io/").unwrap(),
            ("mqtt.eclipseprojects.io".to_string(), DEFAULT_MQTT_PORT)
        );
        assert!(broker_addr("http://mqtt.local").is_err());
        assert!(broker_addr("mqtt://mqtt.local:99999").is_err());
        assert!(broker_addr("mqtt://:1883").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_broker() {
        let cfg = MqttSection {
            url: "mqtt://127.0.0.1:1".into(),
            ..Default::default()
        };
        let sink = MqttSink::connect(&cfg).unwrap();
        let s = hub();
        let names = s.process_sensor_list(&s.valid_sensors(), true);

        // two messages per round, more than the request queue holds
        let published = tokio::time::timeout(
            Duration::from_secs(60),
            publish_data(&sink, &s, &names, "f451", 1, 8, RetryPolicy::new(1, 0)),
        )
        .await
        .expect("publish_data must not block on a full queue")
        .unwrap();
        assert!(published <= REQUEST_CAP as u64);

        tokio::time::timeout(Duration::from_secs(60), sink.close())
            .await
            .expect("close must not block on a full queue");
    }

    #[tokio::test(start_paused = true)]
    async fn test_data_sender_once_per_update() {
        let cfg = MyConfig::from_toml_str("[f451_temperature]\n[f451_mqtt]\ntopic = \"home\"\n").unwrap();
        let state = Arc::new(MyState::new(cfg).unwrap());
        state.data.write().await.measurements =
            vec![Measurement::new("chameleon", SensorKind::Temperature, 20.0, "C")];
        *state.data_updated.write().await = true;

        let sink = MockSink::default();
        let delay = clamp_delay(state.config.mqtt.delay);
        let _ = tokio::time::timeout(
            Duration::from_secs(delay * 5 + 1),
            data_sender(state.clone(), &sink),
        )
        .await;

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "home/temp");
        assert!(!*state.data_updated.read().await);
    }

    #[test]
    fn test_clamp_delay() {
        assert_eq!(clamp_delay(0), MIN_DELAY);
        assert_eq!(clamp_delay(30), 30);
        assert_eq!(clamp_delay(100_000), MAX_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_rounds() {
        let s = hub();
        let sink = MockSink::default();
        let names = s.process_sensor_list(&s.valid_sensors(), true);

        let n = publish_data(&sink, &s, &names, "f451", 0, 3, RetryPolicy::new(1, 0))
            .await
            .unwrap();
        assert_eq!(n, 6);

        let sent = sink.sent.lock().unwrap();
        let topics: Vec<&str> = sent.iter().take(2).map(|(t, _)| t.as_str()).collect();
        assert_eq!(topics, vec!["f451/temp", "garden/rain"]);

        let m: Measurement = serde_json::from_slice(&sent[0].1).unwrap();
        assert_eq!(m.kind, SensorKind::Temperature);
        assert_eq!(m.value, 12.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_errors_are_skipped() {
        let s = hub();
        let sink = MockSink {
            fail: true,
            ..Default::default()
        };
        let names = vec![SENSOR_TEMP.to_string()];
        let n = publish_data(&sink, &s, &names, "f451", 1, 2, RetryPolicy::new(1, 0))
            .await
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_publish_invalid_sensor() {
        let s = hub();
        let sink = MockSink::default();
        let names = vec![SENSOR_WIND.to_string()];
        assert!(publish_data(&sink, &s, &names, "f451", 1, 1, RetryPolicy::default())
            .await
            .is_err());
    }

    #[test]
    fn test_message_to_point() {
        let mut m = Measurement::new("chameleon", SensorKind::Humidity, 55.0, "%");
        m.timestamp = 7;
        let payload = serde_json::to_vec(&m).unwrap();
        let p = message_to_point("f451/humid", &payload, "f451").unwrap();
        assert_eq!(p.value, 55.0);
        assert_eq!(p.timestamp, 7);
        assert_eq!(p.tags["kind"], "humidity");
        assert_eq!(p.tags["topic"], "f451/humid");

        let p = message_to_point("temperature", b" 23\n", "f451").unwrap();
        assert_eq!(p.value, 23.0);
        assert_eq!(p.tags["topic"], "temperature");
        assert!(!p.tags.contains_key("sensor"));

        assert!(message_to_point("temperature", b"hot", "f451").is_none());
        assert!(message_to_point("temperature", b"NaN", "f451").is_none());
        assert!(message_to_point("temperature", &[0xff, 0xfe], "f451").is_none());
    }
}

// EOF
