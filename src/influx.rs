// influx.rs
//
// InfluxDB v2 writer, points are sent as line protocol.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::*;

const INFLUX_SERVICE: &str = "influxdb";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub field: String,
    pub value: f64,
    pub timestamp: i64,
}

impl Point {
    pub fn new(measurement: &str, value: f64) -> Self {
        Point {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            field: "value".into(),
            value,
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn tag(mut self, key: &str, value: &str) -> Self {
        if !key.is_empty() && !value.is_empty() {
            self.tags.insert(key.into(), value.into());
        }
        self
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn from_measurement(measurement: &str, m: &Measurement) -> Self {
        Point::new(measurement, m.value)
            .tag("sensor", &m.sensor)
            .tag("kind", &m.kind.to_string())
            .tag("unit", &m.unit)
            .at(m.timestamp)
    }

    /// `measurement,tag=v field=1.5 1700000000`
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape(&self.measurement);
        for (k, v) in &self.tags {
            line.push(',');
            line.push_str(&escape(k));
            line.push('=');
            line.push_str(&escape(v));
        }
        line.push(' ');
        line.push_str(&escape(&self.field));
        line.push('=');
        line.push_str(&self.value.to_string());
        line.push(' ');
        line.push_str(&self.timestamp.to_string());
        line
    }
}

/// Backslash-escape line protocol delimiters. Line breaks are dropped,
/// one point is always one line.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' | '\r' => continue,
            ',' | '=' | ' ' | '\\' => out.push('\\'),
            _ => {}
        }
        out.push(c);
    }
    out
}

pub fn encode_lines(points: &[Point]) -> String {
    points
        .iter()
        .map(Point::to_line_protocol)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Destination for points.
#[async_trait]
pub trait PointWriter: Send + Sync {
    async fn write(&self, points: &[Point]) -> SensorResult<()>;
}

#[derive(Serialize)]
struct WriteQuery<'a> {
    org: &'a str,
    bucket: &'a str,
    precision: &'a str,
}

enum WriteFailure {
    /// Transport error, 5xx or 429. Worth sending again later.
    Retry(SensorError),
    /// The server refused the data itself.
    Rejected(SensorError),
}

pub struct InfluxWriter {
    client: surf::Client,
    write_url: surf::Url,
    org: String,
    bucket: String,
    token: String,
    spool: Option<Spool>,
    spool_max: usize,
}

impl InfluxWriter {
    pub fn new(cfg: &InfluxSection) -> SensorResult<Self> {
        if cfg.bucket.is_empty() {
            return Err(SensorError::MissingAttribute(format!(
                "'bucket' in section '{SECTION_INFLUXDB}'"
            )));
        }
        let url = format!("{}/api/v2/write", cfg.url.trim_end_matches('/'));
        let write_url = surf::Url::parse(&url)
            .map_err(|e| SensorError::InvalidAttribute(format!("InfluxDB url {url:?}: {e}")))?;
        if cfg.token.is_empty() {
            warn!("No InfluxDB token configured, writes will be unauthenticated.");
        }

        Ok(InfluxWriter {
            client: surf::Client::new(),
            write_url,
            org: cfg.org.clone(),
            bucket: cfg.bucket.clone(),
            token: cfg.token.clone(),
            spool: cfg.spool.as_ref().map(|p| Spool::new(expand_home(p))),
            spool_max: cfg.spool_max.max(1),
        })
    }

    fn conn_error(&self, msg: String) -> SensorError {
        SensorError::SensorConnection {
            sensor: INFLUX_SERVICE.into(),
            errors: vec![msg],
        }
    }

    async fn post(&self, body: String) -> Result<(), WriteFailure> {
        let query = WriteQuery {
            org: &self.org,
            bucket: &self.bucket,
            precision: "s",
        };
        let mut req = self
            .client
            .post(self.write_url.as_str())
            .query(&query)
            .map_err(|e| WriteFailure::Rejected(self.conn_error(e.to_string())))?
            .header("Content-Type", "text/plain; charset=utf-8")
            .body_string(body);
        if !self.token.is_empty() {
            req = req.header("Authorization", format!("Token {}", self.token));
        }

        let mut res = req
            .await
            .map_err(|e| WriteFailure::Retry(self.conn_error(e.to_string())))?;
        let status = res.status();
        if status.is_success() {
            return Ok(());
        }

        let body = res.body_string().await.unwrap_or_default();
        let err = self.conn_error(format!("HTTP {status}: {}", body.trim()));
        if status.is_server_error() || status == surf::StatusCode::TooManyRequests {
            Err(WriteFailure::Retry(err))
        } else {
            Err(WriteFailure::Rejected(err))
        }
    }

    /// Keep at most `spool_max` points, newest last.
    async fn spool_batch(&self, spool: &Spool, mut batch: Vec<Point>) {
        let excess = batch.len().saturating_sub(self.spool_max);
        if excess > 0 {
            warn!("InfluxDB: spool full, dropping {excess} oldest points");
            batch.drain(..excess);
        }
        match spool.store(&batch).await {
            Ok(()) => warn!("InfluxDB: {} points spooled", batch.len()),
            Err(e) => error!("Cannot write spool: {e:#}"),
        }
    }
}

#[async_trait]
impl PointWriter for InfluxWriter {
    async fn write(&self, points: &[Point]) -> SensorResult<()> {
        let mut batch = match &self.spool {
            Some(spool) => spool.load().await,
            None => Vec::new(),
        };
        let spooled = batch.len();
        batch.extend_from_slice(points);
        if batch.is_empty() {
            return Ok(());
        }

        match self.post(encode_lines(&batch)).await {
            Ok(()) => {
                debug!("InfluxDB: wrote {} points", batch.len());
                if let (Some(spool), true) = (&self.spool, spooled > 0) {
                    info!("InfluxDB: flushed {spooled} spooled points");
                    if let Err(e) = spool.clear().await {
                        error!("Cannot clear spool: {e:#}");
                    }
                }
                Ok(())
            }
            Err(WriteFailure::Retry(e)) => {
                error!("InfluxDB write failed: {e}");
                if let Some(spool) = &self.spool {
                    self.spool_batch(spool, batch).await;
                }
                Err(e)
            }
            Err(WriteFailure::Rejected(e)) => {
                error!("InfluxDB rejected {} points, dropped: {e}", batch.len());
                debug!("Rejected batch:\n{}", encode_lines(&batch));
                if let (Some(spool), true) = (&self.spool, spooled > 0) {
                    if let Err(e) = spool.clear().await {
                        error!("Cannot clear spool: {e:#}");
                    }
                }
                Err(e)
            }
        }
    }
}


// EOF
