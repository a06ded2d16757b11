// bin/f451-sensors.rs

use std::{fs::File, path::PathBuf, process, sync::Mutex};

use clap::{CommandFactory, Parser, Subcommand};
use f451_sensors::*;
use tracing_subscriber::EnvFilter;

const RULE_WIDTH: usize = 40;

/// Collect sensor data via the f451 Sensors module.
#[derive(Debug, Parser)]
#[command(
    name = "f451-sensors",
    disable_version_flag = true,
    after_help = "NOTE: Only call a module if the corresponding service is installed"
)]
struct Opts {
    /// Display module version number and exit.
    #[arg(short = 'V', long)]
    version: bool,

    /// Run in debug mode.
    #[arg(short, long)]
    debug: bool,

    /// Sensor(s) to use, `|` separated, or `all`.
    #[arg(long, default_value = SENSOR_ALL)]
    sensor: String,

    /// Path to config file.
    #[arg(long, env = APP_ENV_CONFIG)]
    config: Option<PathBuf>,

    /// Path to secrets file.
    #[arg(long, env = APP_ENV_SECRETS)]
    secrets: Option<PathBuf>,

    /// Path to log file.
    #[arg(long)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Show which sensors are available.
    List,

    /// Collect data once and print the responses as JSON.
    Collect {
        #[arg(long)]
        retries: Option<u32>,
        /// Seconds between retries.
        #[arg(long)]
        wait: Option<u64>,
    },

    /// Collect and publish to MQTT in a loop.
    Publish {
        /// Seconds between rounds (1..3600).
        #[arg(long)]
        delay: Option<u64>,
        /// Number of rounds, 0 runs forever.
        #[arg(long, default_value_t = 0)]
        iterations: u64,
    },

    /// Forward MQTT messages to InfluxDB.
    Consume,

    /// Poll sensors, publish to MQTT and serve the HTTP API.
    Serve,
}

fn main() -> anyhow::Result<()> {
    let argc = std::env::args_os().len();
    let opts = Opts::parse();

    // bare invocation shows help, like -h
    if argc == 1 || (argc == 2 && opts.debug) {
        Opts::command().print_help()?;
        return Ok(());
    }

    if opts.version {
        println!("{}", version_string());
        return Ok(());
    }

    let files = resolve_config_files(opts.config.clone(), opts.secrets.clone(), APP_CONFIG, APP_SECRETS);
    let config = MyConfig::from_files(&files)?;
    init_logging(&opts, &config)?;
    info!("Starting up, config from {files:?}");
    debug!("My config:\n{}", serde_json::to_string_pretty(&config)?);

    let sensors = Sensors::new(&config)?;

    let selected = match select_sensors(&sensors, &opts.sensor) {
        Ok(selected) => selected,
        Err(msg) => {
            println!("{msg}");
            process::exit(1);
        }
    };

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(Box::pin(run(opts.cmd.unwrap_or(Cmd::List), config, sensors, selected)))
}

/// Resolve `--sensor`, `all` picks every slot.
fn select_sensors(sensors: &Sensors, arg: &str) -> Result<Vec<String>, String> {
    let selected = if arg == SENSOR_ALL {
        sensors.valid_sensors()
    } else {
        sensors.process_sensor_str(arg, false)
    };
    if sensors.is_valid_sensor(&selected) {
        Ok(selected)
    } else {
        Err(format!("ERROR: '{arg}' is not a valid sensor!"))
    }
}

fn init_logging(opts: &Opts, config: &MyConfig) -> anyhow::Result<()> {
    let level = if opts.debug { "debug" } else { config.main.log_filter() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match &opts.log {
        Some(path) => {
            let file = File::options().create(true).append(true).open(expand_home(path))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

async fn run(cmd: Cmd, config: MyConfig, sensors: Sensors, selected: Vec<String>) -> anyhow::Result<()> {
    match cmd {
        Cmd::List => list_sensors(&sensors),

        Cmd::Collect { retries, wait } => {
            let retry = RetryPolicy::new(
                retries.unwrap_or(config.main.retries),
                wait.unwrap_or(config.main.wait),
            );
            let responses = sensors.collect_data(Some(selected.as_slice()), retry).await?;
            println!("{}", serde_json::to_string_pretty(&responses)?);
        }

        Cmd::Publish { delay, iterations } => {
            let sink = MqttSink::connect(&config.mqtt)?;
            let published = publish_data(
                &sink,
                &sensors,
                &selected,
                &config.mqtt.topic,
                delay.unwrap_or(config.mqtt.delay),
                iterations,
                RetryPolicy::from_config(&config.main),
            )
            .await;
            sink.close().await;
            info!("Published {} messages.", published?);
        }

        Cmd::Consume => {
            let writer = InfluxWriter::new(&config.influxdb)?;
            tokio::select! {
                r = consume(&config.mqtt, &config.influxdb.measurement, &writer) => r?,
                _ = tokio::signal::ctrl_c() => info!("Interrupted."),
            }
        }

        Cmd::Serve => serve(config, sensors).await,
    }
    Ok(())
}

fn list_sensors(sensors: &Sensors) {
    for line in sensor_table(sensors) {
        println!("{line}");
    }
}

fn sensor_table(sensors: &Sensors) -> Vec<String> {
    let rule = "-".repeat(RULE_WIDTH);
    let mut lines = vec![rule.clone(), " - Available Sensors - ".to_string()];
    if sensors.sensors().values().any(Option::is_some) {
        for (name, slot) in sensors.sensors() {
            lines.push(format!("{name:.<20.20}: {}", if slot.is_some() { "ON" } else { "OFF" }));
        }
    } else {
        lines.push("There are no sensors enabled!".to_string());
    }
    lines.push(rule);
    lines
}

async fn serve(config: MyConfig, sensors: Sensors) {
    let shared_state = Arc::new(MyState::with_sensors(config, sensors));

    info!("Entering main loop...");
    tokio::select! {
        _ = Box::pin(uptime_ticker(shared_state.clone())) => { error!("uptime_ticker() ended."); }
        r = Box::pin(poll_sensors(shared_state.clone())) => { error!("poll_sensors() ended: {r:?}"); }
        r = Box::pin(run_mqtt(shared_state.clone())) => { error!("run_mqtt() ended: {r:?}"); }
        r = Box::pin(run_api_server(shared_state.clone())) => { error!("run_api_server() ended: {r:?}"); }
        _ = tokio::signal::ctrl_c() => { info!("Interrupted, shutting down."); }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub(config: &str) -> Sensors {
        Sensors::new(&MyConfig::from_toml_str(config).unwrap()).unwrap()
    }

    const CONFIG: &str = "[f451_main]\nsensor_map = \"temp:f451_temperature\"\n[f451_temperature]\n";

    #[test]
    fn test_select_sensors() {
        let s = hub(CONFIG);
        assert_eq!(select_sensors(&s, SENSOR_ALL).unwrap().len(), 5);
        assert_eq!(select_sensors(&s, "temp").unwrap(), vec![SENSOR_TEMP.to_string()]);
        assert_eq!(
            select_sensors(&s, "f451_foo"),
            Err("ERROR: 'f451_foo' is not a valid sensor!".to_string())
        );
        // known slot, but nothing configured for it
        assert!(select_sensors(&s, SENSOR_WIND).is_err());
    }

    #[test]
    fn test_sensor_table() {
        let lines = sensor_table(&hub(CONFIG));
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[1], " - Available Sensors - ");
        assert_eq!(lines[2], "f451_temperature....: ON");
        assert_eq!(lines[3], "f451_humidity.......: OFF");
        assert_eq!(lines[0], lines[7]);

        let lines = sensor_table(&hub(""));
        assert_eq!(lines[2], "There are no sensors enabled!");
    }

    #[test]
    fn test_cli_parse() {
        let opts = Opts::try_parse_from(["f451-sensors", "--sensor", "temp", "publish", "--iterations", "3"])
            .unwrap();
        assert_eq!(opts.sensor, "temp");
        assert!(matches!(
            opts.cmd,
            Some(Cmd::Publish {
                delay: None,
                iterations: 3
            })
        ));
        Opts::command().debug_assert();
    }
}

// EOF
