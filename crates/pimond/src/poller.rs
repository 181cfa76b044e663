//! Poll loop: reads accessors and forwards values to the sink.
//!
//! Power metrics go out on every tick. Modem metrics go out on the first tick
//! of every `modem_every`-tick cycle; their caches keep qmicli calls down to
//! one per query per TTL regardless.

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{Config, DaemonConfig, SinkKind};
use crate::invoker::ProcessRunner;
use crate::modem::{ModemStatus, QmiClient};
use crate::power::{PowerField, PowerStatus, SysfsPowerApi};
use crate::sink::{metric_name, JsonLinesSink, LogSink, MetricSink, MetricValue};

/// Display labels and fields, in push order.
const POWER_METRICS: [(&str, PowerField); 16] = [
    ("Input Temperature", PowerField::InputTemperature),
    ("Input Voltage", PowerField::InputVoltage),
    ("Input Current", PowerField::InputCurrent),
    ("Input Power", PowerField::InputPower),
    ("System Temperature", PowerField::SystemTemperature),
    ("System Voltage", PowerField::SystemVoltage),
    ("System Current", PowerField::SystemCurrent),
    ("System Power", PowerField::SystemPower),
    ("Battery Temperature", PowerField::BatteryTemperature),
    ("Battery Voltage", PowerField::BatteryVoltage),
    ("Battery Current", PowerField::BatteryCurrent),
    ("battery Power", PowerField::BatteryPower),
    ("battery SOC", PowerField::BatteryLevel),
    ("battery Health", PowerField::BatteryHealth),
    ("Fan health", PowerField::FanHealth),
    ("Fan Speed", PowerField::FanSpeed),
];

pub struct Poller {
    namespace: String,
    modem_every: u32,
    voltage_reports_current: bool,
    modem: Option<ModemStatus>,
    power: Option<PowerStatus>,
    sink: Box<dyn MetricSink>,
    tick: u32,
}

impl Poller {
    pub fn new(
        settings: &DaemonConfig,
        modem: Option<ModemStatus>,
        power: Option<PowerStatus>,
        sink: Box<dyn MetricSink>,
    ) -> Self {
        Self {
            namespace: settings.namespace.clone(),
            modem_every: settings.modem_every.max(1),
            voltage_reports_current: settings.voltage_reports_current,
            modem,
            power,
            sink,
            tick: 0,
        }
    }

    /// Wire up the production collaborators described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let modem = config.modem.enabled.then(|| {
            let runner = Arc::new(ProcessRunner::new(Duration::from_secs(
                config.modem.command_timeout_secs,
            )));
            ModemStatus::new(
                QmiClient::new(runner, &config.modem),
                Duration::from_secs(config.modem.cache_ttl_secs),
            )
        });

        let power = config.power.enabled.then(|| {
            PowerStatus::new(Box::new(SysfsPowerApi::new(config.power.sysfs.clone())))
        });

        let sink: Box<dyn MetricSink> = match config.sink.kind {
            SinkKind::Log => Box::new(LogSink),
            SinkKind::Jsonl => {
                let path = config
                    .sink
                    .path
                    .as_deref()
                    .context("sink.path is required for the jsonl sink")?;
                Box::new(
                    JsonLinesSink::open(path)
                        .with_context(|| format!("Failed to open {}", path.display()))?,
                )
            }
        };

        Ok(Self::new(&config.daemon, modem, power, sink))
    }

    /// Send one labelled value to the sink. Failures are logged only.
    fn publish(&self, label: &str, value: MetricValue) {
        debug!("{}: {}", label, value);
        if let Err(e) = self.sink.push(&self.namespace, &metric_name(label), &value) {
            warn!("Failed to push {}: {}", label, e);
        }
    }

    pub async fn push_modem(&self) {
        let Some(modem) = &self.modem else {
            return;
        };

        self.publish("Connection", modem.connection_type().await.into());
        self.publish("Roaming", modem.roaming().await.into());
        self.publish("3GPP Location", modem.location_area_code().await.into());
        self.publish("3GPP Cell ID", modem.cell_id().await.into());
        self.publish("RSSI_dbm", modem.rssi().await.into());
        self.publish("SNR_db", modem.snr().await.into());
        self.publish("RSRQ_db", modem.rsrq().await.into());
        self.publish("RSRP_dbm", modem.rsrp().await.into());
    }

    pub fn push_power(&mut self) {
        let Some(power) = self.power.as_mut() else {
            return;
        };

        let mut values = Vec::with_capacity(POWER_METRICS.len());
        for (label, field) in POWER_METRICS {
            let source = source_field(field, self.voltage_reports_current);
            values.push((label, power.read(source)));
        }

        for (label, value) in values {
            self.publish(label, value.into());
        }
    }

    /// One scheduled tick.
    pub async fn tick(&mut self) {
        if self.tick == 0 {
            self.push_modem().await;
        }
        self.push_power();
        self.tick = (self.tick + 1) % self.modem_every;
    }

    /// Push everything once, ignoring the modem cadence.
    pub async fn run_once(&mut self) {
        self.push_modem().await;
        self.push_power();
    }

    /// Tick, then sleep `interval`, until `shutdown` resolves.
    pub async fn run<S>(&mut self, interval: Duration, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            "Polling every {:?}, modem every {} ticks",
            interval, self.modem_every
        );

        loop {
            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = &mut shutdown => {
                    info!("Exiting due to user interrupt");
                    return;
                }
            }
        }
    }
}

/// Field actually read for a label's field. Deployed dashboards expect the
/// voltage labels to carry the current readings unless told otherwise.
fn source_field(field: PowerField, voltage_reports_current: bool) -> PowerField {
    match field {
        PowerField::InputVoltage if voltage_reports_current => PowerField::InputCurrent,
        PowerField::SystemVoltage if voltage_reports_current => PowerField::SystemCurrent,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_field_has_a_label() {
        for field in PowerField::ALL {
            assert!(POWER_METRICS.iter().any(|(_, f)| *f == field), "{} unlabelled", field);
        }
    }

    #[test]
    fn test_source_field() {
        assert_eq!(source_field(PowerField::InputVoltage, true), PowerField::InputCurrent);
        assert_eq!(source_field(PowerField::SystemVoltage, true), PowerField::SystemCurrent);
        assert_eq!(source_field(PowerField::BatteryVoltage, true), PowerField::BatteryVoltage);
        assert_eq!(source_field(PowerField::InputVoltage, false), PowerField::InputVoltage);
    }

    #[test]
    fn test_from_config_defaults() {
        assert!(Poller::from_config(&Config::default()).is_ok());
    }
}
