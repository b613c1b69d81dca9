//! One collection cycle: authorize, fetch, report, export.

use anyhow::{Context, Result};
use reqwest::Client;
use std::env;
use tracing::{info, warn};

use crate::{
    api::{AuthClient, AuthCodeSource, AuthState, StationClient, parse_weather_readings},
    config::Config,
    credentials::Credentials,
    error::ApiError,
    model::WeatherReading,
    report,
    store::{EnvFile, StateStore},
    telemetry::{TelemetryManager, TelemetryStatus},
};

/// Outcome of a successful cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub readings: Vec<WeatherReading>,
    /// Number of metric values applied to gauges.
    pub recorded: usize,
    pub telemetry: TelemetryStatus,
}

pub struct Collector {
    config: Config,
    settings: EnvFile,
    auth: AuthClient,
    station: StationClient,
    codes: Box<dyn AuthCodeSource>,
}

impl Collector {
    pub fn new(config: Config, codes: Box<dyn AuthCodeSource>) -> Self {
        let http = Client::new();
        let settings = EnvFile::new(&config.files.env_file);
        let auth = AuthClient::with_client(http.clone(), &config.api, settings.clone())
            .with_state(AuthState::from_config(config.auth.random_state));
        let station = StationClient::with_client(http, &config.api);

        Self { config, settings, auth, station, codes }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Credentials from the process environment, falling back to the settings file.
    pub fn load_credentials(&self) -> Credentials {
        self.load_credentials_with(|key| env::var(key).ok())
    }

    /// Like [`Collector::load_credentials`], with `env_lookup` standing in for
    /// the process environment. Its values win over the settings file.
    pub fn load_credentials_with<F>(&self, env_lookup: F) -> Credentials
    where
        F: Fn(&str) -> Option<String>,
    {
        let file_vars = self.settings.read_vars().unwrap_or_else(|err| {
            warn!(error = %format!("{err:#}"), "Settings file ignored");
            Default::default()
        });

        Credentials::from_lookup(|key| env_lookup(key).or_else(|| file_vars.get(key).cloned()))
    }

    /// Load credentials and run a single cycle.
    pub async fn run_once(&self) -> Result<CycleReport> {
        let mut credentials = self.load_credentials();
        self.run_with_credentials(&mut credentials).await
    }

    pub async fn run_with_credentials(&self, credentials: &mut Credentials) -> Result<CycleReport> {
        if !credentials.validate() {
            return Err(ApiError::InvalidCredentials)
                .context("Set NETATMO_CLIENT_ID and NETATMO_CLIENT_SECRET in the environment or settings file");
        }

        if !credentials.has_refresh_token() {
            info!("No refresh token found. Setting up initial authorization...");
            self.authorize(credentials).await?;
        }

        let state = StateStore::new(self.config.files.state_file_path());
        let mut telemetry = TelemetryManager::new(&self.config.telemetry, state);
        match telemetry.status() {
            TelemetryStatus::DisabledBySetupError(_) => {
                warn!(status = %telemetry.status(), "Metrics export unavailable for this run")
            }
            status => info!(status = %status, "Metrics export"),
        }

        let outcome = self.collect(credentials, &mut telemetry).await;
        telemetry.shutdown().await;
        outcome
    }

    /// Interactive authorization-code exchange, regardless of any stored token.
    pub async fn authorize(&self, credentials: &mut Credentials) -> Result<()> {
        self.auth
            .setup_initial_auth(credentials, self.codes.as_ref())
            .await
            .context("Failed to set up initial authorization")
    }

    async fn collect(
        &self,
        credentials: &mut Credentials,
        telemetry: &mut TelemetryManager,
    ) -> Result<CycleReport> {
        let access_token = match self.auth.refresh_access_token(credentials).await {
            Ok(token) => token,
            Err(err) if err.is_unauthorized() => {
                return Err(err).context(
                    "Refresh token was rejected; run `netatmo authorize` to obtain a new one",
                );
            }
            Err(err) => return Err(err).context("Error refreshing access token"),
        };

        let station_data = self
            .station
            .get_station_data(&access_token)
            .await
            .context("Error retrieving station data")?;

        let readings = parse_weather_readings(&station_data);
        print!("{}", report::render(&readings));

        let recorded = readings
            .iter()
            .map(|reading| telemetry.record_metrics(reading).len())
            .sum();

        Ok(CycleReport { readings, recorded, telemetry: telemetry.status().clone() })
    }
}
