/*
    Copyright 2025 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/


#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

use clap::Parser;
use mqtt_connector_core::AppConfig;
use mqtt_connector_core::CliArgs;
use mqtt_connector_core::Connector;
use mqtt_connector_core::util::ShutdownSignal;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal::unix::SignalKind;
use tokio::signal::unix::signal;

/// Application main entrypoint.
fn main() -> ExitCode {
    if let Err(e) = init_logger() {
        println!("Failed to initialize logging: {e:?}");
        return ExitCode::FAILURE;
    }
    #[cfg(feature = "tracing")]
    let _tracing_guard = {
        // Enable tracing via the RUST_LOG environment variable. Example:
        //
        // ```
        // RUST_LOG="rumqttc=trace,reqwest=debug"
        // ```
        let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
            .with_writer(non_blocking)
            .init();
        guard
    };
    let cli_args = CliArgs::parse();
    let app_config = match AppConfig::new(env!("CARGO_PKG_NAME"), &cli_args) {
        Ok(app_config) => Arc::new(app_config),
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    log_banner(&app_config);
    match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime.block_on(run_async(app_config)),
        Err(e) => {
            log::error!("Unable to start async runtime: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize the logging system and apply filters.
fn init_logger() -> Result<(), log::SetLoggerError> {
    env_logger::builder()
        // Set default log level
        .filter_level(log::LevelFilter::Info)
        // Customize logging for dependencies
        .filter(Some("rumqttc"), log::LevelFilter::Info)
        .filter(Some("reqwest"), log::LevelFilter::Info)
        .filter(Some("hyper_util"), log::LevelFilter::Info)
        .filter(Some("rustls"), log::LevelFilter::Info)
        .filter(
            Some("mqtt_connector_core::connector::dispatcher"),
            log::LevelFilter::Info,
        )
        .write_style(env_logger::fmt::WriteStyle::Auto)
        .target(env_logger::fmt::Target::Stdout)
        .is_test(false)
        .parse_env(
            env_logger::Env::new()
                .filter("LOG_LEVEL")
                .write_style("LOG_STYLE"),
        )
        .try_init()
}

/// Log what the connector is about to do.
fn log_banner(app_config: &AppConfig) {
    log::info!(
        "MQTT Connector: version {}, gateway {}, namespace {}, topic '{}', broker {}, async invoke {}, callback URL {}, rebuild interval {:?}",
        app_config.app_version(),
        app_config.gateway.url(),
        app_config.gateway.namespace().unwrap_or("<all>"),
        app_config.broker.topic(),
        app_config.broker.uri(),
        app_config.gateway.async_invoke(),
        app_config.gateway.callback_url().unwrap_or("<none>"),
        app_config.routing.rebuild_interval(),
    );
}

/// Async code entry point.
pub async fn run_async(app_config: Arc<AppConfig>) -> ExitCode {
    let connector = match Connector::new(&app_config).await {
        Ok(connector) => connector,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let shutdown = connector.shutdown_signal();
    tokio::spawn(signal_on_termination(Arc::clone(&shutdown)));
    match connector.run().await {
        Ok(()) => {
            log::info!("Connector stopped.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Raise the shutdown signal when SIGTERM or SIGINT is received.
async fn signal_on_termination(shutdown: Arc<ShutdownSignal>) {
    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        (Err(e), _) | (_, Err(e)) => {
            log::error!("Unable to listen for termination signals: {e}");
            shutdown.signal();
            return;
        }
    };
    tokio::select! {
        _ = shutdown.wait_for_signal() => {},
        _ = sigterm.recv() => {
            log::debug!("SIGTERM received.")
        },
        _ = sigint.recv() => {
            log::debug!("SIGINT received.")
        },
    };
    shutdown.signal();
}
