use log::{error, info, warn};
use std::sync::Arc;

use weather_recorder::config::{environment, ConfigOverrides, ConfigResolver};
use weather_recorder::delivery::HttpTransport;
use weather_recorder::device::VantageConnector;
use weather_recorder::shutdown::{run_until_shutdown, ShutdownReason};
use weather_recorder::{logging, Recorder, TaskOverrides};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Load configuration before the logger exists; warnings are replayed below
    let resolution = ConfigResolver::new(ConfigOverrides::default())
        .with_environment(&environment::process_env)
        .resolve()
        .map_err(|e| {
            eprintln!("Failed to load configuration: {}", e);
            e
        })?;

    // Initialize logging
    logging::init(&resolution.config.logging)?;
    for warning in &resolution.warnings {
        warn!("{}", warning);
    }

    std::panic::set_hook(Box::new(|panic| {
        error!("Unrecoverable fault: {}", panic);
    }));

    let transport = Arc::new(HttpTransport::new()?);
    let mut recorder = match Recorder::connect(resolution.config, &VantageConnector, transport).await
    {
        Ok(recorder) => recorder,
        Err(e) => {
            error!("Failed to start recorder: {}", e);
            return Err(e.into());
        }
    };

    recorder.configure_current_conditions(Some(TaskOverrides {
        interval: None,
        use_environment: true,
    }))?;
    recorder.start();

    // Run until a signal or a fault stops the recorder
    match run_until_shutdown(&mut recorder).await {
        ShutdownReason::Signal(_) => {
            info!("Program terminated by signal. Exiting gracefully.");
            Ok(())
        }
        ShutdownReason::Fault(_) => std::process::exit(1),
    }
}
