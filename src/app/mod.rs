use crate::api::ApiServer;
use crate::config::Config;
use crate::host::native::native_host;
use crate::media::CaptureMode;
use crate::recorder::{RecordingMachine, SessionController, SessionPhase, TriggerOutcome};
use crate::save::{FileRecordingSink, RecordingSink};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

fn spawn_machine(config: &Config) -> Result<(SessionController, JoinHandle<()>)> {
    let output_dir = config.output.resolve_directory()?;
    info!("Recordings will be written to {:?}", output_dir);

    let host = native_host(config.engine.settings());
    let sink: Arc<dyn RecordingSink> = Arc::new(FileRecordingSink::new(output_dir));
    Ok(RecordingMachine::spawn(host, sink))
}

pub async fn run_service() -> Result<()> {
    info!("Starting interview-recorder service");

    let config = Config::load()?;
    let (controller, machine_task) = spawn_machine(&config)?;

    let api_server = ApiServer::new(controller.clone(), &config);
    let port = api_server.port();
    let mut server_task = tokio::spawn(async move {
        if let Err(e) = api_server.start().await {
            error!("API server failed: {}", e);
        }
    });

    info!("interview-recorder is ready!");
    info!("Start: curl -X POST http://127.0.0.1:{}/start/audio", port);
    info!("Stop:  curl -X POST http://127.0.0.1:{}/stop", port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
        _ = &mut server_task => warn!("API server exited"),
    }
    server_task.abort();

    // An active session is stopped and delivered before exiting.
    if controller.status().phase().await.is_active() {
        wait_while_starting(&controller).await;
        controller.stop().await?;
        wait_for_idle(&controller, SHUTDOWN_GRACE).await;
    }
    drop(controller);
    machine_task.abort();
    Ok(())
}

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

async fn wait_while_starting(controller: &SessionController) {
    while controller.status().phase().await == SessionPhase::Starting {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

async fn wait_for_idle(controller: &SessionController, limit: Duration) {
    let waited = tokio::time::timeout(limit, async {
        while controller.status().phase().await != SessionPhase::Idle {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    if waited.is_err() {
        warn!("Session did not finish within {:?}", limit);
    }
}

/// Record one session in the foreground until Ctrl-C.
pub async fn run_record(config: &Config, mode: CaptureMode) -> Result<()> {
    let (controller, machine_task) = spawn_machine(config)?;
    let status = controller.status().clone();

    match controller.start(mode).await? {
        TriggerOutcome::Accepted => {}
        other => return Err(anyhow!("Recording was not started: {:?}", other)),
    }

    wait_while_starting(&controller).await;

    let snapshot = status.get().await;
    if snapshot.phase != SessionPhase::Recording {
        drop(controller);
        let _ = machine_task.await;
        let reason = snapshot
            .last_error
            .map(|e| format!("{}: {}", e.code, e.message))
            .unwrap_or_else(|| "unknown error".to_string());
        return Err(anyhow!("Failed to start recording ({})", reason));
    }

    println!(
        "Recording {} ({}). Press Ctrl-C to stop.",
        mode,
        snapshot.mime_type.as_deref().unwrap_or("unknown format")
    );
    tokio::select! {
        signal = tokio::signal::ctrl_c() => signal?,
        _ = async {
            while status.phase().await == SessionPhase::Recording {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        } => warn!("Recording ended on its own"),
    }

    info!("Stopping recording");
    let outcome = controller.stop().await?;
    info!("Stop request: {:?}", outcome);
    drop(controller);
    machine_task
        .await
        .map_err(|e| anyhow!("Recording machine task failed: {e}"))?;

    let last = status.get().await;
    match (last.last_recording, last.last_error) {
        (Some(name), _) => println!("Saved {}", name),
        (None, Some(err)) => return Err(anyhow!("Recording failed ({}: {})", err.code, err.message)),
        (None, None) => warn!("Recording finished but nothing was saved"),
    }
    Ok(())
}
