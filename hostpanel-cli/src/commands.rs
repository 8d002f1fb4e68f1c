use anyhow::{Context, Result, bail};
use hostpanel::api::model_label;
use hostpanel::{ApiClient, DownloadState, HfModelRef, Liveness, PollingService, StatusStream};
use shared_http::api::{CONTEXT_LENGTH_PRESETS, KvQuant};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::views::{self, HostPanels};

pub async fn status(client: &ApiClient) -> Result<()> {
    let value = match client.check_health().await {
        Ok(value) => value,
        Err(e) => {
            debug!("Health check failed: {}", e);
            Liveness::Offline
        }
    };
    println!("{}", views::liveness_line(value));
    Ok(())
}

pub async fn watch_status(client: &ApiClient) -> Result<()> {
    let service = PollingService::http(client);
    let mut states = subscribe_health(&service, client)?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            next = states.next() => match next {
                Some(state) if state.checks > 0 => println!("{}", views::status_line(&state)),
                Some(_) => {}
                None => break,
            },
        }
    }
    Ok(())
}

pub async fn hostname(client: &ApiClient) -> Result<()> {
    println!("{}", views::hostname_line(&client.fetch_hostname().await));
    Ok(())
}

pub async fn os(client: &ApiClient) -> Result<()> {
    println!("{}", views::os_line(&client.fetch_os().await));
    Ok(())
}

pub async fn vram(client: &ApiClient) -> Result<()> {
    println!("{}", views::vram_line(&client.fetch_vram_usage().await));
    Ok(())
}

pub async fn power(client: &ApiClient, on: bool) -> Result<()> {
    let (action, response) = if on {
        ("Start desktop", client.start_desktop().await)
    } else {
        ("Shut down", client.shut_down_desktop().await)
    };
    let response = response.with_context(|| format!("{} failed", action))?;
    println!("{}", views::message_line(action, &response));
    Ok(())
}

pub async fn list_scripts(client: &ApiClient) -> Result<()> {
    match client.fetch_scripts().await {
        Ok(catalog) => {
            for line in views::scripts_panel(&catalog) {
                println!("{}", line);
            }
        }
        Err(e) => println!("Error fetching scripts: {}", e),
    }
    Ok(())
}

pub async fn run_script(client: &ApiClient, name: &str) -> Result<()> {
    let response = client
        .run_script(name)
        .await
        .with_context(|| format!("Running {} failed", name))?;
    println!("{}", views::message_line(name, &response));
    Ok(())
}

pub async fn models(client: &ApiClient) -> Result<()> {
    match client.fetch_models().await {
        Ok(models) => {
            for line in views::models_panel(&models) {
                println!("{}", line);
            }
        }
        Err(e) => println!("Error fetching GGUF models: {}", e),
    }
    Ok(())
}

pub async fn download(
    client: &ApiClient,
    hf_model: &str,
    branch: Option<String>,
    file: Option<String>,
) -> Result<()> {
    let reference = HfModelRef::parse(hf_model)?;
    let branch = branch.or(reference.branch);

    let job_id = client
        .start_download(&reference.model, branch.as_deref(), file.as_deref())
        .await
        .context("Starting the download failed")?;
    println!("Started download job {}", job_id);

    let watch = client.watch_download(job_id)?;
    let mut updates = watch.subscribe();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let job_id = watch.job_id().clone();
                watch.stop().await;
                println!("Stopped following job {}; the backend keeps downloading", job_id);
                return Ok(());
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                println!("{}", views::download_line(&state));
                if state.is_terminal() {
                    break;
                }
            }
        }
    }

    let outcome = watch.wait().await;
    if let DownloadState::Failed { message } = outcome {
        bail!("Download failed: {}", message);
    }
    Ok(())
}

pub async fn set_params(
    client: &ApiClient,
    model: &str,
    context_length: u32,
    kv_quant: Option<KvQuant>,
) -> Result<()> {
    if !CONTEXT_LENGTH_PRESETS.contains(&context_length) {
        info!(
            "Context length {} is not one of the presets {:?}",
            context_length, CONTEXT_LENGTH_PRESETS
        );
    }

    client
        .set_parameters(model, context_length, kv_quant)
        .await
        .context("Setting parameters failed")?;

    match kv_quant {
        Some(quant) => println!(
            "{}: context {}, kv cache {}",
            model_label(model),
            context_length,
            quant
        ),
        None => println!("{}: context {}", model_label(model), context_length),
    }
    Ok(())
}

pub async fn dashboard(client: &ApiClient) -> Result<()> {
    let service = PollingService::http(client);
    let mut states = subscribe_health(&service, client)?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        let state = tokio::select! {
            _ = &mut shutdown => break,
            next = states.next() => match next {
                Some(state) => state,
                None => break,
            },
        };
        if state.checks == 0 {
            continue;
        }

        let panels = if state.value.is_online() {
            let (hostname, vram, scripts) = tokio::join!(
                client.fetch_hostname(),
                client.fetch_vram_usage(),
                client.fetch_scripts()
            );
            Some(HostPanels {
                hostname,
                vram,
                scripts,
            })
        } else {
            None
        };

        println!();
        for line in views::dashboard(&state, panels.as_ref()) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn subscribe_health(service: &PollingService, client: &ApiClient) -> Result<StatusStream> {
    let config = client.config();
    let subscription = service.subscribe(&config.health_path, config.poll_interval)?;
    info!(url = subscription.url(), "Polling host status, press Ctrl+C to stop");
    Ok(subscription.into_stream())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    debug!("Received Ctrl+C signal");
}
