use anyhow::Result;

pub async fn start(port: Option<u16>, config_path: &str) -> Result<()> {
    let runtime = super::load_runtime_config(config_path)?;

    let bind_host = runtime.server.bind_host.clone();
    let rest_port = port.unwrap_or(runtime.server.rest_port);

    if let Err(err) = tr_server::check_bind_safety(&bind_host) {
        eprintln!("startup safety check failed:");
        eprintln!("  {err}");
        eprintln!("hint: run `trellis server preflight --config {config_path}`");
        return Err(anyhow::anyhow!("refusing to start unsafe public bind"));
    }

    let server_config = tr_server::ServerConfig {
        bind_host: bind_host.clone(),
        rest_port,
        cors_allowed_origins: runtime.server.cors_allowed_origins,
        engine_config: runtime.engine,
    };

    println!("starting Trellis server...");
    println!("  REST: http://{bind_host}:{rest_port}");

    tr_server::start_server(server_config)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    Ok(())
}

pub async fn preflight(config_path: &str) -> Result<()> {
    let runtime = super::load_runtime_config(config_path)?;
    let bind_host = runtime.server.bind_host.clone();

    let jwt_secret = std::env::var("TRELLIS_JWT_SECRET")
        .map(|v| !v.trim().is_empty())
        .unwrap_or(false);
    let allow_insecure = std::env::var("TRELLIS_ALLOW_INSECURE_BIND")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    println!("server preflight");
    println!("  bind_host: {bind_host}");
    println!("  TRELLIS_JWT_SECRET set: {jwt_secret}");
    println!("  TRELLIS_ALLOW_INSECURE_BIND: {allow_insecure}");

    match tr_server::check_bind_safety(&bind_host) {
        Ok(()) => {
            println!("result: PASS");
            Ok(())
        }
        Err(err) => {
            println!("result: FAIL");
            println!("  {err}");
            println!("next steps:");
            println!("  1) Set TRELLIS_JWT_SECRET");
            println!("  2) Or set TRELLIS_ALLOW_INSECURE_BIND=true only for trusted local networks");
            Err(anyhow::anyhow!("bind safety preflight failed"))
        }
    }
}

pub async fn status(config_path: &str) -> Result<()> {
    let url = health_url(config_path)?;

    let client = reqwest::Client::new();
    match client.get(&url).send().await {
        Ok(resp) => {
            if resp.status().is_success() {
                let body: serde_json::Value = resp.json().await?;
                println!("status: running");
                println!("  endpoint: {url}");
                if let Some(version) = body.get("version").and_then(|v| v.as_str()) {
                    println!("  version: {version}");
                }
            } else {
                println!("status: error (HTTP {})", resp.status());
                println!("  endpoint: {url}");
            }
        }
        Err(_) => {
            println!("status: stopped");
            println!("  endpoint: {url}");
        }
    }
    Ok(())
}

fn health_url(config_path: &str) -> Result<String> {
    let runtime = super::load_runtime_config(config_path)?;
    let host = match runtime.server.bind_host.as_str() {
        "0.0.0.0" | "::" => "127.0.0.1",
        other => other,
    };
    Ok(format!(
        "http://{host}:{}/api/v1/health",
        runtime.server.rest_port
    ))
}
