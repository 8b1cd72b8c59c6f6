use anyhow::Result;

pub fn show(config_path: &str) -> Result<()> {
    let path = super::shellexpand(config_path);

    if std::path::Path::new(&path).exists() {
        let content = std::fs::read_to_string(&path)?;
        println!("config file: {path}\n");
        println!("{content}");
    } else {
        println!("no config file at {path}");
    }

    let runtime = super::load_runtime_config(config_path)?;
    println!("resolved runtime config:\n");
    println!("[server]");
    println!("  bind_host = {}", runtime.server.bind_host);
    println!("  rest_port = {}", runtime.server.rest_port);
    if runtime.server.cors_allowed_origins.is_empty() {
        println!("  cors_allowed_origins = []");
    } else {
        println!(
            "  cors_allowed_origins = {}",
            runtime.server.cors_allowed_origins.join(", ")
        );
    }

    println!("\n[storage]");
    println!("  data_dir = {}", runtime.engine.data_dir);

    Ok(())
}
