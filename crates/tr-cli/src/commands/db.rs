//! Database maintenance commands for the Trellis CLI.

use std::path::Path;

use anyhow::Result;

use tr_storage::SqliteStore;

const SQLITE_DB_FILE: &str = "trellis.sqlite";

fn db_path(config_path: &str) -> Result<String> {
    let config = super::load_runtime_config(config_path)?;
    Ok(format!("{}/{SQLITE_DB_FILE}", config.engine.data_dir))
}

pub fn path(config_path: &str) -> Result<()> {
    println!("{}", db_path(config_path)?);
    Ok(())
}

pub fn stats(config_path: &str) -> Result<()> {
    let path = db_path(config_path)?;
    if !Path::new(&path).exists() {
        println!("Database not found: {path}");
        return Ok(());
    }

    let store = SqliteStore::open(Path::new(&path))?;
    let stats = store.stats()?;

    println!("database: {path}");
    println!("  users:       {}", stats.users);
    println!("  collections: {}", stats.collections);
    println!("  todos:       {}", stats.todos);
    Ok(())
}

pub fn check(config_path: &str) -> Result<()> {
    let path = db_path(config_path)?;
    if !Path::new(&path).exists() {
        println!("Database not found: {path}");
        return Ok(());
    }

    println!("Checking database integrity...");
    let conn = rusqlite::Connection::open(&path)?;

    let result: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    if result == "ok" {
        println!("Database integrity: OK");
    } else {
        println!("Database integrity issues found:");
        println!("{result}");
    }

    let fk_violations = conn
        .prepare("PRAGMA foreign_key_check")?
        .query_map([], |_row| Ok(()))?
        .count();
    if fk_violations == 0 {
        println!("Foreign keys: OK");
    } else {
        println!("Foreign key violations: {fk_violations}");
    }
    Ok(())
}

pub fn vacuum(config_path: &str) -> Result<()> {
    let path = db_path(config_path)?;
    if !Path::new(&path).exists() {
        println!("Database not found: {path}");
        return Ok(());
    }

    let size_before = std::fs::metadata(&path)?.len();

    println!("Running VACUUM on database...");
    let conn = rusqlite::Connection::open(&path)?;
    conn.execute("VACUUM", [])?;

    let size_after = std::fs::metadata(&path)?.len();
    let saved = size_before.saturating_sub(size_after);

    println!("Vacuum complete:");
    println!("  Before: {}", format_size(size_before));
    println!("  After:  {}", format_size(size_after));
    if saved > 0 {
        println!("  Saved:  {}", format_size(saved));
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}
