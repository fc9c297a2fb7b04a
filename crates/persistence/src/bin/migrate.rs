#![deny(warnings)]

use persistence::default_sqlite_url;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| default_sqlite_url().to_string());
    persistence::ensure_parent_dir(&url)?;
    let pool = persistence::init_db(&url).await?;
    let rows = persistence::load_curves(&pool).await?.len();
    println!("Curve store ready at {} ({} rows)", url, rows);
    Ok(())
}
