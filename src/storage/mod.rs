pub mod session_db;

pub use session_db::SessionDatabase;

use std::fs;

/// Ensure data directory exists
pub fn ensure_data_dir() -> std::io::Result<()> {
    fs::create_dir_all("data")?;
    Ok(())
}
