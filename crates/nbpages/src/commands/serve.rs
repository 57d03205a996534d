//! Preview server command.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use axum::Router;
use tower_http::services::ServeDir;

use crate::config::{load_config, ConfigFile};

/// Directory holding the generated pages.
fn serve_dir(file_config: &ConfigFile, dir: Option<PathBuf>) -> PathBuf {
    dir.or_else(|| file_config.output.dir.clone())
        .unwrap_or_else(|| file_config.notebooks.dir.clone())
}

/// Run the serve command.
pub async fn run(config_path: &Path, port: u16, dir: Option<PathBuf>, open: bool) -> Result<()> {
    let file_config = load_config(config_path)?;
    let dir = serve_dir(&file_config, dir);

    if !dir.exists() {
        anyhow::bail!(
            "Directory not found: {}. Run 'nbpages build' first.",
            dir.display()
        );
    }

    let addr: SocketAddr = format!("127.0.0.1:{}", port)
        .parse()
        .context("Invalid address")?;

    tracing::info!("Serving {} at http://{}", dir.display(), addr);

    let app = Router::new().fallback_service(ServeDir::new(&dir));

    let listener = tokio::net::TcpListener::bind(addr).await?;

    if open {
        let url = format!("http://{}", addr);
        if let Err(e) = open::that(&url) {
            tracing::warn!("Could not open browser: {}", e);
        }
    }

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_flag_then_output_then_notebook_dir() {
        let mut config = ConfigFile::default();
        assert_eq!(serve_dir(&config, None), PathBuf::from("."));

        config.output.dir = Some(PathBuf::from("site"));
        assert_eq!(serve_dir(&config, None), PathBuf::from("site"));

        assert_eq!(
            serve_dir(&config, Some(PathBuf::from("public"))),
            PathBuf::from("public")
        );
    }
}
