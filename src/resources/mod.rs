//! Loading of external files.
//!
//! Assets live in `assets/` next to the binary (copied into `OUT_DIR` by the
//! build script) and under `<origin>/assets/` when served to a browser.

use std::path::PathBuf;

use crate::resources::collada::ColladaAsset;

pub mod collada;

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().ok_or_else(|| anyhow::anyhow!("No browser window"))?;
    let origin = window
        .location()
        .origin()
        .map_err(|_| anyhow::anyhow!("Cannot read the page origin"))?;
    let base = reqwest::Url::parse(&format!("{}/assets/", origin))?;
    Ok(base.join(file_name)?)
}

/// Reads a text asset relative to `root`; on the web `root` is ignored and the
/// page's `assets/` directory is used instead.
pub async fn load_string_from(root: &std::path::Path, file_name: &str) -> anyhow::Result<String> {
    #[cfg(target_arch = "wasm32")]
    let txt = {
        let _ = root;
        let url = format_url(file_name)?;
        reqwest::get(url).await?.error_for_status()?.text().await?
    };
    #[cfg(not(target_arch = "wasm32"))]
    let txt = {
        let path = root.join(file_name);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path.display(), e))?
    };

    Ok(txt)
}

fn default_root() -> PathBuf {
    std::path::Path::new("./").join("assets")
}

/// One-shot asynchronous COLLADA loader.
///
/// A load is a single fetch followed by a parse; there is no progress
/// reporting, retry, timeout or cancellation.
#[derive(Clone, Debug)]
pub struct ColladaLoader {
    root: PathBuf,
}

impl Default for ColladaLoader {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

impl ColladaLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves paths against `root` instead of `./assets` (native only).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn load(&self, file_name: &str) -> anyhow::Result<ColladaAsset> {
        log::info!("Loading {}", file_name);
        let text = load_string_from(&self.root, file_name).await?;
        let asset = collada::parse(&text)?;
        Ok(asset)
    }
}
