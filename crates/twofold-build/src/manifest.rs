//! Entry manifest generation.
//!
//! After every client pass the orchestrator writes a JSON manifest mapping
//! each entry to its public asset URLs, so the server bundle can render
//! script and stylesheet tags without knowing hashed filenames. Entry order
//! is significant: entries named after the index page sort first and the
//! error page sorts last, matching the order tags should be emitted in.

use std::path::Path;

use indexmap::IndexMap;

use crate::compiler::CompileResult;
use crate::error::Result;
use crate::store::ArtifactStore;

/// Entry name to public asset URLs.
pub type Manifest = IndexMap<String, Vec<String>>;

/// Build the manifest from a client compile result.
///
/// Only script and stylesheet assets are listed; source maps and raw assets
/// are skipped. Every URL carries the public base path prefix.
pub fn generate(result: &CompileResult, public_path: &str) -> Manifest {
    let mut names: Vec<&String> = result.entrypoints.keys().collect();
    // Stable two-stage sort: index entries float to the front, the error
    // page sinks to the back, everything else keeps entry-map order.
    names.sort_by_key(|name| !name.contains("index"));
    names.sort_by_key(|name| name.contains("_error"));

    let mut manifest = Manifest::new();
    for name in names {
        let assets = result.entrypoints[name]
            .iter()
            .filter(|asset| asset.ends_with(".js") || asset.ends_with(".css"))
            .map(|asset| format!("{public_path}{asset}"))
            .collect();
        manifest.insert(name.clone(), assets);
    }
    manifest
}

/// Serialize the manifest and write it into the artifact store.
pub async fn write(
    store: &dyn ArtifactStore,
    path: &Path,
    manifest: &Manifest,
) -> Result<()> {
    let json = serde_json::to_vec_pretty(manifest)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    store.write(path, json).await?;
    Ok(())
}
