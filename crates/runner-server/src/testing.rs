//! Fixtures shared by the server's unit tests.

use std::path::Path;
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use runner_platform::Platform;

use crate::orchestrator::{Orchestrator, OrchestratorConfig};

pub const APP_SOURCE: &str =
    "http://platform-storage/projects/f2dff223d2cc40a2b7f80a1318aceb5d/archive/0.0.1";

/// Uncompressed tarball with one top-level directory per name, each holding
/// a `run.sh`.
pub fn plain_archive(dirs: &[&str]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for dir in dirs {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_size(0);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{dir}/"), std::io::empty())
            .unwrap();

        let script = b"#!/bin/sh\necho hello\n";
        let mut header = tar::Header::new_gnu();
        header.set_size(script.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{dir}/run.sh"), &script[..])
            .unwrap();
    }
    builder.into_inner().unwrap()
}

pub fn project_archive(dirs: &[&str]) -> Vec<u8> {
    use std::io::Write;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&plain_archive(dirs)).unwrap();
    encoder.finish().unwrap()
}

pub fn config(root: &Path) -> OrchestratorConfig {
    OrchestratorConfig {
        storage_root: root.to_path_buf(),
        app_source: Some(APP_SOURCE.to_string()),
        worker_command: "Worker".to_string(),
    }
}

pub fn orchestrator(platform: Arc<dyn Platform>, root: &Path) -> Orchestrator {
    Orchestrator::new(platform, config(root))
}
