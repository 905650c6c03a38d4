use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expand CLI inputs: files pass through as given, directories become their
/// `*.zst` files (top level only) in name order, so monthly dumps such as
/// `RS_2012-01.zst .. RS_2012-12.zst` are scanned chronologically.
pub fn expand_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for p in inputs {
        if p.is_dir() {
            out.extend(zst_files_in(p));
        } else {
            out.push(p.clone());
        }
    }
    out
}

fn zst_files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "zst"))
        .collect();
    files.sort();
    if files.is_empty() {
        tracing::warn!(dir = %dir.display(), "no .zst archives found");
    }
    files
}
