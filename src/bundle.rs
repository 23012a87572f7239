//! The bundled snapshot: an immutable JSON array of draws shipped with the binary's data.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::types::{Draw, Source};

/// Reads the bundled snapshot. A missing or unreadable file is an empty bundle.
pub fn load_bundle(path: impl AsRef<Path>) -> Vec<Draw> {
    let path = path.as_ref();
    match read_bundle(path) {
        Ok(draws) => {
            info!(path = %path.display(), draws = draws.len(), "bundled draws loaded");
            draws
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "no bundled draws");
            Vec::new()
        }
    }
}

fn read_bundle(path: &Path) -> Result<Vec<Draw>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut draws: Vec<Draw> = serde_json::from_str(&raw).context("Failed to parse bundled draws")?;
    for draw in &mut draws {
        draw.source = Source::Bundled;
    }
    Ok(draws)
}

/// Writes `draws` as a bundled snapshot, newest first.
pub fn write_bundle(path: impl AsRef<Path>, draws: &[Draw]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut bundled = draws.to_vec();
    for draw in &mut bundled {
        draw.source = Source::Bundled;
    }
    bundled.sort_by(|a, b| b.date.cmp(&a.date));

    let json = serde_json::to_string_pretty(&bundled)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), draws = bundled.len(), "bundle written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn legacy_static_source_reads_as_bundled() {
        let dir = std::env::temp_dir().join(format!("lotto-bundle-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("legacy.json");
        fs::write(
            &path,
            r#"[{"date":"2024-01-16","first":"123456","last2":"56","source":"static"},
                {"date":"2024-02-01","first":"654321","source":"api"}]"#,
        )
        .unwrap();

        let draws = load_bundle(&path);
        assert_eq!(draws.len(), 2);
        assert!(draws.iter().all(|d| d.source == Source::Bundled));
        assert!(draws[1].near1.is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_bundle_is_empty() {
        assert!(load_bundle("/definitely/not/here.json").is_empty());
    }

    #[test]
    fn written_bundle_reads_back_newest_first() {
        let dir = std::env::temp_dir().join(format!("lotto-export-{}", std::process::id()));
        let path = dir.join("out/bundle.json");
        let draw = |d: u32| Draw {
            date: NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
            first: "000000".to_string(),
            near1: vec![],
            prize2: vec![],
            prize3: vec![],
            prize4: vec![],
            prize5: vec![],
            front3: vec![],
            back3: vec![],
            last2: "00".to_string(),
            source: Source::Api,
        };

        write_bundle(&path, &[draw(1), draw(16)]).unwrap();
        let back = load_bundle(&path);
        assert_eq!(back[0].date.format("%d").to_string(), "16");
        assert_eq!(back[0].source, Source::Bundled);
        fs::remove_dir_all(&dir).unwrap();
    }
}
