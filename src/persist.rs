// src/persist.rs
use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Read a JSON document. A missing file yields `Ok(None)`; a corrupt one is an error.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let s = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    let value = serde_json::from_str(&s).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(value))
}

/// Write the whole document to `<path>.tmp`, then rename over `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let json = serde_json::to_vec_pretty(value).context("serializing document")?;
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    f.write_all(&json)
        .and_then(|_| f.sync_all())
        .with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn missing_is_none_corrupt_is_err() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("doc.json");
        assert!(read_json::<BTreeMap<String, u32>>(&p).unwrap().is_none());

        fs::write(&p, "{not json").unwrap();
        assert!(read_json::<BTreeMap<String, u32>>(&p).is_err());
    }

    #[test]
    fn atomic_write_creates_parent_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("nested/doc.json");
        let mut m = BTreeMap::new();
        m.insert("a".to_string(), 1u32);
        write_json_atomic(&p, &m).unwrap();

        let back: BTreeMap<String, u32> = read_json(&p).unwrap().unwrap();
        assert_eq!(back, m);
        assert!(!p.with_extension("json.tmp").exists());
    }
}
