use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::tasks::fs::temp_path;

/// Entries written by one [`append_to_archive`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackupSummary {
    pub kept: usize,
    pub added: usize,
    /// Entry names given to files whose base name was already taken.
    pub renamed: Vec<String>,
    /// Files that could not be read and are missing from the archive.
    pub unreadable: Vec<PathBuf>,
}

/// Adds `files` to `folder/archive_name` under their base names.
///
/// Blocking. Existing entries are copied over without recompression. A file whose base
/// name is already in the archive gets a numbered entry (`a.1.xml`). A file that cannot be
/// read is left out. The result replaces the old archive through a rename.
pub fn append_to_archive(folder: &Path, archive_name: &str, files: &[PathBuf]) -> Result<BackupSummary> {
    std::fs::create_dir_all(folder)
        .with_context(|| format!("Failed to create backup folder {}", folder.display()))?;

    let target = folder.join(archive_name);
    let temp = temp_path(folder, archive_name);

    let result = write_archive(&target, &temp, files);
    match result {
        Ok(summary) => {
            std::fs::rename(&temp, &target)
                .with_context(|| format!("Failed to replace {}", target.display()))
                .inspect_err(|_| {
                    let _ = std::fs::remove_file(&temp);
                })?;
            Ok(summary)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&temp);
            Err(e)
        }
    }
}

/// First of `name`, `stem.1.ext`, `stem.2.ext`... not in `taken`.
fn unique_entry_name(name: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }
    let (stem, extension) = match name.split_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, Some(extension)),
        _ => (name, None),
    };
    (1..)
        .map(|n| match extension {
            Some(extension) => format!("{}.{}.{}", stem, n, extension),
            None => format!("{}.{}", stem, n),
        })
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

fn write_archive(target: &Path, temp: &Path, files: &[PathBuf]) -> Result<BackupSummary> {
    let mut summary = BackupSummary::default();
    let mut names = HashSet::new();
    let mut writer = ZipWriter::new(
        File::create(temp).with_context(|| format!("Failed to create {}", temp.display()))?,
    );

    if target.exists() {
        let existing = ZipArchive::new(File::open(target)?)
            .with_context(|| format!("{} is not a readable zip archive", target.display()))?;
        names.extend(existing.file_names().map(str::to_string));
        summary.kept = existing.len();
        writer.merge_archive(existing)?;
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for path in files {
        let Some(base) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        // Read before the entry is opened so a vanished file leaves no partial entry
        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Cannot back up {}: {}", path.display(), e);
                summary.unreadable.push(path.clone());
                continue;
            }
        };

        let name = unique_entry_name(base, &names);
        if name != base {
            tracing::warn!("{} already contains {}, adding it as {}", target.display(), base, name);
            summary.renamed.push(name.clone());
        }

        writer.start_file(name.as_str(), options)?;
        writer.write_all(&content)?;
        names.insert(name);
        summary.added += 1;
    }

    writer.finish()?.sync_all()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::unique_entry_name;
    use std::collections::HashSet;

    #[test]
    fn test_unique_entry_name_numbers_the_stem() {
        let taken: HashSet<String> = ["a.xml", "a.1.xml", "b", "m.tar.gz"]
            .into_iter()
            .map(String::from)
            .collect();

        assert_eq!(unique_entry_name("new.xml", &taken), "new.xml");
        assert_eq!(unique_entry_name("a.xml", &taken), "a.2.xml");
        assert_eq!(unique_entry_name("b", &taken), "b.1");
        assert_eq!(unique_entry_name("m.tar.gz", &taken), "m.1.tar.gz");
    }
}
