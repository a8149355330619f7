//! Rendering of `ls` output.

use std::fs;
use std::io;
use std::path::Path;

/// Coarse entry classification shown in the first column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A directory.
    Directory,
    /// A regular file.
    File,
    /// Anything else (sockets, devices, dangling links).
    Other,
}

impl EntryKind {
    /// Column tag for this kind.
    pub fn tag(self) -> &'static str {
        match self {
            EntryKind::Directory => "<dir>",
            EntryKind::File => "<file>",
            EntryKind::Other => "<other>",
        }
    }
}

/// One row of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Entry kind.
    pub kind: EntryKind,
    /// Base name, never a full path.
    pub name: String,
    /// Size in bytes as reported by the filesystem.
    pub size: u64,
}

impl ListingEntry {
    /// Stat a path and build its listing row.
    ///
    /// Symlinks are followed; a link whose target cannot be read is shown
    /// as `<other>` with the link's own size.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(_) => fs::symlink_metadata(path)?,
        };

        let kind = if metadata.is_dir() {
            EntryKind::Directory
        } else if metadata.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        Ok(Self {
            kind,
            name,
            size: metadata.len(),
        })
    }

    fn cells(&self) -> [String; 3] {
        [
            self.kind.tag().to_string(),
            self.name.clone(),
            format_size(self.size),
        ]
    }
}

/// Human-readable size: plain bytes below 1 KiB, otherwise two decimals
/// with a binary prefix. Halves round up.
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes < KIB {
        format!("{} B", bytes)
    } else if bytes < MIB {
        format!("{:.2} KiB", hundredths(bytes, KIB))
    } else if bytes < GIB {
        format!("{:.2} MiB", hundredths(bytes, MIB))
    } else {
        format!("{:.2} GiB", hundredths(bytes, GIB))
    }
}

/// `bytes / unit` rounded half-up to two decimals. `{:.2}` alone rounds
/// exact ties to even.
fn hundredths(bytes: u64, unit: u64) -> f64 {
    (bytes as f64 * 100.0 / unit as f64).round() / 100.0
}

/// Render rows as a table.
///
/// Each column is padded to its widest cell plus one space. Every row ends
/// with a newline; an empty slice renders as an empty string.
pub fn render_listing(entries: &[ListingEntry]) -> String {
    let rows: Vec<[String; 3]> = entries.iter().map(ListingEntry::cells).collect();

    let mut widths = [0usize; 3];
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for row in &rows {
        for (cell, width) in row.iter().zip(widths.iter()) {
            out.push_str(&format!("{:<w$}", cell, w = width + 1));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(kind: EntryKind, name: &str, size: u64) -> ListingEntry {
        ListingEntry {
            kind,
            name: name.to_string(),
            size,
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.00 KiB");
        assert_eq!(format_size(2048), "2.00 KiB");
        assert_eq!(format_size(1536), "1.50 KiB");
        // 1.125 and 1.375 are exact ties
        assert_eq!(format_size(1152), "1.13 KiB");
        assert_eq!(format_size(1408), "1.38 KiB");
        assert_eq!(format_size(1_179_648), "1.13 MiB");
        assert_eq!(format_size(5_242_880), "5.00 MiB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GiB");
    }

    #[test]
    fn test_render_column_widths() {
        let entries = vec![
            entry(EntryKind::Directory, "src", 4096),
            entry(EntryKind::File, "Cargo.toml", 512),
        ];

        let rendered = render_listing(&entries);
        let lines: Vec<&str> = rendered.lines().collect();

        // widest cells: "<file>" (6), "Cargo.toml" (10), "4.00 KiB" (8)
        assert_eq!(lines[0], "<dir>  src        4.00 KiB ");
        assert_eq!(lines[1], "<file> Cargo.toml 512 B    ");
        assert!(lines.iter().all(|l| l.len() == 7 + 11 + 9));
    }

    #[test]
    fn test_long_name_only_widens_its_column() {
        let short = vec![
            entry(EntryKind::File, "a", 1),
            entry(EntryKind::File, "b", 2),
        ];
        let long = vec![
            entry(EntryKind::File, "a", 1),
            entry(EntryKind::File, "a-much-longer-name", 2),
        ];

        let short_line = render_listing(&short).lines().next().unwrap().to_string();
        let long_line = render_listing(&long).lines().next().unwrap().to_string();

        assert!(short_line.starts_with("<file> a "));
        assert!(long_line.starts_with("<file> a "));
        assert!(short_line.ends_with("1 B "));
        assert!(long_line.ends_with("1 B "));
        assert_eq!(long_line.len() - short_line.len(), "a-much-longer-name".len() - 1);
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_listing(&[]), "");
    }

    #[test]
    fn test_entry_from_path() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("hello.txt"), "Hello World").unwrap();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();

        let file = ListingEntry::from_path(&temp_dir.path().join("hello.txt")).unwrap();
        assert_eq!(file.kind, EntryKind::File);
        assert_eq!(file.name, "hello.txt");
        assert_eq!(file.size, 11);

        let dir = ListingEntry::from_path(&temp_dir.path().join("sub")).unwrap();
        assert_eq!(dir.kind, EntryKind::Directory);
        assert_eq!(dir.name, "sub");
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_other() {
        let temp_dir = TempDir::new().unwrap();
        let link = temp_dir.path().join("dangling");
        std::os::unix::fs::symlink(temp_dir.path().join("missing"), &link).unwrap();

        let entry = ListingEntry::from_path(&link).unwrap();
        assert_eq!(entry.kind, EntryKind::Other);
        assert_eq!(entry.name, "dangling");
    }
}
