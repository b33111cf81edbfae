use std::{
    io::Write,
    path::{Path, PathBuf},
};

/// Joins an error and its sources into one line, skipping empty and repeated
/// messages.
pub fn format_error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = Vec::<String>::new();
    let mut cur: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = cur {
        let s = e.to_string();
        cur = e.source();
        if s.is_empty() || parts.last() == Some(&s) {
            continue;
        }
        // thiserror messages often embed their source already.
        if parts.last().is_some_and(|prev| prev.ends_with(&s)) {
            continue;
        }
        parts.push(s);
    }
    if parts.is_empty() {
        "unknown error".to_string()
    } else {
        parts.join(": ")
    }
}

/// Writes `text` with every line ending normalized to `\n`.
pub fn write_text_lf(path: &Path, text: &str) -> std::io::Result<()> {
    let normalized = if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text.to_string()
    };
    std::fs::write(path, normalized.as_bytes())
}

/// Write-to-temp then rename, so readers never observe a torn file.
pub fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = tmp_path(path);
    {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(data)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
