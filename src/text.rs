//! UTF-8 text I/O over both namespaces.
//!
//! A leading byte-order mark is stripped on read and only written when asked
//! for. Appends never write a BOM.

use crate::error::{Error, Result};
use crate::store::FileSystem;

/// The UTF-8 byte-order mark.
pub const UTF8_BOM: &[u8; 3] = b"\xef\xbb\xbf";

/// Decode bytes as UTF-8, stripping BOM if present.
pub fn decode_utf8(buf: &[u8]) -> Option<&str> {
    let buf = buf.strip_prefix(UTF8_BOM).unwrap_or(buf);
    std::str::from_utf8(buf).ok()
}

/// Encode text as UTF-8, optionally prefixed with a BOM.
pub fn encode_utf8(text: &str, with_bom: bool) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() + if with_bom { UTF8_BOM.len() } else { 0 });
    if with_bom {
        bytes.extend_from_slice(UTF8_BOM);
    }
    bytes.extend_from_slice(text.as_bytes());
    bytes
}

/// Read a whole file as text.
///
/// Fails with [`Error::Decode`] if the content is not valid UTF-8.
pub fn read_text(fs: &FileSystem, path: &str) -> Result<String> {
    let bytes = fs.read(path)?;
    decode_utf8(&bytes)
        .map(str::to_owned)
        .ok_or_else(|| Error::Decode { path: path.into() })
}

/// Replace a file with `text`, optionally prefixed with a BOM.
pub fn write_text(fs: &FileSystem, path: &str, text: &str, with_bom: bool) -> Result<()> {
    fs.write(path, &encode_utf8(text, with_bom))
}

/// Append `text` to an existing file. Never writes a BOM.
pub fn append_text(fs: &FileSystem, path: &str, text: &str) -> Result<()> {
    fs.append(path, text.as_bytes())
}

// =============================================================================
// TextFile
// =============================================================================

/// How a [`TextFile`] was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read the whole content.
    Read,
    /// Replace the content on close.
    Write,
    /// Add to the content on close, creating the file if needed.
    Append,
}

impl OpenMode {
    /// Parse a `"r"`, `"w"` or `"a"` mode string.
    pub fn parse(mode: &str) -> Result<Self> {
        match mode {
            "r" => Ok(Self::Read),
            "w" => Ok(Self::Write),
            "a" => Ok(Self::Append),
            other => Err(Error::Argument(format!("unknown open mode '{other}'"))),
        }
    }
}

/// An open text file in either namespace.
///
/// Writes are buffered and reach the store on [`close`](Self::close) (or
/// on drop, where errors can only be logged).
///
/// ```ignore
/// let mut file = TextFile::open(fs, "$:data/corpus.txt", OpenMode::Write)?.with_bom(true);
/// file.write("Il était une fois")?;
/// file.close()?;
/// ```
pub struct TextFile {
    fs: FileSystem,
    path: String,
    mode: OpenMode,
    with_bom: bool,
    content: Option<String>,
    pending: String,
    closed: bool,
}

impl TextFile {
    /// Open `path` in `mode`. Read mode loads the content immediately.
    pub fn open(fs: &FileSystem, path: &str, mode: OpenMode) -> Result<Self> {
        let content = match mode {
            OpenMode::Read => Some(read_text(fs, path)?),
            OpenMode::Write | OpenMode::Append => None,
        };
        Ok(Self {
            fs: fs.clone(),
            path: path.to_string(),
            mode,
            with_bom: false,
            content,
            pending: String::new(),
            closed: false,
        })
    }

    /// Prefix written content with a BOM (write mode, or append to a new file).
    pub fn with_bom(mut self, with_bom: bool) -> Self {
        self.with_bom = with_bom;
        self
    }

    /// Path this file was opened with.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Mode this file was opened with.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// The file content (read mode only).
    pub fn read(&self) -> Result<&str> {
        self.ensure_open()?;
        self.content.as_deref().ok_or_else(|| {
            Error::Argument(format!("'{}' is not opened in read mode", self.path))
        })
    }

    /// Buffer text for writing (write and append modes).
    pub fn write(&mut self, text: &str) -> Result<()> {
        self.ensure_open()?;
        if self.mode == OpenMode::Read {
            return Err(Error::Argument(format!(
                "'{}' is opened in read mode",
                self.path
            )));
        }
        self.pending.push_str(text);
        Ok(())
    }

    /// Push buffered text to the store and close the file.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Argument(format!("'{}' is closed", self.path)))
        } else {
            Ok(())
        }
    }

    fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let text = std::mem::take(&mut self.pending);
        match self.mode {
            OpenMode::Read => Ok(()),
            OpenMode::Write => write_text(&self.fs, &self.path, &text, self.with_bom),
            OpenMode::Append if self.fs.exists(&self.path) => {
                append_text(&self.fs, &self.path, &text)
            }
            OpenMode::Append => write_text(&self.fs, &self.path, &text, self.with_bom),
        }
    }
}

impl Drop for TextFile {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(path = %self.path, error = %e, "text file flush on drop failed");
        }
    }
}
