//! Package store abstraction and the ZIP-backed OOXML package.

use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

/// Part storage a patch session reads from and writes back to.
///
/// Keys are part paths inside the package (e.g. `xl/styles.xml`), without
/// a leading slash.
pub trait PackageStore {
    /// Raw content of a part, or `None` if it does not exist.
    fn get(&self, path: &str) -> Option<&[u8]>;

    /// Replace (or create) a part.
    fn put(&mut self, path: &str, data: Vec<u8>);

    /// Check if a part exists.
    fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }
}

impl PackageStore for HashMap<String, Vec<u8>> {
    fn get(&self, path: &str) -> Option<&[u8]> {
        HashMap::get(self, path).map(Vec::as_slice)
    }

    fn put(&mut self, path: &str, data: Vec<u8>) {
        self.insert(path.to_string(), data);
    }
}

impl PackageStore for BTreeMap<String, Vec<u8>> {
    fn get(&self, path: &str) -> Option<&[u8]> {
        BTreeMap::get(self, path).map(Vec::as_slice)
    }

    fn put(&mut self, path: &str, data: Vec<u8>) {
        self.insert(path.to_string(), data);
    }
}

/// Read a part and decode it as XML text.
pub fn read_part_text<S: PackageStore + ?Sized>(store: &S, path: &str) -> Result<String> {
    let bytes = store
        .get(path)
        .ok_or_else(|| Error::PartMissing(path.to_string()))?;
    decode_xml_bytes(bytes)
}

/// Fix XML encoding declaration from UTF-16 to UTF-8.
///
/// Decoded text is always UTF-8, and parts are written back as UTF-8, so
/// the declaration has to say so.
fn fix_xml_encoding_declaration(content: &str) -> String {
    if content.starts_with("<?xml") {
        if let Some(end_decl) = content.find("?>") {
            let decl = &content[..end_decl + 2];
            let rest = &content[end_decl + 2..];

            let fixed_decl = decl
                .replace("encoding=\"UTF-16\"", "encoding=\"UTF-8\"")
                .replace("encoding='UTF-16'", "encoding='UTF-8'")
                .replace("encoding=\"utf-16\"", "encoding=\"UTF-8\"")
                .replace("encoding='utf-16'", "encoding='UTF-8'");

            return format!("{}{}", fixed_decl, rest);
        }
    }
    content.to_string()
}

/// Decode XML bytes handling different encodings (UTF-8, UTF-16 LE/BE).
///
/// OOXML parts are typically UTF-8, but some producers write UTF-16.
/// A UTF-8 BOM is dropped.
pub fn decode_xml_bytes(bytes: &[u8]) -> Result<String> {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8(rest.to_vec()).map_err(|e| Error::Encoding(e.to_string()));
    }

    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        let content = decode_utf16(rest, u16::from_le_bytes)?;
        return Ok(fix_xml_encoding_declaration(&content));
    }

    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let content = decode_utf16(rest, u16::from_be_bytes)?;
        return Ok(fix_xml_encoding_declaration(&content));
    }

    match String::from_utf8(bytes.to_vec()) {
        Ok(s) => Ok(s),
        Err(e) => {
            // UTF-16 without BOM: ASCII markup leaves every other byte zero.
            if bytes.len() >= 4 && bytes[1] == 0 && bytes[3] == 0 {
                decode_utf16(bytes, u16::from_le_bytes).map(|s| fix_xml_encoding_declaration(&s))
            } else if bytes.len() >= 4 && bytes[0] == 0 && bytes[2] == 0 {
                decode_utf16(bytes, u16::from_be_bytes).map(|s| fix_xml_encoding_declaration(&s))
            } else {
                // Lossy decoding would corrupt the part on write-back.
                Err(Error::Encoding(e.to_string()))
            }
        }
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String> {
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| Error::Encoding(e.to_string()))
}

/// One archive entry, kept in original order.
#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

/// An OOXML package held in memory.
///
/// Reading loads every entry; writing produces a new archive with the
/// entries in their original order and compression. Parts added with
/// [`PackageStore::put`] are appended, deflated.
#[derive(Clone, Default)]
pub struct Package {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl Package {
    /// Open a package from a file path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sheetpatch::Package;
    ///
    /// let package = Package::open("template.xlsx")?;
    /// assert!(package.exists("xl/workbook.xml"));
    /// # Ok::<(), sheetpatch::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    /// Create a package from ZIP bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_reader(Cursor::new(data))
    }

    /// Create a package from a ZIP reader.
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut package = Self::default();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            package.push(Entry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                is_dir: file.is_dir(),
            });
        }

        log::debug!("loaded package with {} entries", package.entries.len());
        Ok(package)
    }

    fn push(&mut self, entry: Entry) {
        self.index.insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);
    }

    /// Serialize the package to ZIP bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_to(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Serialize the package into a seekable writer.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut zip = zip::ZipWriter::new(writer);

        for entry in &self.entries {
            // Anything we cannot re-encode faithfully is written deflated.
            let method = match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = SimpleFileOptions::default().compression_method(method);

            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), options)?;
            } else {
                zip.start_file(entry.name.as_str(), options)?;
                zip.write_all(&entry.data)?;
            }
        }

        zip.finish()?;
        Ok(())
    }

    /// Write the package to a file path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }

    /// Check if an entry exists in the archive.
    pub fn exists(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// List all entries in the archive, in archive order.
    pub fn list_files(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// List entries matching a prefix.
    pub fn list_files_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| e.name.starts_with(prefix))
            .map(|e| e.name.clone())
            .collect()
    }

    /// Read a part as XML text.
    pub fn read_xml(&self, path: &str) -> Result<String> {
        read_part_text(self, path)
    }

    /// Resolve a relative path from a base path.
    pub fn resolve_path(base: &str, relative: &str) -> String {
        if let Some(stripped) = relative.strip_prefix('/') {
            return stripped.to_string();
        }

        let base_path = Path::new(base);
        let base_dir = base_path.parent().unwrap_or(Path::new(""));

        let mut result = base_dir.to_path_buf();
        for component in Path::new(relative).components() {
            match component {
                std::path::Component::ParentDir => {
                    result.pop();
                }
                std::path::Component::Normal(c) => {
                    result.push(c);
                }
                _ => {}
            }
        }

        result.to_string_lossy().replace('\\', "/")
    }
}

#[cfg(feature = "async")]
impl Package {
    /// Open a package from a file path without blocking the runtime.
    pub async fn open_async(path: impl AsRef<Path>) -> Result<Self> {
        let data = tokio::fs::read(path.as_ref()).await?;
        Self::from_bytes(data)
    }

    /// Write the package to a file path without blocking the runtime.
    pub async fn save_async(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        tokio::fs::write(path.as_ref(), bytes).await?;
        Ok(())
    }
}

impl PackageStore for Package {
    fn get(&self, path: &str) -> Option<&[u8]> {
        self.index
            .get(path)
            .map(|&i| self.entries[i].data.as_slice())
    }

    fn put(&mut self, path: &str, data: Vec<u8>) {
        match self.index.get(path) {
            Some(&i) => self.entries[i].data = data,
            None => self.push(Entry {
                name: path.to_string(),
                data,
                compression: CompressionMethod::Deflated,
                is_dir: false,
            }),
        }
    }
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("files", &self.entries.len())
            .finish()
    }
}
