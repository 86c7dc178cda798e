//! On-disk payload module container.
//!
//! A module file carries a small manifest in front of the loadable code
//! image:
//!
//! ```text
//! ┌──────────────────────────┐
//! │  Magic  b"HUSKMOD\0"     │
//! ├──────────────────────────┤
//! │  Header (fixed size)     │  ← format/schema versions, name lengths,
//! ├──────────────────────────┤    code size, code CRC32
//! │  Entry class name        │  ← UTF-8
//! ├──────────────────────────┤
//! │  Factory class name      │  ← UTF-8, may be empty
//! ├──────────────────────────┤
//! │  Code image              │  ← opaque to this module; the loader
//! └──────────────────────────┘    backend knows what to do with it
//! ```
//!
//! A file that fails any validation step is unusable as a whole; callers
//! treat it as absent and delete it.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Magic bytes identifying a husk module container.
pub const MODULE_MAGIC: [u8; 8] = *b"HUSKMOD\0";

/// Container format version this stub reads and writes.
pub const FORMAT_VERSION: u16 = 1;

/// Fixed header size in bytes: magic + format version + schema version +
/// two name lengths + code size + code checksum.
pub const HEADER_SIZE: usize = 8 + 2 + 4 + 2 + 2 + 8 + 4;

/// Errors produced while reading or validating a module container.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// File is not a husk module container.
    #[error("bad module magic")]
    BadMagic,

    /// File ends before the declared contents.
    #[error("truncated module file: {0}")]
    Truncated(&'static str),

    /// Container format version newer than this stub understands.
    #[error("unsupported container format version {0}")]
    UnsupportedVersion(u16),

    /// Code image does not match its recorded checksum.
    #[error("code checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum recorded in the header.
        expected: u32,
        /// Checksum computed over the code image.
        actual: u32,
    },

    /// A manifest name is not valid UTF-8.
    #[error("manifest name is not valid UTF-8")]
    BadName,

    /// Entry class name is empty.
    #[error("manifest declares no entry class")]
    MissingEntryClass,

    /// I/O error reading the file.
    #[error("{0}")]
    Io(#[from] io::Error),
}

/// Manifest carried by a module container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleManifest {
    /// Stub/payload contract version this module was built for.
    pub schema_version: u32,
    /// Name of the entry object type inside the module.
    pub entry_class: String,
    /// Name of the component factory type, if the module supplies one.
    pub factory_class: Option<String>,
}

/// A validated module file, ready to hand to a loader backend.
#[derive(Debug)]
pub struct ModuleFile {
    path: PathBuf,
    manifest: ModuleManifest,
    code: Vec<u8>,
}

impl ModuleFile {
    /// Open and validate the container at `path`.
    pub fn open(path: &Path) -> Result<Self, FormatError> {
        let bytes = fs::read(path)?;
        Self::parse(&bytes, path.to_path_buf())
    }

    /// Parse a container from raw bytes.
    fn parse(bytes: &[u8], path: PathBuf) -> Result<Self, FormatError> {
        if bytes.len() < HEADER_SIZE {
            return Err(FormatError::Truncated("header"));
        }
        if bytes[..8] != MODULE_MAGIC {
            return Err(FormatError::BadMagic);
        }

        let format_version = u16::from_le_bytes([bytes[8], bytes[9]]);
        if format_version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion(format_version));
        }

        let schema_version = u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]);
        let entry_len = u16::from_le_bytes([bytes[14], bytes[15]]) as usize;
        let factory_len = u16::from_le_bytes([bytes[16], bytes[17]]) as usize;
        let code_size = u64::from_le_bytes([
            bytes[18], bytes[19], bytes[20], bytes[21],
            bytes[22], bytes[23], bytes[24], bytes[25],
        ]) as usize;
        let checksum = u32::from_le_bytes([bytes[26], bytes[27], bytes[28], bytes[29]]);

        let names_end = HEADER_SIZE + entry_len + factory_len;
        if bytes.len() < names_end {
            return Err(FormatError::Truncated("manifest names"));
        }
        if bytes.len() < names_end + code_size {
            return Err(FormatError::Truncated("code image"));
        }

        if entry_len == 0 {
            return Err(FormatError::MissingEntryClass);
        }
        let entry_class = std::str::from_utf8(&bytes[HEADER_SIZE..HEADER_SIZE + entry_len])
            .map_err(|_| FormatError::BadName)?
            .to_string();
        let factory_class = if factory_len == 0 {
            None
        } else {
            Some(
                std::str::from_utf8(&bytes[HEADER_SIZE + entry_len..names_end])
                    .map_err(|_| FormatError::BadName)?
                    .to_string(),
            )
        };

        let code = bytes[names_end..names_end + code_size].to_vec();
        let actual = crc32fast::hash(&code);
        if actual != checksum {
            return Err(FormatError::ChecksumMismatch {
                expected: checksum,
                actual,
            });
        }

        Ok(ModuleFile {
            path,
            manifest: ModuleManifest {
                schema_version,
                entry_class,
                factory_class,
            },
            code,
        })
    }

    /// Path this module was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The validated manifest.
    pub fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    /// The code image.
    pub fn code(&self) -> &[u8] {
        &self.code
    }
}

/// Builder for writing a module container.
///
/// Used by packaging tooling and tests; the stub itself only reads.
#[derive(Debug, Clone)]
pub struct ModuleImage {
    manifest: ModuleManifest,
    code: Vec<u8>,
}

impl ModuleImage {
    /// Assemble a container image.
    pub fn new(
        schema_version: u32,
        entry_class: impl Into<String>,
        factory_class: Option<String>,
        code: Vec<u8>,
    ) -> Self {
        ModuleImage {
            manifest: ModuleManifest {
                schema_version,
                entry_class: entry_class.into(),
                factory_class,
            },
            code,
        }
    }

    /// Serialize the container to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let entry = self.manifest.entry_class.as_bytes();
        let factory = self
            .manifest
            .factory_class
            .as_deref()
            .unwrap_or("")
            .as_bytes();

        let mut bytes = Vec::with_capacity(HEADER_SIZE + entry.len() + factory.len() + self.code.len());
        bytes.extend_from_slice(&MODULE_MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&self.manifest.schema_version.to_le_bytes());
        bytes.extend_from_slice(&(entry.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&(factory.len() as u16).to_le_bytes());
        bytes.extend_from_slice(&(self.code.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&crc32fast::hash(&self.code).to_le_bytes());
        bytes.extend_from_slice(entry);
        bytes.extend_from_slice(factory);
        bytes.extend_from_slice(&self.code);
        bytes
    }

    /// Write the container to a writer.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_bytes())
    }

    /// Write the container to a file.
    pub fn write_file(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_bytes())
    }
}
