//! Column family registry persisted in `MANIFEST`.

use crate::column_family::DEFAULT_COLUMN_FAMILY_NAME;
use crate::error::{CoreError, CoreResult};
use crate::log::compute_crc32;
use crate::types::ColumnFamilyId;
use std::collections::BTreeMap;

/// Magic bytes for the manifest file.
pub const MANIFEST_MAGIC: [u8; 4] = *b"OKVM";

/// Current manifest version.
pub const MANIFEST_VERSION: u16 = 1;

/// Longest column family name the manifest can store, in bytes.
pub const MAX_COLUMN_FAMILY_NAME_LEN: usize = u16::MAX as usize;

/// Checks that `name` can be registered as a column family.
///
/// # Errors
///
/// Returns [`CoreError::InvalidArgument`] for an empty name or one longer
/// than [`MAX_COLUMN_FAMILY_NAME_LEN`] bytes.
pub fn validate_column_family_name(name: &str) -> CoreResult<()> {
    if name.is_empty() {
        return Err(CoreError::invalid_argument("column family name is empty"));
    }
    if name.len() > MAX_COLUMN_FAMILY_NAME_LEN {
        return Err(CoreError::invalid_argument(format!(
            "column family name is {} bytes, limit is {MAX_COLUMN_FAMILY_NAME_LEN}",
            name.len()
        )));
    }
    Ok(())
}

/// Database manifest.
///
/// Maps column family names to ids. Ids are never reused, so log records
/// for a dropped column family are skipped on replay even if the name is
/// created again later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    column_families: BTreeMap<String, ColumnFamilyId>,
    next_column_family_id: u32,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    /// Creates a manifest holding only the default column family.
    #[must_use]
    pub fn new() -> Self {
        let mut column_families = BTreeMap::new();
        column_families.insert(DEFAULT_COLUMN_FAMILY_NAME.to_string(), ColumnFamilyId::DEFAULT);
        Self {
            column_families,
            next_column_family_id: ColumnFamilyId::DEFAULT.as_u32() + 1,
        }
    }

    /// Looks up a column family id by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ColumnFamilyId> {
        self.column_families.get(name).copied()
    }

    /// Registers `name`, returning its id. Existing names keep their id.
    pub fn get_or_create(&mut self, name: &str) -> ColumnFamilyId {
        if let Some(id) = self.get(name) {
            return id;
        }
        let id = ColumnFamilyId::new(self.next_column_family_id);
        self.next_column_family_id += 1;
        self.column_families.insert(name.to_string(), id);
        id
    }

    /// Unregisters `name`. The default column family cannot be removed.
    pub fn remove(&mut self, name: &str) -> Option<ColumnFamilyId> {
        if name == DEFAULT_COLUMN_FAMILY_NAME {
            return None;
        }
        self.column_families.remove(name)
    }

    /// Iterates over `(name, id)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnFamilyId)> {
        self.column_families
            .iter()
            .map(|(name, id)| (name.as_str(), *id))
    }

    /// Encodes the manifest, checksum included.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if a name does not fit the
    /// 16-bit length field.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MANIFEST_MAGIC);
        buf.extend_from_slice(&MANIFEST_VERSION.to_le_bytes());
        buf.extend_from_slice(&self.next_column_family_id.to_le_bytes());

        let count = u32::try_from(self.column_families.len())
            .map_err(|_| CoreError::invalid_argument("too many column families"))?;
        buf.extend_from_slice(&count.to_le_bytes());

        for (name, id) in &self.column_families {
            validate_column_family_name(name)?;
            let name_bytes = name.as_bytes();
            let name_len = u16::try_from(name_bytes.len())
                .map_err(|_| CoreError::invalid_argument("column family name too long"))?;
            buf.extend_from_slice(&id.as_u32().to_le_bytes());
            buf.extend_from_slice(&name_len.to_le_bytes());
            buf.extend_from_slice(name_bytes);
        }

        let crc = compute_crc32(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    /// Decodes a manifest produced by [`Manifest::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidManifest`] for bad magic, an unsupported
    /// version, truncation or a missing default column family, and
    /// [`CoreError::ChecksumMismatch`] when the checksum does not match.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < 4 || data[..4] != MANIFEST_MAGIC {
            return Err(CoreError::invalid_manifest("invalid manifest magic"));
        }
        if data.len() < 4 + 2 + 4 + 4 + 4 {
            return Err(CoreError::invalid_manifest("manifest too short"));
        }

        let (body, crc_bytes) = data.split_at(data.len() - 4);
        let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        let actual = compute_crc32(body);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch { expected, actual });
        }

        let mut cursor = 4;
        let version = u16::from_le_bytes([body[cursor], body[cursor + 1]]);
        cursor += 2;
        if version > MANIFEST_VERSION {
            return Err(CoreError::invalid_manifest(format!(
                "unsupported manifest version: {version}"
            )));
        }

        let next_column_family_id = read_u32(body, &mut cursor)?;
        let count = read_u32(body, &mut cursor)?;

        let mut column_families = BTreeMap::new();
        for _ in 0..count {
            let id = ColumnFamilyId::new(read_u32(body, &mut cursor)?);
            if cursor + 2 > body.len() {
                return Err(CoreError::invalid_manifest("truncated column family entry"));
            }
            let name_len = usize::from(u16::from_le_bytes([body[cursor], body[cursor + 1]]));
            cursor += 2;
            if cursor + name_len > body.len() {
                return Err(CoreError::invalid_manifest("truncated column family name"));
            }
            let name = std::str::from_utf8(&body[cursor..cursor + name_len])
                .map_err(|_| CoreError::invalid_manifest("column family name is not UTF-8"))?
                .to_string();
            cursor += name_len;

            if id.as_u32() >= next_column_family_id {
                return Err(CoreError::invalid_manifest(format!(
                    "column family id {id} not below next id {next_column_family_id}"
                )));
            }
            column_families.insert(name, id);
        }

        if cursor != body.len() {
            return Err(CoreError::invalid_manifest("trailing bytes in manifest"));
        }
        if column_families.get(DEFAULT_COLUMN_FAMILY_NAME) != Some(&ColumnFamilyId::DEFAULT) {
            return Err(CoreError::invalid_manifest("default column family missing"));
        }

        Ok(Self {
            column_families,
            next_column_family_id,
        })
    }
}

fn read_u32(data: &[u8], cursor: &mut usize) -> CoreResult<u32> {
    if *cursor + 4 > data.len() {
        return Err(CoreError::invalid_manifest("manifest truncated"));
    }
    let value = u32::from_le_bytes([
        data[*cursor],
        data[*cursor + 1],
        data[*cursor + 2],
        data[*cursor + 3],
    ]);
    *cursor += 4;
    Ok(value)
}
