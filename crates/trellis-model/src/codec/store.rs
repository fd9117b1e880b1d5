//! Keyed field store with a stable binary image
//!
//! A `ModelStore` holds the decoded fields of one datamodel instance against
//! a static schema. The image layout is the 6-byte interface header followed
//! by `(index:u8 ‖ length:varint ‖ payload)` records in strictly ascending
//! index order. Export views select which fields enter the image; the hash
//! covers hashable, non-transient fields only, so transient mutations never
//! move `id1`.

use std::collections::BTreeMap;

use trellis_core::{hash_args, HashArg, Id32, Result, TrellisError};

use super::field::{FieldKind, FieldSpec};
use super::varint;
use crate::interface::InterfaceHeader;

/// A model schema: interface header plus declared fields
#[derive(Debug)]
pub struct ModelSchema {
    /// Interface header written at the front of every image
    pub header: InterfaceHeader,
    /// Declared fields in ascending index order
    pub fields: &'static [FieldSpec],
}

impl ModelSchema {
    /// Look up a field by record index
    pub fn by_index(&self, index: u8) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.index == index)
    }

    /// Look up a field by name
    pub fn by_name(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Which fields an export includes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportView {
    /// Persistent fields including signatures: the stored wire image
    Stored,
    /// Hashable persistent fields only: the signing input
    Hashable,
    /// Every present field including transient ones
    Full,
}

/// Decoded field values of one datamodel instance
#[derive(Debug, Clone)]
pub struct ModelStore {
    schema: &'static ModelSchema,
    values: BTreeMap<u8, Vec<u8>>,
}

impl ModelStore {
    /// Create an empty store over a schema
    pub fn new(schema: &'static ModelSchema) -> Self {
        Self {
            schema,
            values: BTreeMap::new(),
        }
    }

    /// The schema this store was built against
    pub fn schema(&self) -> &'static ModelSchema {
        self.schema
    }

    /// Decode an image. Transient records are dropped unless
    /// `preserve_transient` is set.
    pub fn load(
        schema: &'static ModelSchema,
        image: &[u8],
        preserve_transient: bool,
    ) -> Result<Self> {
        if image.len() < InterfaceHeader::LENGTH {
            return Err(TrellisError::decode("header", "image shorter than header"));
        }
        let header = InterfaceHeader::from_bytes(&image[..InterfaceHeader::LENGTH])?;
        if header != schema.header {
            return Err(TrellisError::decode(
                "header",
                format!("interface {header} does not match schema {}", schema.header),
            ));
        }

        let mut store = Self::new(schema);
        let mut cursor = InterfaceHeader::LENGTH;
        let mut last_index: Option<u8> = None;
        while cursor < image.len() {
            let index = image[cursor];
            cursor += 1;
            if let Some(last) = last_index {
                if index <= last {
                    return Err(TrellisError::decode(
                        "record",
                        format!("field index {index} out of order after {last}"),
                    ));
                }
            }
            last_index = Some(index);

            let (length, used) = varint::read(&image[cursor..])?;
            cursor += used;
            let length = usize::try_from(length)
                .map_err(|_| TrellisError::decode("record", "length exceeds address space"))?;
            if cursor + length > image.len() {
                return Err(TrellisError::decode(
                    "record",
                    format!("field {index} payload truncated"),
                ));
            }
            let payload = &image[cursor..cursor + length];
            cursor += length;

            let spec = schema
                .by_index(index)
                .ok_or(TrellisError::UnknownField { index })?;
            spec.kind.validate(spec.name, payload)?;
            if spec.transient && !preserve_transient {
                continue;
            }
            store.values.insert(index, payload.to_vec());
        }
        Ok(store)
    }

    /// Serialize the selected view in ascending index order
    pub fn export(&self, view: ExportView) -> Vec<u8> {
        let mut out = self.schema.header.to_bytes().to_vec();
        for spec in self.schema.fields {
            let include = match view {
                ExportView::Stored => !spec.transient,
                ExportView::Hashable => !spec.transient && spec.hashable,
                ExportView::Full => true,
            };
            if !include {
                continue;
            }
            if let Some(payload) = self.values.get(&spec.index) {
                out.push(spec.index);
                varint::write(payload.len() as u64, &mut out);
                out.extend_from_slice(payload);
            }
        }
        out
    }

    /// Structured hash over hashable, non-transient fields.
    ///
    /// Every declared field contributes one element, absent fields as the
    /// absent tag, so the argument arity is fixed by the schema.
    pub fn hash(&self) -> [u8; 32] {
        let mut args = Vec::with_capacity(self.schema.fields.len());
        for spec in self.schema.fields {
            if spec.transient || !spec.hashable {
                continue;
            }
            match self.values.get(&spec.index) {
                Some(payload) => args.push(spec.kind.hash_arg(payload)),
                None => args.push(HashArg::Absent),
            }
        }
        hash_args(&args)
    }

    fn spec(&self, name: &str) -> Result<&FieldSpec> {
        self.schema
            .by_name(name)
            .ok_or_else(|| TrellisError::invalid(format!("schema has no field {name}")))
    }

    /// Set a field from raw payload bytes, validating against its kind
    pub fn set_raw(&mut self, name: &str, payload: impl Into<Vec<u8>>) -> Result<()> {
        let payload = payload.into();
        let spec = self.spec(name)?;
        spec.kind.validate(spec.name, &payload)?;
        self.values.insert(spec.index, payload);
        Ok(())
    }

    /// Set a 1-byte integer field
    pub fn set_u8(&mut self, name: &str, value: u8) -> Result<()> {
        self.set_raw(name, vec![value])
    }

    /// Set a 2-byte little-endian integer field
    pub fn set_u16_le(&mut self, name: &str, value: u16) -> Result<()> {
        self.set_raw(name, value.to_le_bytes().to_vec())
    }

    /// Set a 2-byte big-endian integer field
    pub fn set_u16_be(&mut self, name: &str, value: u16) -> Result<()> {
        self.set_raw(name, value.to_be_bytes().to_vec())
    }

    /// Set a 4-byte big-endian integer field
    pub fn set_u32_be(&mut self, name: &str, value: u32) -> Result<()> {
        self.set_raw(name, value.to_be_bytes().to_vec())
    }

    /// Set a string field
    pub fn set_str(&mut self, name: &str, value: &str) -> Result<()> {
        self.set_raw(name, value.as_bytes().to_vec())
    }

    /// Set a 32-byte id field
    pub fn set_id(&mut self, name: &str, value: Id32) -> Result<()> {
        self.set_raw(name, value.to_bytes().to_vec())
    }

    /// Remove a field
    pub fn clear(&mut self, name: &str) -> Result<()> {
        let index = self.spec(name)?.index;
        self.values.remove(&index);
        Ok(())
    }

    /// True when the field is present
    pub fn has(&self, name: &str) -> bool {
        self.schema
            .by_name(name)
            .map(|spec| self.values.contains_key(&spec.index))
            .unwrap_or(false)
    }

    /// Raw payload of a field, when present
    pub fn get_raw(&self, name: &str) -> Option<&[u8]> {
        let spec = self.schema.by_name(name)?;
        self.values.get(&spec.index).map(Vec::as_slice)
    }

    /// 1-byte integer field value
    pub fn get_u8(&self, name: &str) -> Option<u8> {
        self.get_raw(name).and_then(|p| p.first().copied())
    }

    /// 2-byte little-endian integer field value
    pub fn get_u16_le(&self, name: &str) -> Option<u16> {
        self.get_raw(name)
            .and_then(|p| <[u8; 2]>::try_from(p).ok())
            .map(u16::from_le_bytes)
    }

    /// 2-byte big-endian integer field value
    pub fn get_u16_be(&self, name: &str) -> Option<u16> {
        self.get_raw(name)
            .and_then(|p| <[u8; 2]>::try_from(p).ok())
            .map(u16::from_be_bytes)
    }

    /// 4-byte big-endian integer field value
    pub fn get_u32_be(&self, name: &str) -> Option<u32> {
        self.get_raw(name)
            .and_then(|p| <[u8; 4]>::try_from(p).ok())
            .map(u32::from_be_bytes)
    }

    /// String field value
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get_raw(name)
            .and_then(|p| std::str::from_utf8(p).ok())
    }

    /// 32-byte id field value
    pub fn get_id(&self, name: &str) -> Option<Id32> {
        self.get_raw(name)
            .and_then(|p| Id32::try_from_slice(p).ok())
    }
}
