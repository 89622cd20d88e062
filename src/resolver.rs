//! Object resolver: turns a [`Reference`] into the [`PdfValue`] it names.
//!
//! Resolution is lazy and cached: the first dereference of a given
//! `(object_number, generation_number)` pair seeks into the byte source (or
//! decodes the containing object stream) and parses the value; every
//! subsequent dereference of the same identity returns the cached instance,
//! which is what gives the object graph its shared identity under repeated
//! references.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek, SeekFrom};

use crate::decoders::FilterRegistry;
use crate::error::{Error, Result};
use crate::value::{PdfValue, Reference};
use crate::xref::{CrossRefTable, XRefEntryKind};

/// Resolves indirect references against a byte source and a cross-reference
/// table, caching results by object identity.
pub struct Resolver<R: Read + Seek> {
    reader: RefCell<R>,
    xref: CrossRefTable,
    registry: FilterRegistry,
    cache: RefCell<HashMap<(u32, u16), PdfValue>>,
    resolving: RefCell<HashSet<(u32, u16)>>,
    objstm_cache: RefCell<HashMap<u32, HashMap<u32, PdfValue>>>,
}

impl<R: Read + Seek> Resolver<R> {
    /// Build a resolver over `reader`, given its already-located
    /// cross-reference table.
    pub fn new(reader: R, xref: CrossRefTable, registry: FilterRegistry) -> Self {
        Resolver {
            reader: RefCell::new(reader),
            xref,
            registry,
            cache: RefCell::new(HashMap::new()),
            resolving: RefCell::new(HashSet::new()),
            objstm_cache: RefCell::new(HashMap::new()),
        }
    }

    /// The cross-reference table this resolver was built from.
    pub fn xref(&self) -> &CrossRefTable {
        &self.xref
    }

    /// Resolve `reference` to its value.
    ///
    /// Returns [`Error::UnresolvedReference`] when the object number has no
    /// xref entry, is marked free, or fails to parse. A failure resolving one
    /// object inside a compressed object stream does not poison resolution
    /// of the other objects in that stream or anywhere else in the document.
    pub fn resolve(&self, reference: Reference) -> Result<PdfValue> {
        let key = (reference.object_number, reference.generation_number);

        if let Some(cached) = self.cache.borrow().get(&key) {
            return Ok(cached.clone());
        }

        if self.resolving.borrow().contains(&key) {
            log::debug!("cycle detected resolving {} {} R; returning placeholder", key.0, key.1);
            return Ok(PdfValue::Null);
        }

        let entry = self
            .xref
            .get(reference.object_number)
            .ok_or(Error::UnresolvedReference(reference.object_number, reference.generation_number))?;

        if !entry.is_in_use() {
            return Err(Error::UnresolvedReference(reference.object_number, reference.generation_number));
        }

        self.resolving.borrow_mut().insert(key);

        let result = match entry.kind {
            XRefEntryKind::Uncompressed => self.load_uncompressed(reference, entry.byte_offset),
            XRefEntryKind::Compressed => self.load_compressed(reference, entry.stream_object_number, entry.index_in_stream),
            XRefEntryKind::Free => Err(Error::UnresolvedReference(reference.object_number, reference.generation_number)),
        };

        self.resolving.borrow_mut().remove(&key);

        if let Ok(ref value) = result {
            self.cache.borrow_mut().insert(key, value.clone());
        }

        result
    }

    fn load_uncompressed(&self, reference: Reference, offset: u64) -> Result<PdfValue> {
        let mut reader = self.reader.borrow_mut();
        reader.seek(SeekFrom::Start(offset))?;

        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        drop(reader);

        let (found_reference, value) = crate::parser::parse_indirect_object(&content)?;

        if found_reference.object_number != reference.object_number {
            log::warn!(
                "xref offset {} for object {} actually holds object {}",
                offset,
                reference.object_number,
                found_reference.object_number
            );
        }

        Ok(value)
    }

    fn load_compressed(&self, reference: Reference, stream_object_number: u32, index_in_stream: u32) -> Result<PdfValue> {
        if let Some(objects) = self.objstm_cache.borrow().get(&stream_object_number) {
            return objects
                .get(&reference.object_number)
                .cloned()
                .ok_or(Error::UnresolvedReference(reference.object_number, reference.generation_number));
        }

        let stream_entry = self
            .xref
            .get(stream_object_number)
            .ok_or(Error::UnresolvedReference(reference.object_number, reference.generation_number))?;

        if stream_entry.kind != XRefEntryKind::Uncompressed {
            return Err(Error::ObjectStreamMalformed(format!("object stream {} is not itself an uncompressed object", stream_object_number)));
        }

        let stream_value = self.load_uncompressed(Reference::new(stream_object_number, 0), stream_entry.byte_offset)?;
        let stream = stream_value
            .as_stream()
            .ok_or_else(|| Error::ObjectStreamMalformed(format!("object {} referenced as an object stream is not a stream", stream_object_number)))?;

        let objects = crate::objstm::parse_object_stream(stream, &self.registry)?;

        let value = objects
            .get(&reference.object_number)
            .cloned()
            .ok_or(Error::UnresolvedReference(reference.object_number, reference.generation_number));

        log::debug!("decoded object stream {} holding {} objects, wanted index {}", stream_object_number, objects.len(), index_in_stream);

        self.objstm_cache.borrow_mut().insert(stream_object_number, objects);

        value
    }

    /// Recursively resolve every [`PdfValue::Indirect`] reached from `value`,
    /// up to `max_depth` levels, leaving references unresolved where a
    /// resolution fails rather than propagating the error.
    pub fn resolve_deep(&self, value: &PdfValue, max_depth: usize) -> PdfValue {
        if max_depth == 0 {
            return value.clone();
        }

        match value {
            PdfValue::Indirect(reference) => match self.resolve(*reference) {
                Ok(resolved) => self.resolve_deep(&resolved, max_depth - 1),
                Err(e) => {
                    log::warn!("failed to resolve reference {}: {}", reference, e);
                    value.clone()
                },
            },
            PdfValue::Dictionary(dict) => {
                let resolved = crate::value::DictNode::new();
                for (k, v) in dict.entries() {
                    resolved.insert(k, self.resolve_deep(&v, max_depth - 1));
                }
                PdfValue::Dictionary(resolved)
            },
            PdfValue::Array(arr) => {
                let resolved = crate::value::ArrayNode::new();
                for v in arr.elements() {
                    resolved.push(self.resolve_deep(&v, max_depth - 1));
                }
                PdfValue::Array(resolved)
            },
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xref::XRefEntry;
    use std::io::Cursor;

    fn registry() -> FilterRegistry {
        crate::decoders::default_registry()
    }

    #[test]
    fn resolves_uncompressed_object() {
        let data = b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n";
        let mut xref = CrossRefTable::new();
        xref.add_entry(1, XRefEntry::uncompressed(0, 0));

        let resolver = Resolver::new(Cursor::new(data.to_vec()), xref, registry());
        let value = resolver.resolve(Reference::new(1, 0)).unwrap();
        let dict = value.as_dict().unwrap();
        assert_eq!(dict.get(b"Type").unwrap().as_name(), Some(&b"Catalog"[..]));
    }

    #[test]
    fn caches_repeated_resolution() {
        let data = b"1 0 obj\n<< /Count 1 >>\nendobj\n";
        let mut xref = CrossRefTable::new();
        xref.add_entry(1, XRefEntry::uncompressed(0, 0));

        let resolver = Resolver::new(Cursor::new(data.to_vec()), xref, registry());
        let first = resolver.resolve(Reference::new(1, 0)).unwrap();
        let second = resolver.resolve(Reference::new(1, 0)).unwrap();
        assert_eq!(first.as_dict().unwrap().get(b"Count"), second.as_dict().unwrap().get(b"Count"));
    }

    #[test]
    fn unknown_object_number_is_unresolved() {
        let xref = CrossRefTable::new();
        let resolver = Resolver::new(Cursor::new(Vec::new()), xref, registry());
        let err = resolver.resolve(Reference::new(99, 0)).unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference(99, 0)));
    }

    #[test]
    fn free_entry_is_unresolved() {
        let mut xref = CrossRefTable::new();
        xref.add_entry(5, XRefEntry::free(0, 65535));
        let resolver = Resolver::new(Cursor::new(Vec::new()), xref, registry());
        let err = resolver.resolve(Reference::new(5, 0)).unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference(5, 0)));
    }

    #[test]
    fn self_referential_dictionary_does_not_recurse_forever() {
        let data = b"1 0 obj\n<< /Self 1 0 R >>\nendobj\n";
        let mut xref = CrossRefTable::new();
        xref.add_entry(1, XRefEntry::uncompressed(0, 0));

        let resolver = Resolver::new(Cursor::new(data.to_vec()), xref, registry());
        let value = resolver.resolve(Reference::new(1, 0)).unwrap();
        let resolved = resolver.resolve_deep(&value, 10);
        assert!(resolved.as_dict().is_some());
    }

    #[test]
    fn resolves_object_from_object_stream() {
        let pairs = b"10 0";
        let body = b"<< /Type /Page >>";
        let mut stream_body = Vec::new();
        stream_body.extend_from_slice(pairs);
        stream_body.push(b' ');
        stream_body.extend_from_slice(body);

        let mut data = Vec::new();
        data.extend_from_slice(format!("2 0 obj\n<< /Type /ObjStm /N 1 /First {} >>\nstream\n", pairs.len() + 1).as_bytes());
        data.extend_from_slice(&stream_body);
        data.extend_from_slice(b"\nendstream\nendobj\n");

        let mut xref = CrossRefTable::new();
        xref.add_entry(2, XRefEntry::uncompressed(0, 0));
        xref.add_entry(10, XRefEntry::compressed(2, 0));

        let resolver = Resolver::new(Cursor::new(data), xref, registry());
        let value = resolver.resolve(Reference::new(10, 0)).unwrap();
        assert_eq!(value.as_dict().unwrap().get(b"Type").unwrap().as_name(), Some(&b"Page"[..]));
        assert_eq!(resolver.xref().get(10).unwrap().stream_object_number, 2);
    }
}
