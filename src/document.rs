//! A thin façade over the cross-reference engine, resolver, and writer.
//!
//! Opening a document locates its cross-reference table (falling back to
//! reconstruction if necessary), keeps the merged trailer dictionary, and
//! wraps the byte source in a [`crate::resolver::Resolver`] so object bodies
//! are fetched lazily on first dereference rather than up front.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::decoders::default_registry;
use crate::error::{Error, Result};
use crate::parser_config::{ParserOptions, WriterOptions};
use crate::resolver::Resolver;
use crate::value::{DictNode, PdfValue, Reference};
use crate::xref::{locate_and_parse_xref, CrossRefTable};

/// An open PDF file: its declared version, merged trailer, and a resolver
/// over its object graph.
pub struct PdfDocument {
    version: (u8, u8),
    trailer: DictNode,
    resolver: Resolver<BufReader<File>>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("xref_entries", &self.resolver.xref().len())
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Open a PDF document from a file path, using [`ParserOptions::default`]
    /// recovery behavior.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use pdf_graph::document::PdfDocument;
    ///
    /// let doc = PdfDocument::open("sample.pdf")?;
    /// println!("PDF version: {}.{}", doc.version().0, doc.version().1);
    /// # Ok::<(), pdf_graph::error::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, ParserOptions::default())
    }

    /// Open a PDF document, locating its cross-reference table under the
    /// recovery policy in `options`.
    ///
    /// This:
    /// 1. Opens the file and parses the `%PDF-x.y` header.
    /// 2. Locates and parses the cross-reference chain, falling back to
    ///    reconstruction when no valid xref can be found (see
    ///    [`crate::xref::locate_and_parse_xref`]).
    /// 3. Keeps the trailer dictionary merged across the `/Prev`/`/XRefStm`
    ///    chain, or synthesized by reconstruction.
    pub fn open_with_options(path: impl AsRef<Path>, options: ParserOptions) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);

        let version = parse_header(&mut reader)?;
        let registry = default_registry();
        let xref = locate_and_parse_xref(&mut reader, &options, &registry)?;
        let trailer = xref.trailer().cloned().ok_or(Error::XrefMissing)?;

        log::info!("opened PDF {}.{} with {} xref entries", version.0, version.1, xref.len());

        Ok(PdfDocument {
            version,
            trailer,
            resolver: Resolver::new(reader, xref, registry),
        })
    }

    /// The PDF version declared in the file header, as `(major, minor)`.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// The merged trailer dictionary.
    pub fn trailer(&self) -> &DictNode {
        &self.trailer
    }

    /// The cross-reference table located when the document was opened.
    pub fn xref(&self) -> &CrossRefTable {
        self.resolver.xref()
    }

    /// Resolve `reference` against this document's object graph.
    ///
    /// See [`Resolver::resolve`] for caching and cycle-detection behavior.
    pub fn resolve(&self, reference: Reference) -> Result<PdfValue> {
        self.resolver.resolve(reference)
    }

    /// Resolve `value` recursively, up to `max_depth` levels of indirection,
    /// leaving a reference unresolved where resolution fails.
    pub fn resolve_deep(&self, value: &PdfValue, max_depth: usize) -> PdfValue {
        self.resolver.resolve_deep(value, max_depth)
    }

    /// Resolve the document's `/Root` catalog dictionary.
    pub fn catalog(&self) -> Result<DictNode> {
        let root = self
            .trailer
            .get(b"Root")
            .ok_or_else(|| Error::XrefMalformed("trailer has no /Root entry".to_string()))?;
        let reference = root
            .as_reference()
            .ok_or_else(|| Error::type_mismatch("Indirect", root.type_name()))?;
        let value = self.resolve(reference)?;
        value
            .as_dict()
            .cloned()
            .ok_or_else(|| Error::type_mismatch("Dictionary", value.type_name()))
    }
}

/// Write `value` as a complete, standalone PDF document: objects, xref,
/// trailer, and `startxref`/`%%EOF`, per `options`.
pub fn write_document<W: Write>(destination: W, value: &PdfValue, options: &WriterOptions) -> Result<W> {
    crate::writer::write_document(destination, value, options)
}

/// Parse the `%PDF-x.y` header from a reader positioned at the start of a
/// PDF file.
///
/// # Example
///
/// ```rust
/// use std::io::Cursor;
/// # use pdf_graph::document::parse_header;
///
/// let data = b"%PDF-1.7\n";
/// let mut cursor = Cursor::new(data);
/// let (major, minor) = parse_header(&mut cursor).unwrap();
/// assert_eq!((major, minor), (1, 7));
/// ```
pub fn parse_header<R: Read + Seek>(reader: &mut R) -> Result<(u8, u8)> {
    reader.seek(SeekFrom::Start(0))?;

    let mut header = [0u8; 8];
    reader.read_exact(&mut header).map_err(|_| Error::XrefMalformed("file too short to contain a PDF header".to_string()))?;

    if &header[0..5] != b"%PDF-" {
        return Err(Error::XrefMalformed(format!("expected '%PDF-', found {:?}", String::from_utf8_lossy(&header[0..5]))));
    }

    if header[6] != b'.' {
        return Err(Error::XrefMalformed(format!("invalid version format: expected '.', found '{}'", header[6] as char)));
    }

    let major = header[5];
    let minor = header[7];

    if !major.is_ascii_digit() || !minor.is_ascii_digit() {
        return Err(Error::XrefMalformed(format!("invalid version: {}.{} (not digits)", major as char, minor as char)));
    }

    let major = major - b'0';
    let minor = minor - b'0';

    if major > 2 || (major == 0 && minor == 0) {
        return Err(Error::XrefMalformed(format!("unsupported PDF version {}.{}", major, minor)));
    }

    Ok((major, minor))
}
