//! The typed PDF value model: atoms, dictionaries, arrays, streams, and
//! the `Reference` handle that mediates indirection between them.
//!
//! Composite values (`Dictionary`, `Array`, `Stream`) are `Rc<RefCell<..>>`
//! handles rather than owned trees: PDF graphs are routinely cyclic (a page
//! points at its parent `Pages` node, which lists the page among its kids),
//! so ownership is modeled as shared identity plus an optional back-edge to
//! the `Reference` a value was (or will be) written under, not as a strict
//! tree.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use bytes::Bytes;
use indexmap::IndexMap;

/// A `/`-prefixed atom in its decoded (unescaped) byte form.
pub type PdfName = Vec<u8>;

/// An indirect-object handle: `object_number generation_number R`.
///
/// This is the lightweight identity used both as a dictionary/array child
/// (`PdfValue::Indirect`) and as the key for cross-reference lookups.
/// Location data (byte offset, containing object stream) lives in the
/// cross-reference engine's own entry type, not here, since a bare
/// `Reference` must be cheap to copy and hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    /// The object number. Zero is reserved for the free-list head.
    pub object_number: u32,
    /// The generation number. Defaults to zero for freshly allocated objects.
    pub generation_number: u16,
}

impl Reference {
    /// Construct a reference with the given identity.
    pub fn new(object_number: u32, generation_number: u16) -> Self {
        Reference {
            object_number,
            generation_number,
        }
    }

    /// The reference reserved for the head of the xref free list:
    /// `0 65535 R`, marked not-in-use.
    pub fn free_list_head() -> Self {
        Reference::new(0, 65535)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.object_number, self.generation_number)
    }
}

/// Which literal form a `String` value should prefer when written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringKind {
    /// `(raw bytes, parens balanced or escaped)`.
    Literal,
    /// `<hex digits>`.
    Hex,
}

/// An arbitrary-precision fixed-point PDF number: `mantissa * 10^-scale`.
///
/// PDF does not distinguish integers from reals at the syntax level, but an
/// integer-valued number must round-trip without a decimal point, and
/// byte-exact numeric forms matter for signed documents. A `f64` cannot make
/// either guarantee, so numbers are carried as a decimal mantissa/scale pair
/// instead.
#[derive(Debug, Clone, Copy)]
pub struct PdfNumber {
    mantissa: i64,
    scale: u8,
}

impl PdfNumber {
    /// An integer-valued number.
    pub fn integer(value: i64) -> Self {
        PdfNumber { mantissa: value, scale: 0 }
    }

    /// A number from an explicit mantissa/scale pair, normalizing away any
    /// trailing zero digits of the fractional part so that equal values
    /// compare equal regardless of how many trailing zeros the source text
    /// had.
    pub fn from_parts(mantissa: i64, scale: u8) -> Self {
        let mut n = PdfNumber { mantissa, scale };
        n.normalize();
        n
    }

    fn normalize(&mut self) {
        while self.scale > 0 && self.mantissa % 10 == 0 {
            self.mantissa /= 10;
            self.scale -= 1;
        }
    }

    /// Parse a PDF numeric literal (`123`, `-12`, `4.5`, `.5`, `-.5`, `+3`).
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let (sign, rest) = match text.as_bytes()[0] {
            b'-' => (-1i64, &text[1..]),
            b'+' => (1i64, &text[1..]),
            _ => (1i64, text),
        };
        if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
            return None;
        }
        let mut parts = rest.splitn(2, '.');
        let int_part = parts.next().unwrap_or("");
        let frac_part = parts.next();
        if parts.next().is_some() {
            return None;
        }
        if int_part.is_empty() && frac_part.map(|f| f.is_empty()).unwrap_or(true) {
            return None;
        }
        let digits: String = format!("{}{}", int_part, frac_part.unwrap_or(""));
        if digits.is_empty() {
            return Some(PdfNumber::integer(0));
        }
        let scale = frac_part.map(|f| f.len()).unwrap_or(0);
        if scale > u8::MAX as usize {
            return None;
        }
        let mantissa: i64 = digits.parse().ok()?;
        Some(PdfNumber::from_parts(sign * mantissa, scale as u8))
    }

    /// Whether this number has no fractional part.
    pub fn is_integer(&self) -> bool {
        self.scale == 0
    }

    /// The value as an `i64`, if it has no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        self.is_integer().then_some(self.mantissa)
    }

    /// The value as an `f64`, for callers that need approximate arithmetic.
    pub fn as_f64(&self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }

    /// Render the canonical PDF textual form: no decimal point for
    /// integer-valued numbers, otherwise a fixed-point form with no
    /// trailing zeros.
    pub fn to_pdf_string(&self) -> String {
        if self.scale == 0 {
            return self.mantissa.to_string();
        }
        let neg = self.mantissa < 0;
        let abs = self.mantissa.unsigned_abs();
        let scale = self.scale as usize;
        let digits = abs.to_string();
        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale - digits.len() + 1), digits)
        } else {
            digits
        };
        let split_at = padded.len() - scale;
        let (int_part, frac_part) = padded.split_at(split_at);
        let mut out = String::new();
        if neg {
            out.push('-');
        }
        out.push_str(int_part);
        out.push('.');
        out.push_str(frac_part);
        out
    }
}

impl PartialEq for PdfNumber {
    fn eq(&self, other: &Self) -> bool {
        self.mantissa == other.mantissa && self.scale == other.scale
    }
}

impl From<i64> for PdfNumber {
    fn from(value: i64) -> Self {
        PdfNumber::integer(value)
    }
}

impl From<f64> for PdfNumber {
    fn from(value: f64) -> Self {
        // Five decimal digits is the precision the writer's predecessor used
        // for real numbers; it is enough for page geometry and keeps the
        // mantissa well within i64 range.
        let scaled = (value * 100_000.0).round() as i64;
        PdfNumber::from_parts(scaled, 5)
    }
}

type BackRef = Rc<Cell<Option<Reference>>>;

fn new_back_ref() -> BackRef {
    Rc::new(Cell::new(None))
}

/// An insertion-ordered `Name -> PdfValue` mapping, shared by handle.
#[derive(Clone)]
pub struct DictNode {
    inner: Rc<RefCell<IndexMap<PdfName, PdfValue>>>,
    back_ref: BackRef,
}

impl DictNode {
    /// A new, empty dictionary with no assigned reference.
    pub fn new() -> Self {
        DictNode {
            inner: Rc::new(RefCell::new(IndexMap::new())),
            back_ref: new_back_ref(),
        }
    }

    /// Insert a key, preserving its original position if already present,
    /// appending at the end otherwise. Returns the previous value, if any.
    pub fn insert(&self, key: impl Into<PdfName>, value: PdfValue) -> Option<PdfValue> {
        self.inner.borrow_mut().insert(key.into(), value)
    }

    /// Look up a key's value.
    pub fn get(&self, key: &[u8]) -> Option<PdfValue> {
        self.inner.borrow().get(key).cloned()
    }

    /// Whether a key is present.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.inner.borrow().contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// Whether the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Snapshot the entries in insertion order.
    pub fn entries(&self) -> Vec<(PdfName, PdfValue)> {
        self.inner.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// The `Reference` this dictionary was read from, or has been assigned
    /// during a write pass, if any.
    pub fn reference(&self) -> Option<Reference> {
        self.back_ref.get()
    }

    /// Assign (or overwrite) the back-reference.
    pub fn set_reference(&self, reference: Reference) {
        self.back_ref.set(Some(reference));
    }

    /// Convenience: fetch `/Type` as a name, if present.
    pub fn type_name(&self) -> Option<PdfName> {
        match self.get(b"Type") {
            Some(PdfValue::Name(n)) => Some(n),
            _ => None,
        }
    }

    fn identity(&self) -> *const RefCell<IndexMap<PdfName, PdfValue>> {
        Rc::as_ptr(&self.inner)
    }
}

impl Default for DictNode {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for DictNode {
    fn eq(&self, other: &Self) -> bool {
        if self.identity() == other.identity() {
            return true;
        }
        *self.inner.borrow() == *other.inner.borrow()
    }
}

impl fmt::Debug for DictNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictNode")
            .field("entries", &self.inner.borrow().len())
            .field("reference", &self.reference())
            .finish()
    }
}

/// An ordered sequence of `PdfValue`, shared by handle.
#[derive(Clone)]
pub struct ArrayNode {
    inner: Rc<RefCell<Vec<PdfValue>>>,
    back_ref: BackRef,
}

impl ArrayNode {
    /// A new, empty array with no assigned reference.
    pub fn new() -> Self {
        ArrayNode {
            inner: Rc::new(RefCell::new(Vec::new())),
            back_ref: new_back_ref(),
        }
    }

    /// Build an array from an existing `Vec`.
    pub fn from_vec(values: Vec<PdfValue>) -> Self {
        ArrayNode {
            inner: Rc::new(RefCell::new(values)),
            back_ref: new_back_ref(),
        }
    }

    /// Append a value.
    pub fn push(&self, value: PdfValue) {
        self.inner.borrow_mut().push(value);
    }

    /// Fetch the element at `index`.
    pub fn get(&self, index: usize) -> Option<PdfValue> {
        self.inner.borrow().get(index).cloned()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// Whether the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Snapshot the elements in order.
    pub fn elements(&self) -> Vec<PdfValue> {
        self.inner.borrow().clone()
    }

    /// The `Reference` this array was read from, or assigned during write.
    pub fn reference(&self) -> Option<Reference> {
        self.back_ref.get()
    }

    /// Assign (or overwrite) the back-reference.
    pub fn set_reference(&self, reference: Reference) {
        self.back_ref.set(Some(reference));
    }

    fn identity(&self) -> *const RefCell<Vec<PdfValue>> {
        Rc::as_ptr(&self.inner)
    }
}

impl Default for ArrayNode {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ArrayNode {
    fn eq(&self, other: &Self) -> bool {
        if self.identity() == other.identity() {
            return true;
        }
        *self.inner.borrow() == *other.inner.borrow()
    }
}

impl fmt::Debug for ArrayNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayNode")
            .field("len", &self.inner.borrow().len())
            .field("reference", &self.reference())
            .finish()
    }
}

struct StreamData {
    raw: Bytes,
    decoded: Option<Bytes>,
}

/// A `Dictionary` plus raw (and, once decoded, materialized) byte content.
#[derive(Clone)]
pub struct StreamNode {
    /// The stream's dictionary, e.g. carrying `/Length`, `/Filter`.
    pub dict: DictNode,
    data: Rc<RefCell<StreamData>>,
    back_ref: BackRef,
}

impl StreamNode {
    /// Build a stream from its dictionary and raw (still-encoded) bytes.
    pub fn new(dict: DictNode, raw: Bytes) -> Self {
        StreamNode {
            dict,
            data: Rc::new(RefCell::new(StreamData { raw, decoded: None })),
            back_ref: new_back_ref(),
        }
    }

    /// The raw, still-filtered bytes as read from (or set for) the stream.
    pub fn raw_bytes(&self) -> Bytes {
        self.data.borrow().raw.clone()
    }

    /// Replace the raw bytes, invalidating any cached decoded bytes.
    pub fn set_raw_bytes(&self, raw: Bytes) {
        let mut data = self.data.borrow_mut();
        data.raw = raw;
        data.decoded = None;
    }

    /// The decoded bytes, if a decode pass has populated them.
    pub fn decoded_bytes(&self) -> Option<Bytes> {
        self.data.borrow().decoded.clone()
    }

    /// Cache the result of decoding this stream's filter chain.
    pub fn set_decoded_bytes(&self, decoded: Bytes) {
        self.data.borrow_mut().decoded = Some(decoded);
    }

    /// The `Reference` this stream was read from, or assigned during write.
    pub fn reference(&self) -> Option<Reference> {
        self.back_ref.get()
    }

    /// Assign (or overwrite) the back-reference.
    pub fn set_reference(&self, reference: Reference) {
        self.back_ref.set(Some(reference));
    }

    fn identity(&self) -> *const RefCell<StreamData> {
        Rc::as_ptr(&self.data)
    }
}

impl PartialEq for StreamNode {
    fn eq(&self, other: &Self) -> bool {
        if self.identity() == other.identity() {
            return true;
        }
        self.dict == other.dict && self.raw_bytes() == other.raw_bytes()
    }
}

impl fmt::Debug for StreamNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamNode")
            .field("dict", &self.dict)
            .field("raw_len", &self.data.borrow().raw.len())
            .field("reference", &self.reference())
            .finish()
    }
}

/// A PDF value of any kind: an atom, a composite, or an unresolved
/// indirect-object placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    /// The PDF `null` keyword.
    Null,
    /// `true` / `false`.
    Boolean(bool),
    /// An arbitrary-precision fixed-point number.
    Number(PdfNumber),
    /// A `/Name` atom in decoded byte form.
    Name(PdfName),
    /// A string, with the literal-vs-hex form the writer should prefer.
    String(Vec<u8>, StringKind),
    /// An ordered sequence of values.
    Array(ArrayNode),
    /// An insertion-ordered mapping from names to values.
    Dictionary(DictNode),
    /// A dictionary plus raw (and optionally decoded) byte content.
    Stream(StreamNode),
    /// A placeholder resolved lazily through the object resolver.
    Indirect(Reference),
}

impl PdfValue {
    /// Whether this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, PdfValue::Null)
    }

    /// View as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PdfValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// View as a number.
    pub fn as_number(&self) -> Option<PdfNumber> {
        match self {
            PdfValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// View as an integer, if this is an integer-valued number.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().and_then(|n| n.as_i64())
    }

    /// View as a name's decoded bytes.
    pub fn as_name(&self) -> Option<&[u8]> {
        match self {
            PdfValue::Name(n) => Some(n),
            _ => None,
        }
    }

    /// View as a name decoded as UTF-8, for the (overwhelmingly common) case
    /// of ASCII-only PDF names.
    pub fn as_name_str(&self) -> Option<&str> {
        self.as_name().and_then(|n| std::str::from_utf8(n).ok())
    }

    /// View as string bytes, regardless of literal/hex form.
    pub fn as_string_bytes(&self) -> Option<&[u8]> {
        match self {
            PdfValue::String(bytes, _) => Some(bytes),
            _ => None,
        }
    }

    /// View as a dictionary, unwrapping a stream's dictionary too.
    pub fn as_dict(&self) -> Option<&DictNode> {
        match self {
            PdfValue::Dictionary(d) => Some(d),
            PdfValue::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// View as an array.
    pub fn as_array(&self) -> Option<&ArrayNode> {
        match self {
            PdfValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// View as a stream.
    pub fn as_stream(&self) -> Option<&StreamNode> {
        match self {
            PdfValue::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// View as an indirect-object reference.
    pub fn as_reference(&self) -> Option<Reference> {
        match self {
            PdfValue::Indirect(r) => Some(*r),
            _ => None,
        }
    }

    /// The back-reference a composite value carries, if this is a
    /// `Dictionary`, `Array`, or `Stream` that has one.
    pub fn back_reference(&self) -> Option<Reference> {
        match self {
            PdfValue::Dictionary(d) => d.reference(),
            PdfValue::Array(a) => a.reference(),
            PdfValue::Stream(s) => s.reference(),
            _ => None,
        }
    }

    /// Assign a back-reference to a composite value. A no-op for atoms.
    pub fn set_back_reference(&self, reference: Reference) {
        match self {
            PdfValue::Dictionary(d) => d.set_reference(reference),
            PdfValue::Array(a) => a.set_reference(reference),
            PdfValue::Stream(s) => s.set_reference(reference),
            _ => {}
        }
    }

    /// A human-readable variant name, for `TypeMismatch` errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            PdfValue::Null => "Null",
            PdfValue::Boolean(_) => "Boolean",
            PdfValue::Number(_) => "Number",
            PdfValue::Name(_) => "Name",
            PdfValue::String(..) => "String",
            PdfValue::Array(_) => "Array",
            PdfValue::Dictionary(_) => "Dictionary",
            PdfValue::Stream(_) => "Stream",
            PdfValue::Indirect(_) => "Indirect",
        }
    }

    /// Whether a child of this kind must be indirected (given its own
    /// reference and queued for top-level emission) rather than inlined
    /// when it appears inside a dictionary or array during a write pass.
    pub fn requires_indirection(&self) -> bool {
        matches!(self, PdfValue::Dictionary(_) | PdfValue::Array(_) | PdfValue::Stream(_))
    }
}
