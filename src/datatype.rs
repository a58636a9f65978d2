//! Primitive type tags, layout math and typed runtime values.
//!
//! A property's declared type is a `(TypeTag, size)` pair: the tag names
//! the primitive kind and the size is the stored width in bytes (the
//! element width for `Blob` and `String`, the numeric width for the
//! numeric tags, the pointer width for `StringPtr`).
//!
//! The pure functions [`alignment`], [`member_offset`] and
//! [`TypeTag::typename`] are the sole mechanism for deriving instance
//! layouts: entity sizes and member offsets are computed by sweeping
//! members in declaration order through [`member_offset`].
//!
//! Runtime data is held in tagged values: an [`Element`] is a single
//! typed value, a [`Buffer`] a homogeneous array of them, and a
//! [`PropertyValue`] either an inline scalar or a heap buffer with a
//! shape. The scalar/array split mirrors the two storage forms an
//! instance block uses (value in place vs pointer to heap) and is
//! observable through the instance accessors.

// used to print out readable forms of values
use std::fmt;

use crate::error::{DLiteError, Result};

/// Width of a pointer slot, used for the heap storage form and for
/// `StringPtr` values.
pub const POINTER_SIZE: usize = std::mem::size_of::<*const u8>();

// ------------- TypeTag -------------
/// The closed set of primitive kinds a property can have.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// Opaque bytes of a schema-chosen width.
    Blob,
    Bool,
    Int,
    UInt,
    Float,
    /// Fixed-width string stored inline, NUL-terminated.
    String,
    /// Owned variable-length string, stored by reference.
    StringPtr,
}

impl TypeTag {
    /// Stable human-readable name of the tag.
    pub fn typename(self) -> &'static str {
        match self {
            TypeTag::Blob => "blob",
            TypeTag::Bool => "boolean",
            TypeTag::Int => "integer",
            TypeTag::UInt => "unsigned_integer",
            TypeTag::Float => "float",
            TypeTag::String => "string",
            TypeTag::StringPtr => "string_pointer",
        }
    }

    /// Parses a type name. Accepts the canonical names from
    /// [`TypeTag::typename`] as well as the short aliases used in
    /// persisted schemas (`bool`, `int`, `uint`, `string-pointer`).
    pub fn from_typename(name: &str) -> Result<TypeTag> {
        match name {
            "blob" => Ok(TypeTag::Blob),
            "bool" | "boolean" => Ok(TypeTag::Bool),
            "int" | "integer" => Ok(TypeTag::Int),
            "uint" | "unsigned_integer" => Ok(TypeTag::UInt),
            "float" => Ok(TypeTag::Float),
            "string" => Ok(TypeTag::String),
            "string-pointer" | "string_pointer" => Ok(TypeTag::StringPtr),
            _ => Err(DLiteError::Schema(format!("unknown type name: '{name}'"))),
        }
    }

    /// The natural stored width for tags that have one. `Blob` and
    /// `String` widths are chosen by the schema and have no default.
    pub fn default_size(self) -> Option<usize> {
        match self {
            TypeTag::Bool => Some(1),
            TypeTag::Int | TypeTag::UInt | TypeTag::Float => Some(8),
            TypeTag::StringPtr => Some(POINTER_SIZE),
            TypeTag::Blob | TypeTag::String => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.typename())
    }
}

/// Checks that `size` is a width the tag can be stored with.
pub fn check_size(tag: TypeTag, size: usize) -> Result<()> {
    let ok = match tag {
        TypeTag::Blob | TypeTag::String => size >= 1,
        TypeTag::Bool => size == 1,
        TypeTag::Int | TypeTag::UInt => matches!(size, 1 | 2 | 4 | 8),
        TypeTag::Float => matches!(size, 4 | 8),
        TypeTag::StringPtr => size == POINTER_SIZE,
    };
    if ok {
        Ok(())
    } else {
        Err(DLiteError::Schema(format!(
            "invalid size {size} for type {}",
            tag.typename()
        )))
    }
}

// ------------- Layout math -------------

/// Natural alignment for a stored value of the given kind and width.
/// Byte-granular kinds align to one, numerics to their width and
/// `StringPtr` to the pointer width.
pub fn alignment(tag: TypeTag, size: usize) -> usize {
    match tag {
        TypeTag::Blob | TypeTag::String | TypeTag::Bool => 1,
        TypeTag::Int | TypeTag::UInt | TypeTag::Float => size,
        TypeTag::StringPtr => POINTER_SIZE,
    }
}

/// Rounds `offset` up to the next multiple of `align`.
pub fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) & !(align - 1)
}

/// Returns the offset of a member of kind `(tag, size)` that follows a
/// member occupying `prev_size` bytes at `prev_offset`.
pub fn member_offset(prev_offset: usize, prev_size: usize, tag: TypeTag, size: usize) -> usize {
    align_up(prev_offset + prev_size, alignment(tag, size))
}

/// How a property is stored inside an instance block: scalars live
/// inline at their declared width, arrays as a pointer to a heap buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageForm {
    Inline { tag: TypeTag, size: usize },
    Pointer,
}

impl StorageForm {
    /// Bytes the member occupies inside the instance block.
    pub fn size(self) -> usize {
        match self {
            StorageForm::Inline { size, .. } => size,
            StorageForm::Pointer => POINTER_SIZE,
        }
    }

    /// Natural alignment of the member inside the instance block.
    pub fn alignment(self) -> usize {
        match self {
            StorageForm::Inline { tag, size } => alignment(tag, size),
            StorageForm::Pointer => POINTER_SIZE,
        }
    }
}

// ------------- Runtime values -------------

/// A single typed value.
#[derive(Clone, Debug, PartialEq)]
pub enum Element {
    Blob(Vec<u8>),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    StringPtr(String),
}

impl Element {
    /// The tag this element belongs to.
    pub fn tag(&self) -> TypeTag {
        match self {
            Element::Blob(_) => TypeTag::Blob,
            Element::Bool(_) => TypeTag::Bool,
            Element::Int(_) => TypeTag::Int,
            Element::UInt(_) => TypeTag::UInt,
            Element::Float(_) => TypeTag::Float,
            Element::String(_) => TypeTag::String,
            Element::StringPtr(_) => TypeTag::StringPtr,
        }
    }

    /// The zero value for `(tag, size)`, used when an instance is created.
    pub fn zero(tag: TypeTag, size: usize) -> Element {
        match tag {
            TypeTag::Blob => Element::Blob(vec![0; size]),
            TypeTag::Bool => Element::Bool(false),
            TypeTag::Int => Element::Int(0),
            TypeTag::UInt => Element::UInt(0),
            TypeTag::Float => Element::Float(0.0),
            TypeTag::String => Element::String(String::new()),
            TypeTag::StringPtr => Element::StringPtr(String::new()),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Element::Blob(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Element::Bool(v) => write!(f, "{v}"),
            Element::Int(v) => write!(f, "{v}"),
            Element::UInt(v) => write!(f, "{v}"),
            Element::Float(v) => write!(f, "{v}"),
            Element::String(v) | Element::StringPtr(v) => write!(f, "{v}"),
        }
    }
}

/// A homogeneous heap buffer of elements. String buffers own every
/// element, so dropping the buffer drops each string it holds.
#[derive(Clone, Debug, PartialEq)]
pub enum Buffer {
    /// `data.len() == nmemb * width`.
    Blob { width: usize, data: Vec<u8> },
    Bool(Vec<bool>),
    Int(Vec<i64>),
    UInt(Vec<u64>),
    Float(Vec<f64>),
    String { width: usize, data: Vec<String> },
    StringPtr(Vec<String>),
}

impl Buffer {
    /// A zero-initialised buffer of `nmemb` elements of `(tag, size)`.
    pub fn zeroed(tag: TypeTag, size: usize, nmemb: usize) -> Buffer {
        match tag {
            TypeTag::Blob => Buffer::Blob { width: size, data: vec![0; nmemb * size] },
            TypeTag::Bool => Buffer::Bool(vec![false; nmemb]),
            TypeTag::Int => Buffer::Int(vec![0; nmemb]),
            TypeTag::UInt => Buffer::UInt(vec![0; nmemb]),
            TypeTag::Float => Buffer::Float(vec![0.0; nmemb]),
            TypeTag::String => Buffer::String { width: size, data: vec![String::new(); nmemb] },
            TypeTag::StringPtr => Buffer::StringPtr(vec![String::new(); nmemb]),
        }
    }

    /// Collects elements into a buffer. Every element must carry `tag`
    /// and blob elements must have exactly `size` bytes.
    pub fn from_elements(tag: TypeTag, size: usize, elements: Vec<Element>) -> Result<Buffer> {
        let mismatch = |e: &Element| {
            DLiteError::Schema(format!(
                "expected elements of type {}, got {}",
                tag.typename(),
                e.tag().typename()
            ))
        };
        match tag {
            TypeTag::Blob => {
                let mut data = Vec::with_capacity(elements.len() * size);
                for e in &elements {
                    match e {
                        Element::Blob(b) if b.len() == size => data.extend_from_slice(b),
                        Element::Blob(b) => {
                            return Err(DLiteError::Schema(format!(
                                "blob element has {} bytes (expected {size})",
                                b.len()
                            )))
                        }
                        other => return Err(mismatch(other)),
                    }
                }
                Ok(Buffer::Blob { width: size, data })
            }
            TypeTag::Bool => elements
                .iter()
                .map(|e| match e {
                    Element::Bool(v) => Ok(*v),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<_>>()
                .map(Buffer::Bool),
            TypeTag::Int => elements
                .iter()
                .map(|e| match e {
                    Element::Int(v) => Ok(*v),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<_>>()
                .map(Buffer::Int),
            TypeTag::UInt => elements
                .iter()
                .map(|e| match e {
                    Element::UInt(v) => Ok(*v),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<_>>()
                .map(Buffer::UInt),
            TypeTag::Float => elements
                .iter()
                .map(|e| match e {
                    Element::Float(v) => Ok(*v),
                    other => Err(mismatch(other)),
                })
                .collect::<Result<_>>()
                .map(Buffer::Float),
            TypeTag::String => elements
                .into_iter()
                .map(|e| match e {
                    Element::String(v) => Ok(v),
                    other => Err(mismatch(&other)),
                })
                .collect::<Result<_>>()
                .map(|data| Buffer::String { width: size, data }),
            TypeTag::StringPtr => elements
                .into_iter()
                .map(|e| match e {
                    Element::StringPtr(v) => Ok(v),
                    other => Err(mismatch(&other)),
                })
                .collect::<Result<_>>()
                .map(Buffer::StringPtr),
        }
    }

    /// The tag of the buffered elements.
    pub fn tag(&self) -> TypeTag {
        match self {
            Buffer::Blob { .. } => TypeTag::Blob,
            Buffer::Bool(_) => TypeTag::Bool,
            Buffer::Int(_) => TypeTag::Int,
            Buffer::UInt(_) => TypeTag::UInt,
            Buffer::Float(_) => TypeTag::Float,
            Buffer::String { .. } => TypeTag::String,
            Buffer::StringPtr(_) => TypeTag::StringPtr,
        }
    }

    /// Number of buffered elements.
    pub fn len(&self) -> usize {
        match self {
            Buffer::Blob { width, data } => {
                if *width == 0 { 0 } else { data.len() / width }
            }
            Buffer::Bool(v) => v.len(),
            Buffer::Int(v) => v.len(),
            Buffer::UInt(v) => v.len(),
            Buffer::Float(v) => v.len(),
            Buffer::String { data, .. } => data.len(),
            Buffer::StringPtr(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of the `i`-th element.
    pub fn element(&self, i: usize) -> Element {
        match self {
            Buffer::Blob { width, data } => Element::Blob(data[i * width..(i + 1) * width].to_vec()),
            Buffer::Bool(v) => Element::Bool(v[i]),
            Buffer::Int(v) => Element::Int(v[i]),
            Buffer::UInt(v) => Element::UInt(v[i]),
            Buffer::Float(v) => Element::Float(v[i]),
            Buffer::String { data, .. } => Element::String(data[i].clone()),
            Buffer::StringPtr(v) => Element::StringPtr(v[i].clone()),
        }
    }
}

/// A property's runtime value: inline scalar or heap array.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Scalar(Element),
    Array { shape: Vec<usize>, data: Buffer },
}

impl PropertyValue {
    pub fn tag(&self) -> TypeTag {
        match self {
            PropertyValue::Scalar(e) => e.tag(),
            PropertyValue::Array { data, .. } => data.tag(),
        }
    }

    /// Runtime shape; scalars have the empty shape.
    pub fn shape(&self) -> &[usize] {
        match self {
            PropertyValue::Scalar(_) => &[],
            PropertyValue::Array { shape, .. } => shape,
        }
    }
}
