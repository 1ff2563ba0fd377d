//! Property descriptors: applying them to a sink, and building them from Rust values.

use engine::PropertySink;
use error::BridgeError;
use ffi::{AiMatrix4x4, AiProperty, AiPropertyKind};
use libc::c_void;
use std::ffi::{CStr, CString};

/// A few well-known engine configuration keys.
pub mod keys {
    pub const GLOBAL_SCALE_FACTOR: &str = "GLOBAL_SCALE_FACTOR";
    pub const PP_SBP_REMOVE: &str = "PP_SBP_REMOVE";
    pub const PP_SLM_VERTEX_LIMIT: &str = "PP_SLM_VERTEX_LIMIT";
    pub const PP_PTV_ROOT_TRANSFORMATION: &str = "PP_PTV_ROOT_TRANSFORMATION";
    pub const PP_PTV_ADD_ROOT_TRANSFORMATION: &str = "PP_PTV_ADD_ROOT_TRANSFORMATION";
    pub const IMPORT_FBX_READ_ANIMATIONS: &str = "IMPORT_FBX_READ_ANIMATIONS";
    pub const IMPORT_NO_SKELETON_MESHES: &str = "IMPORT_NO_SKELETON_MESHES";
    pub const FAVOUR_SPEED: &str = "FAVOUR_SPEED";
}

/// Applies each descriptor to `sink`, in order.
///
/// Descriptors with a null name, an unknown kind or a null matrix pointer are skipped without
/// signalling anything; whatever was applied before stays applied.
pub fn apply_properties<S: PropertySink + ?Sized>(sink: &mut S, properties: &[AiProperty]) {
    for (index, p) in properties.iter().enumerate() {
        if p.name.is_null() {
            debug!("property #{}: null name, skipped", index);
            continue;
        }
        let name = unsafe { CStr::from_ptr(p.name) };
        match AiPropertyKind::from_raw(p.kind) {
            Some(AiPropertyKind::Integer) => sink.set_property_integer(name, p.int_value),
            Some(AiPropertyKind::Boolean) => sink.set_property_bool(name, p.int_value != 0),
            Some(AiPropertyKind::Float) => sink.set_property_float(name, p.float_value),
            Some(AiPropertyKind::String) => {
                let value = if p.string_value.is_null() {
                    Default::default()
                } else {
                    unsafe { CStr::from_ptr(p.string_value) }
                };
                sink.set_property_string(name, value)
            }
            Some(AiPropertyKind::Matrix4x4) => {
                let matrix = p.matrix_value as *const AiMatrix4x4;
                match unsafe { matrix.as_ref() } {
                    Some(m) => sink.set_property_matrix(name, m),
                    None => debug!("property {:?}: null matrix, skipped", name),
                }
            }
            None => debug!("property {:?}: unknown kind {}, skipped", name, p.kind),
        }
    }
}

/// Borrows `count` descriptors from a C array. Null or zero-length gives an empty slice.
pub unsafe fn descriptors_from_raw<'a>(props: *const AiProperty, count: usize) -> &'a [AiProperty] {
    if props.is_null() || count == 0 {
        &[]
    } else {
        ::std::slice::from_raw_parts(props, count)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Integer(i32),
    Float(f32),
    Boolean(bool),
    String(String),
    Matrix(AiMatrix4x4),
}

#[derive(Debug)]
enum StoredValue {
    Integer(i32),
    Float(f32),
    Boolean(bool),
    String(CString),
    // boxed so descriptor pointers survive the entries vector growing
    Matrix(Box<AiMatrix4x4>),
}

#[derive(Debug)]
struct Entry {
    name: CString,
    value: StoredValue,
}

/// Owned storage for a set of properties, handing out descriptors that point into it.
#[derive(Debug, Default)]
pub struct PropertyList {
    entries: Vec<Entry>,
}

impl PropertyList {
    pub fn new() -> PropertyList {
        PropertyList { entries: Vec::new() }
    }

    /// Appends a property. Names and string values must not contain NUL bytes.
    pub fn set<S: Into<String>>(
        &mut self,
        name: S,
        value: PropertyValue,
    ) -> Result<&mut PropertyList, BridgeError> {
        let name = name.into();
        let c_name = CString::new(name.as_bytes())
            .map_err(|_| BridgeError::InvalidProperty(format!("name {:?} contains NUL", name)))?;
        let value = match value {
            PropertyValue::Integer(v) => StoredValue::Integer(v),
            PropertyValue::Float(v) => StoredValue::Float(v),
            PropertyValue::Boolean(v) => StoredValue::Boolean(v),
            PropertyValue::String(s) => StoredValue::String(CString::new(s).map_err(|_| {
                BridgeError::InvalidProperty(format!("value of {:?} contains NUL", name))
            })?),
            PropertyValue::Matrix(m) => StoredValue::Matrix(Box::new(m)),
        };
        self.entries.push(Entry { name: c_name, value });
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Descriptors borrowing this list's storage; they dangle once the list is modified or
    /// dropped.
    pub fn descriptors(&self) -> Vec<AiProperty> {
        self.entries
            .iter()
            .map(|e| {
                let mut p = AiProperty {
                    name: e.name.as_ptr(),
                    ..Default::default()
                };
                match e.value {
                    StoredValue::Integer(v) => {
                        p.kind = AiPropertyKind::Integer.to_raw();
                        p.int_value = v;
                    }
                    StoredValue::Boolean(v) => {
                        p.kind = AiPropertyKind::Boolean.to_raw();
                        p.int_value = v as i32;
                    }
                    StoredValue::Float(v) => {
                        p.kind = AiPropertyKind::Float.to_raw();
                        p.float_value = v;
                    }
                    StoredValue::String(ref s) => {
                        p.kind = AiPropertyKind::String.to_raw();
                        p.string_value = s.as_ptr();
                    }
                    StoredValue::Matrix(ref m) => {
                        p.kind = AiPropertyKind::Matrix4x4.to_raw();
                        p.matrix_value = &**m as *const AiMatrix4x4 as *mut c_void;
                    }
                }
                p
            })
            .collect()
    }
}

#[cfg(test)]
use std::ptr;

#[cfg(test)]
#[derive(Debug, PartialEq)]
enum Set {
    Int(String, i32),
    Bool(String, bool),
    Float(String, f32),
    Str(String, String),
    Matrix(String, AiMatrix4x4),
}

#[cfg(test)]
#[derive(Default)]
struct RecordingSink(Vec<Set>);

#[cfg(test)]
fn s(c: &CStr) -> String {
    c.to_string_lossy().into_owned()
}

#[cfg(test)]
impl PropertySink for RecordingSink {
    fn set_property_integer(&mut self, name: &CStr, value: i32) {
        self.0.push(Set::Int(s(name), value));
    }
    fn set_property_bool(&mut self, name: &CStr, value: bool) {
        self.0.push(Set::Bool(s(name), value));
    }
    fn set_property_float(&mut self, name: &CStr, value: f32) {
        self.0.push(Set::Float(s(name), value));
    }
    fn set_property_string(&mut self, name: &CStr, value: &CStr) {
        self.0.push(Set::Str(s(name), s(value)));
    }
    fn set_property_matrix(&mut self, name: &CStr, value: &AiMatrix4x4) {
        self.0.push(Set::Matrix(s(name), *value));
    }
}

#[test]
fn one_descriptor_per_kind_maps_to_matching_setter_in_order() {
    let mut list = PropertyList::new();
    list.set("a", PropertyValue::Integer(7)).unwrap()
        .set("b", PropertyValue::Float(0.5)).unwrap()
        .set("c", PropertyValue::String("hello".to_owned())).unwrap()
        .set("d", PropertyValue::Matrix(AiMatrix4x4::identity())).unwrap()
        .set("e", PropertyValue::Boolean(true)).unwrap();

    let mut sink = RecordingSink::default();
    apply_properties(&mut sink, &list.descriptors());
    assert_eq!(
        sink.0,
        vec![
            Set::Int("a".to_owned(), 7),
            Set::Float("b".to_owned(), 0.5),
            Set::Str("c".to_owned(), "hello".to_owned()),
            Set::Matrix("d".to_owned(), AiMatrix4x4::identity()),
            Set::Bool("e".to_owned(), true),
        ]
    );
}

#[test]
fn null_name_unknown_kind_and_null_matrix_are_skipped() {
    let name = CString::new("kept").unwrap();
    let skipped = CString::new("skipped").unwrap();
    let props = [
        AiProperty { name: ptr::null(), int_value: 1, ..Default::default() },
        AiProperty { name: skipped.as_ptr(), kind: 42, ..Default::default() },
        AiProperty {
            name: skipped.as_ptr(),
            kind: AiPropertyKind::Matrix4x4.to_raw(),
            matrix_value: ptr::null_mut(),
            ..Default::default()
        },
        AiProperty { name: name.as_ptr(), int_value: 3, ..Default::default() },
    ];

    let mut sink = RecordingSink::default();
    apply_properties(&mut sink, &props);
    assert_eq!(sink.0, vec![Set::Int("kept".to_owned(), 3)]);
}

#[test]
fn null_string_value_becomes_empty_and_bool_is_nonzero() {
    let name = CString::new("k").unwrap();
    let props = [
        AiProperty {
            name: name.as_ptr(),
            kind: AiPropertyKind::String.to_raw(),
            string_value: ptr::null(),
            ..Default::default()
        },
        AiProperty {
            name: name.as_ptr(),
            kind: AiPropertyKind::Boolean.to_raw(),
            int_value: -5,
            ..Default::default()
        },
    ];

    let mut sink = RecordingSink::default();
    apply_properties(&mut sink, &props);
    assert_eq!(
        sink.0,
        vec![Set::Str("k".to_owned(), String::new()), Set::Bool("k".to_owned(), true)]
    );
}

#[test]
fn property_list_rejects_interior_nul() {
    let mut list = PropertyList::new();
    assert!(list.set("bad\0name", PropertyValue::Integer(1)).is_err());
    assert!(list.set("ok", PropertyValue::String("bad\0value".to_owned())).is_err());
    assert!(list.is_empty());
}

#[test]
fn raw_descriptor_view_handles_null() {
    let empty = unsafe { descriptors_from_raw(ptr::null(), 4) };
    assert!(empty.is_empty());
}
