//! Minimal JVM class-file writer for signature-only stubs.
//!
//! Emits well-formed class files containing a constant pool, access flags,
//! the type hierarchy and member signatures - and nothing else. No method
//! carries a `Code` attribute and no attribute section is populated at all,
//! so the output can resolve symbols at compile time but can never execute.

use std::collections::HashMap;

use super::reader::DexClass;
use super::{malformed, TranscodeResult};

/// Class-file major version written to every stub (Java 8).
const CLASS_MAJOR_VERSION: u16 = 52;

/// Interface bit shared between DEX and JVM access flags.
const ACC_INTERFACE: u16 = 0x0200;

/// Historical JVM flag set on every non-interface class.
const ACC_SUPER: u16 = 0x0020;

const TAG_UTF8: u8 = 1;
const TAG_CLASS: u8 = 7;

/// Convert a class type descriptor (`Lcom/host/Api;`) into the binary name
/// used inside class files and as the archive entry stem (`com/host/Api`).
pub fn binary_name(descriptor: &str) -> TranscodeResult<&str> {
    descriptor
        .strip_prefix('L')
        .and_then(|d| d.strip_suffix(';'))
        .filter(|d| !d.is_empty())
        .ok_or_else(|| malformed(format!("'{}' is not a class type descriptor", descriptor)))
}

/// Serialize one class definition into class-file bytes.
pub fn write_class(class: &DexClass) -> TranscodeResult<Vec<u8>> {
    let mut pool = ConstantPool::default();

    // Intern everything in declaration order first so the pool layout is a
    // pure function of the input.
    let this_class = pool.class(binary_name(&class.descriptor)?);
    let super_class = match &class.superclass {
        Some(descriptor) => pool.class(binary_name(descriptor)?),
        None => 0,
    };
    let mut interfaces = Vec::with_capacity(class.interfaces.len());
    for descriptor in &class.interfaces {
        interfaces.push(pool.class(binary_name(descriptor)?));
    }

    let fields: Vec<(u16, u16, u16)> = class
        .fields
        .iter()
        .map(|f| {
            (
                (f.access_flags & 0xffff) as u16,
                pool.utf8(&f.name),
                pool.utf8(&f.descriptor),
            )
        })
        .collect();

    let methods: Vec<(u16, u16, u16)> = class
        .methods
        .iter()
        .map(|m| {
            (
                (m.access_flags & 0xffff) as u16,
                pool.utf8(&m.name),
                pool.utf8(&m.descriptor),
            )
        })
        .collect();

    let mut access = (class.access_flags & 0xffff) as u16;
    if access & ACC_INTERFACE == 0 {
        access |= ACC_SUPER;
    }

    let mut out = Vec::new();
    push_u32(&mut out, 0xcafe_babe);
    push_u16(&mut out, 0); // minor version
    push_u16(&mut out, CLASS_MAJOR_VERSION);

    pool.write(&mut out);

    push_u16(&mut out, access);
    push_u16(&mut out, this_class);
    push_u16(&mut out, super_class);

    push_u16(&mut out, interfaces.len() as u16);
    for idx in interfaces {
        push_u16(&mut out, idx);
    }

    push_u16(&mut out, fields.len() as u16);
    for (access, name, descriptor) in fields {
        push_u16(&mut out, access);
        push_u16(&mut out, name);
        push_u16(&mut out, descriptor);
        push_u16(&mut out, 0); // attributes_count
    }

    push_u16(&mut out, methods.len() as u16);
    for (access, name, descriptor) in methods {
        push_u16(&mut out, access);
        push_u16(&mut out, name);
        push_u16(&mut out, descriptor);
        push_u16(&mut out, 0); // attributes_count: no Code, ever
    }

    push_u16(&mut out, 0); // class attributes_count

    Ok(out)
}

/// Deduplicating constant pool restricted to the two entry kinds a
/// signature stub needs.
#[derive(Default)]
struct ConstantPool {
    entries: Vec<PoolEntry>,
    utf8_index: HashMap<String, u16>,
    class_index: HashMap<String, u16>,
}

enum PoolEntry {
    Utf8(String),
    Class(u16),
}

impl ConstantPool {
    /// Intern a Utf8 entry, returning its 1-based pool index.
    fn utf8(&mut self, value: &str) -> u16 {
        if let Some(&idx) = self.utf8_index.get(value) {
            return idx;
        }
        self.entries.push(PoolEntry::Utf8(value.to_string()));
        let idx = self.entries.len() as u16;
        self.utf8_index.insert(value.to_string(), idx);
        idx
    }

    /// Intern a Class entry for a binary name, returning its pool index.
    fn class(&mut self, binary_name: &str) -> u16 {
        if let Some(&idx) = self.class_index.get(binary_name) {
            return idx;
        }
        let name_idx = self.utf8(binary_name);
        self.entries.push(PoolEntry::Class(name_idx));
        let idx = self.entries.len() as u16;
        self.class_index.insert(binary_name.to_string(), idx);
        idx
    }

    fn write(&self, out: &mut Vec<u8>) {
        push_u16(out, self.entries.len() as u16 + 1);
        for entry in &self.entries {
            match entry {
                PoolEntry::Utf8(value) => {
                    let bytes = encode_mutf8(value);
                    out.push(TAG_UTF8);
                    push_u16(out, bytes.len() as u16);
                    out.extend_from_slice(&bytes);
                }
                PoolEntry::Class(name_idx) => {
                    out.push(TAG_CLASS);
                    push_u16(out, *name_idx);
                }
            }
        }
    }
}

/// Encode a string as class-file MUTF-8: U+0000 becomes `0xC0 0x80` and
/// supplementary characters are written as CESU-8 surrogate pairs.
fn encode_mutf8(value: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0 => bytes.extend_from_slice(&[0xc0, 0x80]),
            1..=0x7f => bytes.push(unit as u8),
            0x80..=0x7ff => {
                bytes.push(0xc0 | (unit >> 6) as u8);
                bytes.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                bytes.push(0xe0 | (unit >> 12) as u8);
                bytes.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                bytes.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    bytes
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}
