//! DEX container parsing, limited to class signatures.
//!
//! Reads the tables a compile-time stub needs - strings, types, prototypes,
//! field/method ids, class definitions and class data - and deliberately
//! nothing else. Code items, debug info, annotations and static values are
//! never dereferenced; `code_off` is read from each encoded method and
//! discarded, which is where method bodies are stripped.
//!
//! All multi-byte header/table values are little-endian. Variable-length
//! counts use ULEB128 and string data is MUTF-8, both per the DEX format.

use super::{malformed, TranscodeResult};

/// Sentinel index meaning "no value" (e.g. no superclass).
pub const NO_INDEX: u32 = 0xffff_ffff;

/// Required on-disk size of the DEX header.
const HEADER_SIZE: usize = 0x70;

/// Little-endian constant expected in the header's endian tag.
const ENDIAN_CONSTANT: u32 = 0x1234_5678;

/// A class definition reduced to its compile-time signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexClass {
    /// Type descriptor of the class itself, e.g. `Lcom/host/Api;`.
    pub descriptor: String,
    /// Raw DEX access flags.
    pub access_flags: u32,
    /// Type descriptor of the superclass, `None` only for `Ljava/lang/Object;`.
    pub superclass: Option<String>,
    /// Type descriptors of implemented interfaces, in declaration order.
    pub interfaces: Vec<String>,
    /// Field signatures in declaration order (static, then instance).
    pub fields: Vec<DexField>,
    /// Method signatures in declaration order (direct, then virtual).
    pub methods: Vec<DexMethod>,
}

/// A field signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexField {
    pub name: String,
    /// Field type descriptor, e.g. `I` or `Ljava/lang/String;`.
    pub descriptor: String,
    pub access_flags: u32,
}

/// A method signature. The body is already gone by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DexMethod {
    pub name: String,
    /// Full method descriptor, e.g. `(ILjava/lang/String;)V`.
    pub descriptor: String,
    pub access_flags: u32,
}

/// Parse one DEX part into its class definitions.
pub fn parse(data: &[u8]) -> TranscodeResult<Vec<DexClass>> {
    check_header(data)?;

    let strings = read_strings(data)?;
    let types = read_types(data, &strings)?;
    let protos = read_protos(data, &types)?;
    let field_ids = read_field_ids(data)?;
    let method_ids = read_method_ids(data)?;

    read_class_defs(data, &strings, &types, &protos, &field_ids, &method_ids)
}

fn check_header(data: &[u8]) -> TranscodeResult<()> {
    if data.len() < HEADER_SIZE {
        return Err(malformed(format!(
            "{} bytes is too short for a DEX header",
            data.len()
        )));
    }

    // Magic is "dex\n" + three version digits + NUL.
    if &data[0..4] != b"dex\n" || data[7] != 0 {
        return Err(malformed("bad DEX magic"));
    }
    if !data[4..7].iter().all(|b| b.is_ascii_digit()) {
        return Err(malformed("bad DEX version in magic"));
    }

    let endian = u32_at(data, 0x28)?;
    if endian != ENDIAN_CONSTANT {
        return Err(malformed(format!(
            "unsupported endian tag {:#010x}",
            endian
        )));
    }

    Ok(())
}

fn read_strings(data: &[u8]) -> TranscodeResult<Vec<String>> {
    let size = u32_at(data, 0x38)? as usize;
    let off = u32_at(data, 0x3c)? as usize;

    let mut strings = Vec::with_capacity(size);
    for i in 0..size {
        let data_off = u32_at(data, off + i * 4)? as usize;
        strings.push(read_string_data(data, data_off)?);
    }
    Ok(strings)
}

fn read_string_data(data: &[u8], off: usize) -> TranscodeResult<String> {
    let mut pos = off;
    // utf16 code unit count; the payload is NUL-terminated, so the count is
    // only a sanity bound here.
    let declared = read_uleb128(data, &mut pos)? as usize;

    let start = pos;
    while *data
        .get(pos)
        .ok_or_else(|| malformed("unterminated string data"))?
        != 0
    {
        pos += 1;
    }

    let decoded = decode_mutf8(&data[start..pos])?;
    if decoded.encode_utf16().count() != declared {
        return Err(malformed("string data length does not match its header"));
    }
    Ok(decoded)
}

fn read_types(data: &[u8], strings: &[String]) -> TranscodeResult<Vec<String>> {
    let size = u32_at(data, 0x40)? as usize;
    let off = u32_at(data, 0x44)? as usize;

    let mut types = Vec::with_capacity(size);
    for i in 0..size {
        let string_idx = u32_at(data, off + i * 4)?;
        types.push(string_at(strings, string_idx)?.to_string());
    }
    Ok(types)
}

fn read_protos(data: &[u8], types: &[String]) -> TranscodeResult<Vec<String>> {
    let size = u32_at(data, 0x48)? as usize;
    let off = u32_at(data, 0x4c)? as usize;

    let mut protos = Vec::with_capacity(size);
    for i in 0..size {
        let base = off + i * 12;
        // shorty_idx at +0 is redundant with the full descriptor; skipped.
        let return_type_idx = u32_at(data, base + 4)?;
        let parameters_off = u32_at(data, base + 8)? as usize;

        let mut descriptor = String::from("(");
        if parameters_off != 0 {
            for param in read_type_list(data, parameters_off, types)? {
                descriptor.push_str(&param);
            }
        }
        descriptor.push(')');
        descriptor.push_str(type_at(types, return_type_idx)?);

        protos.push(descriptor);
    }
    Ok(protos)
}

fn read_type_list(data: &[u8], off: usize, types: &[String]) -> TranscodeResult<Vec<String>> {
    let size = u32_at(data, off)? as usize;
    let mut list = Vec::with_capacity(size);
    for i in 0..size {
        let type_idx = u16_at(data, off + 4 + i * 2)? as u32;
        list.push(type_at(types, type_idx)?.to_string());
    }
    Ok(list)
}

/// Raw field_id entry: (class_idx, type_idx, name_idx).
type FieldId = (u16, u16, u32);

fn read_field_ids(data: &[u8]) -> TranscodeResult<Vec<FieldId>> {
    let size = u32_at(data, 0x50)? as usize;
    let off = u32_at(data, 0x54)? as usize;

    let mut ids = Vec::with_capacity(size);
    for i in 0..size {
        let base = off + i * 8;
        ids.push((
            u16_at(data, base)?,
            u16_at(data, base + 2)?,
            u32_at(data, base + 4)?,
        ));
    }
    Ok(ids)
}

/// Raw method_id entry: (class_idx, proto_idx, name_idx).
type MethodId = (u16, u16, u32);

fn read_method_ids(data: &[u8]) -> TranscodeResult<Vec<MethodId>> {
    let size = u32_at(data, 0x58)? as usize;
    let off = u32_at(data, 0x5c)? as usize;

    let mut ids = Vec::with_capacity(size);
    for i in 0..size {
        let base = off + i * 8;
        ids.push((
            u16_at(data, base)?,
            u16_at(data, base + 2)?,
            u32_at(data, base + 4)?,
        ));
    }
    Ok(ids)
}

#[allow(clippy::too_many_arguments)]
fn read_class_defs(
    data: &[u8],
    strings: &[String],
    types: &[String],
    protos: &[String],
    field_ids: &[FieldId],
    method_ids: &[MethodId],
) -> TranscodeResult<Vec<DexClass>> {
    let size = u32_at(data, 0x60)? as usize;
    let off = u32_at(data, 0x64)? as usize;

    let mut classes = Vec::with_capacity(size);
    for i in 0..size {
        let base = off + i * 32;

        let class_idx = u32_at(data, base)?;
        let access_flags = u32_at(data, base + 4)?;
        let superclass_idx = u32_at(data, base + 8)?;
        let interfaces_off = u32_at(data, base + 12)? as usize;
        // source_file_idx (+16) and annotations_off (+20) carry debug and
        // annotation data; both are stripped from the stub.
        let class_data_off = u32_at(data, base + 24)? as usize;
        // static_values_off (+28) is likewise ignored.

        let descriptor = type_at(types, class_idx)?.to_string();
        let superclass = if superclass_idx == NO_INDEX {
            None
        } else {
            Some(type_at(types, superclass_idx)?.to_string())
        };
        let interfaces = if interfaces_off == 0 {
            Vec::new()
        } else {
            read_type_list(data, interfaces_off, types)?
        };

        let (fields, methods) = if class_data_off == 0 {
            (Vec::new(), Vec::new())
        } else {
            read_class_data(data, class_data_off, strings, types, protos, field_ids, method_ids)?
        };

        classes.push(DexClass {
            descriptor,
            access_flags,
            superclass,
            interfaces,
            fields,
            methods,
        });
    }
    Ok(classes)
}

#[allow(clippy::too_many_arguments)]
fn read_class_data(
    data: &[u8],
    off: usize,
    strings: &[String],
    types: &[String],
    protos: &[String],
    field_ids: &[FieldId],
    method_ids: &[MethodId],
) -> TranscodeResult<(Vec<DexField>, Vec<DexMethod>)> {
    let mut pos = off;

    let static_fields = read_uleb128(data, &mut pos)? as usize;
    let instance_fields = read_uleb128(data, &mut pos)? as usize;
    let direct_methods = read_uleb128(data, &mut pos)? as usize;
    let virtual_methods = read_uleb128(data, &mut pos)? as usize;

    let mut fields = Vec::with_capacity(static_fields + instance_fields);
    for group in [static_fields, instance_fields] {
        let mut field_idx = 0u32;
        for _ in 0..group {
            let idx_diff = read_uleb128(data, &mut pos)?;
            let access_flags = read_uleb128(data, &mut pos)?;
            field_idx = field_idx.wrapping_add(idx_diff);

            let (_, type_idx, name_idx) = *field_ids
                .get(field_idx as usize)
                .ok_or_else(|| malformed("field index out of range in class data"))?;

            fields.push(DexField {
                name: string_at(strings, name_idx)?.to_string(),
                descriptor: type_at(types, type_idx as u32)?.to_string(),
                access_flags,
            });
        }
    }

    let mut methods = Vec::with_capacity(direct_methods + virtual_methods);
    for group in [direct_methods, virtual_methods] {
        let mut method_idx = 0u32;
        for _ in 0..group {
            let idx_diff = read_uleb128(data, &mut pos)?;
            let access_flags = read_uleb128(data, &mut pos)?;
            // The body lives at code_off; reading and dropping it here is
            // the "strip method bodies" step.
            let _code_off = read_uleb128(data, &mut pos)?;
            method_idx = method_idx.wrapping_add(idx_diff);

            let (_, proto_idx, name_idx) = *method_ids
                .get(method_idx as usize)
                .ok_or_else(|| malformed("method index out of range in class data"))?;

            let descriptor = protos
                .get(proto_idx as usize)
                .ok_or_else(|| malformed("proto index out of range in class data"))?
                .clone();

            methods.push(DexMethod {
                name: string_at(strings, name_idx)?.to_string(),
                descriptor,
                access_flags,
            });
        }
    }

    Ok((fields, methods))
}

// ── Low-level readers ───────────────────────────────────────────

fn u16_at(data: &[u8], off: usize) -> TranscodeResult<u16> {
    let bytes = data
        .get(off..off + 2)
        .ok_or_else(|| malformed("truncated u16"))?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn u32_at(data: &[u8], off: usize) -> TranscodeResult<u32> {
    let bytes = data
        .get(off..off + 4)
        .ok_or_else(|| malformed("truncated u32"))?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_uleb128(data: &[u8], pos: &mut usize) -> TranscodeResult<u32> {
    let mut result = 0u32;
    let mut shift = 0u32;
    loop {
        let byte = *data
            .get(*pos)
            .ok_or_else(|| malformed("truncated ULEB128"))?;
        *pos += 1;

        result |= ((byte & 0x7f) as u32) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }

        shift += 7;
        if shift >= 35 {
            return Err(malformed("oversized ULEB128"));
        }
    }
}

/// Decode a MUTF-8 byte sequence (no embedded raw NULs; `0xC0 0x80` encodes
/// U+0000, supplementary characters arrive as CESU-8 surrogate pairs).
fn decode_mutf8(bytes: &[u8]) -> TranscodeResult<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(b as u16);
            i += 1;
        } else if b & 0xe0 == 0xc0 {
            let b2 = *bytes
                .get(i + 1)
                .ok_or_else(|| malformed("truncated MUTF-8 sequence"))?;
            units.push((((b & 0x1f) as u16) << 6) | (b2 & 0x3f) as u16);
            i += 2;
        } else if b & 0xf0 == 0xe0 {
            let b2 = *bytes
                .get(i + 1)
                .ok_or_else(|| malformed("truncated MUTF-8 sequence"))?;
            let b3 = *bytes
                .get(i + 2)
                .ok_or_else(|| malformed("truncated MUTF-8 sequence"))?;
            units.push(
                (((b & 0x0f) as u16) << 12) | (((b2 & 0x3f) as u16) << 6) | (b3 & 0x3f) as u16,
            );
            i += 3;
        } else {
            return Err(malformed("invalid MUTF-8 byte"));
        }
    }

    String::from_utf16(&units).map_err(|_| malformed("unpaired surrogate in string data"))
}

fn string_at(strings: &[String], idx: u32) -> TranscodeResult<&str> {
    strings
        .get(idx as usize)
        .map(String::as_str)
        .ok_or_else(|| malformed(format!("string index {} out of range", idx)))
}

fn type_at(types: &[String], idx: u32) -> TranscodeResult<&str> {
    types
        .get(idx as usize)
        .map(String::as_str)
        .ok_or_else(|| malformed(format!("type index {} out of range", idx)))
}
