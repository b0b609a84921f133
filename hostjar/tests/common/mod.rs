//! Test fixtures: a minimal DEX builder and package assembly helpers.
//!
//! Builds just enough of the DEX format to exercise the transcoding
//! pipeline: string/type/proto/field/method tables, class definitions and
//! class data. Offsets are computed in a first pass, then the sections are
//! emitted in order.

/// Sentinel index meaning "no value" in a class definition.
pub const NO_INDEX: u32 = 0xffff_ffff;

const HEADER_SIZE: usize = 0x70;
const ENDIAN_CONSTANT: u32 = 0x1234_5678;

/// One class definition fed to [`DexBuilder`]. All indices refer to the
/// builder's tables.
pub struct ClassSpec {
    /// Type index of the class itself.
    pub class_type: u32,
    pub access: u32,
    /// Type index of the superclass, or [`NO_INDEX`].
    pub superclass: u32,
    /// Type indices of implemented interfaces.
    pub interfaces: Vec<u16>,
    /// (field_id index, access flags) pairs, ascending by field_id.
    pub fields: Vec<(u32, u32)>,
    /// (method_id index, access flags, code_off) triples, ascending.
    pub methods: Vec<(u32, u32, u32)>,
}

/// Builder for a single synthetic DEX part.
#[derive(Default)]
pub struct DexBuilder {
    strings: Vec<String>,
    types: Vec<u32>,
    protos: Vec<(u32, u32, Vec<u16>)>,
    field_ids: Vec<(u16, u16, u32)>,
    method_ids: Vec<(u16, u16, u32)>,
    classes: Vec<ClassSpec>,
}

impl DexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the string table. Entries must already be in DEX sort order.
    pub fn strings(mut self, strings: &[&str]) -> Self {
        self.strings = strings.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Set the type table as indices into the string table.
    pub fn types(mut self, string_indices: &[u32]) -> Self {
        self.types = string_indices.to_vec();
        self
    }

    /// Add a prototype: (shorty string index, return type index, parameter
    /// type indices).
    pub fn proto(mut self, shorty: u32, return_type: u32, params: &[u16]) -> Self {
        self.protos.push((shorty, return_type, params.to_vec()));
        self
    }

    /// Add a field id: (class type index, field type index, name string
    /// index).
    pub fn field_id(mut self, class: u16, field_type: u16, name: u32) -> Self {
        self.field_ids.push((class, field_type, name));
        self
    }

    /// Add a method id: (class type index, proto index, name string index).
    pub fn method_id(mut self, class: u16, proto: u16, name: u32) -> Self {
        self.method_ids.push((class, proto, name));
        self
    }

    pub fn class(mut self, spec: ClassSpec) -> Self {
        self.classes.push(spec);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let string_ids_off = HEADER_SIZE;
        let type_ids_off = string_ids_off + 4 * self.strings.len();
        let proto_ids_off = type_ids_off + 4 * self.types.len();
        let field_ids_off = proto_ids_off + 12 * self.protos.len();
        let method_ids_off = field_ids_off + 8 * self.field_ids.len();
        let class_defs_off = method_ids_off + 8 * self.method_ids.len();
        let data_off = class_defs_off + 32 * self.classes.len();

        // Data section, with every item's absolute offset recorded.
        let mut data: Vec<u8> = Vec::new();

        let proto_param_offs: Vec<u32> = self
            .protos
            .iter()
            .map(|(_, _, params)| {
                if params.is_empty() {
                    0
                } else {
                    write_type_list(&mut data, data_off, params)
                }
            })
            .collect();

        let interface_offs: Vec<u32> = self
            .classes
            .iter()
            .map(|spec| {
                if spec.interfaces.is_empty() {
                    0
                } else {
                    write_type_list(&mut data, data_off, &spec.interfaces)
                }
            })
            .collect();

        let string_data_offs: Vec<u32> = self
            .strings
            .iter()
            .map(|s| {
                let off = (data_off + data.len()) as u32;
                write_uleb128(&mut data, s.encode_utf16().count() as u32);
                data.extend_from_slice(s.as_bytes()); // fixtures are ASCII
                data.push(0);
                off
            })
            .collect();

        let class_data_offs: Vec<u32> = self
            .classes
            .iter()
            .map(|spec| {
                if spec.fields.is_empty() && spec.methods.is_empty() {
                    return 0;
                }
                let off = (data_off + data.len()) as u32;
                write_uleb128(&mut data, 0); // static_fields_size
                write_uleb128(&mut data, spec.fields.len() as u32);
                write_uleb128(&mut data, 0); // direct_methods_size
                write_uleb128(&mut data, spec.methods.len() as u32);

                let mut prev = 0u32;
                for (i, &(idx, access)) in spec.fields.iter().enumerate() {
                    let diff = if i == 0 { idx } else { idx - prev };
                    prev = idx;
                    write_uleb128(&mut data, diff);
                    write_uleb128(&mut data, access);
                }

                let mut prev = 0u32;
                for (i, &(idx, access, code_off)) in spec.methods.iter().enumerate() {
                    let diff = if i == 0 { idx } else { idx - prev };
                    prev = idx;
                    write_uleb128(&mut data, diff);
                    write_uleb128(&mut data, access);
                    write_uleb128(&mut data, code_off);
                }

                off
            })
            .collect();

        // Assemble the file front to back.
        let total = data_off + data.len();
        let mut out = Vec::with_capacity(total);

        out.extend_from_slice(b"dex\n035\0");
        push_u32(&mut out, 0); // checksum, unchecked by the reader
        out.extend_from_slice(&[0u8; 20]); // signature
        push_u32(&mut out, total as u32);
        push_u32(&mut out, HEADER_SIZE as u32);
        push_u32(&mut out, ENDIAN_CONSTANT);
        push_u32(&mut out, 0); // link_size
        push_u32(&mut out, 0); // link_off
        push_u32(&mut out, 0); // map_off
        push_u32(&mut out, self.strings.len() as u32);
        push_u32(&mut out, string_ids_off as u32);
        push_u32(&mut out, self.types.len() as u32);
        push_u32(&mut out, type_ids_off as u32);
        push_u32(&mut out, self.protos.len() as u32);
        push_u32(&mut out, proto_ids_off as u32);
        push_u32(&mut out, self.field_ids.len() as u32);
        push_u32(&mut out, field_ids_off as u32);
        push_u32(&mut out, self.method_ids.len() as u32);
        push_u32(&mut out, method_ids_off as u32);
        push_u32(&mut out, self.classes.len() as u32);
        push_u32(&mut out, class_defs_off as u32);
        push_u32(&mut out, data.len() as u32);
        push_u32(&mut out, data_off as u32);
        assert_eq!(out.len(), HEADER_SIZE);

        for &off in &string_data_offs {
            push_u32(&mut out, off);
        }
        for &string_idx in &self.types {
            push_u32(&mut out, string_idx);
        }
        for (i, &(shorty, return_type, _)) in self.protos.iter().enumerate() {
            push_u32(&mut out, shorty);
            push_u32(&mut out, return_type);
            push_u32(&mut out, proto_param_offs[i]);
        }
        for &(class, field_type, name) in &self.field_ids {
            push_u16(&mut out, class);
            push_u16(&mut out, field_type);
            push_u32(&mut out, name);
        }
        for &(class, proto, name) in &self.method_ids {
            push_u16(&mut out, class);
            push_u16(&mut out, proto);
            push_u32(&mut out, name);
        }
        for (i, spec) in self.classes.iter().enumerate() {
            push_u32(&mut out, spec.class_type);
            push_u32(&mut out, spec.access);
            push_u32(&mut out, spec.superclass);
            push_u32(&mut out, interface_offs[i]);
            push_u32(&mut out, NO_INDEX); // source_file_idx
            push_u32(&mut out, 0); // annotations_off
            push_u32(&mut out, class_data_offs[i]);
            push_u32(&mut out, 0); // static_values_off
        }

        out.extend_from_slice(&data);
        out
    }
}

fn write_type_list(data: &mut Vec<u8>, data_off: usize, entries: &[u16]) -> u32 {
    while (data_off + data.len()) % 4 != 0 {
        data.push(0);
    }
    let off = (data_off + data.len()) as u32;
    push_u32(data, entries.len() as u32);
    for &idx in entries {
        push_u16(data, idx);
    }
    off
}

fn write_uleb128(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Zip dex parts into an APK-style package container.
pub fn package_with(parts: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, bytes) in parts {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A dex part defining `A` (one private int field `x`) and `B extends A`
/// (one public virtual method `foo()V`), with `B` deliberately defined
/// before `A` so consumers must reorder.
pub fn ab_dex() -> Vec<u8> {
    // Strings in DEX sort order.
    let strings = ["I", "LA;", "LB;", "Ljava/lang/Object;", "V", "foo", "x"];
    DexBuilder::new()
        .strings(&strings)
        // types: 0="I" 1="LA;" 2="LB;" 3=Object 4="V"
        .types(&[0, 1, 2, 3, 4])
        // proto 0: ()V
        .proto(4, 4, &[])
        // field 0: A.x : I
        .field_id(1, 0, 6)
        // method 0: B.foo()V
        .method_id(2, 0, 5)
        .class(ClassSpec {
            class_type: 2, // LB;
            access: 0x0001,
            superclass: 1, // LA;
            interfaces: vec![],
            fields: vec![],
            // Nonzero code_off proves bodies are dropped, not followed.
            methods: vec![(0, 0x0001, 0x0200)],
        })
        .class(ClassSpec {
            class_type: 1, // LA;
            access: 0x0001,
            superclass: 3, // Object
            interfaces: vec![],
            fields: vec![(0, 0x0002)],
            methods: vec![],
        })
        .build()
}

/// A second dex part defining `C extends A`, where `A` lives in another
/// part of the same package.
pub fn c_dex() -> Vec<u8> {
    let strings = ["LA;", "LC;"];
    DexBuilder::new()
        .strings(&strings)
        .types(&[0, 1])
        .class(ClassSpec {
            class_type: 1, // LC;
            access: 0x0001,
            superclass: 0, // LA;
            interfaces: vec![],
            fields: vec![],
            methods: vec![],
        })
        .build()
}

/// The canonical single-part test package.
pub fn ab_package() -> Vec<u8> {
    let dex = ab_dex();
    package_with(&[("classes.dex", &dex)])
}
