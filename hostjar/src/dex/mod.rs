//! Host package transcoding.
//!
//! Converts the host application's native package - an APK-style ZIP
//! container holding one or more `classes*.dex` parts - into a single jar
//! of signature-only class stubs for the compile-time classpath.
//!
//! # Pipeline
//!
//! ```text
//! package bytes ──► extract_classes ──► topological_order ──► write_archive
//!                   (zip + dex parse)   (supertypes first)     (stub jar)
//! ```
//!
//! The output is deterministic: identical package bytes always produce
//! byte-identical archives. Entry order is a topological ordering of the
//! intra-package reference graph (superclass and interfaces before their
//! subtypes, ties broken by descriptor order), because some consumers
//! process jar entries sequentially and expect supertypes to be available
//! before subtypes.

mod classfile;
mod reader;

pub use reader::{DexClass, DexField, DexMethod, NO_INDEX};

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};

use thiserror::Error;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Result type for transcoding operations.
pub type TranscodeResult<T> = Result<T, TranscodeError>;

/// Errors that can occur while converting a package into a stub archive.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The input is not a well-formed host package.
    #[error("malformed host package: {reason}")]
    MalformedPackage { reason: String },

    /// Assembling the output archive failed.
    #[error("failed to assemble stub archive: {reason}")]
    Archive { reason: String },
}

pub(crate) fn malformed(reason: impl Into<String>) -> TranscodeError {
    TranscodeError::MalformedPackage {
        reason: reason.into(),
    }
}

fn archive_error(reason: impl std::fmt::Display) -> TranscodeError {
    TranscodeError::Archive {
        reason: reason.to_string(),
    }
}

/// Convert package bytes into stub-archive bytes.
///
/// The archive contains one `.class` entry per class definition across all
/// parts of the package, each stripped to its compile-time signature.
pub fn transcode(package: &[u8]) -> TranscodeResult<Vec<u8>> {
    let classes = extract_classes(package)?;
    debug!(classes = classes.len(), "parsed class definitions");

    let ordered = topological_order(classes);
    write_archive(&ordered)
}

/// Pull every class definition out of the package's dex parts.
///
/// Parts are processed in their numeric order (`classes.dex`,
/// `classes2.dex`, ...). A descriptor seen in an earlier part wins over a
/// duplicate in a later one.
fn extract_classes(package: &[u8]) -> TranscodeResult<Vec<DexClass>> {
    let mut container = ZipArchive::new(Cursor::new(package))
        .map_err(|e| malformed(format!("not a package container: {}", e)))?;

    let mut segments: Vec<String> = container
        .file_names()
        .filter(|name| class_segment_index(name).is_some())
        .map(str::to_string)
        .collect();
    if segments.is_empty() {
        return Err(malformed("package contains no class data segments"));
    }
    segments.sort_by_key(|name| class_segment_index(name).unwrap_or(u32::MAX));

    let mut seen: HashSet<String> = HashSet::new();
    let mut classes = Vec::new();
    for name in &segments {
        let mut entry = container
            .by_name(name)
            .map_err(|e| malformed(format!("unreadable segment {}: {}", name, e)))?;

        let mut bytes = Vec::new();
        std::io::copy(&mut entry, &mut bytes)
            .map_err(|e| malformed(format!("unreadable segment {}: {}", name, e)))?;

        for class in reader::parse(&bytes)? {
            if seen.insert(class.descriptor.clone()) {
                classes.push(class);
            }
        }
    }

    Ok(classes)
}

/// Numeric index of a class data segment, or `None` for other entries.
///
/// `classes.dex` is part 1; `classesN.dex` is part N.
fn class_segment_index(name: &str) -> Option<u32> {
    let rest = name.strip_prefix("classes")?.strip_suffix(".dex")?;
    if rest.is_empty() {
        Some(1)
    } else {
        rest.parse().ok()
    }
}

/// Order classes so every in-package dependency (superclass, interfaces)
/// precedes its dependents.
///
/// Traversal roots are visited in descriptor order and dependencies are
/// visited depth-first, so the result is deterministic for a given input
/// set. Types defined outside the package (e.g. platform classes) are not
/// ordering constraints. Reference cycles cannot occur in a valid type
/// hierarchy; if one is present the cycle member is emitted at the point
/// of first discovery rather than looping.
fn topological_order(classes: Vec<DexClass>) -> Vec<DexClass> {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        Unvisited,
        InProgress,
        Done,
    }

    let index: HashMap<String, usize> = classes
        .iter()
        .enumerate()
        .map(|(i, c)| (c.descriptor.clone(), i))
        .collect();

    let mut roots: Vec<usize> = (0..classes.len()).collect();
    roots.sort_by(|&a, &b| classes[a].descriptor.cmp(&classes[b].descriptor));

    fn visit(
        i: usize,
        classes: &[DexClass],
        index: &HashMap<String, usize>,
        state: &mut [State],
        order: &mut Vec<usize>,
    ) {
        if state[i] != State::Unvisited {
            return;
        }
        state[i] = State::InProgress;

        let class = &classes[i];
        let deps = class.superclass.iter().chain(class.interfaces.iter());
        for descriptor in deps {
            if let Some(&dep) = index.get(descriptor) {
                visit(dep, classes, index, state, order);
            }
        }

        state[i] = State::Done;
        order.push(i);
    }

    let mut state = vec![State::Unvisited; classes.len()];
    let mut order = Vec::with_capacity(classes.len());
    for root in roots {
        visit(root, &classes, &index, &mut state, &mut order);
    }

    let mut slots: Vec<Option<DexClass>> = classes.into_iter().map(Some).collect();
    order
        .into_iter()
        .map(|i| slots[i].take().expect("each class ordered exactly once"))
        .collect()
}

/// Write the ordered classes into jar bytes.
///
/// Timestamps are pinned and entries are written in the given order, so the
/// output depends only on the input classes.
fn write_archive(classes: &[DexClass]) -> TranscodeResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    for class in classes {
        let entry_name = format!("{}.class", classfile::binary_name(&class.descriptor)?);
        writer
            .start_file(entry_name, options)
            .map_err(archive_error)?;
        writer
            .write_all(&classfile::write_class(class)?)
            .map_err(archive_error)?;
    }

    let cursor = writer.finish().map_err(archive_error)?;
    Ok(cursor.into_inner())
}
