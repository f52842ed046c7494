//! Conformance case definitions.

use std::fmt;

use cxfer_common::error::TransferErrorKind;

/// Content written by the short round-trip cases.
pub const SHORT_WRITE: &[u8] = b"Short Write";

/// One page.
pub const PAGE_SIZE: usize = 4096;

/// One mebibyte.
pub const MIB: usize = 1024 * 1024;

/// Filler byte of the sized payloads.
pub const FILLER: u8 = b'0';

/// Content written to satisfy an absent regular-file prerequisite.
pub const PREREQUISITE_CONTENT: &[u8] = b"prerequisite";

/// Payload of a round-trip case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Fixed bytes.
    Literal(&'static [u8]),
    /// `len` copies of `byte`.
    Repeat {
        /// Filler byte.
        byte: u8,
        /// Exact length.
        len: usize,
    },
}

impl Payload {
    /// Exact length in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::Literal(bytes) => bytes.len(),
            Self::Repeat { len, .. } => *len,
        }
    }

    /// Whether the payload is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materializes the payload.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        match self {
            Self::Literal(bytes) => bytes.to_vec(),
            Self::Repeat { byte, len } => vec![*byte; *len],
        }
    }
}

/// Where a path resolves inside the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountClass {
    /// The container's own writable layer.
    ContainerLocal,
    /// A bind-mounted shared directory.
    SharedMount,
}

impl fmt::Display for MountClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContainerLocal => write!(f, "local"),
            Self::SharedMount => write!(f, "shared"),
        }
    }
}

/// State a case needs before it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prerequisite {
    /// The path must exist as a regular file.
    RegularFile(String),
}

/// A single conformance case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Case {
    /// Write then read `path`; the content must match exactly.
    RoundTrip {
        /// Container path.
        path: String,
        /// Payload written.
        payload: Payload,
        /// Storage the path resolves to.
        class: MountClass,
    },
    /// Writing `path` must fail with `expected`.
    WriteFails {
        /// Container path.
        path: String,
        /// Expected classification.
        expected: TransferErrorKind,
        /// State established before the write.
        prerequisite: Option<Prerequisite>,
    },
}

impl Case {
    /// Container path the case targets.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::RoundTrip { path, .. } | Self::WriteFails { path, .. } => path,
        }
    }

    /// Human-readable description.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::RoundTrip {
                path,
                payload,
                class,
            } => format!("round-trip {} B ({class}) {path}", payload.len()),
            Self::WriteFails { path, expected, .. } => {
                format!("write {path} fails with {expected}")
            }
        }
    }
}

/// The standard case list: six round-trips, then two invalid writes.
///
/// `mount_point` is the container path of the shared directory.
#[must_use]
pub fn standard_cases(mount_point: &str) -> Vec<Case> {
    let payloads = [
        Payload::Literal(SHORT_WRITE),
        Payload::Repeat {
            byte: FILLER,
            len: PAGE_SIZE,
        },
        Payload::Repeat {
            byte: FILLER,
            len: MIB,
        },
    ];
    let mount_point = mount_point.trim_end_matches('/');
    let classes = [
        (MountClass::ContainerLocal, "/tmp"),
        (MountClass::SharedMount, mount_point),
    ];

    let mut cases: Vec<Case> = classes
        .iter()
        .flat_map(|(class, dir)| {
            payloads
                .iter()
                .enumerate()
                .map(move |(i, payload)| Case::RoundTrip {
                    path: format!("{dir}/file{i}"),
                    payload: *payload,
                    class: *class,
                })
        })
        .collect();

    cases.push(Case::WriteFails {
        path: "/path/not/exist".into(),
        expected: TransferErrorKind::ParentNotFound,
        prerequisite: None,
    });
    cases.push(Case::WriteFails {
        path: "/tmp/file0/bla".into(),
        expected: TransferErrorKind::ParentNotADirectory,
        prerequisite: Some(Prerequisite::RegularFile("/tmp/file0".into())),
    });
    cases
}
