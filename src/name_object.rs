//! AML name handling.
//!
//! An AML name is built from 4-character segments (`_SB_`, `PCI0`, `_HID`).
//! The byte encoding is position-dependent: an optional ROOT (`\`) escape,
//! then zero or more PARENT (`^`) escapes, then either a single segment, a
//! DUAL prefix (two segments), or a MULTI prefix (a count byte followed by
//! that many segments). Paths are stored structurally as segment sequences,
//! so walking up a scope is a pop rather than buffer surgery.

use crate::{opcode, AmlError};
use alloc::vec::Vec;
use core::{fmt, str};

/// A 4-character AML name segment. Short names are padded with `_`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameSeg(pub(crate) [u8; 4]);

impl NameSeg {
    pub fn from_bytes(bytes: [u8; 4]) -> Result<NameSeg, AmlError> {
        if !is_lead_name_char(bytes[0]) {
            return Err(AmlError::InvalidNameSeg);
        }
        if !bytes[1..].iter().all(|&b| is_name_char(b)) {
            return Err(AmlError::InvalidNameSeg);
        }
        Ok(NameSeg(bytes))
    }

    pub fn from_str(string: &str) -> Result<NameSeg, AmlError> {
        if string.is_empty() || string.len() > 4 {
            return Err(AmlError::InvalidNameSeg);
        }
        let mut bytes = [b'_'; 4];
        bytes[..string.len()].copy_from_slice(string.as_bytes());
        NameSeg::from_bytes(bytes)
    }

    pub fn as_str(&self) -> &str {
        // segments are validated ASCII on construction
        str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl fmt::Debug for NameSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameSeg({:?})", self.as_str())
    }
}

impl fmt::Display for NameSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_lead_name_char(byte: u8) -> bool {
    byte.is_ascii_uppercase() || byte == b'_'
}

fn is_name_char(byte: u8) -> bool {
    is_lead_name_char(byte) || byte.is_ascii_digit()
}

/// Whether `byte` can start a name encoding. The executor uses this to decide
/// if the next statement or operand is a name reference.
pub fn is_name_start(byte: u8) -> bool {
    is_name_char(byte)
        || byte == opcode::ROOT_CHAR
        || byte == opcode::PARENT_PREFIX_CHAR
        || byte == opcode::DUAL_NAME_PREFIX
        || byte == opcode::MULTI_NAME_PREFIX
}

/// An absolute, root-anchored name. The root itself is the empty sequence of
/// segments and prints as `\`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AmlName {
    segments: Vec<NameSeg>,
}

impl AmlName {
    pub fn root() -> AmlName {
        AmlName { segments: Vec::new() }
    }

    /// Parses names of the form `\_SB.PCI0.SBRG`. The leading `\` is
    /// optional; the parsed name is absolute either way.
    pub fn from_str(string: &str) -> Result<AmlName, AmlError> {
        let string = string.strip_prefix('\\').unwrap_or(string);
        if string.is_empty() {
            return Ok(AmlName::root());
        }
        let segments = string.split('.').map(NameSeg::from_str).collect::<Result<Vec<_>, AmlError>>()?;
        Ok(AmlName { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[NameSeg] {
        &self.segments
    }

    pub fn last_seg(&self) -> Option<NameSeg> {
        self.segments.last().copied()
    }

    pub fn parent(&self) -> Result<AmlName, AmlError> {
        let mut parent = self.clone();
        if parent.segments.pop().is_none() {
            return Err(AmlError::RootHasNoParent);
        }
        Ok(parent)
    }

    pub fn child(&self, seg: NameSeg) -> AmlName {
        let mut child = self.clone();
        child.segments.push(seg);
        child
    }

    pub fn starts_with(&self, prefix: &AmlName) -> bool {
        self.segments.len() >= prefix.segments.len() && self.segments[..prefix.segments.len()] == prefix.segments
    }
}

impl fmt::Display for AmlName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\\")?;
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

// AmlName appears in error variants, so Debug should read like a name.
impl fmt::Debug for AmlName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// The raw decoded form of a name as it appears in the byte stream, before
/// it's been anchored to a scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamePath {
    pub root: bool,
    /// Number of `^` escapes, each ascending one scope.
    pub parent_ups: usize,
    pub segments: Vec<NameSeg>,
}

impl NamePath {
    /// Decodes a name from the front of `stream`, returning it and the number
    /// of bytes consumed.
    pub fn parse(stream: &[u8]) -> Result<(NamePath, usize), AmlError> {
        let mut offset = 0;
        let mut root = false;
        let mut parent_ups = 0;

        match stream.first() {
            Some(&opcode::ROOT_CHAR) => {
                root = true;
                offset += 1;
            }
            Some(&opcode::PARENT_PREFIX_CHAR) => {
                while stream.get(offset) == Some(&opcode::PARENT_PREFIX_CHAR) {
                    parent_ups += 1;
                    offset += 1;
                }
            }
            Some(_) => (),
            None => return Err(AmlError::UnexpectedEndOfStream),
        }

        let seg_count = match stream.get(offset) {
            Some(&opcode::DUAL_NAME_PREFIX) => {
                offset += 1;
                2
            }
            Some(&opcode::MULTI_NAME_PREFIX) => {
                let count = *stream.get(offset + 1).ok_or(AmlError::UnexpectedEndOfStream)?;
                offset += 2;
                count as usize
            }
            // NullName - encodes the empty name (e.g. a missing target)
            Some(&0x00) => {
                return Ok((NamePath { root, parent_ups, segments: Vec::new() }, offset + 1));
            }
            Some(_) => 1,
            None => return Err(AmlError::UnexpectedEndOfStream),
        };

        let mut segments = Vec::with_capacity(seg_count);
        for _ in 0..seg_count {
            let bytes = stream.get(offset..offset + 4).ok_or(AmlError::UnexpectedEndOfStream)?;
            segments.push(NameSeg::from_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])?);
            offset += 4;
        }

        Ok((NamePath { root, parent_ups, segments }, offset))
    }

    /// A bare single segment, with no escapes and no prefix. Only these are
    /// subject to the upward search rule during resolution.
    pub fn search_rules_apply(&self) -> bool {
        !self.root && self.parent_ups == 0 && self.segments.len() == 1
    }

    /// Anchors this path at `scope`, producing an absolute name. Fails if the
    /// `^` escapes ascend past the root.
    pub fn resolve(&self, scope: &AmlName) -> Result<AmlName, AmlError> {
        let mut resolved = if self.root { AmlName::root() } else { scope.clone() };
        for _ in 0..self.parent_ups {
            resolved = resolved.parent()?;
        }
        for seg in &self.segments {
            resolved = resolved.child(*seg);
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::{format, vec};

    #[test]
    fn name_seg_validation() {
        assert_eq!(NameSeg::from_str("_SB"), Ok(NameSeg(*b"_SB_")));
        assert_eq!(NameSeg::from_str("PCI0"), Ok(NameSeg(*b"PCI0")));
        assert_eq!(NameSeg::from_str("0ABC"), Err(AmlError::InvalidNameSeg));
        assert_eq!(NameSeg::from_str("toolong"), Err(AmlError::InvalidNameSeg));
        assert_eq!(NameSeg::from_bytes(*b"AB-C"), Err(AmlError::InvalidNameSeg));
    }

    #[test]
    fn aml_name_from_str() {
        assert_eq!(AmlName::from_str("\\"), Ok(AmlName::root()));
        let name = AmlName::from_str("\\_SB.PCI0").unwrap();
        assert_eq!(name.depth(), 2);
        assert_eq!(name.last_seg(), Some(NameSeg(*b"PCI0")));
        assert_eq!(format!("{}", name), "\\_SB_.PCI0");
    }

    #[test]
    fn parent_and_child() {
        let name = AmlName::from_str("\\_SB.PCI0").unwrap();
        let parent = name.parent().unwrap();
        assert_eq!(parent, AmlName::from_str("\\_SB").unwrap());
        assert_eq!(parent.child(NameSeg(*b"PCI0")), name);
        assert_eq!(AmlName::root().parent(), Err(AmlError::RootHasNoParent));
    }

    #[test]
    fn parse_single_seg() {
        let (path, consumed) = NamePath::parse(b"_HID").unwrap();
        assert_eq!(consumed, 4);
        assert!(path.search_rules_apply());
        assert_eq!(path.segments, vec![NameSeg(*b"_HID")]);
    }

    #[test]
    fn parse_rooted_dual() {
        // \ + dual prefix + _SB_PCI0
        let stream = b"\x5c\x2e_SB_PCI0";
        let (path, consumed) = NamePath::parse(stream).unwrap();
        assert_eq!(consumed, 10);
        assert!(path.root);
        assert_eq!(path.segments.len(), 2);
        assert_eq!(path.resolve(&AmlName::root()).unwrap(), AmlName::from_str("\\_SB.PCI0").unwrap());
    }

    #[test]
    fn parse_parent_escapes() {
        let stream = b"\x5e\x5eABCD";
        let (path, consumed) = NamePath::parse(stream).unwrap();
        assert_eq!(consumed, 6);
        assert_eq!(path.parent_ups, 2);

        let scope = AmlName::from_str("\\_SB.PCI0.SBRG").unwrap();
        assert_eq!(path.resolve(&scope).unwrap(), AmlName::from_str("\\_SB.ABCD").unwrap());

        // ascending past the root is an error
        let scope = AmlName::from_str("\\_SB").unwrap();
        assert_eq!(path.resolve(&scope), Err(AmlError::RootHasNoParent));
    }

    #[test]
    fn parse_multi_prefix() {
        let stream = b"\x2f\x03_SB_PCI0SBRG";
        let (path, consumed) = NamePath::parse(stream).unwrap();
        assert_eq!(consumed, 14);
        assert_eq!(path.segments.len(), 3);
        assert!(!path.search_rules_apply());
    }

    #[test]
    fn name_start_predicate() {
        for byte in [b'A', b'Z', b'_', b'0', 0x5c, 0x5e, 0x2e, 0x2f] {
            assert!(is_name_start(byte));
        }
        for byte in [0x10u8, 0x70, 0xa0, 0xff] {
            assert!(!is_name_start(byte));
        }
    }
}
