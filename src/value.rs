//! The AML object model: the tagged value type produced and consumed by the
//! executor, plus the flag types carried on method and field declarations.

use crate::{name_object::AmlName, AmlError};
use alloc::{string::String, vec::Vec};
use bit_field::BitField;
use bitflags::bitflags;

/// The type of an `AmlValue`, used in diagnostics and conversion errors.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AmlType {
    Integer,
    String,
    Buffer,
    Package,
    Reference,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AmlValue {
    /// All AML integers are unsigned 64-bit.
    Integer(u64),
    String(String),
    Buffer(Vec<u8>),
    /// Fixed-size at construction; elements are never appended or removed.
    Package(Vec<AmlValue>),
    /// A reference to a named object, optionally to one element of it (as
    /// produced by `Index` over a package).
    Reference { target: AmlName, index: Option<u64> },
}

impl AmlValue {
    pub fn zero() -> AmlValue {
        AmlValue::Integer(0)
    }

    pub fn ones() -> AmlValue {
        AmlValue::Integer(u64::MAX)
    }

    /// AML encodes logical results as Ones / Zero.
    pub fn boolean(value: bool) -> AmlValue {
        if value {
            AmlValue::ones()
        } else {
            AmlValue::zero()
        }
    }

    pub fn type_of(&self) -> AmlType {
        match self {
            AmlValue::Integer(_) => AmlType::Integer,
            AmlValue::String(_) => AmlType::String,
            AmlValue::Buffer(_) => AmlType::Buffer,
            AmlValue::Package(_) => AmlType::Package,
            AmlValue::Reference { .. } => AmlType::Reference,
        }
    }

    pub fn as_integer(&self) -> Result<u64, AmlError> {
        match self {
            AmlValue::Integer(value) => Ok(*value),
            /*
             * Buffers convert little-endian from their first 8 bytes; shorter
             * buffers zero-extend.
             */
            AmlValue::Buffer(bytes) => {
                let mut raw = [0u8; 8];
                let length = usize::min(bytes.len(), 8);
                raw[..length].copy_from_slice(&bytes[..length]);
                Ok(u64::from_le_bytes(raw))
            }
            _ => Err(AmlError::IncompatibleValueConversion { current: self.type_of(), target: AmlType::Integer }),
        }
    }

    /// The `SizeOf` measure of a value: integers are treated as qwords,
    /// strings count characters, buffers count bytes, packages count
    /// elements. Other types cannot be measured.
    pub fn size_of(&self) -> Result<u64, AmlError> {
        match self {
            AmlValue::Integer(_) => Ok(8),
            AmlValue::String(string) => Ok(string.len() as u64),
            AmlValue::Buffer(bytes) => Ok(bytes.len() as u64),
            AmlValue::Package(elements) => Ok(elements.len() as u64),
            _ => Err(AmlError::InvalidSizeOfApplication(self.type_of())),
        }
    }
}

/// Arguments passed to a control method. A method can take at most 7.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Args(pub [Option<AmlValue>; 7]);

impl Args {
    pub const EMPTY: Args = {
        // `Option<AmlValue>` is not `Copy`, but consts can initialize arrays
        const NONE: Option<AmlValue> = None;
        Args([NONE; 7])
    };

    pub fn from_list(list: Vec<AmlValue>) -> Result<Args, AmlError> {
        if list.len() > 7 {
            return Err(AmlError::TooManyArgs);
        }
        let mut args = Args::EMPTY;
        for (i, arg) in list.into_iter().enumerate() {
            args.0[i] = Some(arg);
        }
        Ok(args)
    }
}

bitflags! {
    /// The flags byte of a method declaration. The low 3 bits are the
    /// argument count; bits 4-7 are the serialization sync level.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MethodFlags: u8 {
        const SERIALIZE = 1 << 3;
    }
}

impl MethodFlags {
    pub fn arg_count(&self) -> u8 {
        self.bits().get_bits(0..3)
    }

    pub fn sync_level(&self) -> u8 {
        self.bits().get_bits(4..8)
    }
}

bitflags! {
    /// The flags byte of a field-list declaration. The access type occupies
    /// the low nibble and the update rule bits 5-6; they're exposed through
    /// the accessor methods.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FieldFlags: u8 {
        const LOCK = 1 << 4;
    }
}

impl FieldFlags {
    pub fn access_type(&self) -> Result<FieldAccessType, AmlError> {
        match self.bits().get_bits(0..4) {
            0 => Ok(FieldAccessType::Any),
            1 => Ok(FieldAccessType::Byte),
            2 => Ok(FieldAccessType::Word),
            3 => Ok(FieldAccessType::DWord),
            4 => Ok(FieldAccessType::QWord),
            5 => Ok(FieldAccessType::Buffer),
            _ => Err(AmlError::InvalidFieldFlags),
        }
    }

    pub fn update_rule(&self) -> Result<FieldUpdateRule, AmlError> {
        match self.bits().get_bits(5..7) {
            0 => Ok(FieldUpdateRule::Preserve),
            1 => Ok(FieldUpdateRule::WriteAsOnes),
            2 => Ok(FieldUpdateRule::WriteAsZeros),
            _ => Err(AmlError::InvalidFieldFlags),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldAccessType {
    Any,
    Byte,
    Word,
    DWord,
    QWord,
    Buffer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldUpdateRule {
    Preserve,
    WriteAsOnes,
    WriteAsZeros,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::{string::ToString, vec};

    #[test]
    fn size_of_values() {
        assert_eq!(AmlValue::Integer(42).size_of(), Ok(8));
        assert_eq!(AmlValue::String("abc".to_string()).size_of(), Ok(3));
        assert_eq!(AmlValue::Buffer(vec![0; 16]).size_of(), Ok(16));
        assert_eq!(AmlValue::Package(vec![AmlValue::zero(); 4]).size_of(), Ok(4));
        assert_eq!(
            AmlValue::Reference { target: AmlName::root(), index: None }.size_of(),
            Err(AmlError::InvalidSizeOfApplication(AmlType::Reference))
        );
    }

    #[test]
    fn deep_copy_is_independent() {
        let original = AmlValue::Package(vec![
            AmlValue::Buffer(vec![1, 2, 3]),
            AmlValue::String("hello".to_string()),
            AmlValue::Integer(7),
        ]);
        let copy = original.clone();
        assert_eq!(copy.clone(), original);

        // mutating the copy must not reach through to the original
        let mut mutated = copy.clone();
        if let AmlValue::Package(ref mut elements) = mutated {
            elements[0] = AmlValue::Integer(99);
        }
        assert_eq!(copy, original);
        assert_ne!(mutated, original);
    }

    #[test]
    fn buffer_to_integer_is_little_endian() {
        assert_eq!(AmlValue::Buffer(vec![0x78, 0x56, 0x34, 0x12]).as_integer(), Ok(0x1234_5678));
        assert_eq!(AmlValue::Buffer(vec![]).as_integer(), Ok(0));
        assert!(AmlValue::String("nope".to_string()).as_integer().is_err());
    }

    #[test]
    fn method_flags() {
        let flags = MethodFlags::from_bits_retain(0b0010_1011);
        assert_eq!(flags.arg_count(), 3);
        assert!(flags.contains(MethodFlags::SERIALIZE));
        assert_eq!(flags.sync_level(), 2);
    }

    #[test]
    fn field_flags() {
        let flags = FieldFlags::from_bits_retain(0b0101_0010);
        assert_eq!(flags.access_type(), Ok(FieldAccessType::Word));
        assert!(flags.contains(FieldFlags::LOCK));
        assert_eq!(flags.update_rule(), Ok(FieldUpdateRule::WriteAsZeros));
    }

    #[test]
    fn args_marshalling() {
        let args = Args::from_list(vec![AmlValue::Integer(1), AmlValue::Integer(2)]).unwrap();
        assert_eq!(args.0[0], Some(AmlValue::Integer(1)));
        assert_eq!(args.0[2], None);
        assert_eq!(Args::from_list(vec![AmlValue::zero(); 8]), Err(AmlError::TooManyArgs));
    }
}
