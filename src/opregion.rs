//! OperationRegion field I/O.
//!
//! Fields name bit-granular windows inside an OperationRegion; reads and
//! writes are widened to the field's access size, aligned within the region,
//! and performed against the host's port-I/O, physical-memory, or
//! PCI-configuration backends. Writes are read-modify-write, honoring the
//! field's update rule. IndexFields funnel accesses through an index/data
//! register pair.

use crate::{
    name_object::{AmlName, NameSeg},
    namespace::{FieldUnit, IndexFieldUnit, NsObject},
    value::{AmlValue, FieldAccessType, FieldUpdateRule},
    AmlContext, AmlError,
};
use bit_field::BitField;
use log::warn;

/// The address space an OperationRegion windows onto. The tag values are
/// ACPI-defined; `0x80..` is reserved for OEMs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionSpace {
    SystemMemory,
    SystemIo,
    PciConfig,
    EmbeddedControl,
    SMBus,
    SystemCmos,
    PciBarTarget,
    IPMI,
    GeneralPurposeIo,
    GenericSerialBus,
    OemDefined(u8),
}

impl RegionSpace {
    pub fn from_raw(raw: u8) -> RegionSpace {
        match raw {
            0 => RegionSpace::SystemMemory,
            1 => RegionSpace::SystemIo,
            2 => RegionSpace::PciConfig,
            3 => RegionSpace::EmbeddedControl,
            4 => RegionSpace::SMBus,
            5 => RegionSpace::SystemCmos,
            6 => RegionSpace::PciBarTarget,
            7 => RegionSpace::IPMI,
            8 => RegionSpace::GeneralPurposeIo,
            9 => RegionSpace::GenericSerialBus,
            other => RegionSpace::OemDefined(other),
        }
    }
}

/// A PCI geographical address, as discovered from `_BBN` and `_ADR`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PciAddress {
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

#[derive(Clone, Debug)]
pub struct OpRegion {
    pub space: RegionSpace,
    pub base: u64,
    pub length: u64,
    /// Filled on first access to a PCIConfig region; the `_BBN`/`_ADR` walk
    /// is not repeated afterwards.
    pub(crate) pci_address: Option<PciAddress>,
}

impl OpRegion {
    pub fn new(space: RegionSpace, base: u64, length: u64) -> OpRegion {
        OpRegion { space, base, length, pci_address: None }
    }
}

pub(crate) fn read_field(context: &mut AmlContext, field: &FieldUnit) -> Result<AmlValue, AmlError> {
    let region = context.namespace.lookup_opregion(&field.region)?;
    let (access_bits, aligned_byte, shift, mask) = field_geometry(&region, field)?;
    let word = region_read(context, &region, &field.region, aligned_byte, access_bits)?;
    Ok(AmlValue::Integer((word >> shift) & mask))
}

pub(crate) fn write_field(context: &mut AmlContext, field: &FieldUnit, value: u64) -> Result<(), AmlError> {
    let region = context.namespace.lookup_opregion(&field.region)?;
    let (access_bits, aligned_byte, shift, mask) = field_geometry(&region, field)?;

    let mut word = match field.flags.update_rule()? {
        FieldUpdateRule::Preserve => region_read(context, &region, &field.region, aligned_byte, access_bits)?,
        FieldUpdateRule::WriteAsOnes => u64::MAX,
        FieldUpdateRule::WriteAsZeros => 0,
    };
    word &= !(mask << shift);
    word |= (value & mask) << shift;

    region_write(context, &region, &field.region, aligned_byte, access_bits, word)?;

    // legacy settling writes to the POST port after I/O-space accesses
    if region.space == RegionSpace::SystemIo {
        context.handler.write_io_u8(0x80, 0x00);
        context.handler.write_io_u8(0x80, 0x00);
    }

    Ok(())
}

/// IndexField accesses write the byte-granular offset to the index register,
/// then move data through the data register.
pub(crate) fn read_index_field(context: &mut AmlContext, field: &IndexFieldUnit) -> Result<AmlValue, AmlError> {
    let index = lookup_field(context, &field.index)?;
    let data = lookup_field(context, &field.data)?;

    write_field(context, &index, field.bit_offset / 8)?;
    read_field(context, &data)
}

pub(crate) fn write_index_field(
    context: &mut AmlContext,
    field: &IndexFieldUnit,
    value: u64,
) -> Result<(), AmlError> {
    let index = lookup_field(context, &field.index)?;
    let data = lookup_field(context, &field.data)?;

    write_field(context, &index, field.bit_offset / 8)?;
    write_field(context, &data, value)
}

fn lookup_field(context: &AmlContext, path: &AmlName) -> Result<FieldUnit, AmlError> {
    match context.namespace.get(path)? {
        NsObject::Field(field) => Ok(field.clone()),
        object => Err(AmlError::ObjectOfWrongKind { path: path.clone(), found: object.kind() }),
    }
}

/// Works out the concrete geometry of one field access: the access width in
/// bits, the aligned byte offset of the access word within the region, and
/// the shift/mask extracting the field from that word.
fn field_geometry(region: &OpRegion, field: &FieldUnit) -> Result<(u64, u64, u64, u64), AmlError> {
    let access_bits = match region.space {
        // config space is always accessed as dwords
        RegionSpace::PciConfig => 32,
        _ => match field.flags.access_type()? {
            FieldAccessType::Byte | FieldAccessType::Buffer => 8,
            FieldAccessType::Word => 16,
            FieldAccessType::DWord | FieldAccessType::Any => 32,
            FieldAccessType::QWord => 64,
        },
    };

    let shift = field.bit_offset % access_bits;
    if field.bit_length == 0 || field.bit_length > 64 || shift + field.bit_length > access_bits {
        // the window must fit within a single access word
        return Err(AmlError::FieldInvalidAccessSize);
    }

    let aligned_byte = (field.bit_offset / access_bits) * (access_bits / 8);
    let mask = if field.bit_length == 64 { u64::MAX } else { (1u64 << field.bit_length) - 1 };

    Ok((access_bits, aligned_byte, shift, mask))
}

fn region_read(
    context: &mut AmlContext,
    region: &OpRegion,
    region_path: &AmlName,
    offset: u64,
    access_bits: u64,
) -> Result<u64, AmlError> {
    match region.space {
        RegionSpace::SystemIo => {
            let port = (region.base + offset) as u16;
            match access_bits {
                8 => Ok(u64::from(context.handler.read_io_u8(port))),
                16 => Ok(u64::from(context.handler.read_io_u16(port))),
                32 => Ok(u64::from(context.handler.read_io_u32(port))),
                _ => Err(AmlError::FieldInvalidAccessSize),
            }
        }
        RegionSpace::SystemMemory => {
            let address = (region.base + offset) as usize;
            match access_bits {
                8 => Ok(u64::from(context.handler.read_u8(address))),
                16 => Ok(u64::from(context.handler.read_u16(address))),
                32 => Ok(u64::from(context.handler.read_u32(address))),
                64 => Ok(context.handler.read_u64(address)),
                _ => Err(AmlError::FieldInvalidAccessSize),
            }
        }
        RegionSpace::PciConfig => {
            let pci = pci_address(context, region_path)?;
            let config_offset = (region.base + (offset & !0x3)) as u16;
            Ok(u64::from(context.handler.read_pci_u32(0, pci.bus, pci.device, pci.function, config_offset)))
        }
        space => {
            warn!("read from unsupported region space {:?} ({})", space, region_path);
            Err(AmlError::Unimplemented)
        }
    }
}

fn region_write(
    context: &mut AmlContext,
    region: &OpRegion,
    region_path: &AmlName,
    offset: u64,
    access_bits: u64,
    value: u64,
) -> Result<(), AmlError> {
    match region.space {
        RegionSpace::SystemIo => {
            let port = (region.base + offset) as u16;
            match access_bits {
                8 => context.handler.write_io_u8(port, value as u8),
                16 => context.handler.write_io_u16(port, value as u16),
                32 => context.handler.write_io_u32(port, value as u32),
                _ => return Err(AmlError::FieldInvalidAccessSize),
            }
            Ok(())
        }
        RegionSpace::SystemMemory => {
            let address = (region.base + offset) as usize;
            match access_bits {
                8 => context.handler.write_u8(address, value as u8),
                16 => context.handler.write_u16(address, value as u16),
                32 => context.handler.write_u32(address, value as u32),
                64 => context.handler.write_u64(address, value),
                _ => return Err(AmlError::FieldInvalidAccessSize),
            }
            Ok(())
        }
        RegionSpace::PciConfig => {
            let pci = pci_address(context, region_path)?;
            let config_offset = (region.base + (offset & !0x3)) as u16;
            context.handler.write_pci_u32(0, pci.bus, pci.device, pci.function, config_offset, value as u32);
            Ok(())
        }
        space => {
            warn!("write to unsupported region space {:?} ({})", space, region_path);
            Err(AmlError::Unimplemented)
        }
    }
}

/// Finds the bus from the first `_BBN` and the device/function from the first
/// `_ADR` ascending from the region's scope. Firmware commonly omits both on
/// bus 0, so missing objects default to bus 0, device 0, function 0. The
/// result is cached on the region handle.
fn pci_address(context: &mut AmlContext, region_path: &AmlName) -> Result<PciAddress, AmlError> {
    if let NsObject::OpRegion(region) = context.namespace.get(region_path)? {
        if let Some(address) = region.pci_address {
            return Ok(address);
        }
    }

    let scope = region_path.parent()?;
    let bus = match ascend_eval(context, &scope, NameSeg(*b"_BBN"))? {
        Some(value) => value.as_integer()? as u8,
        None => 0,
    };
    let (device, function) = match ascend_eval(context, &scope, NameSeg(*b"_ADR"))? {
        // high word is the slot, low word the function
        Some(value) => {
            let address = value.as_integer()?;
            (address.get_bits(16..32) as u8, address.get_bits(0..16) as u8)
        }
        None => (0, 0),
    };

    let address = PciAddress { bus, device, function };
    if let NsObject::OpRegion(region) = context.namespace.get_mut(region_path)? {
        region.pci_address = Some(address);
    }
    Ok(address)
}

/// Evaluates the nearest object called `seg`, walking from `scope` up to the
/// root. Returns `None` if no enclosing scope defines one.
fn ascend_eval(context: &mut AmlContext, scope: &AmlName, seg: NameSeg) -> Result<Option<AmlValue>, AmlError> {
    let mut current = scope.clone();
    loop {
        let candidate = current.child(seg);
        if context.namespace.contains(&candidate) {
            return context.eval_name(&candidate).map(Some);
        }
        if current.is_root() {
            return Ok(None);
        }
        current = current.parent()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        namespace::ScopeType,
        test_utils::TestHandler,
        value::FieldFlags,
    };
    use alloc::{boxed::Box, vec::Vec};

    fn context_with_region(space: RegionSpace, base: u64, length: u64) -> (AmlContext, TestHandler) {
        let handler = TestHandler::new();
        let mut context = AmlContext::new(Box::new(handler.clone()));
        context
            .namespace
            .insert(AmlName::from_str("\\REGN").unwrap(), NsObject::OpRegion(OpRegion::new(space, base, length)))
            .unwrap();
        (context, handler)
    }

    fn field(bit_offset: u64, bit_length: u64, flags: u8) -> FieldUnit {
        FieldUnit {
            region: AmlName::from_str("\\REGN").unwrap(),
            bit_offset,
            bit_length,
            flags: FieldFlags::from_bits_retain(flags),
        }
    }

    #[test]
    fn write_then_read_masks_to_field_width() {
        let (mut context, _handler) = context_with_region(RegionSpace::SystemMemory, 0x1000, 8);

        // a 5-bit field at bit offset 9, word access
        let f = field(9, 5, 0x02);
        write_field(&mut context, &f, 0xffff).unwrap();
        let value = read_field(&mut context, &f).unwrap();
        assert_eq!(value, AmlValue::Integer(0x1f));
    }

    #[test]
    fn preserve_update_rule_keeps_neighbouring_bits() {
        let (mut context, handler) = context_with_region(RegionSpace::SystemMemory, 0x2000, 8);
        handler.write_memory_u8(0x2000, 0xff);

        // byte access, 4-bit window at bit offset 2, update rule Preserve
        let f = field(2, 4, 0x01);
        write_field(&mut context, &f, 0b0101).unwrap();
        assert_eq!(handler.read_memory_u8(0x2000), 0b1101_0111);
    }

    #[test]
    fn write_as_zeros_clears_neighbouring_bits() {
        let (mut context, handler) = context_with_region(RegionSpace::SystemMemory, 0x2000, 8);
        handler.write_memory_u8(0x2000, 0xff);

        let f = field(2, 4, 0x41); // byte access, update rule WriteAsZeros
        write_field(&mut context, &f, 0b0101).unwrap();
        assert_eq!(handler.read_memory_u8(0x2000), 0b0001_0100);
    }

    #[test]
    fn io_write_emits_settling_writes() {
        let (mut context, handler) = context_with_region(RegionSpace::SystemIo, 0x70, 2);

        let f = field(0, 8, 0x01);
        write_field(&mut context, &f, 0xab).unwrap();

        let writes: Vec<(u16, u8)> = handler.port_writes();
        assert_eq!(writes, alloc::vec![(0x70, 0xab), (0x80, 0x00), (0x80, 0x00)]);
    }

    #[test]
    fn field_must_fit_access_word() {
        let (mut context, _handler) = context_with_region(RegionSpace::SystemMemory, 0x1000, 8);

        // 12-bit field at bit offset 6 straddles two byte accesses
        let f = field(6, 12, 0x01);
        assert_eq!(read_field(&mut context, &f), Err(AmlError::FieldInvalidAccessSize));
    }

    #[test]
    fn index_field_protocol() {
        let handler = TestHandler::new();
        let mut context = AmlContext::new(Box::new(handler.clone()));
        let region = AmlName::from_str("\\REGN").unwrap();
        context
            .namespace
            .insert(region.clone(), NsObject::OpRegion(OpRegion::new(RegionSpace::SystemIo, 0x70, 2)))
            .unwrap();
        context
            .namespace
            .insert(AmlName::from_str("\\IDX").unwrap(), NsObject::Field(field(0, 8, 0x01)))
            .unwrap();
        context
            .namespace
            .insert(AmlName::from_str("\\DAT").unwrap(), NsObject::Field(field(8, 8, 0x01)))
            .unwrap();

        let index_field = IndexFieldUnit {
            index: AmlName::from_str("\\IDX").unwrap(),
            data: AmlName::from_str("\\DAT").unwrap(),
            bit_offset: 0x30 * 8,
            bit_length: 8,
            flags: FieldFlags::from_bits_retain(0x01),
        };
        write_index_field(&mut context, &index_field, 0x42).unwrap();

        let writes = handler.port_writes();
        // index register selects byte 0x30, then the data register carries the value
        assert_eq!(writes[0], (0x70, 0x30));
        assert_eq!(writes[1], (0x80, 0x00));
        assert_eq!(writes[2], (0x80, 0x00));
        assert_eq!(writes[3], (0x71, 0x42));
    }

    #[test]
    fn pci_address_from_bbn_and_adr() {
        let handler = TestHandler::new();
        let mut context = AmlContext::new(Box::new(handler.clone()));

        let pci0 = AmlName::from_str("\\_SB.PCI0").unwrap();
        context.namespace.insert(pci0.clone(), NsObject::Scope(ScopeType::Device)).unwrap();
        context
            .namespace
            .insert(pci0.child(NameSeg(*b"_BBN")), NsObject::Name(AmlValue::Integer(2)))
            .unwrap();
        context
            .namespace
            .insert(pci0.child(NameSeg(*b"_ADR")), NsObject::Name(AmlValue::Integer(0x001f_0003)))
            .unwrap();

        let region = pci0.child(NameSeg(*b"CFGR"));
        context
            .namespace
            .insert(region.clone(), NsObject::OpRegion(OpRegion::new(RegionSpace::PciConfig, 0x40, 0x10)))
            .unwrap();
        handler.write_pci(2, 0x1f, 3, 0x40, 0xdead_beef);

        let f = FieldUnit {
            region: region.clone(),
            bit_offset: 0,
            bit_length: 32,
            flags: FieldFlags::from_bits_retain(0x03),
        };
        assert_eq!(read_field(&mut context, &f), Ok(AmlValue::Integer(0xdead_beef)));

        // the resolved address is cached on the region handle
        match context.namespace.get(&region).unwrap() {
            NsObject::OpRegion(r) => {
                assert_eq!(r.pci_address, Some(PciAddress { bus: 2, device: 0x1f, function: 3 }))
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn pci_defaults_when_bbn_and_adr_missing() {
        let (mut context, handler) = context_with_region(RegionSpace::PciConfig, 0x00, 0x100);
        handler.write_pci(0, 0, 0, 0x00, 0x8086_1234);

        let f = field(0, 16, 0x03);
        assert_eq!(read_field(&mut context, &f), Ok(AmlValue::Integer(0x1234)));
    }
}
