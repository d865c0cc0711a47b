//! Load-time population of the namespace from an AML table.
//!
//! Tables are term lists of definitions: scopes, devices, names, methods,
//! opregions and their field lists. The walk tracks the current scope and
//! installs each definition at its absolute name; method bodies are copied
//! but not executed. Control flow never appears at table level.

use crate::{
    expression,
    name_object::{AmlName, NamePath, NameSeg},
    namespace::{FieldUnit, IndexFieldUnit, NsObject, ScopeType},
    opcode,
    opregion::{OpRegion, RegionSpace},
    pkg_length::PkgLength,
    value::{Args, FieldFlags, MethodFlags},
    AmlContext, AmlError, MethodState,
};
use log::{debug, error};

pub(crate) fn load_table(context: &mut AmlContext, stream: &[u8]) -> Result<(), AmlError> {
    if stream.is_empty() {
        return Err(AmlError::UnexpectedEndOfStream);
    }
    parse_term_list(context, &AmlName::root(), stream)
}

fn parse_term_list(context: &mut AmlContext, scope: &AmlName, code: &[u8]) -> Result<(), AmlError> {
    let mut offset = 0;
    while offset < code.len() {
        offset += parse_term_obj(context, scope, &code[offset..])?;
    }
    Ok(())
}

fn parse_term_obj(context: &mut AmlContext, scope: &AmlName, code: &[u8]) -> Result<usize, AmlError> {
    match code[0] {
        opcode::SCOPE_OP => {
            // DefScope := ScopeOp PkgLength NameString TermList
            let (end, mut offset) = block_extent(code, 1)?;
            let (path, name_len) = NamePath::parse(&code[offset..end])?;
            offset += name_len;
            let name = path.resolve(scope)?;
            if !context.namespace.contains(&name) {
                context.namespace.insert(name.clone(), NsObject::Scope(ScopeType::Scope))?;
            }
            parse_term_list(context, &name, &code[offset..end])?;
            Ok(end)
        }
        opcode::NAME_OP => {
            // DefName := NameOp NameString DataRefObject
            let (path, name_len) = NamePath::parse(&code[1..])?;
            let name = path.resolve(scope)?;
            let mut state = MethodState::new(scope.clone(), Args::EMPTY);
            let (value, value_len) = expression::eval_operand(context, &mut state, &code[1 + name_len..])?;
            context.namespace.insert(name, NsObject::Name(value))?;
            Ok(1 + name_len + value_len)
        }
        opcode::ALIAS_OP => {
            // DefAlias := AliasOp NameString(source) NameString(alias)
            let (source, source_len) = NamePath::parse(&code[1..])?;
            let target = match context.namespace.search(&source, scope) {
                Ok(resolved) => resolved,
                // the source may be defined by a later table
                Err(_) => source.resolve(scope)?,
            };
            let (alias_path, alias_len) = NamePath::parse(&code[1 + source_len..])?;
            let alias = alias_path.resolve(scope)?;
            context.namespace.insert(alias, NsObject::Alias(target))?;
            Ok(1 + source_len + alias_len)
        }
        opcode::METHOD_OP => {
            // DefMethod := MethodOp PkgLength NameString MethodFlags TermList
            let (end, mut offset) = block_extent(code, 1)?;
            let (path, name_len) = NamePath::parse(&code[offset..end])?;
            offset += name_len;
            let name = path.resolve(scope)?;
            let flags = *code.get(offset).ok_or(AmlError::UnexpectedEndOfStream)?;
            offset += 1;
            context.namespace.insert(
                name,
                NsObject::Method {
                    flags: MethodFlags::from_bits_retain(flags),
                    code: code[offset..end].to_vec(),
                },
            )?;
            Ok(end)
        }
        opcode::EXTERNAL_OP => {
            // a declaration for another table's object; nothing to install
            let (path, name_len) = NamePath::parse(&code[1..])?;
            debug!("skipping External declaration {:?}", path);
            Ok(1 + name_len + 2)
        }
        opcode::EXT_OP_PREFIX => parse_ext_term_obj(context, scope, code),
        other => {
            error!(
                "undefined opcode at table level, sequence {:02x?}",
                &code[..usize::min(code.len(), 4)]
            );
            Err(AmlError::UnexpectedByte(other))
        }
    }
}

fn parse_ext_term_obj(context: &mut AmlContext, scope: &AmlName, code: &[u8]) -> Result<usize, AmlError> {
    match *code.get(1).ok_or(AmlError::UnexpectedEndOfStream)? {
        opcode::EXT_OP_REGION_OP => {
            // DefOpRegion := OpRegionOp NameString RegionSpace(byte) Base(TermArg) Len(TermArg)
            let (path, name_len) = NamePath::parse(&code[2..])?;
            let name = path.resolve(scope)?;
            let mut offset = 2 + name_len;
            let space = *code.get(offset).ok_or(AmlError::UnexpectedEndOfStream)?;
            offset += 1;

            let mut state = MethodState::new(scope.clone(), Args::EMPTY);
            let (base, base_len) = expression::eval_operand(context, &mut state, &code[offset..])?;
            offset += base_len;
            let (length, length_len) = expression::eval_operand(context, &mut state, &code[offset..])?;
            offset += length_len;

            context.namespace.insert(
                name,
                NsObject::OpRegion(OpRegion::new(
                    RegionSpace::from_raw(space),
                    base.as_integer()?,
                    length.as_integer()?,
                )),
            )?;
            Ok(offset)
        }
        opcode::EXT_FIELD_OP => {
            // DefField := FieldOp PkgLength NameString(region) FieldFlags FieldList
            let (end, mut offset) = block_extent(code, 2)?;
            let (region_path, region_len) = NamePath::parse(&code[offset..end])?;
            let region = context.namespace.search(&region_path, scope)?;
            offset += region_len;
            let flags = *code.get(offset).ok_or(AmlError::UnexpectedEndOfStream)?;
            offset += 1;

            parse_field_list(context, scope, &code[offset..end], flags, |bit_offset, bit_length, flags| {
                NsObject::Field(FieldUnit { region: region.clone(), bit_offset, bit_length, flags })
            })?;
            Ok(end)
        }
        opcode::EXT_INDEX_FIELD_OP => {
            // DefIndexField := IndexFieldOp PkgLength Index(NameString) Data(NameString) FieldFlags FieldList
            let (end, mut offset) = block_extent(code, 2)?;
            let (index_path, index_len) = NamePath::parse(&code[offset..end])?;
            let index = context.namespace.search(&index_path, scope)?;
            offset += index_len;
            let (data_path, data_len) = NamePath::parse(&code[offset..end])?;
            let data = context.namespace.search(&data_path, scope)?;
            offset += data_len;
            let flags = *code.get(offset).ok_or(AmlError::UnexpectedEndOfStream)?;
            offset += 1;

            parse_field_list(context, scope, &code[offset..end], flags, |bit_offset, bit_length, flags| {
                NsObject::IndexField(IndexFieldUnit {
                    index: index.clone(),
                    data: data.clone(),
                    bit_offset,
                    bit_length,
                    flags,
                })
            })?;
            Ok(end)
        }
        ext_op @ (opcode::EXT_DEVICE_OP | opcode::EXT_THERMAL_ZONE_OP) => {
            // DefDevice/DefThermalZone := Op PkgLength NameString TermList
            let (end, mut offset) = block_extent(code, 2)?;
            let (path, name_len) = NamePath::parse(&code[offset..end])?;
            offset += name_len;
            let name = path.resolve(scope)?;
            let scope_type = if ext_op == opcode::EXT_DEVICE_OP {
                ScopeType::Device
            } else {
                ScopeType::ThermalZone
            };
            context.namespace.insert(name.clone(), NsObject::Scope(scope_type))?;
            parse_term_list(context, &name, &code[offset..end])?;
            Ok(end)
        }
        opcode::EXT_PROCESSOR_OP => {
            // DefProcessor := ProcessorOp PkgLength NameString ProcID(byte) PblkAddr(dword) PblkLen(byte) TermList
            let (end, mut offset) = block_extent(code, 2)?;
            let (path, name_len) = NamePath::parse(&code[offset..end])?;
            offset += name_len;
            let name = path.resolve(scope)?;
            code.get(offset..offset + 6).ok_or(AmlError::UnexpectedEndOfStream)?;
            offset += 6;
            context.namespace.insert(name.clone(), NsObject::Scope(ScopeType::Processor))?;
            parse_term_list(context, &name, &code[offset..end])?;
            Ok(end)
        }
        opcode::EXT_POWER_RES_OP => {
            // DefPowerRes := PowerResOp PkgLength NameString SystemLevel(byte) ResourceOrder(word) TermList
            let (end, mut offset) = block_extent(code, 2)?;
            let (path, name_len) = NamePath::parse(&code[offset..end])?;
            offset += name_len;
            let name = path.resolve(scope)?;
            code.get(offset..offset + 3).ok_or(AmlError::UnexpectedEndOfStream)?;
            offset += 3;
            context.namespace.insert(name.clone(), NsObject::Scope(ScopeType::PowerResource))?;
            parse_term_list(context, &name, &code[offset..end])?;
            Ok(end)
        }
        opcode::EXT_MUTEX_OP => {
            // no concurrency surface; the declaration carries no state
            let (path, name_len) = NamePath::parse(&code[2..])?;
            debug!("ignoring Mutex definition {:?}", path);
            Ok(2 + name_len + 1)
        }
        opcode::EXT_EVENT_OP => {
            let (path, name_len) = NamePath::parse(&code[2..])?;
            debug!("ignoring Event definition {:?}", path);
            Ok(2 + name_len)
        }
        other => {
            error!(
                "undefined extended opcode at table level, sequence {:02x?}",
                &code[..usize::min(code.len(), 4)]
            );
            Err(AmlError::UnexpectedByte(other))
        }
    }
}

/// Decodes the PkgLength at `offset` (just past the opcode bytes), bounds-
/// checks it, and returns the block's end and the offset of its content.
fn block_extent(code: &[u8], offset: usize) -> Result<(usize, usize), AmlError> {
    let pkg = PkgLength::parse(&code[offset..])?;
    let end = offset + pkg.raw_length as usize;
    if code.len() < end {
        return Err(AmlError::UnexpectedEndOfStream);
    }
    Ok((end, offset + pkg.encoding_size))
}

/// Walks a field list, tracking the running bit offset, and installs each
/// named entry into `scope` via `make`. Reserved entries advance the offset;
/// access entries swap the access type for the remainder of the list.
fn parse_field_list<F>(
    context: &mut AmlContext,
    scope: &AmlName,
    code: &[u8],
    flags: u8,
    mut make: F,
) -> Result<(), AmlError>
where
    F: FnMut(u64, u64, FieldFlags) -> NsObject,
{
    let mut offset = 0;
    let mut bit_offset: u64 = 0;
    let mut flags = flags;

    while offset < code.len() {
        match code[offset] {
            0x00 => {
                // ReservedField: the PkgLength is a count of bits to skip
                let pkg = PkgLength::parse(&code[offset + 1..])?;
                bit_offset += u64::from(pkg.raw_length);
                offset += 1 + pkg.encoding_size;
            }
            0x01 => {
                // AccessField: AccessType(byte) AccessAttrib(byte)
                let access_type = *code.get(offset + 1).ok_or(AmlError::UnexpectedEndOfStream)?;
                code.get(offset + 2).ok_or(AmlError::UnexpectedEndOfStream)?;
                flags = (flags & 0xf0) | (access_type & 0x0f);
                offset += 3;
            }
            entry @ (0x02 | 0x03) => {
                error!("unimplemented field-list entry type {:#04x}", entry);
                return Err(AmlError::Unimplemented);
            }
            _ => {
                // NamedField := NameSeg PkgLength(bit count)
                let bytes = code.get(offset..offset + 4).ok_or(AmlError::UnexpectedEndOfStream)?;
                let seg = NameSeg::from_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])?;
                offset += 4;
                let pkg = PkgLength::parse(&code[offset..])?;
                offset += pkg.encoding_size;

                let bit_length = u64::from(pkg.raw_length);
                context.namespace.insert(
                    scope.child(seg),
                    make(bit_offset, bit_length, FieldFlags::from_bits_retain(flags)),
                )?;
                bit_offset += bit_length;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_utils::TestHandler, value::AmlValue, Args};
    use alloc::{boxed::Box, vec::Vec};

    fn context() -> AmlContext {
        AmlContext::new(Box::new(TestHandler::new()))
    }

    fn name(string: &str) -> AmlName {
        AmlName::from_str(string).unwrap()
    }

    /// Encodes `op` (with an optional 0x5B prefix) followed by a PkgLength
    /// covering `content`.
    fn pkg_block(op: &[u8], content: &[u8]) -> Vec<u8> {
        assert!(content.len() + 1 <= 0x3f);
        let mut encoded = op.to_vec();
        encoded.push((content.len() + 1) as u8);
        encoded.extend_from_slice(content);
        encoded
    }

    fn concat(parts: &[&[u8]]) -> Vec<u8> {
        parts.iter().flat_map(|part| part.iter().copied()).collect()
    }

    #[test]
    fn scopes_names_and_methods() {
        let mut context = context();

        // Scope(\_SB_) {
        //     Device(PCI0) {
        //         Name(_ADR, 0)
        //         Name(_BBN, One)
        //     }
        // }
        // Method(MTH0, 0) { Return(One) }
        let device_body = concat(&[
            &[0x08u8][..],
            b"_ADR",
            &[0x00],
            &[0x08],
            b"_BBN",
            &[0x01],
        ]);
        let device = pkg_block(&[0x5b, 0x82], &concat(&[b"PCI0", &device_body]));
        let scope = pkg_block(&[0x10], &concat(&[b"_SB_", &device]));
        let method = pkg_block(&[0x14], &concat(&[b"MTH0", &[0x00u8, 0xa4, 0x01]]));
        let table = concat(&[&scope, &method]);

        context.parse_table(&table).unwrap();

        assert!(matches!(
            context.namespace.get(&name("\\_SB.PCI0")).unwrap(),
            NsObject::Scope(ScopeType::Device)
        ));
        assert!(matches!(
            context.namespace.get(&name("\\_SB.PCI0._ADR")).unwrap(),
            NsObject::Name(AmlValue::Integer(0))
        ));
        assert_eq!(context.invoke_method(&name("\\MTH0"), Args::EMPTY), Ok(AmlValue::Integer(1)));
    }

    #[test]
    fn opregion_and_field_list() {
        let mut context = context();

        // OperationRegion(GPIO, SystemIO, 0x620, 0x10)
        // Field(GPIO, ByteAcc, NoLock, Preserve) {
        //     LED0, 1,
        //     Offset(1),     // reserved gap up to bit 8
        //     DATA, 8,
        // }
        let opregion = concat(&[
            &[0x5bu8, 0x80][..],
            b"GPIO",
            &[0x01],             // SystemIO
            &[0x0b, 0x20, 0x06], // base 0x620
            &[0x0a, 0x10],       // length 0x10
        ]);
        let field_list = concat(&[
            b"LED0",
            &[0x01u8],    // 1 bit
            &[0x00, 0x07], // reserved: skip 7 bits
            b"DATA",
            &[0x08], // 8 bits
        ]);
        let field = pkg_block(&[0x5b, 0x81], &concat(&[b"GPIO", &[0x01u8], &field_list]));
        let table = concat(&[&opregion, &field]);

        context.parse_table(&table).unwrap();

        match context.namespace.get(&name("\\GPIO")).unwrap() {
            NsObject::OpRegion(region) => {
                assert_eq!(region.space, RegionSpace::SystemIo);
                assert_eq!(region.base, 0x620);
                assert_eq!(region.length, 0x10);
            }
            _ => unreachable!(),
        }
        match context.namespace.get(&name("\\LED0")).unwrap() {
            NsObject::Field(unit) => {
                assert_eq!((unit.bit_offset, unit.bit_length), (0, 1));
                assert_eq!(unit.region, name("\\GPIO"));
            }
            _ => unreachable!(),
        }
        match context.namespace.get(&name("\\DATA")).unwrap() {
            NsObject::Field(unit) => assert_eq!((unit.bit_offset, unit.bit_length), (8, 8)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn index_field_list() {
        let mut context = context();

        let opregion = concat(&[
            &[0x5bu8, 0x80][..],
            b"REGN",
            &[0x01],
            &[0x0a, 0x70],
            &[0x0a, 0x02],
        ]);
        let pair = pkg_block(
            &[0x5b, 0x81],
            &concat(&[b"REGN", &[0x01u8], b"IDX_", &[0x08u8], b"DAT_", &[0x08u8]]),
        );
        let index_field = pkg_block(
            &[0x5b, 0x86],
            &concat(&[b"IDX_", b"DAT_", &[0x01u8], b"CMOS", &[0x20u8]]),
        );
        let table = concat(&[&opregion, &pair, &index_field]);

        context.parse_table(&table).unwrap();

        match context.namespace.get(&name("\\CMOS")).unwrap() {
            NsObject::IndexField(unit) => {
                assert_eq!(unit.index, name("\\IDX_"));
                assert_eq!(unit.data, name("\\DAT_"));
                assert_eq!((unit.bit_offset, unit.bit_length), (0, 0x20));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn alias_installed() {
        let mut context = context();

        // Name(REAL, 7); Alias(REAL, NICK)
        let table = concat(&[
            &[0x08u8][..],
            b"REAL",
            &[0x0a, 0x07],
            &[0x06],
            b"REAL",
            b"NICK",
        ]);
        context.parse_table(&table).unwrap();

        assert!(matches!(context.namespace.get(&name("\\NICK")).unwrap(), NsObject::Alias(_)));
        assert_eq!(context.eval_name(&name("\\NICK")), Ok(AmlValue::Integer(7)));
    }

    #[test]
    fn name_with_package_value() {
        let mut context = context();

        // Name(_PRT, Package(2) { 0x10, DEV0 }) - DEV0 is a forward reference
        let package = pkg_block(&[0x12], &concat(&[&[0x02u8, 0x0a, 0x10][..], b"DEV0"]));
        let table = concat(&[&[0x08u8][..], b"_PRT", &package]);
        context.parse_table(&table).unwrap();

        match context.namespace.get(&name("\\_PRT")).unwrap() {
            NsObject::Name(AmlValue::Package(elements)) => {
                assert_eq!(elements[0], AmlValue::Integer(0x10));
                assert_eq!(elements[1], AmlValue::Reference { target: name("\\DEV0"), index: None });
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn truncated_table_is_a_decode_error() {
        let mut context = context();
        // Scope with a PkgLength running past the end of the stream
        assert_eq!(context.parse_table(&[0x10, 0x20, b'_', b'S', b'B', b'_']), Err(AmlError::UnexpectedEndOfStream));
        assert_eq!(context.parse_table(&[]), Err(AmlError::UnexpectedEndOfStream));
    }

    #[test]
    fn unknown_table_level_opcode_is_reported() {
        let mut context = context();
        assert_eq!(context.parse_table(&[0x70, 0x01, 0x60]), Err(AmlError::UnexpectedByte(0x70)));
    }
}
