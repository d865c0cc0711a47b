//! The object evaluator and the Type2 (expression) opcode handlers.
//!
//! `eval_operand` decodes one operand from the front of a byte stream into an
//! `AmlValue`: literals, locals and args, buffers, packages, name references
//! (which may turn into method invocations or opregion reads), and every
//! Type2 expression. `write_object` is its write-side counterpart,
//! dispatching on the destination encoding. Type2 handlers share one
//! skeleton: evaluate the operands, compute, write the target, yield the
//! result.

use crate::{
    name_object::{self, NamePath},
    namespace::NsObject,
    opcode, opregion,
    pkg_length::PkgLength,
    value::{AmlValue, Args},
    AmlContext, AmlError, MethodState,
};
use alloc::{string::String, vec, vec::Vec};
use core::str;
use log::{error, info, warn};

/// Evaluates one operand, returning its value and the number of bytes
/// consumed.
pub(crate) fn eval_operand(
    context: &mut AmlContext,
    state: &mut MethodState,
    stream: &[u8],
) -> Result<(AmlValue, usize), AmlError> {
    let op = *stream.first().ok_or(AmlError::UnexpectedEndOfStream)?;
    match op {
        opcode::LOCAL0_OP..=opcode::LOCAL7_OP => {
            Ok((state.local((op - opcode::LOCAL0_OP) as usize).clone(), 1))
        }
        opcode::ARG0_OP..=opcode::ARG6_OP => Ok((state.arg((op - opcode::ARG0_OP) as usize).clone(), 1)),
        opcode::ZERO_OP => Ok((AmlValue::zero(), 1)),
        opcode::ONE_OP => Ok((AmlValue::Integer(1), 1)),
        opcode::ONES_OP => Ok((AmlValue::ones(), 1)),
        opcode::BYTE_PREFIX => {
            let byte = *stream.get(1).ok_or(AmlError::UnexpectedEndOfStream)?;
            Ok((AmlValue::Integer(u64::from(byte)), 2))
        }
        opcode::WORD_PREFIX => {
            let bytes = stream.get(1..3).ok_or(AmlError::UnexpectedEndOfStream)?;
            Ok((AmlValue::Integer(u64::from(u16::from_le_bytes([bytes[0], bytes[1]]))), 3))
        }
        opcode::DWORD_PREFIX => {
            let bytes = stream.get(1..5).ok_or(AmlError::UnexpectedEndOfStream)?;
            Ok((
                AmlValue::Integer(u64::from(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))),
                5,
            ))
        }
        opcode::QWORD_PREFIX => {
            let bytes = stream.get(1..9).ok_or(AmlError::UnexpectedEndOfStream)?;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            Ok((AmlValue::Integer(u64::from_le_bytes(raw)), 9))
        }
        opcode::STRING_PREFIX => eval_string(stream),
        opcode::BUFFER_OP => eval_buffer(context, state, stream),
        opcode::PACKAGE_OP => eval_package(context, state, stream),
        opcode::SIZE_OF_OP => {
            let (value, consumed) = eval_operand(context, state, &stream[1..])?;
            Ok((AmlValue::Integer(value.size_of()?), 1 + consumed))
        }
        opcode::DEREF_OF_OP => {
            let (value, consumed) = eval_operand(context, state, &stream[1..])?;
            Ok((deref(context, value)?, 1 + consumed))
        }
        opcode::INDEX_OP => eval_index(context, state, stream),
        opcode::REF_OF_OP => {
            let target = *stream.get(1).ok_or(AmlError::UnexpectedEndOfStream)?;
            if name_object::is_name_start(target) {
                let (path, name_len) = NamePath::parse(&stream[1..])?;
                let name = context.namespace.search(&path, state.scope())?;
                Ok((AmlValue::Reference { target: name, index: None }, 1 + name_len))
            } else {
                warn!("RefOf of a non-name operand is not supported");
                Err(AmlError::Unimplemented)
            }
        }
        opcode::EXT_OP_PREFIX => match *stream.get(1).ok_or(AmlError::UnexpectedEndOfStream)? {
            opcode::EXT_REVISION_OP => Ok((AmlValue::Integer(crate::AML_INTERPRETER_REVISION), 2)),
            other => {
                warn!("unimplemented extended opcode {:#04x} in operand position", other);
                Err(AmlError::Unimplemented)
            }
        },
        _ if name_object::is_name_start(op) => eval_name_reference(context, state, stream),
        _ => match eval_type2(context, state, stream)? {
            Some(result) => Ok(result),
            None => {
                error!(
                    "undefined opcode in operand position, sequence {:02x?}",
                    &stream[..usize::min(stream.len(), 4)]
                );
                Err(AmlError::UnexpectedByte(op))
            }
        },
    }
}

/// Whether `op` starts a Type2 expression. The statement executor uses this
/// to evaluate expression statements for their side effects.
pub(crate) fn is_type2_op(op: u8) -> bool {
    matches!(
        op,
        opcode::STORE_OP..=opcode::MOD_OP
            | opcode::SIZE_OF_OP..=opcode::MATCH_OP
            | opcode::OBJECT_TYPE_OP
            | opcode::L_AND_OP..=opcode::L_LESS_OP
            | opcode::TO_BUFFER_OP..=opcode::TO_INTEGER_OP
            | opcode::TO_STRING_OP..=opcode::MID_OP
    )
}

/// Dispatches a Type2 expression opcode. Returns `None` if the first byte
/// isn't one, so `eval_operand` can report an undefined opcode instead.
fn eval_type2(
    context: &mut AmlContext,
    state: &mut MethodState,
    stream: &[u8],
) -> Result<Option<(AmlValue, usize)>, AmlError> {
    let op = *stream.first().ok_or(AmlError::UnexpectedEndOfStream)?;
    let result = match op {
        opcode::STORE_OP => {
            // DefStore := StoreOp TermArg SuperName
            let (value, value_len) = eval_operand(context, state, &stream[1..])?;
            let target_len = write_object(context, state, &stream[1 + value_len..], &value)?;
            (value, 1 + value_len + target_len)
        }
        opcode::ADD_OP => binary_op(context, state, stream, |a, b| Ok(a.wrapping_add(b)))?,
        opcode::SUBTRACT_OP => binary_op(context, state, stream, |a, b| Ok(a.wrapping_sub(b)))?,
        opcode::MULTIPLY_OP => binary_op(context, state, stream, |a, b| Ok(a.wrapping_mul(b)))?,
        opcode::MOD_OP => {
            binary_op(context, state, stream, |a, b| if b == 0 { Err(AmlError::DivideByZero) } else { Ok(a % b) })?
        }
        opcode::AND_OP => binary_op(context, state, stream, |a, b| Ok(a & b))?,
        opcode::NAND_OP => binary_op(context, state, stream, |a, b| Ok(!(a & b)))?,
        opcode::OR_OP => binary_op(context, state, stream, |a, b| Ok(a | b))?,
        opcode::NOR_OP => binary_op(context, state, stream, |a, b| Ok(!(a | b)))?,
        opcode::XOR_OP => binary_op(context, state, stream, |a, b| Ok(a ^ b))?,
        opcode::SHIFT_LEFT_OP => binary_op(context, state, stream, |a, b| {
            if b > 63 {
                Err(AmlError::InvalidShiftLeft)
            } else {
                Ok(a << b)
            }
        })?,
        opcode::SHIFT_RIGHT_OP => binary_op(context, state, stream, |a, b| {
            if b > 63 {
                Err(AmlError::InvalidShiftRight)
            } else {
                Ok(a >> b)
            }
        })?,
        opcode::NOT_OP => unary_op(context, state, stream, |a| Ok(!a))?,
        // one-based bit positions of the most/least significant set bit
        opcode::FIND_SET_LEFT_BIT_OP => {
            unary_op(context, state, stream, |a| Ok(64 - u64::from(a.leading_zeros())))?
        }
        opcode::FIND_SET_RIGHT_BIT_OP => unary_op(context, state, stream, |a| {
            Ok(if a == 0 { 0 } else { u64::from(a.trailing_zeros()) + 1 })
        })?,
        opcode::DIVIDE_OP => divide(context, state, stream)?,
        opcode::INCREMENT_OP => increment(context, state, stream, |value| value.wrapping_add(1))?,
        opcode::DECREMENT_OP => increment(context, state, stream, |value| value.wrapping_sub(1))?,
        opcode::L_AND_OP => comparison(context, state, stream, |a, b| a != 0 && b != 0)?,
        opcode::L_OR_OP => comparison(context, state, stream, |a, b| a != 0 || b != 0)?,
        opcode::L_EQUAL_OP => comparison(context, state, stream, |a, b| a == b)?,
        opcode::L_GREATER_OP => comparison(context, state, stream, |a, b| a > b)?,
        opcode::L_LESS_OP => comparison(context, state, stream, |a, b| a < b)?,
        opcode::L_NOT_OP => {
            /*
             * LNotEqual/LLessEqual/LGreaterEqual are encoded as LNot fused
             * onto the base comparison, which falls out naturally by
             * evaluating the operand and inverting its truthiness.
             */
            let (value, consumed) = eval_operand(context, state, &stream[1..])?;
            (AmlValue::boolean(value.as_integer()? == 0), 1 + consumed)
        }
        // also valid in expression positions; eval_operand dispatches them
        opcode::SIZE_OF_OP | opcode::DEREF_OF_OP | opcode::INDEX_OP | opcode::REF_OF_OP => {
            return eval_operand(context, state, stream).map(Some);
        }
        opcode::CONCAT_OP
        | opcode::CONCAT_RES_OP
        | opcode::MATCH_OP
        | opcode::OBJECT_TYPE_OP
        | opcode::TO_BUFFER_OP
        | opcode::TO_DECIMAL_STRING_OP
        | opcode::TO_HEX_STRING_OP
        | opcode::TO_INTEGER_OP
        | opcode::TO_STRING_OP
        | opcode::COPY_OBJECT_OP
        | opcode::MID_OP => {
            warn!("unimplemented Type2 opcode {:#04x}", op);
            return Err(AmlError::Unimplemented);
        }
        _ => return Ok(None),
    };
    Ok(Some(result))
}

/// Writes `value` through the destination encoded at the front of `stream`,
/// returning the bytes the destination encoding occupies. Integer literals
/// are the null target: the value is discarded.
pub(crate) fn write_object(
    context: &mut AmlContext,
    state: &mut MethodState,
    stream: &[u8],
    value: &AmlValue,
) -> Result<usize, AmlError> {
    let op = *stream.first().ok_or(AmlError::UnexpectedEndOfStream)?;
    match op {
        opcode::LOCAL0_OP..=opcode::LOCAL7_OP => {
            *state.local_mut((op - opcode::LOCAL0_OP) as usize) = value.clone();
            Ok(1)
        }
        opcode::ARG0_OP..=opcode::ARG6_OP => {
            *state.arg_mut((op - opcode::ARG0_OP) as usize) = value.clone();
            Ok(1)
        }
        opcode::ZERO_OP | opcode::ONE_OP | opcode::ONES_OP => Ok(1),
        opcode::BYTE_PREFIX => {
            stream.get(1).ok_or(AmlError::UnexpectedEndOfStream)?;
            Ok(2)
        }
        opcode::WORD_PREFIX => {
            stream.get(1..3).ok_or(AmlError::UnexpectedEndOfStream)?;
            Ok(3)
        }
        opcode::DWORD_PREFIX => {
            stream.get(1..5).ok_or(AmlError::UnexpectedEndOfStream)?;
            Ok(5)
        }
        opcode::QWORD_PREFIX => {
            stream.get(1..9).ok_or(AmlError::UnexpectedEndOfStream)?;
            Ok(9)
        }
        // stores to the Debug object route to the log
        opcode::EXT_OP_PREFIX if stream.get(1) == Some(&opcode::EXT_DEBUG_OP) => {
            info!("AML Debug: {:?}", value);
            Ok(2)
        }
        opcode::INDEX_OP => write_index(context, state, stream, value),
        _ if name_object::is_name_start(op) => {
            let (path, name_len) = NamePath::parse(stream)?;
            let name = context.namespace.search(&path, state.scope())?;
            match context.namespace.get(&name)?.clone() {
                NsObject::Name(_) => {
                    *context.namespace.get_mut(&name)? = NsObject::Name(value.clone());
                    Ok(name_len)
                }
                NsObject::Field(field) => {
                    opregion::write_field(context, &field, value.as_integer()?)?;
                    Ok(name_len)
                }
                NsObject::IndexField(field) => {
                    opregion::write_index_field(context, &field, value.as_integer()?)?;
                    Ok(name_len)
                }
                object => Err(AmlError::ObjectOfWrongKind { path: name, found: object.kind() }),
            }
        }
        _ => {
            error!(
                "undefined store destination, sequence {:02x?}",
                &stream[..usize::min(stream.len(), 4)]
            );
            Err(AmlError::UnexpectedByte(op))
        }
    }
}

/// Evaluates the operands a method invocation consumes from the stream.
pub(crate) fn eval_method_args(
    context: &mut AmlContext,
    state: &mut MethodState,
    stream: &[u8],
    count: u8,
) -> Result<(Args, usize), AmlError> {
    let mut list = Vec::with_capacity(count as usize);
    let mut offset = 0;
    for _ in 0..count {
        let (value, consumed) = eval_operand(context, state, &stream[offset..])?;
        list.push(value);
        offset += consumed;
    }
    Ok((Args::from_list(list)?, offset))
}

fn eval_string(stream: &[u8]) -> Result<(AmlValue, usize), AmlError> {
    let bytes = &stream[1..];
    let nul = bytes.iter().position(|&b| b == 0).ok_or(AmlError::UnterminatedStringConstant)?;
    let string = str::from_utf8(&bytes[..nul]).map_err(|_| AmlError::InvalidStringConstant)?;
    // the prefix and the terminator are part of the encoding
    Ok((AmlValue::String(String::from(string)), nul + 2))
}

fn eval_buffer(
    context: &mut AmlContext,
    state: &mut MethodState,
    stream: &[u8],
) -> Result<(AmlValue, usize), AmlError> {
    // DefBuffer := BufferOp PkgLength BufferSize(TermArg) ByteList
    let pkg = PkgLength::parse(&stream[1..])?;
    let buffer_end = 1 + pkg.raw_length as usize;
    if stream.len() < buffer_end {
        return Err(AmlError::UnexpectedEndOfStream);
    }

    let mut offset = 1 + pkg.encoding_size;
    let (declared, length_len) = eval_operand(context, state, &stream[offset..buffer_end])?;
    offset += length_len;
    let declared = declared.as_integer()? as usize;

    /*
     * The declared length governs the allocation; any literal bytes fill the
     * front and the remainder stays zeroed.
     */
    let literal = &stream[offset..buffer_end];
    if literal.len() > declared {
        return Err(AmlError::MalformedBuffer);
    }
    let mut bytes = vec![0u8; declared];
    bytes[..literal.len()].copy_from_slice(literal);

    Ok((AmlValue::Buffer(bytes), buffer_end))
}

fn eval_package(
    context: &mut AmlContext,
    state: &mut MethodState,
    stream: &[u8],
) -> Result<(AmlValue, usize), AmlError> {
    // DefPackage := PackageOp PkgLength NumElements(byte) PackageElementList
    let pkg = PkgLength::parse(&stream[1..])?;
    let package_end = 1 + pkg.raw_length as usize;
    if stream.len() < package_end {
        return Err(AmlError::UnexpectedEndOfStream);
    }

    let mut offset = 1 + pkg.encoding_size;
    let count = *stream.get(offset).ok_or(AmlError::UnexpectedEndOfStream)? as usize;
    offset += 1;

    let mut elements = Vec::with_capacity(count);
    while offset < package_end {
        if elements.len() == count {
            return Err(AmlError::MalformedPackage);
        }
        let (value, consumed) = eval_package_element(context, state, &stream[offset..package_end])?;
        elements.push(value);
        offset += consumed;
    }
    // NumElements may exceed the encoded list; the tail defaults to zeros
    while elements.len() < count {
        elements.push(AmlValue::zero());
    }

    Ok((AmlValue::Package(elements), package_end))
}

fn eval_package_element(
    context: &mut AmlContext,
    state: &mut MethodState,
    stream: &[u8],
) -> Result<(AmlValue, usize), AmlError> {
    let op = *stream.first().ok_or(AmlError::UnexpectedEndOfStream)?;
    if name_object::is_name_start(op) {
        /*
         * Names inside a package are object references, not invocations, and
         * may point at objects defined later in the table, so existence
         * isn't checked here.
         */
        let (path, name_len) = NamePath::parse(stream)?;
        let target = match context.namespace.search(&path, state.scope()) {
            Ok(resolved) => resolved,
            Err(_) => path.resolve(state.scope())?,
        };
        Ok((AmlValue::Reference { target, index: None }, name_len))
    } else {
        eval_operand(context, state, stream)
    }
}

fn eval_name_reference(
    context: &mut AmlContext,
    state: &mut MethodState,
    stream: &[u8],
) -> Result<(AmlValue, usize), AmlError> {
    let (path, name_len) = NamePath::parse(stream)?;
    let name = match context.namespace.search(&path, state.scope()) {
        Ok(name) => name,
        Err(err) => {
            error!("undefined reference {:?} in scope {}", path, state.scope());
            return Err(err);
        }
    };

    match context.namespace.get(&name)?.clone() {
        NsObject::Name(value) => Ok((value, name_len)),
        NsObject::Method { flags, .. } => {
            let (args, args_len) = eval_method_args(context, state, &stream[name_len..], flags.arg_count())?;
            Ok((context.invoke_method(&name, args)?, name_len + args_len))
        }
        NsObject::NativeMethod { arg_count, .. } => {
            let (args, args_len) = eval_method_args(context, state, &stream[name_len..], arg_count)?;
            Ok((context.invoke_method(&name, args)?, name_len + args_len))
        }
        NsObject::Field(field) => Ok((opregion::read_field(context, &field)?, name_len)),
        NsObject::IndexField(field) => Ok((opregion::read_index_field(context, &field)?, name_len)),
        object => Err(AmlError::ObjectOfWrongKind { path: name, found: object.kind() }),
    }
}

/// Reads through a reference produced by `RefOf`/`Index`. Non-reference
/// values pass through unchanged.
fn deref(context: &mut AmlContext, value: AmlValue) -> Result<AmlValue, AmlError> {
    let (target, index) = match value {
        AmlValue::Reference { target, index } => (target, index),
        other => return Ok(other),
    };

    let value = match context.namespace.get(&target)?.clone() {
        NsObject::Name(value) => value,
        NsObject::Field(field) => opregion::read_field(context, &field)?,
        NsObject::IndexField(field) => opregion::read_index_field(context, &field)?,
        object => return Err(AmlError::ObjectOfWrongKind { path: target, found: object.kind() }),
    };

    match index {
        None => Ok(value),
        Some(index) => {
            let index = index as usize;
            match value {
                AmlValue::Package(elements) => {
                    elements.get(index).cloned().ok_or(AmlError::IndexOutOfBounds)
                }
                AmlValue::Buffer(bytes) => {
                    bytes.get(index).map(|&b| AmlValue::Integer(u64::from(b))).ok_or(AmlError::IndexOutOfBounds)
                }
                AmlValue::String(string) => string
                    .as_bytes()
                    .get(index)
                    .map(|&b| AmlValue::Integer(u64::from(b)))
                    .ok_or(AmlError::IndexOutOfBounds),
                other => Err(AmlError::TypeCannotBeIndexed(other.type_of())),
            }
        }
    }
}

fn eval_index(
    context: &mut AmlContext,
    state: &mut MethodState,
    stream: &[u8],
) -> Result<(AmlValue, usize), AmlError> {
    // DefIndex := IndexOp TermArg TermArg Target
    let mut offset = 1;
    let target_byte = *stream.get(offset).ok_or(AmlError::UnexpectedEndOfStream)?;

    let value = if name_object::is_name_start(target_byte) {
        let (path, name_len) = NamePath::parse(&stream[offset..])?;
        let name = context.namespace.search(&path, state.scope())?;
        offset += name_len;

        let (index, index_len) = eval_operand(context, state, &stream[offset..])?;
        offset += index_len;
        let index = index.as_integer()?;

        match context.namespace.get(&name)?.clone() {
            /*
             * Indexing a named package yields a reference to the element, so
             * stores through the result reach the package.
             */
            NsObject::Name(AmlValue::Package(elements)) => {
                if index as usize >= elements.len() {
                    return Err(AmlError::IndexOutOfBounds);
                }
                AmlValue::Reference { target: name, index: Some(index) }
            }
            NsObject::Name(AmlValue::Buffer(bytes)) => AmlValue::Integer(u64::from(
                *bytes.get(index as usize).ok_or(AmlError::IndexOutOfBounds)?,
            )),
            NsObject::Name(AmlValue::String(string)) => AmlValue::Integer(u64::from(
                *string.as_bytes().get(index as usize).ok_or(AmlError::IndexOutOfBounds)?,
            )),
            NsObject::Name(other) => return Err(AmlError::TypeCannotBeIndexed(other.type_of())),
            object => return Err(AmlError::ObjectOfWrongKind { path: name, found: object.kind() }),
        }
    } else {
        let (target, target_len) = eval_operand(context, state, &stream[offset..])?;
        offset += target_len;
        let (index, index_len) = eval_operand(context, state, &stream[offset..])?;
        offset += index_len;
        let index = index.as_integer()? as usize;

        match target {
            AmlValue::String(string) => AmlValue::Integer(u64::from(
                *string.as_bytes().get(index).ok_or(AmlError::IndexOutOfBounds)?,
            )),
            AmlValue::Buffer(bytes) => {
                AmlValue::Integer(u64::from(*bytes.get(index).ok_or(AmlError::IndexOutOfBounds)?))
            }
            // a package held in a local has no namespace identity to refer to
            AmlValue::Package(elements) => {
                elements.get(index).cloned().ok_or(AmlError::IndexOutOfBounds)?
            }
            other => return Err(AmlError::TypeCannotBeIndexed(other.type_of())),
        }
    };

    let target_len = write_object(context, state, &stream[offset..], &value)?;
    Ok((value, offset + target_len))
}

/// Stores through an `Index` destination, mutating the named package or
/// buffer element (or one held in a local or arg slot).
fn write_index(
    context: &mut AmlContext,
    state: &mut MethodState,
    stream: &[u8],
    value: &AmlValue,
) -> Result<usize, AmlError> {
    let mut offset = 1;
    let target_byte = *stream.get(offset).ok_or(AmlError::UnexpectedEndOfStream)?;

    if name_object::is_name_start(target_byte) {
        let (path, name_len) = NamePath::parse(&stream[offset..])?;
        let name = context.namespace.search(&path, state.scope())?;
        offset += name_len;

        let (index, index_len) = eval_operand(context, state, &stream[offset..])?;
        offset += index_len;
        let index = index.as_integer()? as usize;

        let byte = value.as_integer().ok();
        match context.namespace.get_mut(&name)? {
            NsObject::Name(AmlValue::Package(elements)) => {
                *elements.get_mut(index).ok_or(AmlError::IndexOutOfBounds)? = value.clone();
            }
            NsObject::Name(AmlValue::Buffer(bytes)) => {
                let byte = byte.ok_or(AmlError::IncompatibleValueConversion {
                    current: value.type_of(),
                    target: crate::value::AmlType::Integer,
                })?;
                *bytes.get_mut(index).ok_or(AmlError::IndexOutOfBounds)? = byte as u8;
            }
            NsObject::Name(other) => return Err(AmlError::TypeCannotBeIndexed(other.type_of())),
            object => {
                let found = object.kind();
                return Err(AmlError::ObjectOfWrongKind { path: name.clone(), found });
            }
        }

        // the Index expression's own target receives the element reference
        let reference = AmlValue::Reference { target: name, index: Some(index as u64) };
        offset += write_object(context, state, &stream[offset..], &reference)?;
        Ok(offset)
    } else if (opcode::LOCAL0_OP..=opcode::LOCAL7_OP).contains(&target_byte)
        || (opcode::ARG0_OP..=opcode::ARG6_OP).contains(&target_byte)
    {
        offset += 1;
        let (index, index_len) = eval_operand(context, state, &stream[offset..])?;
        offset += index_len;
        let index = index.as_integer()? as usize;

        let byte = value.as_integer().ok();
        let slot = if (opcode::LOCAL0_OP..=opcode::LOCAL7_OP).contains(&target_byte) {
            state.local_mut((target_byte - opcode::LOCAL0_OP) as usize)
        } else {
            state.arg_mut((target_byte - opcode::ARG0_OP) as usize)
        };
        match slot {
            AmlValue::Package(elements) => {
                *elements.get_mut(index).ok_or(AmlError::IndexOutOfBounds)? = value.clone();
            }
            AmlValue::Buffer(bytes) => {
                let byte = byte.ok_or(AmlError::IncompatibleValueConversion {
                    current: value.type_of(),
                    target: crate::value::AmlType::Integer,
                })?;
                *bytes.get_mut(index).ok_or(AmlError::IndexOutOfBounds)? = byte as u8;
            }
            other => return Err(AmlError::TypeCannotBeIndexed(other.type_of())),
        }

        offset += write_object(context, state, &stream[offset..], value)?;
        Ok(offset)
    } else {
        error!("unsupported Index destination, sequence {:02x?}", &stream[..usize::min(stream.len(), 4)]);
        Err(AmlError::UnexpectedByte(target_byte))
    }
}

fn binary_op<F>(
    context: &mut AmlContext,
    state: &mut MethodState,
    stream: &[u8],
    op: F,
) -> Result<(AmlValue, usize), AmlError>
where
    F: FnOnce(u64, u64) -> Result<u64, AmlError>,
{
    let mut offset = 1;
    let (left, left_len) = eval_operand(context, state, &stream[offset..])?;
    offset += left_len;
    let (right, right_len) = eval_operand(context, state, &stream[offset..])?;
    offset += right_len;

    let value = AmlValue::Integer(op(left.as_integer()?, right.as_integer()?)?);
    let target_len = write_object(context, state, &stream[offset..], &value)?;
    Ok((value, offset + target_len))
}

fn unary_op<F>(
    context: &mut AmlContext,
    state: &mut MethodState,
    stream: &[u8],
    op: F,
) -> Result<(AmlValue, usize), AmlError>
where
    F: FnOnce(u64) -> Result<u64, AmlError>,
{
    let mut offset = 1;
    let (operand, operand_len) = eval_operand(context, state, &stream[offset..])?;
    offset += operand_len;

    let value = AmlValue::Integer(op(operand.as_integer()?)?);
    let target_len = write_object(context, state, &stream[offset..], &value)?;
    Ok((value, offset + target_len))
}

fn comparison<F>(
    context: &mut AmlContext,
    state: &mut MethodState,
    stream: &[u8],
    op: F,
) -> Result<(AmlValue, usize), AmlError>
where
    F: FnOnce(u64, u64) -> bool,
{
    let mut offset = 1;
    let (left, left_len) = eval_operand(context, state, &stream[offset..])?;
    offset += left_len;
    let (right, right_len) = eval_operand(context, state, &stream[offset..])?;
    offset += right_len;

    Ok((AmlValue::boolean(op(left.as_integer()?, right.as_integer()?)), offset))
}

/// Reads the current value of a SuperName, applies `op`, and writes the
/// result back to the same place.
fn increment<F>(
    context: &mut AmlContext,
    state: &mut MethodState,
    stream: &[u8],
    op: F,
) -> Result<(AmlValue, usize), AmlError>
where
    F: FnOnce(u64) -> u64,
{
    let (current, consumed) = eval_operand(context, state, &stream[1..])?;
    let value = AmlValue::Integer(op(current.as_integer()?));
    write_object(context, state, &stream[1..], &value)?;
    Ok((value, 1 + consumed))
}

fn divide(
    context: &mut AmlContext,
    state: &mut MethodState,
    stream: &[u8],
) -> Result<(AmlValue, usize), AmlError> {
    // DefDivide := DivideOp Dividend Divisor Remainder(Target) Quotient(Target)
    let mut offset = 1;
    let (dividend, dividend_len) = eval_operand(context, state, &stream[offset..])?;
    offset += dividend_len;
    let (divisor, divisor_len) = eval_operand(context, state, &stream[offset..])?;
    offset += divisor_len;

    let dividend = dividend.as_integer()?;
    let divisor = divisor.as_integer()?;
    if divisor == 0 {
        return Err(AmlError::DivideByZero);
    }

    let remainder = AmlValue::Integer(dividend % divisor);
    let quotient = AmlValue::Integer(dividend / divisor);
    offset += write_object(context, state, &stream[offset..], &remainder)?;
    offset += write_object(context, state, &stream[offset..], &quotient)?;
    Ok((quotient, offset))
}
