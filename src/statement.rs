//! The Type1 (statement) executor.
//!
//! A method body is a flat byte range walked by an instruction pointer. Bare
//! names at statement level are method invocations; Type2 opcodes are
//! evaluated for their side effects; `If`/`Else` and `While` delimit blocks
//! with package lengths. Control transfers (`Return`, `Break`, `Continue`)
//! propagate out of nested blocks as a `Flow` value, so each enclosing
//! `While` naturally owns one loop frame on the executor stack.

use crate::{
    expression,
    name_object::{self, NamePath},
    namespace::NsObject,
    opcode,
    pkg_length::PkgLength,
    value::AmlValue,
    AmlContext, AmlError, MethodState,
};
use log::{debug, error};

/// How a block finished executing.
pub(crate) enum Flow {
    Normal,
    Return(AmlValue),
    Break,
    Continue,
}

/// Executes one block of statements. `Break`, `Continue` and `Return` stop
/// the walk and propagate to the enclosing construct.
pub(crate) fn execute_block(
    context: &mut AmlContext,
    state: &mut MethodState,
    code: &[u8],
) -> Result<Flow, AmlError> {
    let mut ip = 0;
    while ip < code.len() {
        let op = code[ip];
        match op {
            opcode::ZERO_OP | opcode::ONE_OP | opcode::ONES_OP | opcode::NOOP_OP | opcode::BREAKPOINT_OP => {
                ip += 1;
            }
            opcode::NAME_OP => ip += exec_name_def(context, state, &code[ip..])?,
            opcode::IF_OP => {
                let (flow, consumed) = exec_if(context, state, &code[ip..])?;
                match flow {
                    Flow::Normal => ip += consumed,
                    other => return Ok(other),
                }
            }
            opcode::WHILE_OP => {
                let (flow, consumed) = exec_while(context, state, &code[ip..])?;
                match flow {
                    Flow::Normal => ip += consumed,
                    other => return Ok(other),
                }
            }
            opcode::RETURN_OP => {
                let (value, _) = expression::eval_operand(context, state, &code[ip + 1..])?;
                return Ok(Flow::Return(value));
            }
            opcode::BREAK_OP => return Ok(Flow::Break),
            opcode::CONTINUE_OP => return Ok(Flow::Continue),
            opcode::NOTIFY_OP => ip += exec_notify(context, state, &code[ip..])?,
            opcode::EXT_OP_PREFIX => ip += exec_ext_statement(context, state, &code[ip..])?,
            _ if name_object::is_name_start(op) => ip += exec_bare_name(context, state, &code[ip..])?,
            _ if expression::is_type2_op(op) => {
                let (_, consumed) = expression::eval_operand(context, state, &code[ip..])?;
                ip += consumed;
            }
            _ => {
                error!(
                    "undefined opcode in method body, sequence {:02x?}",
                    &code[ip..usize::min(ip + 4, code.len())]
                );
                return Err(AmlError::UnexpectedByte(op));
            }
        }
    }
    Ok(Flow::Normal)
}

/// A bare name at statement level invokes the method it resolves to. A name
/// that resolves to anything else is evaluated for nothing, per the spec.
fn exec_bare_name(context: &mut AmlContext, state: &mut MethodState, code: &[u8]) -> Result<usize, AmlError> {
    let (path, name_len) = NamePath::parse(code)?;
    let name = context.namespace.search(&path, state.scope())?;
    let arg_count = match context.namespace.get(&name)? {
        NsObject::Method { flags, .. } => flags.arg_count(),
        NsObject::NativeMethod { arg_count, .. } => *arg_count,
        _ => return Ok(name_len),
    };

    let (args, args_len) = expression::eval_method_args(context, state, &code[name_len..], arg_count)?;
    context.invoke_method(&name, args)?;
    Ok(name_len + args_len)
}

/// `Name()` executed inside a method defines the object in the method's
/// lexical scope; it's torn down when the invocation returns.
fn exec_name_def(context: &mut AmlContext, state: &mut MethodState, code: &[u8]) -> Result<usize, AmlError> {
    let (path, name_len) = NamePath::parse(&code[1..])?;
    let name = path.resolve(state.scope())?;
    let (value, value_len) = expression::eval_operand(context, state, &code[1 + name_len..])?;
    context.namespace.insert(name, NsObject::Name(value))?;
    Ok(1 + name_len + value_len)
}

fn exec_if(
    context: &mut AmlContext,
    state: &mut MethodState,
    code: &[u8],
) -> Result<(Flow, usize), AmlError> {
    // DefIfElse := IfOp PkgLength Predicate TermList DefElse?
    let pkg = PkgLength::parse(&code[1..])?;
    let if_end = 1 + pkg.raw_length as usize;
    if code.len() < if_end {
        return Err(AmlError::UnexpectedEndOfStream);
    }

    let mut offset = 1 + pkg.encoding_size;
    let (predicate, predicate_len) = expression::eval_operand(context, state, &code[offset..if_end])?;
    offset += predicate_len;

    let (else_range, total_len) = if code.get(if_end) == Some(&opcode::ELSE_OP) {
        let else_pkg = PkgLength::parse(&code[if_end + 1..])?;
        let else_end = if_end + 1 + else_pkg.raw_length as usize;
        if code.len() < else_end {
            return Err(AmlError::UnexpectedEndOfStream);
        }
        (Some((if_end + 1 + else_pkg.encoding_size, else_end)), else_end)
    } else {
        (None, if_end)
    };

    let flow = if predicate.as_integer()? != 0 {
        execute_block(context, state, &code[offset..if_end])?
    } else if let Some((else_start, else_end)) = else_range {
        execute_block(context, state, &code[else_start..else_end])?
    } else {
        Flow::Normal
    };

    Ok((flow, total_len))
}

fn exec_while(
    context: &mut AmlContext,
    state: &mut MethodState,
    code: &[u8],
) -> Result<(Flow, usize), AmlError> {
    // DefWhile := WhileOp PkgLength Predicate TermList
    let pkg = PkgLength::parse(&code[1..])?;
    let while_end = 1 + pkg.raw_length as usize;
    if code.len() < while_end {
        return Err(AmlError::UnexpectedEndOfStream);
    }
    let predicate_offset = 1 + pkg.encoding_size;

    loop {
        // the predicate is re-evaluated on every iteration
        let (predicate, predicate_len) =
            expression::eval_operand(context, state, &code[predicate_offset..while_end])?;
        if predicate.as_integer()? == 0 {
            break;
        }

        match execute_block(context, state, &code[predicate_offset + predicate_len..while_end])? {
            Flow::Normal | Flow::Continue => (),
            Flow::Break => break,
            Flow::Return(value) => return Ok((Flow::Return(value), while_end)),
        }
    }

    Ok((Flow::Normal, while_end))
}

/// Device notifications go to an event layer this core doesn't have; the
/// statement is decoded and dropped.
fn exec_notify(context: &mut AmlContext, state: &mut MethodState, code: &[u8]) -> Result<usize, AmlError> {
    let (path, name_len) = NamePath::parse(&code[1..])?;
    let name = context.namespace.search(&path, state.scope())?;
    let (value, value_len) = expression::eval_operand(context, state, &code[1 + name_len..])?;
    debug!("dropping Notify({}, {:#x})", name, value.as_integer()?);
    Ok(1 + name_len + value_len)
}

fn exec_ext_statement(
    context: &mut AmlContext,
    state: &mut MethodState,
    code: &[u8],
) -> Result<usize, AmlError> {
    match *code.get(1).ok_or(AmlError::UnexpectedEndOfStream)? {
        opcode::EXT_FATAL_OP => {
            // DefFatal := FatalOp Type(byte) Code(dword) Arg(TermArg)
            let fatal_type = *code.get(2).ok_or(AmlError::UnexpectedEndOfStream)?;
            let code_bytes = code.get(3..7).ok_or(AmlError::UnexpectedEndOfStream)?;
            let fatal_code = u32::from_le_bytes([code_bytes[0], code_bytes[1], code_bytes[2], code_bytes[3]]);
            let (arg, _) = expression::eval_operand(context, state, &code[7..])?;

            context.handler.handle_fatal_error(fatal_type, fatal_code, arg.as_integer()?);
            Err(AmlError::FatalError)
        }
        opcode::EXT_STALL_OP => {
            let (microseconds, consumed) = expression::eval_operand(context, state, &code[2..])?;
            context.handler.stall(microseconds.as_integer()?);
            Ok(2 + consumed)
        }
        opcode::EXT_SLEEP_OP => {
            let (milliseconds, consumed) = expression::eval_operand(context, state, &code[2..])?;
            context.handler.sleep(milliseconds.as_integer()?);
            Ok(2 + consumed)
        }
        opcode::EXT_MUTEX_OP => {
            // no concurrency surface, so the definition carries no state
            let (path, name_len) = NamePath::parse(&code[2..])?;
            debug!("ignoring Mutex definition {:?} in method body", path);
            Ok(2 + name_len + 1)
        }
        other => {
            error!("unimplemented extended opcode {:#04x} at statement level", other);
            Err(AmlError::Unimplemented)
        }
    }
}
