//! `aml-vm` is a pure-Rust interpreter core for AML (ACPI Machine Language),
//! the bytecode firmware compiles into the DSDT and SSDT tables. It is meant
//! to be embedded in a kernel: feed it the tables, and it populates an ACPI
//! namespace and executes control methods to query and change the state of
//! devices in a hardware-independent way.
//!
//! ### Using the library
//! Create an [`AmlContext`] with a [`Handler`] implementing your platform's
//! raw port-I/O, physical-memory, and PCI-configuration accesses, then pass
//! it each table's AML byte stream (the bytes after the SDT header), mapped
//! wherever is convenient. Definitions are copied onto the heap, so the
//! tables may be unmapped once parsed:
//! ```ignore
//! let mut context = AmlContext::new(Box::new(handler));
//! context.parse_table(dsdt_stream)?;
//! ```
//!
//! After that, objects can be read by name, and control methods invoked:
//! ```ignore
//! let adr = context.eval_name(&AmlName::from_str("\\_SB.PCI0.S08._ADR")?)?;
//! let result = context.invoke_method(&AmlName::from_str("\\_SB.HPET._CRS")?, Args::EMPTY)?;
//! ```
//!
//! ### About the interpreter
//! The executor is opcode-driven: a method body is walked by an instruction
//! pointer, statements dispatch directly on their leading byte, and operands
//! are decoded recursively by the object evaluator. Each invocation owns a
//! fresh machine state (eight locals, up to seven arguments, the method's
//! path as its lexical scope); nested invocations recurse. Symbolic field
//! accesses resolve through the namespace into concrete backend transactions
//! at the field's bit offset and width.
//!
//! Errors are returned to the embedder rather than escalated: a firmware
//! bug surfaces as an `Err` from the `eval_*`/`invoke_*` call that hit it,
//! with diagnostics on the log.
//!
//! The interpreter executes one method at a time; a kernel running it from
//! several CPUs serializes on its own lock around the context, which also
//! protects the namespace.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod test_utils;

pub(crate) mod expression;
pub(crate) mod loader;
pub mod name_object;
pub mod namespace;
pub mod opcode;
pub mod opregion;
pub(crate) mod pkg_length;
pub(crate) mod statement;
pub mod value;

pub use crate::{
    name_object::{AmlName, NameSeg},
    namespace::{Namespace, NsObject},
    value::{AmlValue, Args},
};

use alloc::{boxed::Box, string::String};
use log::{error, trace, warn};
use namespace::ScopeType;
use statement::Flow;
use value::AmlType;

/// AML has a `RevisionOp` operator that returns the "AML interpreter
/// revision". It's not clear what this is actually used for, but this is
/// ours.
pub const AML_INTERPRETER_REVISION: u64 = 0;

/// The per-invocation machine state of an executing control method: its
/// lexical scope, eight local slots, and the bound arguments. Slots start as
/// `Integer(0)`.
pub(crate) struct MethodState {
    scope: AmlName,
    locals: [AmlValue; 8],
    args: [AmlValue; 7],
}

impl MethodState {
    pub(crate) fn new(scope: AmlName, args: Args) -> MethodState {
        let mut bound: [AmlValue; 7] = core::array::from_fn(|_| AmlValue::zero());
        for (slot, arg) in bound.iter_mut().zip(args.0) {
            if let Some(value) = arg {
                *slot = value;
            }
        }
        MethodState { scope, locals: core::array::from_fn(|_| AmlValue::zero()), args: bound }
    }

    pub(crate) fn scope(&self) -> &AmlName {
        &self.scope
    }

    pub(crate) fn local(&self, index: usize) -> &AmlValue {
        &self.locals[index]
    }

    pub(crate) fn local_mut(&mut self, index: usize) -> &mut AmlValue {
        &mut self.locals[index]
    }

    pub(crate) fn arg(&self, index: usize) -> &AmlValue {
        &self.args[index]
    }

    pub(crate) fn arg_mut(&mut self, index: usize) -> &mut AmlValue {
        &mut self.args[index]
    }
}

pub struct AmlContext {
    /// Stored as a boxed trait object simply to avoid adding a lifetime and
    /// type parameter to `AmlContext` and everything that touches it.
    pub(crate) handler: Box<dyn Handler>,
    pub namespace: Namespace,
}

impl AmlContext {
    /// Creates a new `AmlContext` - the central type of the interpreter.
    /// Only one should be created, and it should be passed the DSDT and all
    /// SSDTs defined by the hardware.
    pub fn new(handler: Box<dyn Handler>) -> AmlContext {
        let mut context = AmlContext { handler, namespace: Namespace::new() };
        context.add_predefined_objects();
        context
    }

    /// Installs the definitions of one AML table into the namespace. The
    /// stream is the table's body, after the SDT header.
    pub fn parse_table(&mut self, stream: &[u8]) -> Result<(), AmlError> {
        loader::load_table(self, stream)
    }

    /// Invokes a control method, binding `args` into its argument slots.
    /// Aliases are chased first, and firmware that encodes a computationless
    /// "method" directly as a value gets that value back; fields read
    /// through to their opregion.
    pub fn invoke_method(&mut self, path: &AmlName, args: Args) -> Result<AmlValue, AmlError> {
        let resolved = self.namespace.resolve_aliases(path.clone())?;
        match self.namespace.get(&resolved)?.clone() {
            NsObject::Method { code, .. } => {
                trace!("invoking control method {}", resolved);
                let mut state = MethodState::new(resolved.clone(), args);
                let flow = statement::execute_block(self, &mut state, &code);

                /*
                 * Objects the method created in its own scope are destroyed
                 * on exit, whether it returned normally or not.
                 */
                self.namespace.remove_children(&resolved);

                match flow? {
                    Flow::Return(value) => Ok(value),
                    // falling off the end is an implicit Return(0)
                    Flow::Normal => Ok(AmlValue::Integer(0)),
                    Flow::Break => Err(AmlError::BreakInInvalidPosition),
                    Flow::Continue => Err(AmlError::ContinueInInvalidPosition),
                }
            }
            NsObject::NativeMethod { code, .. } => (code)(self, &args),
            NsObject::Name(value) => Ok(value),
            NsObject::Field(field) => opregion::read_field(self, &field),
            NsObject::IndexField(field) => opregion::read_index_field(self, &field),
            object => Err(AmlError::ObjectOfWrongKind { path: resolved, found: object.kind() }),
        }
    }

    /// Evaluates the object at `path` to a value: a `Name`'s value, a
    /// method's return value, or an opregion field's current contents.
    pub fn eval_name(&mut self, path: &AmlName) -> Result<AmlValue, AmlError> {
        self.invoke_method(path, Args::EMPTY)
    }

    fn add_predefined_objects(&mut self) {
        /*
         * These are the scopes predefined by the spec. Some tables will try
         * to access them without defining them themselves, and so we have to
         * pre-create them.
         */
        for scope in ["\\_GPE", "\\_SB", "\\_SI", "\\_PR", "\\_TZ"] {
            self.namespace.insert(AmlName::from_str(scope).unwrap(), NsObject::Scope(ScopeType::Scope)).unwrap();
        }

        /*
         * Before `\_OSI` existed, `\_OS` told the firmware which OS was
         * running. Modern firmware shouldn't use it, but to avoid problems
         * we follow Linux in returning "Microsoft Windows NT".
         */
        self.namespace
            .insert(
                AmlName::from_str("\\_OS").unwrap(),
                NsObject::Name(AmlValue::String(String::from("Microsoft Windows NT"))),
            )
            .unwrap();

        self.namespace
            .insert(AmlName::from_str("\\_OSI").unwrap(), NsObject::NativeMethod { arg_count: 1, code: osi_query })
            .unwrap();

        /*
         * `\_REV` nominally reports the supported ACPI revision, but
         * firmware misused it to detect specific OSes, so everyone now
         * returns `2`, meaning "ACPI 2 or greater".
         */
        self.namespace.insert(AmlName::from_str("\\_REV").unwrap(), NsObject::Name(AmlValue::Integer(2))).unwrap();
    }
}

/// The implementation of `\_OSI`. We claim compatibility with the Windows
/// family, as real firmware tests for little else and takes untested paths
/// otherwise; Linux does the same.
fn osi_query(_context: &mut AmlContext, args: &Args) -> Result<AmlValue, AmlError> {
    let query = match args.0[0] {
        Some(AmlValue::String(ref string)) => string.as_str(),
        Some(ref value) => {
            return Err(AmlError::IncompatibleValueConversion { current: value.type_of(), target: AmlType::String })
        }
        None => {
            return Err(AmlError::IncompatibleValueConversion { current: AmlType::Integer, target: AmlType::String })
        }
    };

    let supported = match query {
        "Darwin" => true,
        "Linux" => {
            // firmware should never test for Linux; report no support
            warn!("firmware evaluated `_OSI(\"Linux\")`. This is a bug. Reporting no support.");
            false
        }
        "Extended Address Space Descriptor" => true,
        "3.0 Thermal Model" => true,
        "3.0 _SCP Extensions" => true,
        "Module Device" => false,
        "Processor Aggregator Device" => false,
        _ => query.starts_with("Windows "),
    };

    Ok(AmlValue::boolean(supported))
}

/// Trait used by [`AmlContext`] to reach the platform: raw reads and writes
/// to physical memory, I/O ports, and PCI configuration space. Memory
/// accesses are given physical addresses; mapping them (cache-disabled,
/// read/write) is the implementation's concern.
pub trait Handler: Send + Sync {
    fn read_u8(&self, address: usize) -> u8;
    fn read_u16(&self, address: usize) -> u16;
    fn read_u32(&self, address: usize) -> u32;
    fn read_u64(&self, address: usize) -> u64;

    fn write_u8(&mut self, address: usize, value: u8);
    fn write_u16(&mut self, address: usize, value: u16);
    fn write_u32(&mut self, address: usize, value: u32);
    fn write_u64(&mut self, address: usize, value: u64);

    fn read_io_u8(&self, port: u16) -> u8;
    fn read_io_u16(&self, port: u16) -> u16;
    fn read_io_u32(&self, port: u16) -> u32;

    fn write_io_u8(&mut self, port: u16, value: u8);
    fn write_io_u16(&mut self, port: u16, value: u16);
    fn write_io_u32(&mut self, port: u16, value: u32);

    fn read_pci_u32(&self, segment: u16, bus: u8, device: u8, function: u8, offset: u16) -> u32;
    fn write_pci_u32(&mut self, segment: u16, bus: u8, device: u8, function: u8, offset: u16, value: u32);

    /// Stall for at least the given number of **microseconds**. An
    /// implementation should not relinquish the processor during the stall,
    /// and for this reason firmware should not stall for periods of more
    /// than 100 microseconds.
    fn stall(&self, microseconds: u64);

    /// Sleep for at least the given number of **milliseconds**. An
    /// implementation may round to the closest sleep time supported, and
    /// should relinquish the processor.
    fn sleep(&self, milliseconds: u64);

    /// Called when a `Fatal` op executes, before the interpreter unwinds
    /// with [`AmlError::FatalError`]. The default just logs the payload.
    fn handle_fatal_error(&self, fatal_type: u8, fatal_code: u32, fatal_arg: u64) {
        error!(
            "fatal error while executing AML: type = {:#x}, code = {:#x}, arg = {:#x}",
            fatal_type, fatal_code, fatal_arg
        );
    }
}

/// Produced when the interpreter hits something it can't decode, resolve,
/// or execute. These surface to the embedder from the `eval_*`/`invoke_*`
/// entry points; the interpreter itself never panics on firmware input.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AmlError {
    /*
     * Errors produced decoding the AML byte stream.
     */
    UnexpectedEndOfStream,
    UnexpectedByte(u8),
    InvalidNameSeg,
    InvalidPkgLength,
    InvalidFieldFlags,
    UnterminatedStringConstant,
    InvalidStringConstant,
    /// Produced when a package encodes more elements than its declared count.
    MalformedPackage,
    /// Produced when a buffer's literal bytes overrun its declared length.
    MalformedBuffer,
    /// A `Fatal` op was executed; reported through
    /// [`Handler::handle_fatal_error`] first.
    FatalError,

    /*
     * Errors produced manipulating AML names.
     */
    /// Produced when `^` escapes in a name ascend above the namespace root.
    RootHasNoParent,

    /*
     * Errors produced working with the namespace.
     */
    ValueDoesNotExist(AmlName),
    /// Produced when two objects with the same name are installed.
    NameCollision(AmlName),
    /// An alias chain exceeded the hop bound - almost certainly a cycle.
    AliasLoop(AmlName),
    /// An object was found, but its kind can't do what was asked of it
    /// (e.g. storing to an `OpRegion` handle, invoking a `Scope`).
    ObjectOfWrongKind { path: AmlName, found: &'static str },

    /*
     * Errors produced executing control methods.
     */
    TooManyArgs,
    /// A `Break` was executed outside of a `While`.
    BreakInInvalidPosition,
    /// A `Continue` was executed outside of a `While`.
    ContinueInInvalidPosition,

    /*
     * Errors produced working with AML values.
     */
    IncompatibleValueConversion { current: AmlType, target: AmlType },
    InvalidSizeOfApplication(AmlType),
    TypeCannotBeIndexed(AmlType),
    IndexOutOfBounds,
    InvalidShiftLeft,
    InvalidShiftRight,
    DivideByZero,
    /// A field's window doesn't fit within a single word of its access size.
    FieldInvalidAccessSize,

    /// Recognized but unsupported functionality - returned as an error
    /// rather than aborting.
    Unimplemented,
}
