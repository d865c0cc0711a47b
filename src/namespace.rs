//! The ACPI namespace: a tree of named objects populated from the tables at
//! load time and mutated by executing methods. Objects are keyed by absolute
//! name; scoped resolution implements AML's lexical search rules.

use crate::{
    name_object::{AmlName, NamePath},
    opregion::OpRegion,
    value::{AmlValue, Args, FieldFlags, MethodFlags},
    AmlContext, AmlError,
};
use alloc::{collections::BTreeMap, vec::Vec};

/// Aliases may chain; resolution follows at most this many hops before
/// declaring a cycle.
const MAX_ALIAS_DEPTH: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeType {
    Scope,
    Device,
    Processor,
    ThermalZone,
    PowerResource,
}

/// A Field bind: a bit-granular window into an OperationRegion.
#[derive(Clone, Debug)]
pub struct FieldUnit {
    pub region: AmlName,
    pub bit_offset: u64,
    pub bit_length: u64,
    pub flags: FieldFlags,
}

/// An IndexField bind: accesses go through an index/data register pair, both
/// themselves Fields, resolved at access time.
#[derive(Clone, Debug)]
pub struct IndexFieldUnit {
    pub index: AmlName,
    pub data: AmlName,
    pub bit_offset: u64,
    pub bit_length: u64,
    pub flags: FieldFlags,
}

pub type NativeMethodFn = fn(&mut AmlContext, &Args) -> Result<AmlValue, AmlError>;

/// One named entity in the namespace.
#[derive(Clone, Debug)]
pub enum NsObject {
    Name(AmlValue),
    /// Method bytecode is copied out of the table at load time, so tables can
    /// be unmapped once parsed.
    Method { flags: MethodFlags, code: Vec<u8> },
    /// A method implemented by the interpreter itself (e.g. `\_OSI`).
    NativeMethod { arg_count: u8, code: NativeMethodFn },
    Field(FieldUnit),
    IndexField(IndexFieldUnit),
    OpRegion(OpRegion),
    Alias(AmlName),
    Scope(ScopeType),
}

impl NsObject {
    /// A short human-readable kind tag for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            NsObject::Name(_) => "Name",
            NsObject::Method { .. } => "Method",
            NsObject::NativeMethod { .. } => "NativeMethod",
            NsObject::Field(_) => "Field",
            NsObject::IndexField(_) => "IndexField",
            NsObject::OpRegion(_) => "OpRegion",
            NsObject::Alias(_) => "Alias",
            NsObject::Scope(_) => "Scope",
        }
    }
}

pub struct Namespace {
    objects: BTreeMap<AmlName, NsObject>,
}

impl Namespace {
    pub(crate) fn new() -> Namespace {
        Namespace { objects: BTreeMap::new() }
    }

    /// Adds an object at an absolute path. Re-declaring an existing scope
    /// (e.g. a second table opening `\_SB`) is permitted; any other collision
    /// is an error.
    pub fn insert(&mut self, path: AmlName, object: NsObject) -> Result<(), AmlError> {
        match self.objects.get(&path) {
            Some(NsObject::Scope(_)) if matches!(object, NsObject::Scope(_)) => Ok(()),
            Some(_) => Err(AmlError::NameCollision(path)),
            None => {
                self.objects.insert(path, object);
                Ok(())
            }
        }
    }

    pub fn get(&self, path: &AmlName) -> Result<&NsObject, AmlError> {
        self.objects.get(path).ok_or(AmlError::ValueDoesNotExist(path.clone()))
    }

    pub(crate) fn get_mut(&mut self, path: &AmlName) -> Result<&mut NsObject, AmlError> {
        self.objects.get_mut(path).ok_or(AmlError::ValueDoesNotExist(path.clone()))
    }

    pub fn contains(&self, path: &AmlName) -> bool {
        self.objects.contains_key(path)
    }

    /// Resolves a raw name against a scope, following AML's lexical rules: a
    /// rooted or prefixed path resolves structurally, while a bare single
    /// segment searches the current scope and then each enclosing scope up to
    /// the root. Aliases are chased on the result.
    pub fn search(&self, path: &NamePath, scope: &AmlName) -> Result<AmlName, AmlError> {
        if path.search_rules_apply() {
            let seg = path.segments[0];
            let mut current = scope.clone();
            loop {
                let candidate = current.child(seg);
                if self.objects.contains_key(&candidate) {
                    return self.resolve_aliases(candidate);
                }
                if current.is_root() {
                    return Err(AmlError::ValueDoesNotExist(scope.child(seg)));
                }
                current = current.parent()?;
            }
        } else {
            let absolute = path.resolve(scope)?;
            if self.objects.contains_key(&absolute) {
                self.resolve_aliases(absolute)
            } else {
                Err(AmlError::ValueDoesNotExist(absolute))
            }
        }
    }

    /// Follows alias handles until a non-alias object is reached.
    pub(crate) fn resolve_aliases(&self, path: AmlName) -> Result<AmlName, AmlError> {
        let mut current = path;
        for _ in 0..MAX_ALIAS_DEPTH {
            match self.objects.get(&current) {
                Some(NsObject::Alias(target)) => current = target.clone(),
                Some(_) => return Ok(current),
                None => return Err(AmlError::ValueDoesNotExist(current)),
            }
        }
        Err(AmlError::AliasLoop(current))
    }

    pub fn lookup_method(&self, path: &AmlName) -> Result<(MethodFlags, &[u8]), AmlError> {
        match self.get(path)? {
            NsObject::Method { flags, code } => Ok((*flags, code)),
            object => Err(AmlError::ObjectOfWrongKind { path: path.clone(), found: object.kind() }),
        }
    }

    pub fn lookup_opregion(&self, path: &AmlName) -> Result<OpRegion, AmlError> {
        match self.get(path)? {
            NsObject::OpRegion(region) => Ok(region.clone()),
            object => Err(AmlError::ObjectOfWrongKind { path: path.clone(), found: object.kind() }),
        }
    }

    /// Iterates the direct children of `prefix`, in name order.
    pub fn children<'a>(&'a self, prefix: &AmlName) -> impl Iterator<Item = (&'a AmlName, &'a NsObject)> + 'a {
        let depth = prefix.depth() + 1;
        let prefix = prefix.clone();
        self.objects.iter().filter(move |(name, _)| name.depth() == depth && name.starts_with(&prefix))
    }

    /// Removes everything below `prefix` (but not `prefix` itself). Used to
    /// destroy the objects a method created in its own scope when the
    /// invocation returns.
    pub(crate) fn remove_children(&mut self, prefix: &AmlName) {
        let depth = prefix.depth();
        self.objects.retain(|name, _| !(name.depth() > depth && name.starts_with(prefix)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name_object::NameSeg;

    fn name(string: &str) -> AmlName {
        AmlName::from_str(string).unwrap()
    }

    fn namespace_with(names: &[&str]) -> Namespace {
        let mut namespace = Namespace::new();
        for n in names {
            let path = name(n);
            // create intermediate scopes so the tree is well-formed
            let mut ancestors = alloc::vec::Vec::new();
            let mut current = path.parent().unwrap();
            while !current.is_root() {
                ancestors.push(current.clone());
                current = current.parent().unwrap();
            }
            for scope in ancestors.into_iter().rev() {
                let _ = namespace.insert(scope, NsObject::Scope(ScopeType::Scope));
            }
            namespace.insert(path, NsObject::Name(AmlValue::Integer(0))).unwrap();
        }
        namespace
    }

    fn bare(seg: &str) -> NamePath {
        NamePath { root: false, parent_ups: 0, segments: alloc::vec![NameSeg::from_str(seg).unwrap()] }
    }

    #[test]
    fn collision_detected() {
        let mut namespace = Namespace::new();
        namespace.insert(name("\\FOO"), NsObject::Name(AmlValue::Integer(1))).unwrap();
        assert_eq!(
            namespace.insert(name("\\FOO"), NsObject::Name(AmlValue::Integer(2))),
            Err(AmlError::NameCollision(name("\\FOO")))
        );
        // scopes may be re-opened
        namespace.insert(name("\\_SB"), NsObject::Scope(ScopeType::Scope)).unwrap();
        namespace.insert(name("\\_SB"), NsObject::Scope(ScopeType::Scope)).unwrap();
    }

    #[test]
    fn upward_search_from_nested_scope() {
        let namespace = namespace_with(&["\\_SB.PCI0.SBRG.DEV0", "\\_SB.GLOB"]);

        // GLOB isn't under SBRG, so the search walks up to \_SB
        let scope = name("\\_SB.PCI0.SBRG");
        assert_eq!(namespace.search(&bare("GLOB"), &scope).unwrap(), name("\\_SB.GLOB"));

        // matches the direct lookup from the root
        assert_eq!(namespace.search(&bare("GLOB"), &AmlName::root()).unwrap(), name("\\_SB.GLOB"));
    }

    #[test]
    fn shadowing_prefers_inner_scope() {
        let mut namespace = namespace_with(&["\\_SB.PCI0.GLOB", "\\GLOB"]);
        namespace.insert(name("\\_SB.PCI0.SBRG"), NsObject::Scope(ScopeType::Scope)).unwrap();

        let scope = name("\\_SB.PCI0.SBRG");
        assert_eq!(namespace.search(&bare("GLOB"), &scope).unwrap(), name("\\_SB.PCI0.GLOB"));
    }

    #[test]
    fn search_failure_names_innermost_candidate() {
        let namespace = namespace_with(&["\\_SB.DEV0"]);
        let scope = name("\\_SB");
        assert_eq!(
            namespace.search(&bare("NOPE"), &scope),
            Err(AmlError::ValueDoesNotExist(name("\\_SB.NOPE")))
        );
    }

    #[test]
    fn alias_chain_resolves() {
        let mut namespace = namespace_with(&["\\REAL"]);
        namespace.insert(name("\\ALI0"), NsObject::Alias(name("\\REAL"))).unwrap();
        namespace.insert(name("\\ALI1"), NsObject::Alias(name("\\ALI0"))).unwrap();

        assert_eq!(namespace.search(&bare("ALI1"), &AmlName::root()).unwrap(), name("\\REAL"));
    }

    #[test]
    fn alias_cycle_is_bounded() {
        let mut namespace = Namespace::new();
        namespace.insert(name("\\ALIA"), NsObject::Alias(name("\\ALIB"))).unwrap();
        namespace.insert(name("\\ALIB"), NsObject::Alias(name("\\ALIA"))).unwrap();

        assert!(matches!(namespace.search(&bare("ALIA"), &AmlName::root()), Err(AmlError::AliasLoop(_))));
    }

    #[test]
    fn children_enumeration() {
        let namespace = namespace_with(&["\\_SB.DEVA", "\\_SB.DEVB", "\\_SB.DEVA.CHLD", "\\OTHR"]);
        let children: Vec<_> = namespace.children(&name("\\_SB")).map(|(n, _)| n.clone()).collect();
        assert_eq!(children, alloc::vec![name("\\_SB.DEVA"), name("\\_SB.DEVB")]);
    }

    #[test]
    fn remove_children_clears_subtree() {
        let mut namespace = namespace_with(&["\\MTH_.TMP0", "\\MTH_.TMP1", "\\KEEP"]);
        namespace.remove_children(&name("\\MTH_"));
        assert!(namespace.contains(&name("\\MTH_")));
        assert!(!namespace.contains(&name("\\MTH_.TMP0")));
        assert!(namespace.contains(&name("\\KEEP")));
    }
}
