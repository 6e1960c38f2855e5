//! Registries mapping wire type codes to parsers and serializers.
//!
//! Every extensible encoding in this crate (BGP messages, path attributes,
//! extended communities, NLRI families, capabilities, BGP-LS TLVs, BMP
//! messages and TLVs, RSVP subobjects) is dispatched through a
//! [`TypeRegistry`]. In the parsing direction the registry is keyed by the
//! numeric code found on the wire. In the serializing direction it is keyed
//! by a tag taken from the value to be written, and hands back both the
//! serializer and the code to put on the wire.
//!
//! Registries are filled once at start-up and are read-only afterwards.
//! They hold nothing but plain data and function pointers, so a registry
//! behind an [`Arc`](std::sync::Arc) can be read from any number of
//! sessions at the same time without locking.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::hash::Hash;

use log::debug;

//------------ TypeRegistry --------------------------------------------------

/// Maps type codes `K` to parsers `P` and value tags `T` to serializers `S`.
#[derive(Clone, Debug)]
pub struct TypeRegistry<K, T, P, S> {
    parsers: HashMap<K, Binding<P>>,
    serializers: HashMap<T, Binding<(K, S)>>,
    next_id: u64,
}

#[derive(Clone, Debug)]
struct Binding<F> {
    id: u64,
    handler: F,
}

impl<K, T, P, S> Default for TypeRegistry<K, T, P, S> {
    fn default() -> Self {
        TypeRegistry {
            parsers: HashMap::new(),
            serializers: HashMap::new(),
            next_id: 0,
        }
    }
}

impl<K, T, P, S> TypeRegistry<K, T, P, S>
where
    K: Copy + Eq + Hash + fmt::Debug,
    T: Copy + Eq + Hash + fmt::Debug,
    P: Copy,
    S: Copy,
{
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `code` to `parser` and `tag` to `serializer`.
    ///
    /// Fails without changing anything if either the code or the tag is
    /// already bound.
    pub fn register(
        &mut self,
        code: K,
        tag: T,
        parser: P,
        serializer: S,
    ) -> Result<Handle<K, T>, DuplicateType<K, T>> {
        if self.parsers.contains_key(&code) {
            return Err(DuplicateType::Code(code));
        }
        if self.serializers.contains_key(&tag) {
            return Err(DuplicateType::Tag(tag));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.parsers.insert(code, Binding { id, handler: parser });
        self.serializers.insert(
            tag, Binding { id, handler: (code, serializer) }
        );
        debug!("registered {:?} as {:?}", tag, code);
        Ok(Handle { code, tag, id })
    }

    /// Removes the bindings made by the registration `handle` came from.
    ///
    /// Bindings made by a later registration for the same code or tag are
    /// left alone. Returns whether anything was removed.
    pub fn unregister(&mut self, handle: Handle<K, T>) -> bool {
        let mut removed = false;
        if self.parsers.get(&handle.code).map(|b| b.id) == Some(handle.id) {
            self.parsers.remove(&handle.code);
            removed = true;
        }
        if self.serializers.get(&handle.tag).map(|b| b.id) == Some(handle.id)
        {
            self.serializers.remove(&handle.tag);
            removed = true;
        }
        if removed {
            debug!("unregistered {:?} ({:?})", handle.tag, handle.code);
        }
        removed
    }

    /// Returns the parser bound to `code`.
    ///
    /// An unknown code is not an error, callers decide what to do with
    /// values nobody registered for.
    pub fn parser_for(&self, code: K) -> Option<P> {
        self.parsers.get(&code).map(|b| b.handler)
    }

    /// Returns the serializer bound to `tag` and the code to write for it.
    pub fn serializer_for(&self, tag: T) -> Option<(K, S)> {
        self.serializers.get(&tag).map(|b| b.handler)
    }

    /// Returns whether a parser is bound to `code`.
    pub fn contains(&self, code: K) -> bool {
        self.parsers.contains_key(&code)
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

//------------ Handle --------------------------------------------------------

/// Proof of a successful registration.
///
/// Passing it to [`TypeRegistry::unregister`] removes exactly the bindings
/// made by that registration.
#[derive(Debug, Eq, PartialEq)]
#[must_use = "dropping the handle makes the registration permanent"]
pub struct Handle<K, T> {
    code: K,
    tag: T,
    id: u64,
}

impl<K: Copy, T: Copy> Handle<K, T> {
    pub fn code(&self) -> K {
        self.code
    }

    pub fn tag(&self) -> T {
        self.tag
    }
}

//------------ DuplicateType -------------------------------------------------

/// A registration attempt hit an existing binding.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DuplicateType<K, T> {
    Code(K),
    Tag(T),
}

impl<K: fmt::Debug, T: fmt::Debug> fmt::Display for DuplicateType<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DuplicateType::Code(code) => {
                write!(f, "type code {:?} is already registered", code)
            }
            DuplicateType::Tag(tag) => {
                write!(f, "serializer for {:?} is already registered", tag)
            }
        }
    }
}

impl<K: fmt::Debug, T: fmt::Debug> Error for DuplicateType<K, T> { }

//--- Tests ------------------------------------------------------------------
