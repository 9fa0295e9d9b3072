//! Handler registration and the lambda id table.
//!
//! Every remote invocation names its handler with a two-byte id. All ranks
//! must agree on the numbering without exchanging it, so the table is built
//! once at communicator construction: entries are sorted by their stable
//! type name and numbered in that order. Identical program images therefore
//! produce identical tables regardless of the order `register` calls ran in.

use std::any::TypeId;
use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec;
use crate::comm::Comm;
use crate::error::Result;
use crate::types::LambdaId;

/// A remote invocable: a named unit type plus a typed argument tuple.
///
/// Handlers carry no state of their own; per-rank state is reached through
/// [`Anchor`](crate::anchor::Anchor) arguments. `call` may post further
/// invocations through the communicator it receives.
pub trait Handler: 'static {
    type Args: Serialize + DeserializeOwned;

    fn call(comm: &Comm, args: Self::Args);

    /// Stable identity used to order the id table. The default — the full
    /// type path — is unique per handler within one program image.
    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Monomorphized unpack-and-invoke shim stored in the table.
pub(crate) type Thunk = fn(&Comm, &[u8]) -> Result<()>;

fn thunk<H: Handler>(comm: &Comm, bytes: &[u8]) -> Result<()> {
    let args: H::Args = codec::unpack(bytes)?;
    H::call(comm, args);
    Ok(())
}

/// Collects the handlers a program uses before the communicator exists.
///
/// Every rank must register the same set (the call order does not matter).
#[derive(Debug, Clone, Default)]
pub struct HandlerSet {
    entries: Vec<(&'static str, TypeId, Thunk)>,
}

impl HandlerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler type. Registering the same handler twice is fine.
    pub fn register<H: Handler>(mut self) -> Self {
        let id = TypeId::of::<H>();
        if !self.entries.iter().any(|(_, t, _)| *t == id) {
            self.entries.push((H::name(), id, thunk::<H>));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Immutable id table built from a [`HandlerSet`].
pub(crate) struct LambdaRegistry {
    thunks: Vec<Thunk>,
    names: Vec<&'static str>,
    ids: HashMap<TypeId, LambdaId>,
}

impl LambdaRegistry {
    pub(crate) fn build(set: HandlerSet) -> Self {
        let mut entries = set.entries;
        entries.sort_by_key(|(name, _, _)| *name);
        for pair in entries.windows(2) {
            assert_ne!(
                pair[0].0, pair[1].0,
                "two distinct handlers share the name {:?}",
                pair[0].0
            );
        }
        assert!(
            entries.len() <= LambdaId::MAX as usize + 1,
            "handler table overflows the {}-entry id space",
            LambdaId::MAX as usize + 1
        );

        let mut thunks = Vec::with_capacity(entries.len());
        let mut names = Vec::with_capacity(entries.len());
        let mut ids = HashMap::with_capacity(entries.len());
        for (index, (name, type_id, thunk)) in entries.into_iter().enumerate() {
            thunks.push(thunk);
            names.push(name);
            ids.insert(type_id, index as LambdaId);
        }
        Self { thunks, names, ids }
    }

    /// The id all ranks agree on for `H`. Sending an unregistered handler is
    /// a programming error.
    pub(crate) fn id_of<H: Handler>(&self) -> LambdaId {
        match self.ids.get(&TypeId::of::<H>()) {
            Some(id) => *id,
            None => panic!("handler {} was not registered", H::name()),
        }
    }

    /// Decode the arguments for `id` and run the handler.
    pub(crate) fn invoke(&self, comm: &Comm, id: LambdaId, args: &[u8]) -> Result<()> {
        match self.thunks.get(id as usize) {
            Some(t) => t(comm, args),
            None => panic!(
                "received unknown lambda id {id} (table has {} handlers)",
                self.thunks.len()
            ),
        }
    }

    pub(crate) fn name_of(&self, id: LambdaId) -> &'static str {
        self.names[id as usize]
    }

    pub(crate) fn len(&self) -> usize {
        self.thunks.len()
    }
}
