use std::marker::PhantomData;
use std::ops::AddAssign;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::anchor::Anchor;
use crate::comm::Comm;
use crate::error::Result;
use crate::registry::Handler;
use crate::types::Rank;

/// A remote visitation of one element, executed at the owning rank with
/// mutable access to the slot. Implementations are named types so every rank
/// agrees on their identity; register the corresponding
/// [`ArrayVisit<V, F>`] handler with the communicator.
///
/// Visitors may post further invocations through `comm`; they must not
/// touch the array they are visiting through its anchor (the slot is
/// already borrowed).
pub trait ArrayVisitor<V>: 'static {
    type Args: Serialize + DeserializeOwned;

    fn visit(comm: &Comm, index: u64, value: &mut V, args: Self::Args);
}

/// A named merge of an incoming value into the owned slot. Register the
/// corresponding [`ArrayBinaryOp<V, Op>`] handler per element type.
pub trait BinaryOp<V>: 'static {
    fn apply(current: &mut V, incoming: V);
}

/// Element-wise addition, the most common merge.
pub struct AddOp;

impl<V: AddAssign + 'static> BinaryOp<V> for AddOp {
    fn apply(current: &mut V, incoming: V) {
        *current += incoming;
    }
}

fn slot<'v, V>(vec: &'v mut Vec<V>, local_index: u64) -> &'v mut V {
    assert!(
        (local_index as usize) < vec.len(),
        "array slot {local_index} out of local range {}",
        vec.len()
    );
    &mut vec[local_index as usize]
}

/// Handler that overwrites one local slot. Register per element type.
pub struct ArraySet<V>(PhantomData<V>);

impl<V> Handler for ArraySet<V>
where
    V: Serialize + DeserializeOwned + 'static,
{
    type Args = (Anchor<Vec<V>>, u64, V);

    fn call(comm: &Comm, (store, local_index, value): Self::Args) {
        let store = comm.get(store);
        *slot(&mut store.borrow_mut(), local_index) = value;
    }
}

/// Handler that merges an incoming value into one local slot with `Op`.
/// Register per (element type, op) pair.
pub struct ArrayBinaryOp<V, Op>(PhantomData<(V, Op)>);

impl<V, Op> Handler for ArrayBinaryOp<V, Op>
where
    V: Serialize + DeserializeOwned + 'static,
    Op: BinaryOp<V>,
{
    type Args = (Anchor<Vec<V>>, u64, V);

    fn call(comm: &Comm, (store, local_index, value): Self::Args) {
        let store = comm.get(store);
        Op::apply(slot(&mut store.borrow_mut(), local_index), value);
    }
}

/// Additive merge, kept under its own name for the common case.
pub type ArrayAdd<V> = ArrayBinaryOp<V, AddOp>;

/// Handler that runs an [`ArrayVisitor`] on one local slot. Register per
/// (element type, visitor) pair.
pub struct ArrayVisit<V, F>(PhantomData<(V, F)>);

impl<V, F> Handler for ArrayVisit<V, F>
where
    V: Serialize + DeserializeOwned + 'static,
    F: ArrayVisitor<V>,
{
    type Args = (Anchor<Vec<V>>, u64, u64, F::Args);

    fn call(comm: &Comm, (store, local_index, index, args): Self::Args) {
        let store = comm.get(store);
        F::visit(comm, index, slot(&mut store.borrow_mut(), local_index), args);
    }
}

/// A fixed-size array block-partitioned across ranks: rank `r` owns indices
/// `[r * block, min((r + 1) * block, len))` with `block = ceil(len / size)`,
/// the last rank possibly short.
///
/// Construct collectively. Mutations are asynchronous; read your own block
/// with [`for_all`](Self::for_all) after a [`Comm::barrier`].
pub struct Array<'a, V: 'static> {
    comm: &'a Comm,
    global_len: u64,
    block: u64,
    store: Anchor<Vec<V>>,
}

impl<'a, V> Array<'a, V>
where
    V: Serialize + DeserializeOwned + Clone + 'static,
{
    pub fn new(comm: &'a Comm, global_len: u64, fill: V) -> Self {
        assert!(global_len > 0, "array must have at least one element");
        let block = global_len.div_ceil(u64::from(comm.size()));
        let start = (u64::from(comm.rank()) * block).min(global_len);
        let end = (start + block).min(global_len);
        let store = comm.make_anchor(vec![fill; (end - start) as usize]);
        Self {
            comm,
            global_len,
            block,
            store,
        }
    }

    pub fn len(&self) -> u64 {
        self.global_len
    }

    pub fn is_empty(&self) -> bool {
        self.global_len == 0
    }

    /// Rank owning `index`.
    pub fn owner(&self, index: u64) -> Rank {
        assert!(index < self.global_len, "index {index} out of range");
        (index / self.block) as Rank
    }

    /// Queue an overwrite of `index` with `value`.
    pub fn async_set(&self, index: u64, value: V) -> Result<()> {
        let dest = self.owner(index);
        self.comm.post(
            dest,
            ArraySet(PhantomData),
            (self.store, index % self.block, value),
        )
    }

    /// Queue a visit of `index`: `F` runs at the owning rank with mutable
    /// access to the element.
    pub fn async_visit<F>(&self, index: u64, args: F::Args) -> Result<()>
    where
        F: ArrayVisitor<V>,
    {
        let dest = self.owner(index);
        self.comm.post(
            dest,
            ArrayVisit::<V, F>(PhantomData),
            (self.store, index % self.block, index, args),
        )
    }

    /// Queue a merge of `value` into `index` with the named op.
    pub fn async_binary_op<Op>(&self, index: u64, value: V) -> Result<()>
    where
        Op: BinaryOp<V>,
    {
        let dest = self.owner(index);
        self.comm.post(
            dest,
            ArrayBinaryOp::<V, Op>(PhantomData),
            (self.store, index % self.block, value),
        )
    }

    /// Queue an accumulation into `index`.
    pub fn async_add(&self, index: u64, value: V) -> Result<()>
    where
        V: AddAssign,
    {
        self.async_binary_op::<AddOp>(index, value)
    }

    /// Visit this rank's block as `(global_index, &value)`. Call after a
    /// barrier for a consistent view.
    pub fn for_all<F: FnMut(u64, &V)>(&self, mut f: F) {
        let base = u64::from(self.comm.rank()) * self.block;
        let store = self.comm.get(self.store);
        for (offset, value) in store.borrow().iter().enumerate() {
            f(base + offset as u64, value);
        }
    }
}
