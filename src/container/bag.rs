use std::cell::Cell;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::anchor::Anchor;
use crate::comm::Comm;
use crate::error::Result;
use crate::registry::Handler;
use crate::types::Rank;

/// Handler that appends one item to a rank's local bag storage. Register it
/// for each item type the program bags: `handlers.register::<BagInsert<T>>()`.
pub struct BagInsert<T>(PhantomData<T>);

impl<T> Handler for BagInsert<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    type Args = (Anchor<Vec<T>>, T);

    fn call(comm: &Comm, (store, item): Self::Args) {
        comm.get(store).borrow_mut().push(item);
    }
}

/// An unordered distributed multiset. Items land on ranks round-robin from
/// the inserting rank; nothing about placement is observable beyond balance.
///
/// Construct collectively on every rank. Insertions are asynchronous:
/// results are visible only after a [`Comm::barrier`].
pub struct Bag<'a, T: 'static> {
    comm: &'a Comm,
    store: Anchor<Vec<T>>,
    next_dest: Cell<Rank>,
}

impl<'a, T> Bag<'a, T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    pub fn new(comm: &'a Comm) -> Self {
        let store = comm.make_anchor(Vec::new());
        Self {
            comm,
            store,
            next_dest: Cell::new(comm.rank()),
        }
    }

    /// Queue `item` for insertion somewhere in the bag.
    pub fn async_insert(&self, item: T) -> Result<()> {
        let dest = self.next_dest.get();
        self.next_dest.set((dest + 1) % self.comm.size());
        self.comm
            .post(dest, BagInsert(PhantomData), (self.store, item))
    }

    /// Items stored on this rank. Meaningful after a barrier.
    pub fn local_size(&self) -> usize {
        self.comm.get(self.store).borrow().len()
    }

    /// Total items across all ranks. Collective; runs a full barrier first
    /// so in-flight insertions are counted.
    pub fn size(&self) -> Result<u64> {
        self.comm.barrier()?;
        self.comm.all_reduce_sum(self.local_size() as u64)
    }

    /// Visit every locally-stored item. Call after a barrier for a
    /// consistent view.
    pub fn for_all<F: FnMut(&T)>(&self, mut f: F) {
        let store = self.comm.get(self.store);
        for item in store.borrow().iter() {
            f(item);
        }
    }

    /// Collect the whole bag onto `root`. Collective; other ranks get an
    /// empty vector.
    pub fn gather_to(&self, root: Rank) -> Result<Vec<T>>
    where
        T: Clone,
    {
        self.comm.barrier()?;
        let local: Vec<T> = self.comm.get(self.store).borrow().clone();
        if self.comm.rank() == root {
            let mut all = local;
            for src in 0..self.comm.size() {
                if src != root {
                    let mut part: Vec<T> = self.comm.p2p_recv(src)?;
                    all.append(&mut part);
                }
            }
            Ok(all)
        } else {
            self.comm.p2p_send(root, &local)?;
            Ok(Vec::new())
        }
    }
}
