//! The instantiation cache, shared across threads.
//!
//! A key is claimed before its instance is built, so a nested use of the
//! same key (a struct mentioning itself, a recursive function) gets the
//! reserved id instead of recursing. A second thread asking for a key
//! under construction waits for it, unless the builder is itself waiting
//! on that thread, in which case it takes the reserved id too.
//!
//! ```text
//! claim(key)
//!     ├── Ready        -> finished instance id
//!     ├── Failed       -> what the builder hit, to be reported at the
//!     │                   caller's own use site
//!     ├── InProgress   -> same thread, or a wait cycle: reserved id
//!     │                   other thread: wait, then look again
//!     └── absent       -> reserve an id; caller builds and calls complete
//! ```

use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use umbra_types::DeclId;

use super::Instantiation;
use crate::binding::BindingSet;
use crate::error::{GenericError, GenericErrorKind};

/// Index of an instance in its cache.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u32);

impl InstanceId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId({})", self.0)
    }
}

/// A declaration with the canonical binding of every parameter in its
/// scope.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub decl: DeclId,
    pub binding: BindingSet,
}

enum Slot {
    InProgress { id: InstanceId, owner: ThreadId },
    Ready(InstanceId),
    Failed(GenericErrorKind),
}

#[derive(Default)]
struct State {
    slots: FxHashMap<InstanceKey, Slot>,
    /// Finished instances by id; `None` while reserved.
    instances: Vec<Option<Arc<Instantiation>>>,
    /// Thread -> owner of the slot it waits on.
    waiting: FxHashMap<ThreadId, ThreadId>,
}

impl State {
    /// Whether `owner` is, through the chain of waits, waiting on `me`.
    fn waits_on(&self, mut owner: ThreadId, me: ThreadId) -> bool {
        for _ in 0..=self.waiting.len() {
            if owner == me {
                return true;
            }
            match self.waiting.get(&owner) {
                Some(&next) => owner = next,
                None => return false,
            }
        }
        false
    }
}

pub(crate) enum Claim {
    Ready(InstanceId),
    /// Building the key failed before.
    Failed(GenericErrorKind),
    /// Under construction further up this thread's stack or in a wait cycle.
    Reserved(InstanceId),
    /// Reserved for the caller, who must call [`InstantiationCache::complete`].
    Build(InstanceId),
}

#[derive(Default)]
pub struct InstantiationCache {
    state: Mutex<State>,
    finished: Condvar,
}

impl InstantiationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn claim(&self, key: &InstanceKey) -> Claim {
        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            match state.slots.get(key) {
                Some(Slot::Ready(id)) => {
                    tracing::trace!(?key.decl, id = ?id, "instantiation cache hit");
                    return Claim::Ready(*id);
                }
                Some(Slot::Failed(kind)) => return Claim::Failed(kind.clone()),
                Some(&Slot::InProgress { id, owner }) => {
                    if state.waits_on(owner, me) {
                        tracing::debug!(?key.decl, ?id, "using reserved instance");
                        return Claim::Reserved(id);
                    }
                    state.waiting.insert(me, owner);
                    self.finished.wait(&mut state);
                    state.waiting.remove(&me);
                }
                None => {
                    let Ok(raw) = u32::try_from(state.instances.len()) else {
                        return Claim::Failed(GenericErrorKind::Internal(
                            "instance table overflow".to_owned(),
                        ));
                    };
                    let id = InstanceId(raw);
                    state.instances.push(None);
                    state
                        .slots
                        .insert(key.clone(), Slot::InProgress { id, owner: me });
                    tracing::debug!(?key.decl, ?id, "reserved instance");
                    return Claim::Build(id);
                }
            }
        }
    }

    /// Finish a key claimed with [`Claim::Build`] and wake waiters.
    pub(crate) fn complete(
        &self,
        key: InstanceKey,
        id: InstanceId,
        result: Result<Instantiation, GenericError>,
    ) -> Result<Arc<Instantiation>, GenericError> {
        let mut state = self.state.lock();
        let out = match result {
            Ok(instance) => {
                let instance = Arc::new(instance);
                if let Some(slot) = state.instances.get_mut(id.index()) {
                    *slot = Some(Arc::clone(&instance));
                }
                state.slots.insert(key, Slot::Ready(id));
                Ok(instance)
            }
            Err(e) => {
                state.slots.insert(key, Slot::Failed(e.kind.clone()));
                Err(e)
            }
        };
        drop(state);
        self.finished.notify_all();
        out
    }

    pub fn get(&self, id: InstanceId) -> Option<Arc<Instantiation>> {
        self.state.lock().instances.get(id.index()).cloned().flatten()
    }

    /// Every finished instance, in id order.
    pub fn snapshot(&self) -> Vec<Arc<Instantiation>> {
        self.state.lock().instances.iter().flatten().cloned().collect()
    }

    /// Number of finished instances; reserved and failed keys do not count.
    pub fn len(&self) -> usize {
        self.state.lock().instances.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use std::sync::Barrier;

    use pretty_assertions::assert_eq;
    use umbra_types::TypeId;

    use super::*;
    use crate::specialize::Entity;

    fn key(raw: u32) -> InstanceKey {
        InstanceKey {
            decl: DeclId::new(raw),
            binding: BindingSet::new(),
        }
    }

    fn built(key: &InstanceKey, id: InstanceId) -> Result<Instantiation, GenericError> {
        Ok(Instantiation {
            id,
            decl: key.decl,
            binding: key.binding.clone(),
            name: format!("decl{}", key.decl.raw()),
            entity: Entity::Alias(TypeId::INT),
        })
    }

    #[test]
    fn nested_claim_on_one_thread_is_reserved() {
        let cache = InstantiationCache::new();
        let a = key(0);
        let Claim::Build(id) = cache.claim(&a) else {
            panic!("first claim builds");
        };
        assert!(matches!(cache.claim(&a), Claim::Reserved(r) if r == id));
        assert!(cache.is_empty());
        cache.complete(a.clone(), id, built(&a, id)).unwrap();
        assert!(matches!(cache.claim(&a), Claim::Ready(r) if r == id));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn builders_waiting_on_each_other_take_reserved_ids() {
        let cache = InstantiationCache::new();
        let (a, b) = (key(0), key(1));
        let claimed = Barrier::new(2);

        thread::scope(|s| {
            let other = s.spawn(|| {
                let Claim::Build(b_id) = cache.claim(&b) else {
                    panic!("b is unclaimed");
                };
                claimed.wait();
                // Waits until `a` is finished on the first thread.
                let Claim::Ready(a_id) = cache.claim(&a) else {
                    panic!("a is finished by its builder");
                };
                cache.complete(b.clone(), b_id, built(&b, b_id)).unwrap();
                a_id
            });

            let Claim::Build(a_id) = cache.claim(&a) else {
                panic!("a is unclaimed");
            };
            claimed.wait();
            let waiter = other.thread().id();
            while !cache.state.lock().waiting.contains_key(&waiter) {
                thread::yield_now();
            }
            // The builder of `b` waits on this thread, so waiting here would
            // deadlock.
            let Claim::Reserved(b_id) = cache.claim(&b) else {
                panic!("b is reserved");
            };
            cache.complete(a.clone(), a_id, built(&a, a_id)).unwrap();
            assert_eq!(other.join().unwrap(), a_id);
            assert_eq!(cache.get(b_id).map(|i| i.decl), Some(b.decl));
        });
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failures_keep_only_the_kind() {
        let cache = InstantiationCache::new();
        let a = key(0);
        let Claim::Build(id) = cache.claim(&a) else {
            panic!("first claim builds");
        };
        let kind = GenericErrorKind::InstantiationDepthExceeded { limit: 4 };
        let err = GenericError::new(kind.clone(), umbra_ir::Span::new(3, 4));
        assert_eq!(cache.complete(a.clone(), id, Err(err.clone())), Err(err));
        assert!(matches!(cache.claim(&a), Claim::Failed(k) if k == kind));
        assert!(cache.is_empty());
    }
}
