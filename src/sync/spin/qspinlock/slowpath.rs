//! Contended acquisition: the pending arbiter and the MCS queue.

use core::sync::atomic::Ordering;

use super::{
    word::{
        decode_tail, encode_tail, WaiterId, LOCKED_MASK, LOCKED_PENDING_MASK, LOCKED_VAL,
        PENDING_MASK, PENDING_VAL, TAIL_MASK,
    },
    LockPath, RawQSpinLock,
};
use crate::{config::PENDING_LOOPS, processor::Platform};

impl<P: Platform> RawQSpinLock<P> {
    /// Acquires the lock after the fast path saw `val` instead of zero.
    ///
    /// ```text
    /// (queue tail, pending bit, lock value)
    ///
    ///              fast     :    slow                                  :    unlock
    ///                       :                                          :
    /// uncontended  (0,0,0) -:--> (0,0,1) ------------------------------:--> (*,*,0)
    ///                       :       | ^--------.------.             /  :
    ///                       :       v           \      \            |  :
    /// pending               :    (0,1,1) +--> (0,1,0)   \           |  :
    ///                       :       | ^--'              |           |  :
    ///                       :       v                   |           |  :
    /// uncontended           :    (n,x,y) +--> (n,0,0) --'           |  :
    ///   queue               :       | ^--'                          |  :
    ///                       :       v                               |  :
    /// contended             :    (*,x,y) +--> (*,0,0) ---> (*,0,1) -'  :
    ///   queue               :         ^--'                             :
    /// ```
    pub(super) fn lock_slowpath(&self, mut val: u32, id: WaiterId) -> LockPath {
        // A pending owner is mid hand-over (0,1,0) -> (0,0,1); give it a
        // moment instead of queueing behind a transition.
        if val == PENDING_VAL {
            let mut loops = PENDING_LOOPS;
            while val == PENDING_VAL && loops > 0 {
                P::relax();
                val = self.val.load(Ordering::Relaxed);
                loops -= 1;
            }
        }

        // Anybody pending or queued: join the queue.
        if val & !LOCKED_MASK != 0 {
            return self.lock_queued(id);
        }

        // trylock || pending
        //
        // 0,0,* -> 0,1,* -> 0,0,1 pending, trylock
        let val = self.val.fetch_or(PENDING_VAL, Ordering::Acquire);

        // Somebody else got there first. Undo our pending bit if we set it:
        // it may have made a queue head's (n,0,0) -> (0,0,1) claim fail, and
        // that head now waits for us to link in behind it.
        if val & !LOCKED_MASK != 0 {
            if val & PENDING_MASK == 0 {
                self.clear_pending();
            }
            return self.lock_queued(id);
        }

        // We are the pending owner: wait for the current owner to go away.
        //
        // 0,1,1 -> 0,1,0
        if val & LOCKED_MASK != 0 {
            while self.val.load(Ordering::Acquire) & LOCKED_MASK != 0 {
                P::relax();
            }
        }

        // Only the pending owner may take the lock from here, no CAS needed.
        //
        // 0,1,0 -> 0,0,1
        self.clear_pending_set_locked();
        LockPath::Pending
    }

    /// Queues behind the current tail and spins on this context's own node.
    fn lock_queued(&self, id: WaiterId) -> LockPath {
        let pool = P::node_pool();
        let node = pool.node(id);
        let tail = encode_tail(id);

        node.reset();

        // Publishes the node; its reset above is ordered before the swap.
        let old = self.xchg_tail(tail);
        let mut next = 0;

        // There was a predecessor: link in behind it and wait for the queue
        // head to be handed to us.
        if old & TAIL_MASK != 0 {
            let prev = match decode_tail(old) {
                Some(prev) => prev,
                None => unreachable!("lock word holds an undecodable tail {:#x}", old),
            };
            log::trace!(
                "cpu {} level {} queued behind {:?}",
                id.cpu().as_usize(),
                id.level().as_usize(),
                prev
            );

            pool.node(prev).link(tail);
            node.wait_handoff::<P>();

            // A successor may already be linked behind us.
            next = node.next();
        }

        // We are the head: wait for the owner and any pending owner to go.
        //
        // *,x,y -> *,0,0
        let mut val;
        loop {
            val = self.val.load(Ordering::Acquire);
            if val & LOCKED_PENDING_MASK == 0 {
                break;
            }
            P::relax();
        }

        // Claim the lock.
        //
        // n,0,0 -> 0,0,1 : lock, uncontended (we are also the tail)
        // *,*,0 -> *,*,1 : lock, contended
        //
        // If the queue head is the only one in the queue, clear the tail in
        // the same step. Otherwise only the lock bit goes up; nobody else can
        // set it while we are head and pending is clear.
        if val & TAIL_MASK == tail
            && self
                .val
                .compare_exchange(val, LOCKED_VAL, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
        {
            node.retire();
            return LockPath::Queued;
        }

        self.set_locked();

        // Contended path: wait for the successor to finish linking, then pass
        // it the head of the queue.
        if next == 0 {
            next = node.wait_next::<P>();
        }
        let successor = match decode_tail(next) {
            Some(successor) => successor,
            None => unreachable!("waiter node links an undecodable tail {:#x}", next),
        };
        log::trace!("cpu {} hands queue head to {:?}", id.cpu().as_usize(), successor);
        pool.node(successor).hand_off();

        node.retire();
        LockPath::Queued
    }

    /// Swaps the tail field for `tail`, keeping locked and pending intact.
    ///
    /// Returns the previous word.
    fn xchg_tail(&self, tail: u32) -> u32 {
        let mut old = self.val.load(Ordering::Relaxed);
        loop {
            let new = (old & LOCKED_PENDING_MASK) | tail;
            match self
                .val
                .compare_exchange_weak(old, new, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(prev) => return prev,
                Err(actual) => old = actual,
            }
        }
    }

    /// *,1,* -> *,0,*
    #[inline(always)]
    fn clear_pending(&self) {
        self.val.fetch_and(!PENDING_MASK, Ordering::Relaxed);
    }

    /// *,1,0 -> *,0,1
    ///
    /// The pending owner already synchronized with the previous owner through
    /// its acquire load of the lock word.
    #[inline(always)]
    fn clear_pending_set_locked(&self) {
        self.val.fetch_sub(PENDING_VAL - LOCKED_VAL, Ordering::Relaxed);
    }

    /// *,*,0 -> *,*,1
    #[inline(always)]
    fn set_locked(&self) {
        self.val.fetch_or(LOCKED_VAL, Ordering::Relaxed);
    }
}
