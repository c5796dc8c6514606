//! Per-contract exclusive leases
//!
//! Every operation that advances a contract's revision must hold the
//! contract's lease. The locker keeps one slot per contract: the current
//! holder (if any) and a queue of waiters. Grants are handed to waiters over
//! oneshot channels, so waiting is cooperative and the internal mutex is
//! never held across an await point.
//!
//! # Ordering
//!
//! Waiters are served by effective priority (requested priority plus one
//! point per `priority_aging_interval` waited), ties by arrival order. Aging
//! bounds how long a low priority waiter can be overtaken.
//!
//! # Expiry
//!
//! A lease whose expiry has passed is free. Nobody needs to release it:
//! waiters sleep at most until the incumbent's expiry and reclaim the slot
//! when they wake.

pub mod pure;

use leasehold_core::{ContractError, ContractId, LockConfig, LockId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::time::Instant;

use pure::WaiterView;

#[derive(Debug, Clone, Copy)]
struct Lease {
    lock_id: LockId,
    expires_at: Instant,
    priority: i64,
}

#[derive(Debug)]
struct Waiter {
    seq: u64,
    priority: i64,
    enqueued_at: Instant,
    lease_duration: Duration,
    grant: oneshot::Sender<LockId>,
}

#[derive(Debug, Default)]
struct Slot {
    holder: Option<Lease>,
    waiters: Vec<Waiter>,
}

impl Slot {
    fn active_holder(&self, now: Instant) -> Option<&Lease> {
        self.holder
            .as_ref()
            .filter(|lease| !pure::is_lease_expired(lease.expires_at, now))
    }

    fn is_idle(&self, now: Instant) -> bool {
        self.active_holder(now).is_none() && self.waiters.is_empty()
    }

    fn remove_waiter(&mut self, seq: u64) -> bool {
        match self.waiters.iter().position(|w| w.seq == seq) {
            Some(idx) => {
                self.waiters.remove(idx);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Default)]
struct LockerState {
    slots: HashMap<ContractId, Slot>,
    next_seq: u64,
}

/// Grants exclusive, expiring leases on contracts
#[derive(Debug)]
pub struct ContractLocker {
    state: Mutex<LockerState>,
    aging_interval: Duration,
}

impl Default for ContractLocker {
    fn default() -> Self {
        Self::new(&LockConfig::default())
    }
}

impl ContractLocker {
    /// Create a locker using the aging interval from `config`
    pub fn new(config: &LockConfig) -> Self {
        Self::with_aging_interval(config.priority_aging_interval())
    }

    /// Create a locker with an explicit priority aging interval
    pub fn with_aging_interval(aging_interval: Duration) -> Self {
        Self {
            state: Mutex::new(LockerState::default()),
            aging_interval,
        }
    }

    /// Wait for exclusive access to a contract
    ///
    /// Resolves with a fresh lease that expires `lease_duration` after it was
    /// granted, or fails with [`ContractError::LockTimedOut`] once `max_wait`
    /// elapsed. Dropping the returned future withdraws the request; a lease
    /// granted concurrently with the drop is released again.
    pub async fn acquire(
        &self,
        contract_id: ContractId,
        max_wait: Duration,
        lease_duration: Duration,
        priority: i64,
    ) -> Result<LockId, ContractError> {
        let started = Instant::now();
        let deadline = started + max_wait;

        let mut pending = {
            let mut state = self.state.lock();
            let seq = state.next_seq;
            state.next_seq = state.next_seq.wrapping_add(1);

            let (grant, rx) = oneshot::channel();
            let slot = state.slots.entry(contract_id).or_default();
            slot.waiters.push(Waiter {
                seq,
                priority,
                enqueued_at: started,
                lease_duration,
                grant,
            });
            self.dispatch(contract_id, slot, started);

            PendingAcquire {
                locker: self,
                contract_id,
                seq,
                rx,
                finished: false,
            }
        };

        loop {
            let wake_at = {
                let mut state = self.state.lock();
                let now = Instant::now();
                if let Some(slot) = state.slots.get_mut(&contract_id) {
                    self.dispatch(contract_id, slot, now);
                }

                match pending.rx.try_recv() {
                    Ok(lock_id) => {
                        pending.finished = true;
                        tracing::debug!(
                            contract = %contract_id,
                            lock_id = %lock_id,
                            priority,
                            waited_ms = millis(now - started),
                            "acquired contract lease"
                        );
                        return Ok(lock_id);
                    }
                    Err(TryRecvError::Closed) => {
                        pending.finished = true;
                        return Err(ContractError::LockTimedOut {
                            contract_id,
                            waited_ms: millis(now - started),
                        });
                    }
                    Err(TryRecvError::Empty) => {}
                }

                if now >= deadline {
                    if let Some(slot) = state.slots.get_mut(&contract_id) {
                        slot.remove_waiter(pending.seq);
                        if slot.is_idle(now) {
                            state.slots.remove(&contract_id);
                        }
                    }
                    pending.finished = true;
                    tracing::debug!(
                        contract = %contract_id,
                        priority,
                        "timed out waiting for contract lease"
                    );
                    return Err(ContractError::LockTimedOut {
                        contract_id,
                        waited_ms: millis(now - started),
                    });
                }

                let incumbent_expiry = state
                    .slots
                    .get(&contract_id)
                    .and_then(|slot| slot.active_holder(now))
                    .map(|lease| lease.expires_at);
                incumbent_expiry.map_or(deadline, |expiry| expiry.min(deadline))
            };

            tokio::select! {
                granted = &mut pending.rx => {
                    pending.finished = true;
                    return match granted {
                        Ok(lock_id) => {
                            tracing::debug!(
                                contract = %contract_id,
                                lock_id = %lock_id,
                                priority,
                                waited_ms = millis(Instant::now() - started),
                                "acquired contract lease"
                            );
                            Ok(lock_id)
                        }
                        Err(_) => Err(ContractError::LockTimedOut {
                            contract_id,
                            waited_ms: millis(Instant::now() - started),
                        }),
                    };
                }
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    /// Push the expiry of a held lease to `extension` from now
    ///
    /// Expired, released and unknown leases are refused rather than
    /// re-granted; the caller has to acquire again.
    pub fn keepalive(
        &self,
        contract_id: ContractId,
        lock_id: LockId,
        extension: Duration,
    ) -> Result<(), ContractError> {
        let mut state = self.state.lock();
        let now = Instant::now();
        let Some(slot) = state.slots.get_mut(&contract_id) else {
            return Err(ContractError::LeaseNotHeld {
                contract_id,
                lock_id,
            });
        };

        match slot.holder.as_mut() {
            Some(lease)
                if lease.lock_id == lock_id
                    && !pure::is_lease_expired(lease.expires_at, now) =>
            {
                lease.expires_at = now + extension;
                tracing::trace!(
                    contract = %contract_id,
                    lock_id = %lock_id,
                    extension_ms = millis(extension),
                    "extended contract lease"
                );
                Ok(())
            }
            _ => {
                self.dispatch(contract_id, slot, now);
                tracing::debug!(
                    contract = %contract_id,
                    lock_id = %lock_id,
                    "refused keepalive for lease that is not held"
                );
                Err(ContractError::LeaseNotHeld {
                    contract_id,
                    lock_id,
                })
            }
        }
    }

    /// Give up a held lease and hand the contract to the next waiter
    pub fn release(&self, contract_id: ContractId, lock_id: LockId) -> Result<(), ContractError> {
        let mut state = self.state.lock();
        let now = Instant::now();
        let Some(slot) = state.slots.get_mut(&contract_id) else {
            return Err(ContractError::LeaseNotHeld {
                contract_id,
                lock_id,
            });
        };

        let held = slot.active_holder(now).map(|lease| lease.lock_id) == Some(lock_id);
        if held {
            slot.holder = None;
            tracing::debug!(contract = %contract_id, lock_id = %lock_id, "released contract lease");
        }
        self.dispatch(contract_id, slot, now);
        if slot.is_idle(now) {
            state.slots.remove(&contract_id);
        }

        if held {
            Ok(())
        } else {
            Err(ContractError::LeaseNotHeld {
                contract_id,
                lock_id,
            })
        }
    }

    /// True while a non-expired lease is outstanding on the contract
    pub fn is_locked(&self, contract_id: ContractId) -> bool {
        let now = Instant::now();
        let state = self.state.lock();
        let locked = state
            .slots
            .get(&contract_id)
            .and_then(|slot| slot.active_holder(now))
            .is_some();
        locked
    }

    /// Number of callers queued for the contract
    pub fn waiters(&self, contract_id: ContractId) -> usize {
        let state = self.state.lock();
        let queued = state
            .slots
            .get(&contract_id)
            .map_or(0, |slot| slot.waiters.len());
        queued
    }

    /// Grant the slot to the best waiter if it is free.
    ///
    /// Must be called with the state mutex held.
    fn dispatch(&self, contract_id: ContractId, slot: &mut Slot, now: Instant) {
        if slot.active_holder(now).is_some() {
            return;
        }
        if let Some(expired) = slot.holder.take() {
            tracing::debug!(
                contract = %contract_id,
                lock_id = %expired.lock_id,
                priority = expired.priority,
                "reclaimed expired contract lease"
            );
        }

        loop {
            let views = slot.waiters.iter().map(|w| WaiterView {
                seq: w.seq,
                priority: w.priority,
                waited: now.saturating_duration_since(w.enqueued_at),
            });
            let Some(idx) = pure::select_next(views, self.aging_interval) else {
                return;
            };

            let waiter = slot.waiters.remove(idx);
            let lock_id = fresh_lock_id();
            if waiter.grant.send(lock_id).is_ok() {
                slot.holder = Some(Lease {
                    lock_id,
                    expires_at: now + waiter.lease_duration,
                    priority: waiter.priority,
                });
                return;
            }
            // the waiter's future is gone, try the next one
        }
    }
}

/// Waiter registration owned by an in-flight `acquire`
///
/// Cleans up the queue entry if the acquire future is dropped early.
struct PendingAcquire<'a> {
    locker: &'a ContractLocker,
    contract_id: ContractId,
    seq: u64,
    rx: oneshot::Receiver<LockId>,
    finished: bool,
}

impl Drop for PendingAcquire<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let mut state = self.locker.state.lock();
        let now = Instant::now();
        let Some(slot) = state.slots.get_mut(&self.contract_id) else {
            return;
        };

        if !slot.remove_waiter(self.seq) {
            // granted between the last poll and the drop
            if let Ok(lock_id) = self.rx.try_recv() {
                if slot.holder.map(|lease| lease.lock_id) == Some(lock_id) {
                    slot.holder = None;
                }
                tracing::debug!(
                    contract = %self.contract_id,
                    lock_id = %lock_id,
                    "released lease granted to a cancelled acquire"
                );
            }
        }
        self.locker.dispatch(self.contract_id, slot, now);
        if slot.is_idle(now) {
            state.slots.remove(&self.contract_id);
        }
    }
}

fn fresh_lock_id() -> LockId {
    loop {
        let id = rand::random::<u64>();
        if id != 0 {
            return LockId(id);
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(seed: u8) -> ContractId {
        ContractId::new([seed; 32])
    }

    const SECOND: Duration = Duration::from_secs(1);

    #[tokio::test(start_paused = true)]
    async fn uncontended_acquire_is_immediate() {
        let locker = ContractLocker::default();
        let lock_id = locker.acquire(contract(1), SECOND, SECOND, 0).await.unwrap();
        assert!(locker.is_locked(contract(1)));
        locker.release(contract(1), lock_id).unwrap();
        assert!(!locker.is_locked(contract(1)));
        assert!(locker.state.lock().slots.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn release_with_foreign_token_fails() {
        let locker = ContractLocker::default();
        let lock_id = locker.acquire(contract(1), SECOND, SECOND, 0).await.unwrap();
        let foreign = LockId(lock_id.0.wrapping_add(1));
        assert!(matches!(
            locker.release(contract(1), foreign),
            Err(ContractError::LeaseNotHeld { .. })
        ));
        // token for the wrong contract
        assert!(locker.release(contract(2), lock_id).is_err());
        assert!(locker.is_locked(contract(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn different_contracts_do_not_contend() {
        let locker = ContractLocker::default();
        let a = locker.acquire(contract(1), Duration::ZERO, SECOND, 0).await;
        let b = locker.acquire(contract(2), Duration::ZERO, SECOND, 0).await;
        assert!(a.is_ok());
        assert!(b.is_ok());
    }

    #[test]
    fn lock_ids_are_never_zero() {
        for _ in 0..1000 {
            assert_ne!(fresh_lock_id().0, 0);
        }
    }
}
