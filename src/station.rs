//! The state container threaded through a workflow run.
//!
//! A [`Station`] pairs the run's shared *capital* (global state, held behind
//! an [`Arc`]) with the current *change* (the task-local work packet). Each
//! task reads the change, and its deliver phase hands the next task a new
//! station.
//!
//! Branching is asymmetric: capital keeps its identity across branches while
//! change is deep-copied. Mutations to interior-mutable capital fields are
//! visible from every branch; replacing capital in one branch detaches only
//! that branch.

use std::fmt;
use std::sync::Arc;

/// A (capital, change) pair.
///
/// # Example
///
/// ```rust
/// use hustle::Station;
///
/// let station = Station::new(vec!["ledger entry"], 5u32);
/// let branch = station.branch();
///
/// assert!(branch.shares_capital_with(&station));
/// assert_eq!(branch.change(), station.change());
/// ```
pub struct Station<C, L> {
    capital: Arc<C>,
    change: L,
}

impl<C, L> Station<C, L> {
    /// Build a station from owned capital. No validation happens here.
    pub fn new(capital: C, change: L) -> Self {
        Self {
            capital: Arc::new(capital),
            change,
        }
    }

    /// Build a station around capital that is already shared.
    pub fn with_shared_capital(capital: Arc<C>, change: L) -> Self {
        Self { capital, change }
    }

    /// The shared global state.
    pub fn capital(&self) -> &C {
        &self.capital
    }

    /// The handle to the shared global state.
    pub fn shared_capital(&self) -> &Arc<C> {
        &self.capital
    }

    /// The current local state.
    pub fn change(&self) -> &L {
        &self.change
    }

    /// Mutable access to the local state.
    pub fn change_mut(&mut self) -> &mut L {
        &mut self.change
    }

    /// Replace capital with a fresh value. Other branches keep the old one.
    pub fn set_capital(&mut self, capital: C) {
        self.capital = Arc::new(capital);
    }

    /// Replace capital with an existing shared handle.
    pub fn set_shared_capital(&mut self, capital: Arc<C>) {
        self.capital = capital;
    }

    /// Replace the local state, returning the previous one.
    pub fn set_change(&mut self, change: L) -> L {
        std::mem::replace(&mut self.change, change)
    }

    /// Consume the station, keeping capital and swapping in new local state.
    pub fn with_change<M>(self, change: M) -> Station<C, M> {
        Station {
            capital: self.capital,
            change,
        }
    }

    /// Update capital in place.
    ///
    /// If the capital is shared with another branch it is cloned first, so
    /// the update lands in this station only (copy-on-write replacement).
    pub fn update_capital<F>(&mut self, f: F)
    where
        C: Clone,
        F: FnOnce(&mut C),
    {
        f(Arc::make_mut(&mut self.capital));
    }

    /// Whether both stations observe the same capital object.
    pub fn shares_capital_with<M>(&self, other: &Station<C, M>) -> bool {
        Arc::ptr_eq(&self.capital, &other.capital)
    }

    /// Split the station into its parts.
    pub fn into_parts(self) -> (Arc<C>, L) {
        (self.capital, self.change)
    }

    /// Produce an isolated station ("undock").
    ///
    /// Capital is shared by reference; change is deep-copied through its
    /// `Clone` impl, so the two branches never observe each other's local
    /// state.
    pub fn branch(&self) -> Self
    where
        L: Clone,
    {
        Self {
            capital: Arc::clone(&self.capital),
            change: self.change.clone(),
        }
    }
}

impl<C: fmt::Debug, L: fmt::Debug> fmt::Debug for Station<C, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Station")
            .field("capital", &self.capital)
            .field("change", &self.change)
            .finish()
    }
}

/// Structural equality: compares capital and change by value.
impl<C: PartialEq, L: PartialEq> PartialEq for Station<C, L> {
    fn eq(&self, other: &Self) -> bool {
        *self.capital == *other.capital && self.change == other.change
    }
}
