//! Attribute references — the named data items actions exchange.

use std::fmt;

use indexmap::IndexMap;

/// A reference to a named data item, qualified by its owning namespace
/// (an agent or action name).
///
/// Identity is the `(owner, name)` pair: two references with the same
/// name under different owners denote different attributes. Attribute
/// payloads themselves are opaque to the scheduling layer — see
/// [`AttrValue`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrRef {
    /// Owning namespace, usually an agent name.
    pub owner: String,
    /// Attribute name, unique within its owner.
    pub name: String,
}

impl AttrRef {
    /// Create a reference to `owner.name`.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for AttrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.name)
    }
}

/// Opaque attribute payload: a flat slice of doubles.
///
/// The scheduling layer never interprets payload contents beyond the
/// finiteness checks performed by interpolation; mesh data, solver state,
/// and anything else an action exchanges is flattened into this shape by
/// the collaborators that own it.
pub type AttrValue = Vec<f64>;

/// Attribute storage for one scheduler.
///
/// Holds the merged outputs of completed actions across rounds, keyed by
/// [`AttrRef`]. Backed by an [`IndexMap`] so iteration order follows
/// first insertion — snapshots and checkpoint publication are therefore
/// deterministic across runs.
#[derive(Clone, Debug, Default)]
pub struct AttrStore {
    values: IndexMap<AttrRef, AttrValue>,
}

impl AttrStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of an attribute, if it has ever been produced.
    pub fn get(&self, attr: &AttrRef) -> Option<&[f64]> {
        self.values.get(attr).map(Vec::as_slice)
    }

    /// Replace (or insert) an attribute's value.
    pub fn set(&mut self, attr: AttrRef, value: AttrValue) {
        self.values.insert(attr, value);
    }

    /// Copy out the values for a set of attributes.
    ///
    /// Attributes not yet present are skipped; the scheduler only cuts
    /// snapshots for read-sets it has already marked produced.
    pub fn snapshot_of<'a, I>(&self, attrs: I) -> IndexMap<AttrRef, AttrValue>
    where
        I: IntoIterator<Item = &'a AttrRef>,
    {
        let mut out = IndexMap::new();
        for attr in attrs {
            if let Some(v) = self.values.get(attr) {
                out.insert(attr.clone(), v.clone());
            }
        }
        out
    }

    /// Number of attributes ever produced.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing has been produced yet.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(attr, value)` pairs in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&AttrRef, &AttrValue)> {
        self.values.iter()
    }
}
