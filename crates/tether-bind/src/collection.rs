#![forbid(unsafe_code)]

//! Observable and filtered collections.
//!
//! [`ObservableCollection`] is an ordered, duplicate-friendly sequence that
//! emits events on mutation. [`ViewCollection`] layers a predicate over it
//! and exposes the filtered view as its own bindable source.
//!
//! # Notification contract
//!
//! Every mutating operation that actually changes the sequence fires its
//! item-level events (`item_added` / `item_removed`, with the resulting or
//! vacated index and the item in the event data; `reordered` for sorts)
//! *after* the mutation is fully applied, then exactly one `changed`. An
//! ineffective operation — removing absent items, clearing an empty
//! collection, a sort that moves nothing — fires nothing.
//!
//! # Binding refresh
//!
//! After `changed`, the collection runs a non-recursive update of the
//! binding context that was active when the collection was constructed.
//! Bindings sourced from the collection's `contents` (or a view's `view`)
//! are therefore refreshed by push, not by polling. The reentrancy latch in
//! [`BindingContext::update`] keeps a mutation performed *by* a binding
//! from recursing.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use std::cell::RefCell;

use tether_core::error::AccessError;
use tether_core::value::Value;

use crate::accessor::{Fields, Target};
use crate::context::BindingContext;
use crate::event::Event;

struct CollectionInner {
    items: RefCell<Vec<Value>>,
    item_added: Event,
    item_removed: Event,
    reordered: Event,
    changed: Event,
    /// Context to refresh after each effective mutation; captured at
    /// construction.
    refresh: Option<BindingContext>,
}

impl CollectionInner {
    fn new(initial: Vec<Value>) -> Self {
        Self {
            items: RefCell::new(initial),
            item_added: Event::new("item_added"),
            item_removed: Event::new("item_removed"),
            reordered: Event::new("reordered"),
            changed: Event::new("changed"),
            refresh: BindingContext::active(),
        }
    }

    fn touch(&self) {
        self.changed.fire(&[], &[]);
        if let Some(ctx) = &self.refresh {
            if let Err(e) = ctx.update(false) {
                // Reachable only under break_on_bind_failure.
                tracing::warn!(error = %e, "collection-triggered binding refresh failed");
            }
        }
    }
}

impl Fields for CollectionInner {
    fn get_field(&self, field: &str) -> Result<Value, AccessError> {
        match field {
            "contents" => Ok(Value::List(self.items.borrow().clone())),
            "count" => Ok(Value::Int(self.items.borrow().len() as i64)),
            _ => Err(AccessError::MissingField {
                field: field.to_owned(),
            }),
        }
    }

    fn set_field(&self, field: &str, _value: Value) -> Result<(), AccessError> {
        if self.has_field(field) {
            Err(AccessError::NotWritable {
                field: field.to_owned(),
            })
        } else {
            Err(AccessError::MissingField {
                field: field.to_owned(),
            })
        }
    }

    fn has_field(&self, field: &str) -> bool {
        matches!(field, "contents" | "count")
    }
}

/// An event-emitting ordered sequence. Cloning yields another handle to the
/// same sequence.
#[derive(Clone)]
pub struct ObservableCollection {
    inner: Rc<CollectionInner>,
}

impl ObservableCollection {
    /// A collection seeded with `initial` items. No events fire for the
    /// seed. The active binding context, if any, becomes the refresh target
    /// for later mutations.
    pub fn new(initial: impl IntoIterator<Item = Value>) -> Self {
        Self {
            inner: Rc::new(CollectionInner::new(initial.into_iter().collect())),
        }
    }

    /// Snapshot of the items.
    #[must_use]
    pub fn items(&self) -> Vec<Value> {
        self.inner.items.borrow().clone()
    }

    /// The item at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Append items. Fires one `item_added` per item, then `changed`.
    pub fn add(&self, items: impl IntoIterator<Item = Value>) {
        let mut added: Vec<(usize, Value)> = Vec::new();
        {
            let mut vec = self.inner.items.borrow_mut();
            for item in items {
                vec.push(item.clone());
                added.push((vec.len() - 1, item));
            }
        }
        if added.is_empty() {
            return;
        }
        for (index, item) in added {
            self.inner.item_added.fire(
                &[],
                &[("index", Value::Int(index as i64)), ("item", item)],
            );
        }
        self.inner.touch();
    }

    /// Insert `item` at `index` (clamped to the end). Fires `item_added`
    /// then `changed`.
    pub fn insert(&self, index: usize, item: Value) {
        let at = {
            let mut vec = self.inner.items.borrow_mut();
            let at = index.min(vec.len());
            vec.insert(at, item.clone());
            at
        };
        self.inner
            .item_added
            .fire(&[], &[("index", Value::Int(at as i64)), ("item", item)]);
        self.inner.touch();
    }

    /// Remove the first occurrence of each requested item (value equality).
    ///
    /// Returns how many were removed. Absent items are skipped; when none
    /// of the requested items were present, nothing fires.
    pub fn remove(&self, items: &[Value]) -> usize {
        let mut removed: Vec<(usize, Value)> = Vec::new();
        {
            let mut vec = self.inner.items.borrow_mut();
            for wanted in items {
                if let Some(pos) = vec.iter().position(|x| x == wanted) {
                    let item = vec.remove(pos);
                    removed.push((pos, item));
                }
            }
        }
        if removed.is_empty() {
            return 0;
        }
        let count = removed.len();
        for (index, item) in removed {
            self.inner.item_removed.fire(
                &[],
                &[("index", Value::Int(index as i64)), ("item", item)],
            );
        }
        self.inner.touch();
        count
    }

    /// Remove everything. Fires one `item_removed` per item, then
    /// `changed`. An empty collection fires nothing.
    pub fn clear(&self) {
        let drained: Vec<Value> = {
            let mut vec = self.inner.items.borrow_mut();
            std::mem::take(&mut *vec)
        };
        if drained.is_empty() {
            return;
        }
        for (index, item) in drained.into_iter().enumerate() {
            self.inner.item_removed.fire(
                &[],
                &[("index", Value::Int(index as i64)), ("item", item)],
            );
        }
        self.inner.touch();
    }

    /// Sort by the natural value order ([`Value::total_cmp`]). Fires
    /// `reordered` then `changed` only if the order actually changed.
    pub fn sort(&self) {
        self.sort_by(Value::total_cmp);
    }

    /// Sort with a comparator. Fires `reordered` then `changed` only if the
    /// order actually changed.
    pub fn sort_by(&self, compare: impl Fn(&Value, &Value) -> Ordering) {
        let moved = {
            let mut vec = self.inner.items.borrow_mut();
            let before = vec.clone();
            vec.sort_by(|a, b| compare(a, b));
            *vec != before
        };
        if moved {
            self.inner.reordered.fire(&[], &[]);
            self.inner.touch();
        }
    }

    /// The `item_added` event.
    #[must_use]
    pub fn item_added(&self) -> &Event {
        &self.inner.item_added
    }

    /// The `item_removed` event.
    #[must_use]
    pub fn item_removed(&self) -> &Event {
        &self.inner.item_removed
    }

    /// The `reordered` event.
    #[must_use]
    pub fn reordered(&self) -> &Event {
        &self.inner.reordered
    }

    /// The `changed` event: exactly one firing per effective mutation.
    #[must_use]
    pub fn changed(&self) -> &Event {
        &self.inner.changed
    }

    /// Expose the collection as a bindable target with read-only `contents`
    /// and `count` fields.
    #[must_use]
    pub fn as_target(&self) -> Target {
        Target::Object(Rc::clone(&self.inner) as Rc<dyn Fields>)
    }
}

impl fmt::Debug for ObservableCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableCollection")
            .field("len", &self.len())
            .finish()
    }
}

type Predicate = Rc<dyn Fn(&Value) -> bool>;

struct ViewInner {
    base: ObservableCollection,
    predicate: RefCell<Predicate>,
    view_changed: Event,
}

impl ViewInner {
    fn view(&self) -> Vec<Value> {
        // Always recomputed fresh; never patched incrementally.
        let predicate = self.predicate.borrow().clone();
        self.base
            .inner
            .items
            .borrow()
            .iter()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }
}

impl Fields for ViewInner {
    fn get_field(&self, field: &str) -> Result<Value, AccessError> {
        match field {
            "view" => Ok(Value::List(self.view())),
            _ => self.base.inner.get_field(field),
        }
    }

    fn set_field(&self, field: &str, value: Value) -> Result<(), AccessError> {
        if field == "view" {
            Err(AccessError::NotWritable {
                field: field.to_owned(),
            })
        } else {
            self.base.inner.set_field(field, value)
        }
    }

    fn has_field(&self, field: &str) -> bool {
        field == "view" || self.base.inner.has_field(field)
    }
}

/// An observable collection plus a predicate-filtered view.
///
/// The view is commonly the bind source, so replacing the predicate fires
/// its own `view_changed` event — distinct from `changed`, and fired even
/// when the recomputed view is identical — and triggers the same binding
/// refresh as a mutation.
#[derive(Clone)]
pub struct ViewCollection {
    inner: Rc<ViewInner>,
}

impl ViewCollection {
    /// A view collection seeded with `initial` items and an always-true
    /// predicate.
    pub fn new(initial: impl IntoIterator<Item = Value>) -> Self {
        Self::over(ObservableCollection::new(initial))
    }

    /// Layer a view over an existing collection.
    #[must_use]
    pub fn over(base: ObservableCollection) -> Self {
        Self {
            inner: Rc::new(ViewInner {
                base,
                predicate: RefCell::new(Rc::new(|_| true)),
                view_changed: Event::new("view_changed"),
            }),
        }
    }

    /// The underlying collection handle.
    #[must_use]
    pub fn collection(&self) -> &ObservableCollection {
        &self.inner.base
    }

    /// The filtered contents, recomputed fresh from the items and the
    /// current predicate.
    #[must_use]
    pub fn view(&self) -> Vec<Value> {
        self.inner.view()
    }

    /// Replace the predicate, fire `view_changed`, and refresh bindings.
    ///
    /// Redundant updates are not suppressed: setting an equivalent
    /// predicate still notifies.
    pub fn update_filter(&self, predicate: impl Fn(&Value) -> bool + 'static) {
        *self.inner.predicate.borrow_mut() = Rc::new(predicate);
        self.inner.view_changed.fire(&[], &[]);
        if let Some(ctx) = &self.inner.base.inner.refresh {
            if let Err(e) = ctx.update(false) {
                tracing::warn!(error = %e, "view-triggered binding refresh failed");
            }
        }
    }

    /// The `view_changed` event.
    #[must_use]
    pub fn view_changed(&self) -> &Event {
        &self.inner.view_changed
    }

    /// Expose the view as a bindable target with a read-only `view` field
    /// (plus the base `contents` and `count`).
    #[must_use]
    pub fn as_target(&self) -> Target {
        Target::Object(Rc::clone(&self.inner) as Rc<dyn Fields>)
    }

    /// Append items to the underlying collection.
    pub fn add(&self, items: impl IntoIterator<Item = Value>) {
        self.inner.base.add(items);
    }

    /// Remove items from the underlying collection.
    pub fn remove(&self, items: &[Value]) -> usize {
        self.inner.base.remove(items)
    }
}

impl fmt::Debug for ViewCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewCollection")
            .field("len", &self.inner.base.len())
            .field("view_len", &self.view().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventArgs, Handler};
    use std::cell::Cell;

    fn ints(values: impl IntoIterator<Item = i64>) -> Vec<Value> {
        values.into_iter().map(Value::Int).collect()
    }

    fn counter(event: &Event) -> (Rc<Cell<usize>>, Handler) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let handler: Handler = Rc::new(move |_args: &EventArgs| c.set(c.get() + 1));
        event.subscribe(&handler);
        (count, handler)
    }

    #[test]
    fn add_fires_item_added_then_one_changed() {
        let col = ObservableCollection::new(ints([1, 2]));
        let (added, _h1) = counter(col.item_added());
        let (changed, _h2) = counter(col.changed());

        col.add(ints([3, 4]));
        assert_eq!(added.get(), 2, "one item_added per item");
        assert_eq!(changed.get(), 1, "exactly one changed per mutation");
        assert_eq!(col.items(), ints([1, 2, 3, 4]));
    }

    #[test]
    fn added_index_is_the_resulting_position() {
        let col = ObservableCollection::new(ints([1]));
        let seen = Rc::new(Cell::new(-1_i64));
        let s = Rc::clone(&seen);
        let handler: Handler = Rc::new(move |args| {
            s.set(args.get("index").and_then(Value::as_int).unwrap_or(-1));
        });
        col.item_added().subscribe(&handler);

        col.insert(0, Value::from(9));
        assert_eq!(seen.get(), 0);
        assert_eq!(col.items(), ints([9, 1]));

        col.insert(100, Value::from(5));
        assert_eq!(seen.get(), 2, "out-of-range insert clamps to the end");
    }

    #[test]
    fn remove_present_fires_once_each() {
        let col = ObservableCollection::new(ints([1, 2, 3]));
        let (removed, _h1) = counter(col.item_removed());
        let (changed, _h2) = counter(col.changed());

        assert_eq!(col.remove(&ints([2])), 1);
        assert_eq!(removed.get(), 1);
        assert_eq!(changed.get(), 1);
        assert_eq!(col.items(), ints([1, 3]));
    }

    #[test]
    fn remove_absent_fires_nothing() {
        let col = ObservableCollection::new(ints([1, 2, 3]));
        let (removed, _h1) = counter(col.item_removed());
        let (changed, _h2) = counter(col.changed());

        assert_eq!(col.remove(&ints([99])), 0);
        assert_eq!(removed.get(), 0, "no item_removed for an absent item");
        assert_eq!(changed.get(), 0, "no changed when nothing was removed");
    }

    #[test]
    fn remove_takes_first_occurrence_only() {
        let col = ObservableCollection::new(ints([1, 2, 1, 2]));
        assert_eq!(col.remove(&ints([1])), 1);
        assert_eq!(col.items(), ints([2, 1, 2]));
    }

    #[test]
    fn clear_fires_per_item_then_changed_once() {
        let col = ObservableCollection::new(ints([1, 2]));
        let (removed, _h1) = counter(col.item_removed());
        let (changed, _h2) = counter(col.changed());

        col.clear();
        assert_eq!(removed.get(), 2);
        assert_eq!(changed.get(), 1);
        assert!(col.is_empty());

        col.clear();
        assert_eq!(changed.get(), 1, "clearing an empty collection fires nothing");
    }

    #[test]
    fn sort_fires_only_when_order_changes() {
        let col = ObservableCollection::new(ints([3, 1, 2]));
        let (reordered, _h1) = counter(col.reordered());
        let (changed, _h2) = counter(col.changed());

        col.sort();
        assert_eq!(col.items(), ints([1, 2, 3]));
        assert_eq!(reordered.get(), 1);
        assert_eq!(changed.get(), 1);

        col.sort();
        assert_eq!(reordered.get(), 1, "an already-sorted collection fires nothing");
        assert_eq!(changed.get(), 1);
    }

    #[test]
    fn sort_by_custom_comparator() {
        let col = ObservableCollection::new(ints([1, 3, 2]));
        col.sort_by(|a, b| b.total_cmp(a));
        assert_eq!(col.items(), ints([3, 2, 1]));
    }

    #[test]
    fn collection_is_bindable_through_contents_and_count() {
        let col = ObservableCollection::new(ints([1, 2]));
        let Target::Object(obj) = col.as_target() else {
            panic!("as_target should yield an object target");
        };
        assert_eq!(
            obj.get_field("contents").expect("contents"),
            Value::List(ints([1, 2]))
        );
        assert_eq!(obj.get_field("count").expect("count"), Value::from(2));
        assert_eq!(
            obj.set_field("count", Value::from(0)),
            Err(AccessError::NotWritable {
                field: "count".into()
            })
        );
    }

    #[test]
    fn view_defaults_to_everything() {
        let view = ViewCollection::new(ints([1, 2, 3]));
        assert_eq!(view.view(), ints([1, 2, 3]));
    }

    #[test]
    fn update_filter_recomputes_and_notifies() {
        let view = ViewCollection::new(ints(1..=10));
        let (changed, _h) = counter(view.view_changed());

        view.update_filter(|v| v.as_int().is_some_and(|n| n % 2 == 0));
        assert_eq!(view.view(), ints([2, 4, 6, 8, 10]));
        assert_eq!(changed.get(), 1);

        // Same predicate again: no suppression of redundant updates.
        view.update_filter(|v| v.as_int().is_some_and(|n| n % 2 == 0));
        assert_eq!(changed.get(), 2, "redundant filter updates still notify");
    }

    #[test]
    fn view_tracks_base_mutations() {
        let view = ViewCollection::new(ints([1, 2, 3]));
        view.update_filter(|v| v.as_int().is_some_and(|n| n > 1));
        assert_eq!(view.view(), ints([2, 3]));

        view.add(ints([4]));
        assert_eq!(view.view(), ints([2, 3, 4]), "view recomputes over new items");

        view.remove(&ints([2]));
        assert_eq!(view.view(), ints([3, 4]));
    }

    mod notification_counts {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn remove_fires_iff_something_was_present(
                items in proptest::collection::vec(0i64..5, 0..8),
                wanted in 0i64..5,
            ) {
                let col = ObservableCollection::new(ints(items.clone()));
                let (removed_fires, _h1) = counter(col.item_removed());
                let (changed_fires, _h2) = counter(col.changed());

                let removed = col.remove(&ints([wanted]));
                let present = usize::from(items.contains(&wanted));
                prop_assert_eq!(removed, present);
                prop_assert_eq!(removed_fires.get(), present);
                prop_assert_eq!(changed_fires.get(), present);
            }

            #[test]
            fn view_matches_a_plain_filter(
                items in proptest::collection::vec(-20i64..20, 0..16),
            ) {
                let view = ViewCollection::new(ints(items.clone()));
                view.update_filter(|v| v.as_int().is_some_and(|n| n >= 0));
                let expected: Vec<Value> =
                    ints(items.into_iter().filter(|n| *n >= 0));
                prop_assert_eq!(view.view(), expected);
            }
        }
    }

    #[test]
    fn view_is_bindable() {
        let view = ViewCollection::new(ints([1, 2, 3]));
        view.update_filter(|v| v.as_int().is_some_and(|n| n != 2));
        let Target::Object(obj) = view.as_target() else {
            panic!("as_target should yield an object target");
        };
        assert_eq!(obj.get_field("view").expect("view"), Value::List(ints([1, 3])));
        assert_eq!(obj.get_field("count").expect("count"), Value::from(3));
    }
}
