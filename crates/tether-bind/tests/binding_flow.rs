#![forbid(unsafe_code)]

//! End-to-end flows across accessors, bindings, contexts, and collections:
//! the paths an embedding GUI layer actually exercises.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tether_bind::{
    BindingContext, HostHandle, ObservableCollection, Record, Site, Target, Value, ViewCollection,
    bind_one_way, bind_one_way_with, bind_two_way,
};
use tether_core::error::AccessError;
use tether_core::host::{self, HostBackend};

/// In-memory host: a widget tree reduced to an address→properties table.
#[derive(Default)]
struct FakeHost {
    props: RefCell<BTreeMap<String, BTreeMap<String, Value>>>,
}

impl FakeHost {
    fn seed(self: &Rc<Self>, address: &str, prop: &str, value: Value) {
        self.props
            .borrow_mut()
            .entry(address.to_owned())
            .or_default()
            .insert(prop.to_owned(), value);
    }

    fn delete(&self, address: &str) {
        self.props.borrow_mut().remove(address);
    }
}

impl HostBackend for FakeHost {
    fn query(&self, address: &str, prop: &str) -> Result<Value, AccessError> {
        self.props
            .borrow()
            .get(address)
            .and_then(|props| props.get(prop))
            .cloned()
            .ok_or_else(|| AccessError::Host(format!("{address}.{prop} unknown")))
    }

    fn apply(&self, address: &str, prop: &str, value: Value) -> Result<(), AccessError> {
        self.props
            .borrow_mut()
            .entry(address.to_owned())
            .or_default()
            .insert(prop.to_owned(), value);
        Ok(())
    }

    fn exists(&self, address: &str) -> bool {
        self.props.borrow().contains_key(address)
    }
}

fn ints(values: impl IntoIterator<Item = i64>) -> Vec<Value> {
    values.into_iter().map(Value::Int).collect()
}

#[test]
fn widget_to_widget_sync_through_a_context() {
    let backend = Rc::new(FakeHost::default());
    backend.seed("slider1", "value", Value::from(25));
    backend.seed("field1", "text", Value::from(""));

    let ctx = BindingContext::new(false);
    {
        let _scope = ctx.enter();
        bind_one_way_with(
            &Site::new(
                Target::HostObject(HostHandle::new(backend.clone(), "slider1")),
                "value",
            ),
            &Site::new(
                Target::HostObject(HostHandle::new(backend.clone(), "field1")),
                "text",
            ),
            |v| Value::from(format!("{v}")),
        )
        .expect("both widgets resolve");
    }

    ctx.update(false).expect("update");
    assert_eq!(
        backend.query("field1", "text").expect("query"),
        Value::from("25"),
        "slider value should land in the text field, translated"
    );
}

#[test]
fn deleted_widget_prunes_its_binding_but_not_others() {
    let backend = Rc::new(FakeHost::default());
    backend.seed("a", "v", Value::from(1));
    backend.seed("doomed", "v", Value::from(2));
    backend.seed("sink", "v", Value::from(0));

    let ctx = BindingContext::new(false);
    {
        let _scope = ctx.enter();
        for source in ["a", "doomed"] {
            bind_one_way(
                &Site::new(
                    Target::HostObject(HostHandle::new(backend.clone(), source)),
                    "v",
                ),
                &Site::new(
                    Target::HostObject(HostHandle::new(backend.clone(), "sink")),
                    "v",
                ),
            )
            .expect("resolve");
        }
    }
    assert_eq!(ctx.binding_count(), 2);

    backend.delete("doomed");
    let live = ctx.update(false).expect("update");
    assert_eq!(live, 1, "the binding on the deleted widget is pruned");
    assert_eq!(
        backend.query("sink", "v").expect("query"),
        Value::from(1),
        "the surviving binding still pushes"
    );
}

#[test]
fn external_addressing_uses_the_installed_backend() {
    let backend = Rc::new(FakeHost::default());
    backend.seed("check1", "checked", Value::from(true));
    backend.seed("mirror", "checked", Value::from(false));
    host::install(backend.clone());

    let binding = bind_one_way(
        &Site::new(Target::External("check1".into()), "checked"),
        &Site::new(Target::External("mirror".into()), "checked"),
    )
    .expect("external sites resolve");

    assert!(binding.invoke().expect("invoke"));
    assert_eq!(
        backend.query("mirror", "checked").expect("query"),
        Value::from(true)
    );
    host::clear();
}

#[test]
fn two_way_edit_wars_resolve_with_source_precedence() {
    let model = Record::new().with_field("name", "model").build();
    let widget = Record::new().with_field("name", "widget").build();

    let binding = bind_two_way(
        &Site::new(Target::Object(Rc::clone(&model)), "name"),
        &Site::new(Target::Object(Rc::clone(&widget)), "name"),
    )
    .expect("resolve");

    // Widget edit flows back to the model.
    widget.set_field("name", Value::from("typed")).expect("set");
    assert!(binding.invoke().expect("invoke"));
    assert_eq!(model.get_field("name").expect("get"), Value::from("typed"));

    // Simultaneous edits: the source side wins.
    model.set_field("name", Value::from("model-wins")).expect("set");
    widget.set_field("name", Value::from("widget-loses")).expect("set");
    assert!(binding.invoke().expect("invoke"));
    assert_eq!(
        widget.get_field("name").expect("get"),
        Value::from("model-wins")
    );
    assert_eq!(
        model.get_field("name").expect("get"),
        Value::from("model-wins")
    );
}

#[test]
fn collection_mutation_refreshes_bindings_by_push() {
    let ctx = BindingContext::new(false);
    let label = Record::new().with_field("text", Value::Nil).build();

    let collection = {
        let _scope = ctx.enter();
        let collection = ObservableCollection::new(ints([1, 2]));
        bind_one_way_with(
            &Site::new(collection.as_target(), "count"),
            &Site::new(Target::Object(Rc::clone(&label)), "text"),
            |v| Value::from(format!("{v} items")),
        )
        .expect("resolve");
        collection
    };

    // Priming update, then mutate: the collection refreshes the context
    // itself, with no polling from the caller.
    ctx.update(false).expect("update");
    assert_eq!(label.get_field("text").expect("get"), Value::from("2 items"));

    collection.add(ints([3]));
    assert_eq!(
        label.get_field("text").expect("get"),
        Value::from("3 items"),
        "mutation must push the refresh"
    );

    collection.remove(&ints([1]));
    collection.remove(&ints([99]));
    assert_eq!(
        label.get_field("text").expect("get"),
        Value::from("2 items"),
        "ineffective removes must not disturb the result"
    );
}

#[test]
fn view_filter_change_refreshes_view_sourced_bindings() {
    let ctx = BindingContext::new(false);
    let panel = Record::new().with_field("rows", Value::Nil).build();

    let view = {
        let _scope = ctx.enter();
        let view = ViewCollection::new(ints(1..=10));
        bind_one_way(
            &Site::new(view.as_target(), "view"),
            &Site::new(Target::Object(Rc::clone(&panel)), "rows"),
        )
        .expect("resolve");
        view
    };

    ctx.update(false).expect("update");
    assert_eq!(
        panel.get_field("rows").expect("get"),
        Value::List(ints(1..=10))
    );

    view.update_filter(|v| v.as_int().is_some_and(|n| n % 2 == 0));
    assert_eq!(
        panel.get_field("rows").expect("get"),
        Value::List(ints([2, 4, 6, 8, 10])),
        "filter change must refresh the bound view"
    );
}

#[test]
fn nested_contexts_update_independently_until_recursive() {
    let parent = BindingContext::new(false);
    let src = Record::new().with_field("v", 7).build();
    let parent_dst = Record::new().with_field("v", 0).build();
    let child_dst = Record::new().with_field("v", 0).build();

    let _outer = parent.enter();
    bind_one_way(
        &Site::new(Target::Object(Rc::clone(&src)), "v"),
        &Site::new(Target::Object(Rc::clone(&parent_dst)), "v"),
    )
    .expect("resolve");

    let child = BindingContext::new(false);
    {
        let _inner = child.enter();
        bind_one_way(
            &Site::new(Target::Object(Rc::clone(&src)), "v"),
            &Site::new(Target::Object(Rc::clone(&child_dst)), "v"),
        )
        .expect("resolve");
    }

    parent.update(false).expect("update");
    assert_eq!(parent_dst.get_field("v").expect("get"), Value::from(7));
    assert_eq!(
        child_dst.get_field("v").expect("get"),
        Value::from(0),
        "non-recursive update stops at the parent"
    );

    let live = parent.update(true).expect("recursive update");
    assert_eq!(live, 2);
    assert_eq!(child_dst.get_field("v").expect("get"), Value::from(7));
}
