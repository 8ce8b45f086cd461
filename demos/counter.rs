//! Counter demo: tracked reads, selective notification, and a getter.
//!
//! Run with: cargo run --example counter

use keywise::{Store, Value};

fn main() {
    let store = Store::builder()
        .field("count", 0i32)
        .field("step", 1i32)
        .action("inc", |cx, _args| {
            let step: i32 = cx.get("step")?;
            cx.update("count", |n: i32| n + step)?;
            Ok(None)
        })
        .action("set_step", |cx, args| {
            let step = args
                .first()
                .and_then(|v| v.downcast_ref::<i32>())
                .copied()
                .unwrap_or(1);
            cx.set("step", step)?;
            Ok(None)
        })
        .action("doubled", |cx, _args| {
            let n: i32 = cx.get("count")?;
            Ok(Some(Value::new(n * 2)))
        })
        .build();

    // A subscriber that only cares about `count`.
    let store_for_render = store.clone();
    let sub = store.subscribe(move || {
        let count: i32 = store_for_render.get_raw("count").unwrap();
        println!("render: count = {count}");
    });

    // Seed the dependency set the way a first render would.
    let _: i32 = sub.view().get("count").unwrap();

    store.call("inc", &[]).unwrap(); // render: count = 1
    let _: i32 = sub.view().get("count").unwrap();

    // Changing `step` does not notify: this subscriber never read it.
    store.call("set_step", &[Value::new(10i32)]).unwrap();

    store.call("inc", &[]).unwrap(); // render: count = 11
    let _: i32 = sub.view().get("count").unwrap();

    // Getters compute without notifying anyone.
    let doubled = store.call("doubled", &[]).unwrap().unwrap();
    println!("doubled = {}", doubled.downcast_ref::<i32>().unwrap());

    println!("final count = {}", store.get_raw::<i32>("count").unwrap());
}
