//! Selector-layer demo: `watch`, `on`, and `select`.
//!
//! Run with: cargo run --example watch_select

use keywise::{on, select, watch, SelectOptions, Store, WatchOptions};

fn main() {
    let store = Store::builder()
        .field("first", "Ada".to_string())
        .field("last", "Lovelace".to_string())
        .field("visits", 0u32)
        .action("rename", |cx, args| {
            let name = args
                .first()
                .and_then(|v| v.downcast_ref::<String>())
                .cloned()
                .unwrap_or_default();
            cx.set("first", name)?;
            Ok(None)
        })
        .action("visit", |cx, _args| {
            cx.update("visits", |n: u32| n + 1)?;
            Ok(None)
        })
        .build();

    // Watch a derived value; only fires when the full name changes.
    let _name_watch = watch(
        &store,
        |view| {
            format!(
                "{} {}",
                view.get::<String>("first").unwrap(),
                view.get::<String>("last").unwrap()
            )
        },
        |name, _changed| println!("watch: name is now {name}"),
        WatchOptions::new().keys(&["first", "last"]).fire_immediately(),
    );

    // React to explicit keys with the changed-key set in hand.
    let _visits_sub = on(&store, &["visits"], |changed| {
        println!("on: changed keys {changed:?}");
    });

    // A derived handle other code can poll or subscribe to.
    let visits = select(
        &store,
        |view| view.get::<u32>("visits").unwrap(),
        SelectOptions::new().keys(&["visits"]),
    );

    store.call("visit", &[]).unwrap();
    store.call("visit", &[]).unwrap();
    store
        .call("rename", &[keywise::Value::new("Grace".to_string())])
        .unwrap();

    println!("select: visits = {}", visits.get());
}
