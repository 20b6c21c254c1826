//! Counter store with a getter, an action, a subscriber and a watcher

use corral::{Module, Mutation, Store, WatchOptions};
use futures::executor::block_on;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Counter Store ===\n");

    let store = Store::new(
        Module::new()
            .state(json!({ "count": 0, "step": 1 }))
            .mutation("increment", |state, _| {
                let count = state["count"].as_i64().unwrap_or(0);
                let step = state["step"].as_i64().unwrap_or(1);
                state["count"] = json!(count + step);
            })
            .mutation("setStep", |state, step| state["step"] = step.clone())
            .mutation("reset", |state, _| state["count"] = json!(0))
            .getter("parity", |state, _, _| {
                let even = state["count"].as_i64().unwrap_or(0) % 2 == 0;
                json!(if even { "even" } else { "odd" })
            })
            .action("incrementBy", |ctx, times| {
                for _ in 0..times.as_u64().unwrap_or(1) {
                    ctx.commit("increment", Value::Null)?;
                }
                Ok(ctx.state()?["count"].clone())
            }),
    )?;

    println!("1. Subscribing to commits");
    let unsubscribe = store.subscribe(Arc::new(|mutation: &Mutation, state: &Value| {
        println!("   [commit] {} -> count = {}", mutation.mutation_type, state["count"]);
    }));

    println!("\n2. Watching the count");
    let watcher = store.watch(
        |state| state["count"].clone(),
        |new, old| println!("   [watch] count changed: {old} -> {new}"),
        WatchOptions::default().sync(),
    );

    println!("\n3. Committing mutations");
    store.commit("increment", Value::Null)?;
    store.commit("setStep", json!(5))?;
    store.commit("increment", Value::Null)?;
    println!("   parity: {:?}", store.getters().get("parity"));

    println!("\n4. Dispatching an action");
    if let Some(future) = store.dispatch("incrementBy", json!(3)) {
        let count = block_on(future)?;
        println!("   action resolved with count = {count}");
    }

    println!("\n5. Direct assignment is rejected");
    if let Err(err) = store.set_state(json!({})) {
        println!("   {err}");
    }

    println!("\n6. Cleaning up");
    unsubscribe.unsubscribe();
    watcher.unwatch();
    store.commit("reset", Value::Null)?;
    println!("   final state: {}", store.state());

    Ok(())
}
