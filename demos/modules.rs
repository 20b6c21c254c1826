//! Nested modules, runtime registration and hot updates

use corral::scheduler::TokioScheduler;
use corral::{HotUpdate, Module, Store, StoreConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn cart() -> Module {
    Module::new()
        .state(json!({ "items": [] }))
        .mutation("addItem", |state, item| {
            if let Some(items) = state["items"].as_array_mut() {
                items.push(item.clone());
            }
        })
        .getter("itemCount", |state, _, _| {
            json!(state["items"].as_array().map_or(0, Vec::len))
        })
        .async_action("checkout", |ctx, _| async move {
            tokio::task::yield_now().await;
            let count = ctx.getters().get("itemCount").unwrap_or(Value::Null);
            ctx.commit("clearCart", Value::Null)?;
            Ok(json!({ "checkedOut": count, "user": ctx.root_state()["user"] }))
        })
        .mutation("clearCart", |state, _| state["items"] = json!([]))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Modules ===\n");

    let store = Store::with_config(
        Module::new()
            .state(json!({ "user": "ada" }))
            .mutation("login", |state, user| state["user"] = user.clone())
            .module("cart", cart()),
        StoreConfig::default().scheduler(Arc::new(TokioScheduler::new())),
    )?;

    println!("1. Module state is nested by path");
    store.commit("addItem", json!("apple"))?;
    store.commit("addItem", json!("pear"))?;
    println!("   state: {}", store.state());

    println!("\n2. Registering a module at runtime");
    store.register_module(
        "wishlist",
        Module::new()
            .state(json!({ "wanted": [] }))
            .mutation("wish", |state, item| {
                if let Some(wanted) = state["wanted"].as_array_mut() {
                    wanted.push(item.clone());
                }
            }),
    )?;
    store.commit("wish", json!("kiwi"))?;
    println!("   runtime modules: {:?}", store.runtime_modules());
    println!("   state: {}", store.state());

    println!("\n3. Hot updating the root mutations");
    store.hot_update(HotUpdate::new().mutation("login", |state, user| {
        state["user"] = json!(format!("{}!", user.as_str().unwrap_or_default()));
    }))?;
    store.commit("login", json!("grace"))?;
    println!("   state survived: {}", store.state());

    println!("\n4. Dispatching an async action");
    if let Some(future) = store.dispatch("checkout", Value::Null) {
        println!("   result: {}", future.await?);
    }

    println!("\n5. Unregistering the runtime module");
    store.unregister_module("wishlist")?;
    println!("   state: {}", store.state());

    Ok(())
}
