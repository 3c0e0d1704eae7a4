//! Module registration, script-side require, and host-side publication

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{bridge, caught, eval_in};
use caramel::{Error, HostValue};

fn config_value() -> HostValue {
    let mut entries = indexmap::IndexMap::new();
    entries.insert("version".to_string(), HostValue::Int(3));
    entries.insert("name".to_string(), HostValue::Str("caramel".to_string()));
    HostValue::Map(entries)
}

#[test]
fn test_require_resolves_registered_modules() {
    let ctx = bridge();
    ctx.register_module("config", config_value);

    assert_eq!(
        eval_in(&ctx, "var c = Caramel.require('config'); c.version"),
        HostValue::Int(3)
    );
    assert_eq!(
        eval_in(&ctx, "c.name"),
        HostValue::Str("caramel".to_string())
    );
}

#[test]
fn test_publish_module_binds_the_key_as_global() {
    let ctx = bridge();
    ctx.register_module("config", config_value);
    ctx.publish_module("config", None).unwrap();

    assert_eq!(eval_in(&ctx, "config.version"), HostValue::Int(3));
}

#[test]
fn test_publish_module_honors_an_alias() {
    let ctx = bridge();
    ctx.register_module("config", config_value);
    ctx.publish_module("config", Some("cfg")).unwrap();

    assert_eq!(eval_in(&ctx, "cfg.version"), HostValue::Int(3));
    assert_eq!(eval_in(&ctx, "typeof config"), HostValue::Str("undefined".to_string()));
}

#[test]
fn test_registering_again_replaces_the_publisher() {
    let ctx = bridge();
    ctx.register_module("config", config_value);
    ctx.register_module("config", || HostValue::Int(99));

    assert_eq!(
        eval_in(&ctx, "Caramel.require('config')"),
        HostValue::Int(99)
    );
}

#[test]
fn test_unknown_module_key_errors() {
    let ctx = bridge();

    let err = ctx.publish_module("ghost", None).unwrap_err();
    assert!(matches!(err, Error::ModuleNotFound { .. }), "{err}");
    assert!(err.to_string().contains("ghost"), "{err}");

    let text = caught(&ctx, "Caramel.require('ghost')");
    assert!(text.contains("module not found: ghost"), "{text}");
}

#[test]
fn test_publishers_run_once_per_resolution() {
    let ctx = bridge();
    let served = Arc::new(AtomicUsize::new(0));
    let counter = served.clone();
    ctx.register_module("ticket", move || {
        HostValue::Int(counter.fetch_add(1, Ordering::SeqCst) as i64)
    });

    assert_eq!(served.load(Ordering::SeqCst), 0);
    assert_eq!(eval_in(&ctx, "Caramel.require('ticket')"), HostValue::Int(0));
    assert_eq!(eval_in(&ctx, "Caramel.require('ticket')"), HostValue::Int(1));
    ctx.publish_module("ticket", Some("t")).unwrap();
    assert_eq!(served.load(Ordering::SeqCst), 3);
}
