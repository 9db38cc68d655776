//! Checkout Flags Example
//!
//! Declares a group of flags, writes an override file, initializes the
//! process-wide environment, and reads flags for a few experiments.
//!
//! Run with:
//! ```bash
//! EXPFLAG_LOG_LEVEL=debug cargo run --example checkout
//! ```

use expflag::prelude::*;
use std::fs;

exp_flags! {
    struct CheckoutFlags {
        one_click: bool = false,
        max_cart_items: u32 = 50,
        shipping_offset_days: i32 = 0,
        discount_rate: f32 = 0.0,
    }
}

const OVERRIDES: &str = "\
# checkout experiments
[one_click_rollout]
one_click = true

[holiday_sale]
discount_rate = 0.2
max_cart_items = 100
shipping_offset_days = 2
";

fn main() {
    let flags = CheckoutFlags::register_global().unwrap_or_else(|err| {
        eprintln!("flag registration failed: {err}");
        std::process::exit(1);
    });

    let path = std::env::temp_dir().join("expflag-checkout-demo.conf");
    if let Err(err) = fs::write(&path, OVERRIDES) {
        eprintln!("cannot write {}: {err}", path.display());
        std::process::exit(1);
    }

    let options = EnvironmentOptions::from_env().with_config_path(&path);
    if let Err(err) = global::init_with(&options) {
        eprintln!("startup aborted: {err}");
        std::process::exit(1);
    }

    for experiment in [None, Some("one_click_rollout"), Some("holiday_sale"), Some("unknown")] {
        println!(
            "{:<18} one_click={} max_cart_items={} shipping_offset_days={} discount_rate={}",
            experiment.unwrap_or("<none>"),
            global::get_bool(experiment, flags.one_click),
            global::get_uint32(experiment, flags.max_cart_items),
            global::get_int32(experiment, flags.shipping_offset_days),
            global::get_float(experiment, flags.discount_rate),
        );
    }

    global::print_all();
    let _ = fs::remove_file(&path);
}
