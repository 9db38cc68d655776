//! Fuzz target for scalar override parsing.
//!
//! Any token must parse to a value of the requested kind, and valid
//! renderings must survive a parse.

#![no_main]

use libfuzzer_sys::fuzz_target;

use expflag_core::{FlagType, FlagValueType};

fuzz_target!(|token: &str| {
    for kind in FlagValueType::ALL {
        assert_eq!(kind.parse(token).value_type(), kind);
    }

    let n = i32::parse(token);
    assert_eq!(i32::parse(&n.to_string()), n);

    let u = u32::parse(token);
    assert_eq!(u32::parse(&u.to_string()), u);

    let b = bool::parse(token);
    assert_eq!(bool::parse(&b.to_string()), b);
});
