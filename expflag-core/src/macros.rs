//! Flag declaration macro.

/// Declare a group of flags as a struct of typed handles.
///
/// Each field becomes a flag named after the field. The generated
/// `register` registers every flag into a [`FlagRegistry`](crate::FlagRegistry);
/// `register_global` does the same against the process registry.
///
/// ```
/// use expflag_core::{exp_flags, ExpEnvironment, FlagRegistry};
///
/// exp_flags! {
///     pub struct SearchFlags {
///         pub new_ranker: bool = false,
///         pub max_results: u32 = 50,
///         pub boost: f32 = 1.0,
///     }
/// }
///
/// let mut registry = FlagRegistry::new();
/// let flags = SearchFlags::register(&mut registry).unwrap();
/// let env = ExpEnvironment::from_config_str(registry, "[wide]\nmax_results = 200\n").unwrap();
///
/// assert_eq!(env.get_uint32(Some("wide"), flags.max_results), 200);
/// assert!(!env.get_bool(Some("wide"), flags.new_ranker));
/// ```
#[macro_export]
macro_rules! exp_flags {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty = $default:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $crate::FlagId<$ty>,
            )*
        }

        impl $name {
            /// Register every flag of this group.
            pub fn register(registry: &mut $crate::FlagRegistry) -> $crate::Result<Self> {
                Ok(Self {
                    $( $field: registry.register::<$ty>(stringify!($field), $default)?, )*
                })
            }

            /// Register every flag of this group in the process registry.
            pub fn register_global() -> $crate::Result<Self> {
                Ok(Self {
                    $( $field: $crate::global::register::<$ty>(stringify!($field), $default)?, )*
                })
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{FlagRegistry, FlagValue, StartupError};

    exp_flags! {
        /// Flags used by the macro tests.
        struct TestFlags {
            verbose: bool = true,
            retries: i32 = 3,
            budget: u32 = 1_000,
            temperature: f32 = 0.7,
        }
    }

    #[test]
    fn test_macro_registers_all_flags() {
        let mut registry = FlagRegistry::new();
        let flags = TestFlags::register(&mut registry).unwrap();

        assert_eq!(registry.len(), 4);
        assert_eq!(registry.default_of(flags.verbose), Some(true));
        assert_eq!(registry.default_of(flags.retries), Some(3));
        assert_eq!(registry.default_of(flags.budget), Some(1_000));
        assert_eq!(
            registry.lookup("temperature").map(|(_, flag)| flag.value()),
            Some(FlagValue::Float(0.7))
        );
    }

    #[test]
    fn test_macro_group_registered_twice_fails() {
        let mut registry = FlagRegistry::new();
        TestFlags::register(&mut registry).unwrap();
        let err = TestFlags::register(&mut registry).unwrap_err();
        assert!(matches!(err, StartupError::DuplicateFlag { ref name } if name == "verbose"));
    }
}
