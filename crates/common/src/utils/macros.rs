//! Macros for reducing boilerplate code
//!
//! The state enums in the cache crates (refresh states, transaction status,
//! eviction policies) all render to and parse from short lowercase names.

/// Implements `as_str`, `Display` and `FromStr` for a fieldless state enum
///
/// Parsing is case-insensitive; rendering always produces the listed name.
///
/// ```rust
/// use repocache_common::impl_state_names;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// pub enum Phase {
///     Idle,
///     Running,
/// }
///
/// impl_state_names!(Phase {
///     Idle => "idle",
///     Running => "running",
/// });
///
/// assert_eq!(Phase::Running.to_string(), "running");
/// assert_eq!("IDLE".parse::<Phase>(), Ok(Phase::Idle));
/// ```
#[macro_export]
macro_rules! impl_state_names {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Stable lowercase name of this state
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
