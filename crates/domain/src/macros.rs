//! Declarative helpers for building call arguments and status enums
//!
//! # Example
//!
//! ```rust
//! use vkrelay_domain::params;
//!
//! let args = params! { "user_ids" => 1, "fields" => "photo_50" };
//! assert_eq!(args.len(), 2);
//! assert_eq!(args["fields"], "photo_50");
//! ```

/// Builds a [`Params`](crate::types::Params) map from `key => value` pairs.
///
/// Each value is handed to `serde_json::json!` as raw tokens, so JSON
/// literals (`null`, `{"a": 1}`, `[1, 2]`) and ordinary Rust expressions
/// both work.
#[macro_export]
macro_rules! params {
    (@entries $map:ident;) => {};
    (@entries $map:ident; $key:expr => $($rest:tt)+) => {
        $crate::params!(@value $map; $key; (); $($rest)+);
    };
    (@value $map:ident; $key:expr; ($($value:tt)+); , $($rest:tt)*) => {
        $map.insert(::std::string::String::from($key), ::serde_json::json!($($value)+));
        $crate::params!(@entries $map; $($rest)*);
    };
    (@value $map:ident; $key:expr; ($($value:tt)*); $next:tt $($rest:tt)*) => {
        $crate::params!(@value $map; $key; ($($value)* $next); $($rest)*);
    };
    (@value $map:ident; $key:expr; ($($value:tt)+);) => {
        $map.insert(::std::string::String::from($key), ::serde_json::json!($($value)+));
    };
    () => {
        $crate::types::Params::new()
    };
    ($($body:tt)+) => {{
        let mut params = $crate::types::Params::new();
        $crate::params!(@entries params; $($body)+);
        params
    }};
}

/// Implements Display and FromStr for fieldless enums
///
/// - Display writes the given lowercase label
/// - FromStr parses labels case-insensitively
#[macro_export]
macro_rules! impl_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
