//! # Monetary Lab Workspace
//!
//! Umbrella crate for the workspace members:
//!
//! - [`regress_math`]: least-squares, LASSO and cross-validation kernels
//! - [`monetary_lab`]: series loading, period normalization, merging,
//!   derived fields and the regression models built on top
//!
//! ## Example
//!
//! ```
//! use monetary_lab_workspace::monetary_lab::period::{normalize, Granularity};
//!
//! let period = normalize("202303", Granularity::Monthly).unwrap();
//! assert_eq!(period.to_string(), "2023-03");
//! ```

pub use monetary_lab;
pub use regress_math;

/// Crate versions of the workspace members
pub fn versions() -> [(&'static str, &'static str); 2] {
    [
        (monetary_lab::NAME, monetary_lab::VERSION),
        ("regress_math", regress_math::VERSION),
    ]
}
