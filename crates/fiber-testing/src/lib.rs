//! Testing utilities and harness for fiber-core

pub mod testing;

pub use testing::*;

pub mod prelude {
    pub use crate::testing::*;
}
