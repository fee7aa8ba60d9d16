/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that are used across the view, channel, and log components of the crate.
//!
//! Types specific to a single component can be found in that component's "types" submodule, e.g.,
//! [`crate::view::types`].

pub mod data_types;

pub mod log;
