// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod document;
pub mod ids;
pub mod model;
pub mod overlay;
pub mod page;
pub mod position;
pub mod state;
pub mod validation;

pub use document::*;
pub use ids::*;
pub use model::*;
pub use overlay::*;
pub use page::*;
pub use position::*;
pub use state::*;
pub use validation::*;
