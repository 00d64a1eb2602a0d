// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod certificate;
pub mod commands;
pub mod dispatch;
pub mod endpoint;
pub mod ids;
pub mod model;
pub mod settings;
pub mod state;

pub use certificate::*;
pub use commands::*;
pub use dispatch::*;
pub use endpoint::*;
pub use ids::*;
pub use model::*;
pub use settings::*;
pub use state::*;
