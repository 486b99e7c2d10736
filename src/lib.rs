pub mod dsl;
pub mod error;
pub mod model;
pub mod paths;
pub mod settings;
pub mod util;
