pub mod logging;
pub mod numeric;
